//! Mass-spring lattice discretizing the soft cube.
//!
//! Nodes live on a cubic grid of `(resolution + 1)^3` points and are connected
//! implicitly by three spring families: structural springs to the six
//! axis-aligned neighbors, shear springs along the face and body diagonals,
//! and bend springs skipping one node along each axis. The families are never
//! stored, force assembly regenerates them from the neighbor pattern every
//! evaluation.

pub(crate) mod forces;
pub(crate) mod integrator;
pub mod mesh;

use itertools::iproduct;
use vek::Vec3;

/// The deformable cube state: positions and velocities of every lattice node.
pub struct JelloCube {
    /// Lattice subdivision parameter, nodes run `0..=resolution` per axis.
    resolution: usize,
    /// Rest distance between axis-aligned neighbors, `1 / resolution`.
    rest_length: f64,
    /// Node positions, flat-indexed by [`Self::index`].
    positions: Vec<Vec3<f64>>,
    /// Node velocities, same indexing as `positions`.
    velocities: Vec<Vec3<f64>>,
}

impl JelloCube {
    /// Build the lattice at rest, filling `[-1/2, 1/2]^3` around `center`.
    pub fn new(resolution: usize, center: Vec3<f64>) -> Self {
        let rest_length = 1.0 / resolution as f64;
        let side = resolution + 1;

        let positions = iproduct!(0..side, 0..side, 0..side)
            .map(|(i, j, k)| {
                center
                    + Vec3::new(
                        -0.5 + i as f64 * rest_length,
                        -0.5 + j as f64 * rest_length,
                        -0.5 + k as f64 * rest_length,
                    )
            })
            .collect::<Vec<_>>();
        let velocities = vec![Vec3::zero(); positions.len()];

        Self {
            resolution,
            rest_length,
            positions,
            velocities,
        }
    }

    /// Lattice subdivision parameter.
    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// Rest distance between axis-aligned neighbors.
    pub fn rest_length(&self) -> f64 {
        self.rest_length
    }

    /// Total amount of nodes, `(resolution + 1)^3`.
    pub fn node_count(&self) -> usize {
        self.positions.len()
    }

    /// All node positions, flat-indexed.
    pub fn positions(&self) -> &[Vec3<f64>] {
        &self.positions
    }

    /// All node velocities, flat-indexed.
    pub fn velocities(&self) -> &[Vec3<f64>] {
        &self.velocities
    }

    pub(crate) fn positions_mut(&mut self) -> &mut [Vec3<f64>] {
        &mut self.positions
    }

    pub(crate) fn velocities_mut(&mut self) -> &mut [Vec3<f64>] {
        &mut self.velocities
    }

    /// Flat index of lattice coordinate `(i, j, k)`.
    ///
    /// Stable across ticks, the implicit spring families rely on it.
    #[inline]
    pub fn index(&self, i: usize, j: usize, k: usize) -> usize {
        let side = self.resolution + 1;

        (i * side + j) * side + k
    }
}
