//! Per-node force assembly for the spring network and collision penalties.

use arrayvec::ArrayVec;
use itertools::iproduct;
use vek::Vec3;

use crate::{math, obstacle::Obstacle, settings::Settings};

use super::JelloCube;

const SQRT_2: f64 = std::f64::consts::SQRT_2;
const SQRT_3: f64 = 1.732_050_807_568_877_2;

/// Springs attached to one interior node: 6 structural, 12 + 8 shear, 6 bend.
pub(crate) const MAX_SPRINGS: usize = 32;

/// Neighbor offsets and rest lengths (in units of the lattice spacing) of
/// every spring attached to a node.
///
/// The traversal order is fixed: structural axis neighbors, shear face
/// diagonals grouped by the axis they are orthogonal to, shear body diagonals
/// in sign order, then bend neighbors. Force accumulation follows this order
/// so sums are reproducible run to run.
const SPRINGS: [([i32; 3], f64); MAX_SPRINGS] = [
    // Structural.
    ([-1, 0, 0], 1.0),
    ([1, 0, 0], 1.0),
    ([0, -1, 0], 1.0),
    ([0, 1, 0], 1.0),
    ([0, 0, -1], 1.0),
    ([0, 0, 1], 1.0),
    // Shear, face diagonals orthogonal to x.
    ([0, -1, -1], SQRT_2),
    ([0, -1, 1], SQRT_2),
    ([0, 1, -1], SQRT_2),
    ([0, 1, 1], SQRT_2),
    // Shear, face diagonals orthogonal to y.
    ([-1, 0, -1], SQRT_2),
    ([-1, 0, 1], SQRT_2),
    ([1, 0, -1], SQRT_2),
    ([1, 0, 1], SQRT_2),
    // Shear, face diagonals orthogonal to z.
    ([-1, -1, 0], SQRT_2),
    ([-1, 1, 0], SQRT_2),
    ([1, -1, 0], SQRT_2),
    ([1, 1, 0], SQRT_2),
    // Shear, body diagonals.
    ([-1, -1, -1], SQRT_3),
    ([-1, -1, 1], SQRT_3),
    ([-1, 1, -1], SQRT_3),
    ([-1, 1, 1], SQRT_3),
    ([1, -1, -1], SQRT_3),
    ([1, -1, 1], SQRT_3),
    ([1, 1, -1], SQRT_3),
    ([1, 1, 1], SQRT_3),
    // Bend.
    ([-2, 0, 0], 2.0),
    ([2, 0, 0], 2.0),
    ([0, -2, 0], 2.0),
    ([0, 2, 0], 2.0),
    ([0, 0, -2], 2.0),
    ([0, 0, 2], 2.0),
];

/// One spring endpoint as seen from a node.
pub(crate) struct Spring {
    /// Flat index of the other node.
    pub neighbor: usize,
    /// Rest length in world units.
    pub rest_length: f64,
}

/// Enumerate the springs attached to node `(i, j, k)`.
///
/// Offsets falling outside the lattice carry no spring, the bounding box is
/// the only wall the lattice knows about.
pub(crate) fn node_springs(
    cube: &JelloCube,
    i: usize,
    j: usize,
    k: usize,
) -> ArrayVec<Spring, MAX_SPRINGS> {
    let limit = 0..=cube.resolution() as i32;

    let mut springs = ArrayVec::new();
    for ([di, dj, dk], scale) in SPRINGS {
        let (ni, nj, nk) = (i as i32 + di, j as i32 + dj, k as i32 + dk);
        if limit.contains(&ni) && limit.contains(&nj) && limit.contains(&nk) {
            springs.push(Spring {
                neighbor: cube.index(ni as usize, nj as usize, nk as usize),
                rest_length: scale * cube.rest_length(),
            });
        }
    }

    springs
}

/// Hooke force on the node at `p1` from a spring to `p2`.
///
/// Zero when the endpoints coincide.
pub(crate) fn hooke(p1: Vec3<f64>, p2: Vec3<f64>, k: f64, rest_length: f64) -> Vec3<f64> {
    let delta = p1 - p2;

    -k * (delta.magnitude() - rest_length) * math::normalize_or_zero(delta)
}

/// Damping force on the node at `p1`, opposing velocity along the spring axis.
///
/// Zero when the endpoints coincide.
pub(crate) fn damping(
    p1: Vec3<f64>,
    p2: Vec3<f64>,
    v1: Vec3<f64>,
    v2: Vec3<f64>,
    d: f64,
) -> Vec3<f64> {
    let delta = p1 - p2;
    let length_squared = delta.magnitude_squared();

    if length_squared < 1e-24 {
        return Vec3::zero();
    }

    -d * (v1 - v2).dot(delta) / length_squared * delta
}

/// Penalty force from the bounding box and every obstacle on a single node.
///
/// Each violated surface contributes a zero-rest-length spring to its closest
/// surface point, with the surface itself at rest. A node can collide with
/// several surfaces at once, everything sums.
pub(crate) fn collision_force(
    position: Vec3<f64>,
    velocity: Vec3<f64>,
    obstacles: &[Obstacle],
    settings: &Settings,
) -> Vec3<f64> {
    let mut force = Vec3::zero();

    // Box walls, each axis independently.
    for axis in 0..3 {
        for wall in [settings.bounds, -settings.bounds] {
            let violated = if wall >= 0.0 {
                position[axis] > wall
            } else {
                position[axis] < wall
            };
            if violated {
                let mut surface = position;
                surface[axis] = wall;
                force += hooke(position, surface, settings.k_collision, 0.0);
                force += damping(position, surface, velocity, Vec3::zero(), settings.d_collision);
            }
        }
    }

    for obstacle in obstacles {
        if let Some(surface) = obstacle.closest_surface_point(position) {
            force += hooke(position, surface, settings.k_collision, 0.0);
            force += damping(position, surface, velocity, Vec3::zero(), settings.d_collision);
        }
    }

    force
}

/// Fill `accelerations` with the net acceleration of every node evaluated at
/// the given intermediate state.
///
/// Damping reads the same intermediate velocities the Hooke terms read
/// positions from, so RK4 substages see one coherent state.
pub(crate) fn fill_accelerations(
    cube: &JelloCube,
    positions: &[Vec3<f64>],
    velocities: &[Vec3<f64>],
    obstacles: &[Obstacle],
    settings: &Settings,
    accelerations: &mut [Vec3<f64>],
) {
    puffin::profile_function!();

    let side = cube.resolution() + 1;
    let gravity = Vec3::new(0.0, -settings.gravity, 0.0);

    for (i, j, k) in iproduct!(0..side, 0..side, 0..side) {
        let node = cube.index(i, j, k);

        let mut force = Vec3::zero();
        for spring in node_springs(cube, i, j, k) {
            force += hooke(
                positions[node],
                positions[spring.neighbor],
                settings.k_elastic,
                spring.rest_length,
            );
            force += damping(
                positions[node],
                positions[spring.neighbor],
                velocities[node],
                velocities[spring.neighbor],
                settings.d_elastic,
            );
        }
        force += collision_force(positions[node], velocities[node], obstacles, settings);

        accelerations[node] = force / settings.mass + gravity;
    }
}

/// Elastic energy stored in the spring network, each spring counted once.
#[cfg(test)]
pub(crate) fn spring_potential_energy(cube: &JelloCube, k_elastic: f64) -> f64 {
    let side = cube.resolution() + 1;

    let mut energy = 0.0;
    for (i, j, k) in iproduct!(0..side, 0..side, 0..side) {
        let node = cube.index(i, j, k);
        for spring in node_springs(cube, i, j, k) {
            // Visit each pair from its lower-indexed endpoint only.
            if spring.neighbor > node {
                let length = (cube.positions()[node] - cube.positions()[spring.neighbor]).magnitude();
                energy += 0.5 * k_elastic * (length - spring.rest_length).powi(2);
            }
        }
    }

    energy
}
