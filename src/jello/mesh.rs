//! Triangle mesh over the outer shell of the lattice.

use bytemuck::{Pod, Zeroable};
use itertools::iproduct;

use crate::settings::Material;

use super::JelloCube;

/// One interleaved vertex as the host renderer consumes it.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// World-space position.
    pub position: [f32; 3],
    /// Face normal, flat per cell.
    pub normal: [f32; 3],
    /// Texture coordinate, already scaled by the material repeat factors.
    pub uv: [f32; 2],
}

/// Which lattice axis a face is perpendicular to, and on which end it sits.
struct Face {
    axis: usize,
    high: bool,
    /// Cell-relative offsets of the top-left, top-right, bottom-left and
    /// bottom-right corner, in the two in-face lattice coordinates.
    corners: [[usize; 2]; 4],
    /// Mirror the parametric U coordinate to keep the texture handedness.
    flip_u: bool,
    /// Mirror the parametric V coordinate to keep the texture handedness.
    flip_v: bool,
}

/// The six outer faces. Corner orders are chosen so `(TL, BL, BR)` and
/// `(TL, BR, TR)` wind with outward-facing normals.
const FACES: [Face; 6] = [
    // +x
    Face {
        axis: 0,
        high: true,
        corners: [[1, 1], [1, 0], [0, 1], [0, 0]],
        flip_u: true,
        flip_v: false,
    },
    // -x
    Face {
        axis: 0,
        high: false,
        corners: [[1, 0], [1, 1], [0, 0], [0, 1]],
        flip_u: false,
        flip_v: false,
    },
    // +y
    Face {
        axis: 1,
        high: true,
        corners: [[1, 1], [0, 1], [1, 0], [0, 0]],
        flip_u: false,
        flip_v: true,
    },
    // -y
    Face {
        axis: 1,
        high: false,
        corners: [[0, 1], [1, 1], [0, 0], [1, 0]],
        flip_u: false,
        flip_v: false,
    },
    // +z
    Face {
        axis: 2,
        high: true,
        corners: [[0, 1], [1, 1], [0, 0], [1, 0]],
        flip_u: false,
        flip_v: false,
    },
    // -z
    Face {
        axis: 2,
        high: false,
        corners: [[1, 1], [0, 1], [1, 0], [0, 0]],
        flip_u: true,
        flip_v: false,
    },
];

impl Face {
    /// Flat node index for in-face coordinates `(first, second)`.
    fn node_index(&self, cube: &JelloCube, first: usize, second: usize) -> usize {
        let fixed = if self.high { cube.resolution() } else { 0 };

        match self.axis {
            0 => cube.index(fixed, first, second),
            1 => cube.index(first, fixed, second),
            _ => cube.index(first, second, fixed),
        }
    }
}

/// The renderable surface, rebuilt from the lattice shell every tick.
///
/// Triangle list, no indices, no deduplication: every cell contributes six
/// vertices so the flat per-cell normal can differ between neighboring cells.
#[derive(Default)]
pub struct SurfaceMesh {
    vertices: Vec<Vertex>,
}

impl SurfaceMesh {
    /// All vertices of the current tick, as a triangle list.
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Amount of vertices in the triangle list.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// The raw interleaved `[px py pz nx ny nz u v]` buffer, ready for upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Regenerate the mesh from the six outer node grids.
    pub(crate) fn rebuild(&mut self, cube: &JelloCube, material: &Material) {
        puffin::profile_function!();

        let cells = cube.resolution();
        let spacing = cube.rest_length();

        self.vertices.clear();
        self.vertices.reserve(6 * cells * cells * 6);

        for face in &FACES {
            for (a, b) in iproduct!(0..cells, 0..cells) {
                let corners = face.corners.map(|[da, db]| (a + da, b + db));
                let positions =
                    corners.map(|(first, second)| cube.positions()[face.node_index(cube, first, second)]);

                // Flat shading: one normal from two edges of the quad.
                let normal = crate::math::normalize_or_zero(
                    (positions[3] - positions[2]).cross(positions[0] - positions[2]),
                )
                .map(|c| c as f32)
                .into_array();

                let uvs = corners.map(|(first, second)| {
                    let u = first as f64 * spacing;
                    let v = second as f64 * spacing;
                    let u = if face.flip_u { 1.0 - u } else { u };
                    let v = if face.flip_v { 1.0 - v } else { v };

                    [
                        u as f32 * material.repeat[0],
                        v as f32 * material.repeat[1],
                    ]
                });

                // Two triangles per cell: (TL, BL, BR) and (TL, BR, TR).
                for corner in [0, 2, 3, 0, 3, 1] {
                    self.vertices.push(Vertex {
                        position: positions[corner].map(|c| c as f32).into_array(),
                        normal,
                        uv: uvs[corner],
                    });
                }
            }
        }
    }
}
