use vek::{Mat4, Vec3, Vec4};

/// Half side length of the unit cube and radius of the unit sphere in object
/// space.
const HALF_EXTENT: f64 = 0.5;

/// The rigid shapes an obstacle can take.
///
/// Both are defined in their unit object space, the affine transform on
/// [`Obstacle`] places them in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObstacleShape {
    /// Axis-aligned cube spanning `[-1/2, 1/2]^3`.
    Cube,
    /// Sphere of diameter 1 around the origin.
    Sphere,
}

/// A rigid collider placed inside the bounding box.
///
/// Obstacles are immutable once added, the simulation driver only ever appends
/// them and drains the whole list on reset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obstacle {
    shape: ObstacleShape,
    object_to_world: Mat4<f64>,
    /// Inverse of `object_to_world`, cached because the inside test runs once
    /// per node per acceleration evaluation.
    world_to_object: Mat4<f64>,
}

impl Obstacle {
    /// Construct an obstacle from its shape and object-to-world transform.
    pub fn new(shape: ObstacleShape, object_to_world: Mat4<f64>) -> Self {
        let world_to_object = object_to_world.inverted();

        Self {
            shape,
            object_to_world,
            world_to_object,
        }
    }

    /// The shape tag, for the host renderer to instance its own primitive.
    pub fn shape(&self) -> ObstacleShape {
        self.shape
    }

    /// The placement of the unit shape in world space.
    pub fn object_to_world(&self) -> Mat4<f64> {
        self.object_to_world
    }

    /// The point on the obstacle surface nearest to `world`, if `world` lies
    /// inside the obstacle.
    ///
    /// The returned point is in world space. `None` is the entire "no
    /// collision" signal, there are no other observable effects.
    pub fn closest_surface_point(&self, world: Vec3<f64>) -> Option<Vec3<f64>> {
        let object = Vec3::from(self.world_to_object * Vec4::from_point(world));

        let surface = match self.shape {
            ObstacleShape::Cube => cube_surface_point(object),
            ObstacleShape::Sphere => sphere_surface_point(object),
        }?;

        Some(Vec3::from(self.object_to_world * Vec4::from_point(surface)))
    }
}

/// Nearest surface point on the unit cube for a point strictly inside it.
fn cube_surface_point(p: Vec3<f64>) -> Option<Vec3<f64>> {
    if p.x.abs() >= HALF_EXTENT || p.y.abs() >= HALF_EXTENT || p.z.abs() >= HALF_EXTENT {
        return None;
    }

    // Walk the six face distances and snap the axis with the smallest one.
    let faces = [
        (0, HALF_EXTENT - p.x, HALF_EXTENT),
        (0, p.x + HALF_EXTENT, -HALF_EXTENT),
        (1, HALF_EXTENT - p.y, HALF_EXTENT),
        (1, p.y + HALF_EXTENT, -HALF_EXTENT),
        (2, HALF_EXTENT - p.z, HALF_EXTENT),
        (2, p.z + HALF_EXTENT, -HALF_EXTENT),
    ];
    let (axis, _, face) = faces
        .into_iter()
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .expect("face list is never empty");

    let mut snapped = p;
    snapped[axis] = face;

    Some(snapped)
}

/// Nearest surface point on the unit sphere for a point inside it.
fn sphere_surface_point(p: Vec3<f64>) -> Option<Vec3<f64>> {
    let distance = p.magnitude();

    if distance > HALF_EXTENT {
        return None;
    }

    if distance < 1e-12 {
        // The exact center has no unique nearest point, pick one.
        return Some(Vec3::new(HALF_EXTENT, 0.0, 0.0));
    }

    Some(p * (HALF_EXTENT / distance))
}

#[cfg(test)]
mod tests {
    use super::{Obstacle, ObstacleShape};
    use vek::{Mat4, Vec3};

    #[test]
    fn cube_snaps_to_nearest_face() {
        let cube = Obstacle::new(ObstacleShape::Cube, Mat4::identity());

        // Closest to the +x face.
        let q = cube
            .closest_surface_point(Vec3::new(0.4, 0.1, -0.2))
            .unwrap();
        assert!((q - Vec3::new(0.5, 0.1, -0.2)).magnitude() < 1e-12);

        // Closest to the -z face.
        let q = cube
            .closest_surface_point(Vec3::new(0.1, 0.0, -0.45))
            .unwrap();
        assert!((q - Vec3::new(0.1, 0.0, -0.5)).magnitude() < 1e-12);

        // On or outside the surface there is no collision.
        assert!(cube.closest_surface_point(Vec3::new(0.5, 0.0, 0.0)).is_none());
        assert!(cube.closest_surface_point(Vec3::new(2.0, 0.0, 0.0)).is_none());
    }

    #[test]
    fn sphere_projects_onto_surface() {
        let sphere = Obstacle::new(ObstacleShape::Sphere, Mat4::identity());
        let mut rng = fastrand::Rng::with_seed(7);

        // Any interior point maps onto the radius-1/2 shell.
        for _ in 0..100 {
            let p = Vec3::new(rng.f64(), rng.f64(), rng.f64()) - Vec3::broadcast(0.5);
            match sphere.closest_surface_point(p) {
                Some(q) => {
                    assert!(p.magnitude() <= 0.5);
                    assert!((q.magnitude() - 0.5).abs() < 1e-9);
                }
                None => assert!(p.magnitude() > 0.5),
            }
        }

        // The center picks an arbitrary but fixed surface point.
        let q = sphere.closest_surface_point(Vec3::zero()).unwrap();
        assert_eq!(q, Vec3::new(0.5, 0.0, 0.0));
    }

    #[test]
    fn transform_round_trips_through_object_space() {
        // A sphere of radius 1 centered at (2, 0, 0).
        let transform = Mat4::<f64>::translation_3d(Vec3::new(2.0, 0.0, 0.0))
            * Mat4::<f64>::scaling_3d(Vec3::broadcast(2.0));
        let sphere = Obstacle::new(ObstacleShape::Sphere, transform);

        let q = sphere
            .closest_surface_point(Vec3::new(2.5, 0.0, 0.0))
            .unwrap();
        assert!((q - Vec3::new(3.0, 0.0, 0.0)).magnitude() < 1e-9);

        // Just outside the scaled surface.
        assert!(sphere
            .closest_surface_point(Vec3::new(3.1, 0.0, 0.0))
            .is_none());

        // A rotated cube still reports points on its own surface.
        let transform = Mat4::rotation_3d(0.7, Vec3::new(1.0, 1.0, 0.3).normalized());
        let cube = Obstacle::new(ObstacleShape::Cube, transform);
        let q = cube.closest_surface_point(Vec3::new(0.1, 0.05, 0.0)).unwrap();
        let object = Vec3::from(transform.inverted() * vek::Vec4::from_point(q));
        let max_axis = object.map(f64::abs).reduce_partial_max();
        assert!((max_axis - 0.5).abs() < 1e-9);
    }
}
