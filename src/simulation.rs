//! The simulation driver owning all state and the public tick loop.

use miette::{ensure, Result};
use vek::{Mat4, Vec3};

use crate::{
    jello::{
        integrator::{self, Scratch},
        mesh::SurfaceMesh,
        JelloCube,
    },
    obstacle::{Obstacle, ObstacleShape},
    settings::{Material, ParameterValue, Settings},
};

/// Read-only counters the host can poll for numerical health.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Diagnostics {
    /// Nodes clamped to the safety radius since the last reset.
    pub position_clamps: u64,
}

/// Owns the jello cube, the obstacle list and the tunables, and advances the
/// whole simulation one tick at a time.
///
/// Operations are not reentrant, the host calls them from a single thread and
/// waits for each to return.
pub struct Simulation {
    /// Authoritative tunables, snapshotted at the start of every tick.
    settings: Settings,
    material: Material,
    cube: JelloCube,
    obstacles: Vec<Obstacle>,
    scratch: Scratch,
    mesh: SurfaceMesh,
    rng: fastrand::Rng,
    diagnostics: Diagnostics,
}

impl Simulation {
    /// Construct the simulation with an entropy-seeded RNG.
    pub fn new(settings: Settings) -> Result<Self> {
        Self::with_rng(settings, fastrand::Rng::new())
    }

    /// Construct the simulation with a fixed RNG seed, for reproducible runs.
    pub fn with_seed(settings: Settings, seed: u64) -> Result<Self> {
        Self::with_rng(settings, fastrand::Rng::with_seed(seed))
    }

    fn with_rng(settings: Settings, rng: fastrand::Rng) -> Result<Self> {
        settings.validate()?;

        let cube = JelloCube::new(settings.resolution as usize, Vec3::zero());
        let scratch = Scratch::new(cube.node_count());
        let material = Material::default();
        let mut mesh = SurfaceMesh::default();
        mesh.rebuild(&cube, &material);

        Ok(Self {
            settings,
            material,
            cube,
            obstacles: Vec::new(),
            scratch,
            mesh,
            rng,
            diagnostics: Diagnostics::default(),
        })
    }

    /// Advance the simulation by one timestep, then rebuild the surface mesh.
    pub fn tick(&mut self) {
        puffin::profile_function!();

        // Local snapshot, `set_parameter` never mutates mid-tick.
        let settings = self.settings;

        self.material.diffuse[3] = if settings.transparent { 0.5 } else { 1.0 };

        {
            puffin::profile_scope!("Integrate");

            let clamped =
                integrator::step(&mut self.cube, &mut self.scratch, &self.obstacles, &settings);
            if clamped > 0 {
                log::trace!("Clamped {clamped} runaway node positions");
                self.diagnostics.position_clamps += clamped;
            }
        }

        {
            puffin::profile_scope!("Remesh");

            self.mesh.rebuild(&self.cube, &self.material);
        }
    }

    /// Discard the jello state and rebuild the lattice at rest around the
    /// origin.
    ///
    /// Obstacles are drained and the diagnostics start over.
    pub fn reset(&mut self) {
        self.cube = JelloCube::new(self.settings.resolution as usize, Vec3::zero());
        self.scratch.resize(self.cube.node_count());
        self.obstacles.clear();
        self.diagnostics = Diagnostics::default();
        self.mesh.rebuild(&self.cube, &self.material);

        log::debug!("Reset the simulation to {} nodes", self.cube.node_count());
    }

    /// Kick the whole cube with one random velocity.
    ///
    /// The kick is drawn uniformly with the horizontal components in
    /// `[-20, 20]` and the vertical one in `[0, 30]`, and added to every node.
    /// Returns the drawn vector.
    pub fn scatter(&mut self) -> Vec3<f64> {
        let kick = Vec3::new(
            self.uniform(-20.0, 20.0),
            self.uniform(0.0, 30.0),
            self.uniform(-20.0, 20.0),
        );

        for velocity in self.cube.velocities_mut() {
            *velocity += kick;
        }

        log::debug!("Scattered the cube with velocity {kick}");

        kick
    }

    /// Drop a randomly shaped, rotated and scaled obstacle somewhere inside
    /// the bounding box.
    ///
    /// Fails when not even the smallest obstacle the generator can produce
    /// would fit inside the box; the obstacle list is unchanged in that case.
    pub fn add_obstacle(&mut self) -> Result<()> {
        let bounds = self.settings.bounds;
        ensure!(
            2.0 * bounds > 0.5,
            "an obstacle of extent 0.5 cannot fit inside the ±{bounds} box"
        );

        let shape = if self.rng.bool() {
            ObstacleShape::Cube
        } else {
            ObstacleShape::Sphere
        };

        // Rotation axis drawn from the unit cube, re-normalized.
        let axis = loop {
            let candidate = Vec3::new(
                self.uniform(-1.0, 1.0),
                self.uniform(-1.0, 1.0),
                self.uniform(-1.0, 1.0),
            );
            if let Some(unit) = candidate.try_normalized() {
                break unit;
            }
        };
        let angle = self.uniform(0.0, std::f64::consts::TAU);

        let scale_min = bounds.min(0.5);
        let scale_max = bounds.max(0.5);
        let scale = Vec3::new(
            self.uniform(scale_min, scale_max),
            self.uniform(scale_min, scale_max),
            self.uniform(scale_min, scale_max),
        );

        // Keep the whole scaled extent inside the box.
        let slack = bounds - 0.5 * scale.reduce_partial_max();
        let translation = Vec3::new(
            self.uniform(-slack, slack),
            self.uniform(-slack, slack),
            self.uniform(-slack, slack),
        );

        let transform = Mat4::<f64>::translation_3d(translation)
            * Mat4::<f64>::rotation_3d(angle, axis)
            * Mat4::<f64>::scaling_3d(scale);
        self.obstacles.push(Obstacle::new(shape, transform));

        log::debug!("Added a {shape:?} obstacle at {translation}");

        Ok(())
    }

    /// Place a specific obstacle, for hosts setting up a known scene.
    pub fn insert_obstacle(&mut self, obstacle: Obstacle) {
        self.obstacles.push(obstacle);
    }

    /// Validate and update one tunable addressed by name.
    ///
    /// On error the stored value is untouched. Changes take effect from the
    /// next tick; `resolution` takes effect on the next reset.
    pub fn set_parameter(&mut self, name: &str, value: impl Into<ParameterValue>) -> Result<()> {
        let mut candidate = self.settings;
        candidate.apply(name, value.into())?;
        candidate.validate()?;

        self.settings = candidate;

        Ok(())
    }

    /// The current tunables.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The jello material, with the diffuse alpha tracking the transparency
    /// tunable.
    pub fn material(&self) -> &Material {
        &self.material
    }

    /// Node positions, flat-indexed.
    pub fn positions(&self) -> &[Vec3<f64>] {
        self.cube.positions()
    }

    /// Node velocities, flat-indexed.
    pub fn velocities(&self) -> &[Vec3<f64>] {
        self.cube.velocities()
    }

    /// The surface mesh generated by the most recent tick (or reset).
    pub fn mesh(&self) -> &SurfaceMesh {
        &self.mesh
    }

    /// All obstacles currently in the scene.
    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    /// Numerical health counters since the last reset.
    pub fn diagnostics(&self) -> Diagnostics {
        self.diagnostics
    }

    /// A uniform draw from `[lo, hi)`.
    fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.rng.f64()
    }
}
