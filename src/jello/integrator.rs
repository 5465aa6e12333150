//! Explicit Euler and classical RK4 stepping of the lattice.

use vek::Vec3;

use crate::{obstacle::Obstacle, settings::{Integrator, Settings}};

use super::{forces, JelloCube};

/// Safety radius far outside any accepted bounding box.
///
/// Positions are clamped here after every step so pathological parameters
/// saturate instead of propagating NaNs through the spring network.
pub(crate) const MAX_POSITION: f64 = 100.0;

/// Scratch buffers for one integration step.
///
/// RK4 needs four derivative pairs, an intermediate state and an acceleration
/// array per step. They are allocated once and reused every tick.
pub(crate) struct Scratch {
    k1_pos: Vec<Vec3<f64>>,
    k1_vel: Vec<Vec3<f64>>,
    k2_pos: Vec<Vec3<f64>>,
    k2_vel: Vec<Vec3<f64>>,
    k3_pos: Vec<Vec3<f64>>,
    k3_vel: Vec<Vec3<f64>>,
    k4_pos: Vec<Vec3<f64>>,
    k4_vel: Vec<Vec3<f64>>,
    tmp_pos: Vec<Vec3<f64>>,
    tmp_vel: Vec<Vec3<f64>>,
    acc: Vec<Vec3<f64>>,
}

impl Scratch {
    /// Allocate all buffers for a lattice of `node_count` nodes.
    pub fn new(node_count: usize) -> Self {
        let buffer = || vec![Vec3::zero(); node_count];

        Self {
            k1_pos: buffer(),
            k1_vel: buffer(),
            k2_pos: buffer(),
            k2_vel: buffer(),
            k3_pos: buffer(),
            k3_vel: buffer(),
            k4_pos: buffer(),
            k4_vel: buffer(),
            tmp_pos: buffer(),
            tmp_vel: buffer(),
            acc: buffer(),
        }
    }

    /// Grow or shrink the buffers after the lattice was rebuilt.
    pub fn resize(&mut self, node_count: usize) {
        for buffer in [
            &mut self.k1_pos,
            &mut self.k1_vel,
            &mut self.k2_pos,
            &mut self.k2_vel,
            &mut self.k3_pos,
            &mut self.k3_vel,
            &mut self.k4_pos,
            &mut self.k4_vel,
            &mut self.tmp_pos,
            &mut self.tmp_vel,
            &mut self.acc,
        ] {
            buffer.resize(node_count, Vec3::zero());
        }
    }
}

/// Advance the lattice by one timestep with the configured integrator.
///
/// Returns the amount of nodes whose position had to be clamped to the safety
/// radius.
pub(crate) fn step(
    cube: &mut JelloCube,
    scratch: &mut Scratch,
    obstacles: &[Obstacle],
    settings: &Settings,
) -> u64 {
    puffin::profile_function!();

    // The timestep tunable is in milliseconds.
    let dt = settings.dt_ms / 1000.0;

    match settings.integrator {
        Integrator::Euler => euler_step(cube, scratch, obstacles, settings, dt),
        Integrator::Rk4 => rk4_step(cube, scratch, obstacles, settings, dt),
    }
}

fn euler_step(
    cube: &mut JelloCube,
    scratch: &mut Scratch,
    obstacles: &[Obstacle],
    settings: &Settings,
    dt: f64,
) -> u64 {
    forces::fill_accelerations(
        cube,
        cube.positions(),
        cube.velocities(),
        obstacles,
        settings,
        &mut scratch.acc,
    );

    let mut clamped = 0;
    for node in 0..cube.node_count() {
        let velocity = cube.velocities()[node];
        let position = &mut cube.positions_mut()[node];
        *position += dt * velocity;
        clamped += clamp_position(position);

        cube.velocities_mut()[node] += dt * scratch.acc[node];
    }

    clamped
}

/// Classical RK4: every substage evaluates the acceleration at the advanced
/// intermediate state, and the substages are totally ordered.
fn rk4_step(
    cube: &mut JelloCube,
    scratch: &mut Scratch,
    obstacles: &[Obstacle],
    settings: &Settings,
    dt: f64,
) -> u64 {
    let node_count = cube.node_count();
    let half_dt = dt / 2.0;

    // Stage 1 at the current state.
    forces::fill_accelerations(
        cube,
        cube.positions(),
        cube.velocities(),
        obstacles,
        settings,
        &mut scratch.acc,
    );
    for node in 0..node_count {
        scratch.k1_pos[node] = cube.velocities()[node];
        scratch.k1_vel[node] = scratch.acc[node];
        scratch.tmp_pos[node] = cube.positions()[node] + half_dt * scratch.k1_pos[node];
        scratch.tmp_vel[node] = cube.velocities()[node] + half_dt * scratch.k1_vel[node];
    }

    // Stage 2 at the first midpoint.
    forces::fill_accelerations(
        cube,
        &scratch.tmp_pos,
        &scratch.tmp_vel,
        obstacles,
        settings,
        &mut scratch.acc,
    );
    for node in 0..node_count {
        scratch.k2_pos[node] = scratch.tmp_vel[node];
        scratch.k2_vel[node] = scratch.acc[node];
        scratch.tmp_pos[node] = cube.positions()[node] + half_dt * scratch.k2_pos[node];
        scratch.tmp_vel[node] = cube.velocities()[node] + half_dt * scratch.k2_vel[node];
    }

    // Stage 3 at the second midpoint.
    forces::fill_accelerations(
        cube,
        &scratch.tmp_pos,
        &scratch.tmp_vel,
        obstacles,
        settings,
        &mut scratch.acc,
    );
    for node in 0..node_count {
        scratch.k3_pos[node] = scratch.tmp_vel[node];
        scratch.k3_vel[node] = scratch.acc[node];
        scratch.tmp_pos[node] = cube.positions()[node] + dt * scratch.k3_pos[node];
        scratch.tmp_vel[node] = cube.velocities()[node] + dt * scratch.k3_vel[node];
    }

    // Stage 4 at the far end, then the weighted update.
    forces::fill_accelerations(
        cube,
        &scratch.tmp_pos,
        &scratch.tmp_vel,
        obstacles,
        settings,
        &mut scratch.acc,
    );
    let mut clamped = 0;
    for node in 0..node_count {
        scratch.k4_pos[node] = scratch.tmp_vel[node];
        scratch.k4_vel[node] = scratch.acc[node];

        let position_slope = scratch.k1_pos[node]
            + 2.0 * scratch.k2_pos[node]
            + 2.0 * scratch.k3_pos[node]
            + scratch.k4_pos[node];
        let velocity_slope = scratch.k1_vel[node]
            + 2.0 * scratch.k2_vel[node]
            + 2.0 * scratch.k3_vel[node]
            + scratch.k4_vel[node];

        let position = &mut cube.positions_mut()[node];
        *position += dt / 6.0 * position_slope;
        clamped += clamp_position(position);

        cube.velocities_mut()[node] += dt / 6.0 * velocity_slope;
    }

    clamped
}

/// Clamp a position to the safety radius, returning 1 when it was out.
fn clamp_position(position: &mut Vec3<f64>) -> u64 {
    let clamped = position.map(|c| c.clamp(-MAX_POSITION, MAX_POSITION));

    if clamped != *position {
        *position = clamped;
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::{step, Scratch, MAX_POSITION};
    use crate::{
        jello::JelloCube,
        settings::{Integrator, Settings},
    };
    use vek::Vec3;

    fn quiet_settings() -> Settings {
        Settings {
            resolution: 4,
            gravity: 0.0,
            ..Settings::default()
        }
    }

    #[test]
    fn rest_lattice_stays_at_rest() {
        let settings = quiet_settings();
        let mut cube = JelloCube::new(4, Vec3::zero());
        let mut scratch = Scratch::new(cube.node_count());
        let initial = cube.positions().to_vec();

        for _ in 0..10 {
            step(&mut cube, &mut scratch, &[], &settings);
        }

        for (position, rest) in cube.positions().iter().zip(&initial) {
            assert!((*position - *rest).magnitude() < 1e-9);
        }
        for velocity in cube.velocities() {
            assert!(velocity.magnitude() < 1e-9);
        }
    }

    #[test]
    fn internal_forces_conserve_momentum() {
        let settings = quiet_settings();
        let mut cube = JelloCube::new(3, Vec3::zero());
        let mut scratch = Scratch::new(cube.node_count());

        // Kick the nodes around so the springs are active.
        let mut rng = fastrand::Rng::with_seed(11);
        for velocity in cube.velocities_mut() {
            *velocity = Vec3::new(rng.f64() - 0.5, rng.f64() - 0.5, rng.f64() - 0.5);
        }
        let momentum =
            |cube: &JelloCube| cube.velocities().iter().fold(Vec3::<f64>::zero(), |sum, v| sum + *v);
        let before = momentum(&cube);

        for _ in 0..50 {
            step(&mut cube, &mut scratch, &[], &settings);
        }

        let after = momentum(&cube);
        assert!((after - before).magnitude() < 1e-6 * cube.node_count() as f64);
    }

    #[test]
    fn euler_advances_positions_along_velocities() {
        let settings = Settings {
            integrator: Integrator::Euler,
            ..quiet_settings()
        };
        let mut cube = JelloCube::new(2, Vec3::zero());
        let mut scratch = Scratch::new(cube.node_count());

        let drift = Vec3::new(1.0, 0.0, 0.0);
        for velocity in cube.velocities_mut() {
            *velocity = drift;
        }
        let initial = cube.positions().to_vec();

        step(&mut cube, &mut scratch, &[], &settings);

        // One millisecond of uniform drift, no spring ever stretches.
        for (position, rest) in cube.positions().iter().zip(&initial) {
            assert!((*position - (*rest + drift * 1e-3)).magnitude() < 1e-12);
        }
    }

    #[test]
    fn runaway_positions_are_clamped_and_counted() {
        let settings = quiet_settings();
        let mut cube = JelloCube::new(2, Vec3::zero());
        let mut scratch = Scratch::new(cube.node_count());

        for velocity in cube.velocities_mut() {
            *velocity = Vec3::new(1e9, 0.0, 0.0);
        }

        let clamped = step(&mut cube, &mut scratch, &[], &settings);

        assert_eq!(clamped, cube.node_count() as u64);
        for position in cube.positions() {
            assert!(position.x <= MAX_POSITION);
        }
    }

    #[test]
    fn undamped_oscillation_conserves_energy() {
        // The conservative system: no damping, no gravity, no collisions.
        // The small timestep keeps the RK4 dissipation of the stiffest
        // lattice modes well below the measurement threshold.
        let settings = Settings {
            resolution: 8,
            gravity: 0.0,
            d_elastic: 0.0,
            dt_ms: 0.1,
            ..Settings::default()
        };
        let mut cube = JelloCube::new(8, Vec3::zero());
        let mut scratch = Scratch::new(cube.node_count());

        // Pluck a single node sideways.
        let plucked = cube.index(4, 4, 4);
        cube.positions_mut()[plucked] += Vec3::new(0.1, 0.0, 0.0);
        let initial = crate::jello::forces::spring_potential_energy(&cube, settings.k_elastic);

        for _ in 0..1000 {
            step(&mut cube, &mut scratch, &[], &settings);
        }

        let kinetic: f64 = cube
            .velocities()
            .iter()
            .map(|v| 0.5 * settings.mass * v.magnitude_squared())
            .sum();
        let potential = crate::jello::forces::spring_potential_energy(&cube, settings.k_elastic);
        let total = kinetic + potential;
        assert!((total - initial).abs() < 0.01 * initial);
    }

    #[test]
    fn damped_drop_keeps_speeds_bounded() {
        let settings = Settings {
            resolution: 4,
            gravity: 100.0,
            d_elastic: 0.25,
            d_collision: 0.25,
            k_collision: 10_000.0,
            ..Settings::default()
        };
        let mut cube = JelloCube::new(4, Vec3::zero());
        let mut scratch = Scratch::new(cube.node_count());

        let mut peak: f64 = 0.0;
        for _ in 0..2000 {
            step(&mut cube, &mut scratch, &[], &settings);
            let fastest = cube
                .velocities()
                .iter()
                .map(|v| v.magnitude())
                .fold(0.0, f64::max);
            peak = peak.max(fastest);
        }

        // Two seconds of bouncing on the floor under heavy gravity: the
        // penalty and damping terms keep everything finite and moderate.
        assert!(peak < 50.0);
        for position in cube.positions() {
            // Resting on the floor leaves the static penalty penetration.
            assert!(position.y > -settings.bounds - 0.1);
        }
    }
}
