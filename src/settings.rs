use miette::{bail, ensure, Result};
use serde::Deserialize;

/// Which scheme advances the lattice every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Integrator {
    /// Explicit Euler, cheap and drifty.
    Euler,
    /// Classical fourth-order Runge-Kutta.
    Rk4,
}

/// Simulation settings, deserializable so the host can load them from its
/// settings file.
///
/// The driver copies a snapshot at the start of every tick; `set_parameter`
/// only ever touches the authoritative copy between ticks.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Settings {
    /// Lattice subdivisions per axis, `(resolution + 1)^3` nodes in total.
    ///
    /// Takes effect on the next reset.
    pub resolution: u32,
    /// Half-extent of the axis-aligned box confining the cube.
    pub bounds: f64,
    /// Simulation timestep in milliseconds.
    pub dt_ms: f64,
    /// Hooke elasticity coefficient for all springs except collision springs.
    pub k_elastic: f64,
    /// Damping coefficient for all springs except collision springs.
    pub d_elastic: f64,
    /// Hooke elasticity coefficient for collision springs.
    pub k_collision: f64,
    /// Damping coefficient for collision springs.
    pub d_collision: f64,
    /// Mass of each node, equal for all nodes.
    pub mass: f64,
    /// Downwards acceleration applied to every node.
    pub gravity: f64,
    /// Integration scheme.
    pub integrator: Integrator,
    /// Whether the cube is rendered translucent.
    pub transparent: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            resolution: 8,
            bounds: 4.0,
            dt_ms: 1.0,
            k_elastic: 500.0,
            d_elastic: 1.0,
            k_collision: 1000.0,
            d_collision: 10.0,
            mass: 0.01,
            gravity: 1.0,
            integrator: Integrator::Rk4,
            transparent: false,
        }
    }
}

impl Settings {
    /// Check every tunable against its allowed domain.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.resolution >= 1,
            "lattice resolution must be at least 1, got {}",
            self.resolution
        );
        ensure!(
            (0.1..=10.0).contains(&self.dt_ms),
            "timestep {} ms is outside [0.1, 10]",
            self.dt_ms
        );
        ensure!(self.mass > 0.0, "node mass must be positive, got {}", self.mass);
        ensure!(
            self.bounds > 0.0,
            "bounding box half-extent must be positive, got {}",
            self.bounds
        );
        ensure!(
            self.k_elastic >= 0.0 && self.d_elastic >= 0.0,
            "spring coefficients may not be negative"
        );
        ensure!(
            self.k_collision >= 0.0 && self.d_collision >= 0.0,
            "collision coefficients may not be negative"
        );

        Ok(())
    }

    /// Overwrite a single tunable addressed by name.
    ///
    /// The value is written unchecked, callers validate the result before
    /// committing it anywhere.
    pub(crate) fn apply(&mut self, name: &str, value: ParameterValue) -> Result<()> {
        match (name, value) {
            ("resolution", ParameterValue::Scalar(v)) => {
                ensure!(
                    v.fract() == 0.0 && v >= 0.0,
                    "lattice resolution must be a whole number, got {v}"
                );
                self.resolution = v as u32;
            }
            ("bounds", ParameterValue::Scalar(v)) => self.bounds = v,
            ("dt_ms", ParameterValue::Scalar(v)) => self.dt_ms = v,
            ("k_elastic", ParameterValue::Scalar(v)) => self.k_elastic = v,
            ("d_elastic", ParameterValue::Scalar(v)) => self.d_elastic = v,
            ("k_collision", ParameterValue::Scalar(v)) => self.k_collision = v,
            ("d_collision", ParameterValue::Scalar(v)) => self.d_collision = v,
            ("mass", ParameterValue::Scalar(v)) => self.mass = v,
            ("gravity", ParameterValue::Scalar(v)) => self.gravity = v,
            ("integrator", ParameterValue::Integrator(v)) => self.integrator = v,
            ("transparent", ParameterValue::Flag(v)) => self.transparent = v,
            (name, value) => bail!("no parameter {name:?} taking {value:?}"),
        }

        Ok(())
    }
}

/// A value accepted by `set_parameter`, one variant per tunable type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterValue {
    Scalar(f64),
    Flag(bool),
    Integrator(Integrator),
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<Integrator> for ParameterValue {
    fn from(value: Integrator) -> Self {
        Self::Integrator(value)
    }
}

/// Phong material the host renderer applies to the jello surface.
///
/// The diffuse alpha tracks the `transparent` tunable every tick.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Material {
    /// Ambient RGBA color.
    pub ambient: [f32; 4],
    /// Diffuse RGBA color.
    pub diffuse: [f32; 4],
    /// Specular RGBA color.
    pub specular: [f32; 4],
    /// Specular exponent.
    pub shininess: f32,
    /// Texture repetitions along the U and V axes of each face.
    pub repeat: [f32; 2],
}

impl Default for Material {
    fn default() -> Self {
        Self {
            ambient: [0.2, 0.8, 0.2, 1.0],
            diffuse: [0.2, 0.8, 0.2, 1.0],
            specular: [1.0, 1.0, 1.0, 1.0],
            shininess: 25.0,
            repeat: [1.0, 1.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Integrator, ParameterValue, Settings};

    #[test]
    fn defaults_are_valid() {
        Settings::default().validate().unwrap();
    }

    #[test]
    fn domains_are_enforced() {
        let mut settings = Settings::default();
        settings.mass = 0.0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.dt_ms = 20.0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.resolution = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.k_collision = -1.0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn apply_rejects_unknown_and_mistyped_names() {
        let mut settings = Settings::default();
        assert!(settings.apply("wobble", ParameterValue::Scalar(1.0)).is_err());
        assert!(settings.apply("mass", ParameterValue::Flag(true)).is_err());
        assert!(settings
            .apply("transparent", ParameterValue::Scalar(1.0))
            .is_err());

        settings
            .apply("integrator", ParameterValue::Integrator(Integrator::Euler))
            .unwrap();
        assert_eq!(settings.integrator, Integrator::Euler);
    }
}
