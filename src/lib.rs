//! Deformable jello-cube physics core.
//!
//! A soft cube is discretized as a cubic lattice of point masses connected by
//! structural, shear and bend springs. Every tick the lattice is subjected to
//! gravity, confined to an axis-aligned box, pushed out of rigid obstacles by
//! penalty springs, advanced with explicit Euler or classical RK4, and
//! re-meshed into a triangle list the host renderer can upload directly.
//!
//! The [`simulation::Simulation`] driver owns all state; everything else is
//! plumbing underneath it.

pub mod jello;
pub mod math;
pub mod obstacle;
pub mod settings;
pub mod simulation;

pub use jello::mesh::{SurfaceMesh, Vertex};
pub use obstacle::{Obstacle, ObstacleShape};
pub use settings::{Integrator, Material, ParameterValue, Settings};
pub use simulation::{Diagnostics, Simulation};
