//! Orbital mechanics for patched-conic trajectories.
//!
//! Every body orbits a single gravitating parent on a bound Keplerian
//! ellipse. This crate represents those orbits, locates bodies on them at
//! arbitrary times, tessellates them into double-precision point buffers and
//! predicts how maneuvers reshape a craft's future trajectory.

pub mod body;
pub mod error;
pub mod kepler;
pub mod maneuver;
pub mod orbit;
pub mod quantities;
pub mod sampler;
pub mod soi;
pub mod state;
pub mod trajectory;

pub use error::OrbitError;

/// Floating point type used for orbital mechanics.
#[allow(non_camel_case_types)]
pub type fph = f64;
