//! Numeric `f64` constants.

pub use std::f64::consts::*;

pub const TWO_PI: f64 = TAU;

/// Newton's gravitational constant [m³/(kg·s²)].
pub const GRAVITATIONAL_CONSTANT: f64 = 6.6743e-11;
