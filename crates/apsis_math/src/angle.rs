//! Different units for angles.

use crate::consts::f64::{PI, TWO_PI};

/// Represents an angle.
pub trait Angle: Copy {
    /// Returns the value of the angle in degrees.
    fn degrees(self) -> f64;

    /// Returns the value of the angle in radians.
    fn radians(self) -> f64;
}

/// An angle in degrees.
#[repr(transparent)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd)]
pub struct Degrees(pub f64);

impl Angle for Degrees {
    fn degrees(self) -> f64 {
        self.0
    }

    fn radians(self) -> f64 {
        degrees_to_radians(self.0)
    }
}

/// Converts the given angle in degrees to radians.
pub fn degrees_to_radians(degrees: f64) -> f64 {
    degrees * (PI / 180.0)
}

/// Wraps the given angle in radians into the range `[0, 2π)`.
///
/// Non-finite angles are returned unchanged.
pub fn normalize_radians(radians: f64) -> f64 {
    let wrapped = radians.rem_euclid(TWO_PI);
    // `rem_euclid` can round up to exactly 2π for tiny negative inputs
    if wrapped >= TWO_PI { 0.0 } else { wrapped }
}
