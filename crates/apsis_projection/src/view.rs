//! Camera placement in world space.

use apsis_orbit::{
    fph,
    quantities::{Displacement, Position},
};

/// The part of the world shown by the camera for a frame.
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraView {
    /// World position [m] shown at the center of the view.
    pub center: Position,
    /// Number of render units per meter.
    pub scale: fph,
}

impl CameraView {
    pub fn new(center: Position, scale: fph) -> Self {
        Self { center, scale }
    }

    /// Whether the view can be projected through, which requires a finite
    /// center and a finite, positive scale.
    pub fn is_valid(&self) -> bool {
        self.center.x.is_finite()
            && self.center.y.is_finite()
            && self.scale.is_finite()
            && self.scale > 0.0
    }

    /// Computes the scaled offset of the given world position from the
    /// center of the view, in double precision.
    pub fn view_offset(&self, world_position: &Position) -> Displacement {
        (world_position - self.center) * self.scale
    }

    /// Returns a view with the same center and the scale multiplied by the
    /// given factor.
    pub fn zoomed(&self, factor: fph) -> Self {
        Self {
            center: self.center,
            scale: self.scale * factor,
        }
    }

    /// Returns a view with the same scale centered on the given position.
    pub fn recentered(&self, center: Position) -> Self {
        Self {
            center,
            scale: self.scale,
        }
    }
}

impl Default for CameraView {
    fn default() -> Self {
        Self {
            center: Position::origin(),
            scale: 1e-6,
        }
    }
}
