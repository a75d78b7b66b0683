//! Physical quantities in the orbital plane.

use crate::fph;
use nalgebra::{Point2, Vector2};

/// A position in 2D world space.
pub type Position = Point2<fph>;

/// A displacement between two positions, such as the offset of an orbiting
/// body from its parent.
pub type Displacement = Vector2<fph>;

/// A velocity in the orbital plane.
pub type Velocity = Vector2<fph>;
