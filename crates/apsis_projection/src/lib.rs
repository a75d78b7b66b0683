//! Floating-origin projection of world coordinates for rendering.
//!
//! World coordinates span from meters to billions of meters and are kept in
//! double precision. Renderers consume single precision, which cannot
//! resolve meter-scale detail at interplanetary distances. Every point is
//! therefore made relative to the camera and scaled while still in double
//! precision, and only the small camera-relative result is truncated.

pub mod buffer;
pub mod projector;
pub mod view;

pub use buffer::{DoubleBufferedRenderPoints, RenderPoint, RenderPointBuffer};
pub use projector::{PrecisionProjector, ProjectionSource};
pub use view::CameraView;

/// Floating point type used for render coordinates.
#[allow(non_camel_case_types)]
pub type fre = f32;
