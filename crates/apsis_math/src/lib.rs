//! Math utilities.

pub mod angle;
pub mod consts;
