//! Numeric constants.

pub mod f64;
