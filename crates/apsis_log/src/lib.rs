//! Logging for the Apsis trajectory pipeline.

#[macro_use]
mod macros;

mod once;

pub use log::*;
pub use once::LogOnce;
