//! Container data structures.

mod arena;

pub use arena::{Arena, Handle};
