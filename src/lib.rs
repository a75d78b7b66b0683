//! Orbital mechanics and high-precision trajectory pipeline for
//! patched-conic space simulation.
//!
//! Bodies follow Keplerian orbits around their parents. Every frame, the
//! [`TrajectoryPipeline`](pipeline::TrajectoryPipeline) tessellates their
//! orbits, predicts the trajectory of the craft through its planned
//! maneuvers, determines which spheres of influence the trajectory comes
//! near, and projects everything into single-precision render buffers
//! relative to the camera.

pub mod pipeline;
pub mod run;
pub mod scenario;
pub mod simulation;
