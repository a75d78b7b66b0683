//! Errors for orbit construction and prediction.

use crate::{body::BodyHandle, fph};
use thiserror::Error;

/// Reasons why an orbit or trajectory could not be constructed.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum OrbitError {
    #[error("semi-major axis {semi_major_axis} is not finite")]
    NonFiniteSemiMajorAxis { semi_major_axis: fph },
    #[error("semi-major axis {semi_major_axis} does not exceed zero")]
    NonPositiveSemiMajorAxis { semi_major_axis: fph },
    #[error("eccentricity {eccentricity} is outside the bound elliptical range [0, 1)")]
    EccentricityOutOfRange { eccentricity: fph },
    #[error("orbital element {name} is not finite")]
    NonFiniteElement { name: &'static str },
    #[error("parent body {parent:?} of orbit does not exist")]
    MissingParent { parent: BodyHandle },
    #[error("body {body:?} does not exist")]
    UnknownBody { body: BodyHandle },
    #[error("body {body:?} has no orbit")]
    MissingOrbit { body: BodyHandle },
    #[error(
        "trajectory with eccentricity {eccentricity} is unbound, which is unsupported by the \
         elliptical two-body model"
    )]
    UnboundTrajectory { eccentricity: fph },
    #[error("state vector does not define an orbit: {reason}")]
    DegenerateState { reason: &'static str },
    #[error("gravitational parameter {mu} of parent does not exceed zero")]
    NonPositiveGravitationalParameter { mu: fph },
    #[error("no maneuver node with ID `{id}`")]
    UnknownManeuverNode { id: String },
    #[error("a maneuver node with ID `{id}` already exists")]
    DuplicateManeuverNode { id: String },
    #[error("maneuver node `{id}` is scheduled at {time_offset} s, before the present")]
    ManeuverNodeInPast { id: String, time_offset: fph },
}
