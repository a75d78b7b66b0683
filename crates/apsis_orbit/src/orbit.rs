//! Keplerian orbits.

use crate::{
    OrbitError,
    body::BodyHandle,
    fph,
    kepler::KeplerSolver,
    quantities::{Displacement, Velocity},
};
use apsis_math::{angle::normalize_radians, consts::f64::TWO_PI};
use nalgebra::{Rotation2, vector};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ORBIT_VERSION: AtomicU64 = AtomicU64::new(1);

/// The bound elliptical orbit of a body around its gravitating parent.
///
/// Orbits are immutable. Whenever the orbit of a body is recomputed, a new
/// `OrbitModel` replaces the old one, and every newly constructed orbit
/// receives a unique [`OrbitVersion`]. Caches derived from an orbit compare
/// versions rather than elements, so two numerically equal orbits computed
/// at different times are still treated as distinct. Clones share the
/// version of the original.
///
/// Positions are expressed relative to the parent body, with the focus of
/// the ellipse located at [`Self::focus_offset`] from the parent.
#[derive(Clone, Debug, PartialEq)]
pub struct OrbitModel {
    parent: BodyHandle,
    semi_major_axis: fph,
    semi_minor_axis: fph,
    eccentricity: fph,
    argument_of_periapsis: fph,
    focus_offset: Displacement,
    direction: OrbitDirection,
    periapsis_rotation: Rotation2<fph>,
    version: OrbitVersion,
}

/// The defining elements of an [`OrbitModel`], without the parent.
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrbitElements {
    /// Half the longest diameter of the orbital ellipse [m].
    pub semi_major_axis: fph,
    /// The eccentricity of the orbital ellipse (0 is circular, must be below
    /// 1).
    pub eccentricity: fph,
    /// The angle from the reference x-axis to the periapsis [rad].
    pub argument_of_periapsis: fph,
    /// The offset from the parent's position to the focus of the ellipse [m].
    pub focus_offset: Displacement,
    /// The sense in which the body travels around the ellipse.
    pub direction: OrbitDirection,
}

/// The sense in which a body travels around its orbit, as seen from above
/// the orbital plane.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum OrbitDirection {
    #[default]
    CounterClockwise,
    Clockwise,
}

/// Identity of a constructed [`OrbitModel`]. Versions increase
/// monotonically in construction order and are never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrbitVersion(u64);

impl OrbitModel {
    /// Creates a counter-clockwise orbit around the given parent with its
    /// focus at the parent's position.
    ///
    /// # Errors
    /// See [`Self::from_elements`].
    pub fn new(
        parent: BodyHandle,
        semi_major_axis: fph,
        eccentricity: fph,
        argument_of_periapsis: fph,
    ) -> Result<Self, OrbitError> {
        Self::from_elements(
            parent,
            &OrbitElements {
                semi_major_axis,
                eccentricity,
                argument_of_periapsis,
                ..OrbitElements::default()
            },
        )
    }

    /// Creates an orbit around the given parent from the given elements.
    ///
    /// # Errors
    /// Returns an error if the semi-major axis is not finite and positive, if
    /// the eccentricity is not in `[0, 1)`, or if any other element is not
    /// finite.
    pub fn from_elements(parent: BodyHandle, elements: &OrbitElements) -> Result<Self, OrbitError> {
        elements.validate()?;

        let semi_minor_axis =
            elements.semi_major_axis * fph::sqrt(1.0 - elements.eccentricity.powi(2));

        Ok(Self {
            parent,
            semi_major_axis: elements.semi_major_axis,
            semi_minor_axis,
            eccentricity: elements.eccentricity,
            argument_of_periapsis: elements.argument_of_periapsis,
            focus_offset: elements.focus_offset,
            direction: elements.direction,
            periapsis_rotation: Rotation2::new(elements.argument_of_periapsis),
            version: OrbitVersion::next(),
        })
    }

    /// The body being orbited.
    pub fn parent(&self) -> BodyHandle {
        self.parent
    }

    pub fn semi_major_axis(&self) -> fph {
        self.semi_major_axis
    }

    pub fn semi_minor_axis(&self) -> fph {
        self.semi_minor_axis
    }

    pub fn eccentricity(&self) -> fph {
        self.eccentricity
    }

    pub fn argument_of_periapsis(&self) -> fph {
        self.argument_of_periapsis
    }

    pub fn focus_offset(&self) -> &Displacement {
        &self.focus_offset
    }

    pub fn direction(&self) -> OrbitDirection {
        self.direction
    }

    pub fn version(&self) -> OrbitVersion {
        self.version
    }

    /// Returns the elements this orbit was constructed from.
    pub fn elements(&self) -> OrbitElements {
        OrbitElements {
            semi_major_axis: self.semi_major_axis,
            eccentricity: self.eccentricity,
            argument_of_periapsis: self.argument_of_periapsis,
            focus_offset: self.focus_offset,
            direction: self.direction,
        }
    }

    /// Checks that the orbit describes a bound, non-degenerate ellipse.
    ///
    /// # Errors
    /// See [`Self::from_elements`].
    pub fn validate(&self) -> Result<(), OrbitError> {
        self.elements().validate()
    }

    /// Computes the distance between the focus and the point of closest
    /// approach.
    pub fn periapsis_distance(&self) -> fph {
        self.semi_major_axis * (1.0 - self.eccentricity)
    }

    /// Computes the distance between the focus and the most distant point.
    pub fn apoapsis_distance(&self) -> fph {
        self.semi_major_axis * (1.0 + self.eccentricity)
    }

    pub fn semi_latus_rectum(&self) -> fph {
        self.semi_major_axis * (1.0 - self.eccentricity.powi(2))
    }

    /// Computes the mean angular speed [rad/s] of a body on this orbit
    /// around a parent with the given gravitational parameter [m³/s²].
    pub fn mean_motion(&self, parent_mu: fph) -> fph {
        fph::sqrt(parent_mu / self.semi_major_axis.powi(3))
    }

    /// Computes the orbital period [s] around a parent with the given
    /// gravitational parameter.
    pub fn period(&self, parent_mu: fph) -> fph {
        TWO_PI / self.mean_motion(parent_mu)
    }

    /// Computes the distance from the focus at the given eccentric anomaly.
    pub fn distance_at_angle(&self, eccentric_anomaly: fph) -> fph {
        self.semi_major_axis * (1.0 - self.eccentricity * fph::cos(eccentric_anomaly))
    }

    /// Computes the position relative to the parent at the given eccentric
    /// anomaly [rad].
    ///
    /// The point on the unrotated, focus-centered ellipse is rotated by the
    /// argument of periapsis and then offset by the focus offset.
    pub fn position_at_angle(&self, eccentric_anomaly: fph) -> Displacement {
        let (sin_e, cos_e) = eccentric_anomaly.sin_cos();

        let perifocal_position = vector![
            self.semi_major_axis * (cos_e - self.eccentricity),
            self.direction.sign() * self.semi_minor_axis * sin_e
        ];

        self.periapsis_rotation * perifocal_position + self.focus_offset
    }

    /// Computes the velocity at the given eccentric anomaly for a parent with
    /// the given gravitational parameter.
    pub fn velocity_at_angle(&self, eccentric_anomaly: fph, parent_mu: fph) -> Velocity {
        let (sin_e, cos_e) = eccentric_anomaly.sin_cos();

        let rate_of_change_of_eccentric_anomaly =
            self.mean_motion(parent_mu) / (1.0 - self.eccentricity * cos_e);

        let perifocal_velocity = vector![
            -self.semi_major_axis * sin_e,
            self.direction.sign() * self.semi_minor_axis * cos_e
        ] * rate_of_change_of_eccentric_anomaly;

        self.periapsis_rotation * perifocal_velocity
    }

    /// Computes the mean anomaly, wrapped into `[0, 2π)`, after the given
    /// time has elapsed since the epoch at which the mean anomaly was
    /// `mean_anomaly_at_epoch`.
    pub fn mean_anomaly_at_time(
        &self,
        parent_mu: fph,
        elapsed_seconds: fph,
        mean_anomaly_at_epoch: fph,
    ) -> fph {
        normalize_radians(mean_anomaly_at_epoch + self.mean_motion(parent_mu) * elapsed_seconds)
    }

    /// Computes the eccentric anomaly after the given time has elapsed since
    /// the epoch.
    pub fn eccentric_anomaly_at_time(
        &self,
        kepler: &KeplerSolver,
        parent_mu: fph,
        elapsed_seconds: fph,
        mean_anomaly_at_epoch: fph,
    ) -> fph {
        let mean_anomaly =
            self.mean_anomaly_at_time(parent_mu, elapsed_seconds, mean_anomaly_at_epoch);
        kepler.solve(mean_anomaly, self.eccentricity)
    }

    /// Computes the position relative to the parent after the given time has
    /// elapsed since the epoch at which the mean anomaly was
    /// `mean_anomaly_at_epoch`.
    pub fn position_at_time(
        &self,
        kepler: &KeplerSolver,
        parent_mu: fph,
        elapsed_seconds: fph,
        mean_anomaly_at_epoch: fph,
    ) -> Displacement {
        self.position_at_angle(self.eccentric_anomaly_at_time(
            kepler,
            parent_mu,
            elapsed_seconds,
            mean_anomaly_at_epoch,
        ))
    }
}

impl OrbitElements {
    /// Checks that the elements describe a bound, non-degenerate ellipse.
    ///
    /// # Errors
    /// See [`OrbitModel::from_elements`].
    pub fn validate(&self) -> Result<(), OrbitError> {
        if !self.semi_major_axis.is_finite() {
            return Err(OrbitError::NonFiniteSemiMajorAxis {
                semi_major_axis: self.semi_major_axis,
            });
        }
        if self.semi_major_axis <= 0.0 {
            return Err(OrbitError::NonPositiveSemiMajorAxis {
                semi_major_axis: self.semi_major_axis,
            });
        }
        if !(0.0..1.0).contains(&self.eccentricity) {
            return Err(OrbitError::EccentricityOutOfRange {
                eccentricity: self.eccentricity,
            });
        }
        if !self.argument_of_periapsis.is_finite() {
            return Err(OrbitError::NonFiniteElement {
                name: "argument_of_periapsis",
            });
        }
        if !(self.focus_offset.x.is_finite() && self.focus_offset.y.is_finite()) {
            return Err(OrbitError::NonFiniteElement {
                name: "focus_offset",
            });
        }
        Ok(())
    }
}

impl Default for OrbitElements {
    fn default() -> Self {
        Self {
            semi_major_axis: 1.0,
            eccentricity: 0.0,
            argument_of_periapsis: 0.0,
            focus_offset: Displacement::zeros(),
            direction: OrbitDirection::CounterClockwise,
        }
    }
}

impl OrbitDirection {
    /// Returns `1` for counter-clockwise and `-1` for clockwise motion.
    pub fn sign(&self) -> fph {
        match self {
            Self::CounterClockwise => 1.0,
            Self::Clockwise => -1.0,
        }
    }

    /// Returns the direction corresponding to the sign of the given specific
    /// angular momentum.
    pub fn from_angular_momentum(angular_momentum: fph) -> Self {
        if angular_momentum < 0.0 {
            Self::Clockwise
        } else {
            Self::CounterClockwise
        }
    }
}

impl OrbitVersion {
    fn next() -> Self {
        Self(NEXT_ORBIT_VERSION.fetch_add(1, Ordering::Relaxed))
    }
}
