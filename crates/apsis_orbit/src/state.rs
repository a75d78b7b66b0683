//! Conversion between state vectors and Keplerian orbits.

use crate::{
    OrbitError,
    body::BodyHandle,
    fph,
    kepler::{self, KeplerSolver},
    orbit::{OrbitDirection, OrbitElements, OrbitModel},
    quantities::{Displacement, Velocity},
};
use apsis_math::angle::normalize_radians;
use approx::{AbsDiffEq, RelativeEq};

/// Eccentricities below this are treated as circular when determining the
/// direction of periapsis, which is undefined for a circle.
const CIRCULAR_ECCENTRICITY: fph = 1e-10;

/// Position and velocity of a body relative to its parent.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrbitalState {
    pub position: Displacement,
    pub velocity: Velocity,
}

impl OrbitalState {
    pub fn new(position: Displacement, velocity: Velocity) -> Self {
        Self { position, velocity }
    }

    /// Computes the specific orbital energy [J/kg] of the state around a
    /// parent with the given gravitational parameter.
    pub fn specific_energy(&self, parent_mu: fph) -> fph {
        0.5 * self.velocity.norm_squared() - parent_mu / self.position.norm()
    }

    /// Computes the (signed, out-of-plane) specific angular momentum
    /// [m²/s].
    pub fn specific_angular_momentum(&self) -> fph {
        self.position.perp(&self.velocity)
    }

    /// Computes the eccentricity vector, pointing from the focus towards the
    /// periapsis with a magnitude equal to the eccentricity.
    pub fn eccentricity_vector(&self, parent_mu: fph) -> Displacement {
        let distance = self.position.norm();
        let speed_squared = self.velocity.norm_squared();
        let radial_velocity = self.position.dot(&self.velocity);

        (self.position * (speed_squared - parent_mu / distance) - self.velocity * radial_velocity)
            / parent_mu
    }
}

impl OrbitModel {
    /// Reconstructs the orbit followed by a body with the given state
    /// relative to the given parent, whose gravitational parameter is
    /// `parent_mu`. The focus of the resulting orbit lies at the parent.
    ///
    /// # Returns
    /// The orbit and the mean anomaly of the body at the moment described by
    /// the state.
    ///
    /// # Errors
    /// Returns [`OrbitError::UnboundTrajectory`] if the state is on a
    /// parabolic or hyperbolic trajectory, and [`OrbitError::DegenerateState`]
    /// if the state is not finite, lies at the parent or moves purely
    /// radially.
    pub fn from_state(
        parent: BodyHandle,
        state: &OrbitalState,
        parent_mu: fph,
    ) -> Result<(Self, fph), OrbitError> {
        if !(parent_mu > 0.0 && parent_mu.is_finite()) {
            return Err(OrbitError::NonPositiveGravitationalParameter { mu: parent_mu });
        }
        if !state_is_finite(state) {
            return Err(OrbitError::DegenerateState {
                reason: "position or velocity is not finite",
            });
        }

        let distance = state.position.norm();
        if distance == 0.0 {
            return Err(OrbitError::DegenerateState {
                reason: "position coincides with the parent",
            });
        }

        let angular_momentum = state.specific_angular_momentum();
        if angular_momentum.abs() <= fph::EPSILON * distance * state.velocity.norm() {
            return Err(OrbitError::DegenerateState {
                reason: "motion is purely radial",
            });
        }

        let eccentricity_vector = state.eccentricity_vector(parent_mu);
        let eccentricity = eccentricity_vector.norm();

        let energy = state.specific_energy(parent_mu);
        if energy >= 0.0 || eccentricity >= 1.0 {
            return Err(OrbitError::UnboundTrajectory { eccentricity });
        }

        let semi_major_axis = -parent_mu / (2.0 * energy);

        let argument_of_periapsis = if eccentricity > CIRCULAR_ECCENTRICITY {
            normalize_radians(fph::atan2(eccentricity_vector.y, eccentricity_vector.x))
        } else {
            0.0
        };

        let direction = OrbitDirection::from_angular_momentum(angular_momentum);

        let orbit = Self::from_elements(
            parent,
            &OrbitElements {
                semi_major_axis,
                eccentricity,
                argument_of_periapsis,
                focus_offset: Displacement::zeros(),
                direction,
            },
        )?;

        let eccentric_anomaly = orbit.eccentric_anomaly_of_position(&state.position);
        let mean_anomaly = normalize_radians(kepler::mean_anomaly_from_eccentric(
            eccentric_anomaly,
            eccentricity,
        ));

        Ok((orbit, mean_anomaly))
    }

    /// Computes the state relative to the parent at the given eccentric
    /// anomaly.
    pub fn state_at_angle(&self, eccentric_anomaly: fph, parent_mu: fph) -> OrbitalState {
        OrbitalState {
            position: self.position_at_angle(eccentric_anomaly),
            velocity: self.velocity_at_angle(eccentric_anomaly, parent_mu),
        }
    }

    /// Computes the state relative to the parent after the given time has
    /// elapsed since the epoch at which the mean anomaly was
    /// `mean_anomaly_at_epoch`.
    pub fn state_at_time(
        &self,
        kepler: &KeplerSolver,
        parent_mu: fph,
        elapsed_seconds: fph,
        mean_anomaly_at_epoch: fph,
    ) -> OrbitalState {
        let eccentric_anomaly = self.eccentric_anomaly_at_time(
            kepler,
            parent_mu,
            elapsed_seconds,
            mean_anomaly_at_epoch,
        );
        self.state_at_angle(eccentric_anomaly, parent_mu)
    }

    /// Computes the eccentric anomaly of the point on the orbit closest in
    /// direction to the given parent-relative position.
    pub fn eccentric_anomaly_of_position(&self, position: &Displacement) -> fph {
        let focus_relative = position - self.focus_offset();
        let (sin_w, cos_w) = self.argument_of_periapsis().sin_cos();

        // Rotate into the perifocal frame, where the periapsis lies on the
        // positive x-axis and the motion is counter-clockwise
        let perifocal_x = cos_w * focus_relative.x + sin_w * focus_relative.y;
        let perifocal_y =
            self.direction().sign() * (-sin_w * focus_relative.x + cos_w * focus_relative.y);

        normalize_radians(fph::atan2(
            perifocal_y / self.semi_minor_axis(),
            perifocal_x / self.semi_major_axis() + self.eccentricity(),
        ))
    }
}

impl AbsDiffEq for OrbitalState {
    type Epsilon = fph;

    fn default_epsilon() -> fph {
        fph::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: fph) -> bool {
        self.position.abs_diff_eq(&other.position, epsilon)
            && self.velocity.abs_diff_eq(&other.velocity, epsilon)
    }
}

impl RelativeEq for OrbitalState {
    fn default_max_relative() -> fph {
        fph::default_max_relative()
    }

    fn relative_eq(&self, other: &Self, epsilon: fph, max_relative: fph) -> bool {
        self.position
            .relative_eq(&other.position, epsilon, max_relative)
            && self
                .velocity
                .relative_eq(&other.velocity, epsilon, max_relative)
    }
}

fn state_is_finite(state: &OrbitalState) -> bool {
    state.position.iter().all(|c| c.is_finite()) && state.velocity.iter().all(|c| c.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use apsis_containers::Arena;
    use apsis_math::consts::f64::TWO_PI;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use nalgebra::vector;
    use proptest::prelude::*;

    const EARTH_MU: fph = 3.986004418e14;

    fn parent() -> BodyHandle {
        let mut arena = Arena::new();
        BodyHandle::from(arena.insert(()))
    }

    #[test]
    fn circular_state_gives_circular_orbit() {
        let radius = 7e6;
        let speed = fph::sqrt(EARTH_MU / radius);
        let state = OrbitalState::new(vector![radius, 0.0], vector![0.0, speed]);

        let (orbit, mean_anomaly) = OrbitModel::from_state(parent(), &state, EARTH_MU).unwrap();

        assert_relative_eq!(orbit.semi_major_axis(), radius, max_relative = 1e-12);
        assert_abs_diff_eq!(orbit.eccentricity(), 0.0, epsilon = 1e-12);
        assert_eq!(orbit.direction(), OrbitDirection::CounterClockwise);
        assert_abs_diff_eq!(mean_anomaly, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn clockwise_motion_gives_clockwise_orbit() {
        let radius = 7e6;
        let speed = fph::sqrt(EARTH_MU / radius);
        let state = OrbitalState::new(vector![radius, 0.0], vector![0.0, -speed]);

        let (orbit, mean_anomaly) = OrbitModel::from_state(parent(), &state, EARTH_MU).unwrap();

        assert_eq!(orbit.direction(), OrbitDirection::Clockwise);
        assert_abs_diff_eq!(
            orbit.state_at_angle(
                KeplerSolver::default().solve(mean_anomaly, orbit.eccentricity()),
                EARTH_MU
            ),
            state,
            epsilon = 1e-3
        );
    }

    #[test]
    fn escape_velocity_is_rejected_as_unbound() {
        let radius = 7e6;
        let escape_speed = fph::sqrt(2.0 * EARTH_MU / radius);
        let state = OrbitalState::new(vector![radius, 0.0], vector![0.0, 1.01 * escape_speed]);

        assert!(matches!(
            OrbitModel::from_state(parent(), &state, EARTH_MU),
            Err(OrbitError::UnboundTrajectory { eccentricity }) if eccentricity > 1.0
        ));
    }

    #[test]
    fn radial_motion_is_rejected_as_degenerate() {
        let state = OrbitalState::new(vector![7e6, 0.0], vector![1000.0, 0.0]);
        assert!(matches!(
            OrbitModel::from_state(parent(), &state, EARTH_MU),
            Err(OrbitError::DegenerateState { .. })
        ));
    }

    #[test]
    fn state_at_parent_is_rejected_as_degenerate() {
        let state = OrbitalState::new(vector![0.0, 0.0], vector![0.0, 7000.0]);
        assert!(matches!(
            OrbitModel::from_state(parent(), &state, EARTH_MU),
            Err(OrbitError::DegenerateState { .. })
        ));
    }

    #[test]
    fn non_positive_gravitational_parameter_is_rejected() {
        let state = OrbitalState::new(vector![7e6, 0.0], vector![0.0, 7000.0]);
        assert!(matches!(
            OrbitModel::from_state(parent(), &state, 0.0),
            Err(OrbitError::NonPositiveGravitationalParameter { .. })
        ));
    }

    #[test]
    fn specific_energy_is_conserved_along_orbit() {
        let orbit = OrbitModel::new(parent(), 2e7, 0.6, 1.0).unwrap();
        let kepler = KeplerSolver::default();
        let reference = orbit
            .state_at_time(&kepler, EARTH_MU, 0.0, 0.0)
            .specific_energy(EARTH_MU);
        for step in 1..10 {
            let energy = orbit
                .state_at_time(&kepler, EARTH_MU, 1000.0 * fph::from(step), 0.0)
                .specific_energy(EARTH_MU);
            assert_relative_eq!(energy, reference, max_relative = 1e-9);
        }
        assert_relative_eq!(reference, -EARTH_MU / 4e7, max_relative = 1e-9);
    }

    proptest! {
        #[test]
        fn reconstructing_orbit_from_its_state_recovers_elements(
            semi_major_axis in 6.5e6..1e9_f64,
            eccentricity in 0.01..0.95_f64,
            argument_of_periapsis in 0.0..TWO_PI,
            eccentric_anomaly in 0.0..TWO_PI,
            clockwise in any::<bool>(),
        ) {
            let direction = if clockwise {
                OrbitDirection::Clockwise
            } else {
                OrbitDirection::CounterClockwise
            };
            let orbit = OrbitModel::from_elements(
                parent(),
                &OrbitElements {
                    semi_major_axis,
                    eccentricity,
                    argument_of_periapsis,
                    focus_offset: Displacement::zeros(),
                    direction,
                },
            )
            .unwrap();
            let state = orbit.state_at_angle(eccentric_anomaly, EARTH_MU);

            let (reconstructed, mean_anomaly) =
                OrbitModel::from_state(orbit.parent(), &state, EARTH_MU).unwrap();

            prop_assert!(
                (reconstructed.semi_major_axis() - semi_major_axis).abs() < 1e-6 * semi_major_axis
            );
            prop_assert!((reconstructed.eccentricity() - eccentricity).abs() < 1e-6);
            prop_assert_eq!(reconstructed.direction(), direction);

            let recovered_state = reconstructed.state_at_angle(
                KeplerSolver::default().solve(mean_anomaly, reconstructed.eccentricity()),
                EARTH_MU,
            );
            prop_assert!(
                (recovered_state.position - state.position).norm() < 1e-5 * semi_major_axis
            );
            prop_assert!(
                (recovered_state.velocity - state.velocity).norm() < 1e-5 * state.velocity.norm()
            );
        }
    }
}
