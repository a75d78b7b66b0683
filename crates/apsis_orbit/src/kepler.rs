//! Solution of Kepler's equation.
//!
//! Kepler's equation `M = E - e·sin(E)` relates the mean anomaly `M`, which
//! advances uniformly with time, to the eccentric anomaly `E`, from which a
//! position on the ellipse follows directly. It has no closed-form inverse
//! and is solved here with Newton-Raphson.
//!
//! The solver runs a fixed number of iterations instead of iterating to a
//! tolerance. It is evaluated for every trajectory point in every frame, so a
//! bounded and predictable cost is preferred over adaptive precision. With
//! the default iteration count the residual stays far below a milliradian
//! for eccentricities up to 0.95; closer to 1 the result may be
//! under-converged, which is accepted and not reported as an error.

use crate::fph;
use apsis_math::{
    angle::normalize_radians,
    consts::f64::{PI, TWO_PI},
};

/// Solves Kepler's equation with a fixed number of Newton-Raphson
/// iterations.
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KeplerSolver {
    /// Number of Newton-Raphson iterations to perform. Values outside
    /// [`Self::MIN_ITERATIONS`]`..=`[`Self::MAX_ITERATIONS`] are clamped.
    pub iterations: u32,
}

impl KeplerSolver {
    pub const MIN_ITERATIONS: u32 = 5;
    pub const MAX_ITERATIONS: u32 = 10;
    pub const DEFAULT_ITERATIONS: u32 = 8;

    /// Above this eccentricity the iteration starts from `E = π`, since
    /// starting from `E = M` converges poorly near periapsis.
    pub const HIGH_ECCENTRICITY_THRESHOLD: fph = 0.8;

    pub fn new(iterations: u32) -> Self {
        Self { iterations }
    }

    /// Computes the eccentric anomaly corresponding to the given mean anomaly
    /// (in radians, any range) for an orbit with the given eccentricity.
    ///
    /// The mean anomaly is wrapped into `[0, 2π)` before solving, so the
    /// returned eccentric anomaly lies close to that range.
    pub fn solve(&self, mean_anomaly: fph, eccentricity: fph) -> fph {
        let mean_anomaly = normalize_radians(mean_anomaly);

        let mut eccentric_anomaly = Self::initial_guess(mean_anomaly, eccentricity);

        for _ in 0..self.iteration_count() {
            eccentric_anomaly -= kepler_residual(eccentric_anomaly, eccentricity, mean_anomaly)
                / (1.0 - eccentricity * fph::cos(eccentric_anomaly));
        }

        eccentric_anomaly
    }

    /// Computes the eccentric anomaly for the given mean anomaly, preserving
    /// the number of whole revolutions contained in the mean anomaly.
    ///
    /// Unlike [`Self::solve`], the result increases continuously with the
    /// mean anomaly, which makes it suitable for bounding arcs that wrap
    /// around periapsis.
    pub fn solve_unwrapped(&self, mean_anomaly: fph, eccentricity: fph) -> fph {
        let revolutions = (mean_anomaly / TWO_PI).floor();
        revolutions * TWO_PI + self.solve(mean_anomaly, eccentricity)
    }

    fn iteration_count(&self) -> u32 {
        self.iterations
            .clamp(Self::MIN_ITERATIONS, Self::MAX_ITERATIONS)
    }

    fn initial_guess(mean_anomaly: fph, eccentricity: fph) -> fph {
        if eccentricity > Self::HIGH_ECCENTRICITY_THRESHOLD {
            PI
        } else {
            mean_anomaly
        }
    }
}

impl Default for KeplerSolver {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ITERATIONS)
    }
}

/// Computes the mean anomaly corresponding to the given eccentric anomaly.
pub fn mean_anomaly_from_eccentric(eccentric_anomaly: fph, eccentricity: fph) -> fph {
    eccentric_anomaly - eccentricity * fph::sin(eccentric_anomaly)
}

/// Computes the true anomaly corresponding to the given eccentric anomaly.
/// The result lies in `(-π, π]`.
pub fn true_anomaly_from_eccentric(eccentric_anomaly: fph, eccentricity: fph) -> fph {
    let (sin_e, cos_e) = eccentric_anomaly.sin_cos();
    fph::atan2(
        fph::sqrt(1.0 - eccentricity.powi(2)) * sin_e,
        cos_e - eccentricity,
    )
}

/// Computes the eccentric anomaly corresponding to the given true anomaly.
/// The result lies in `(-π, π]`.
pub fn eccentric_anomaly_from_true(true_anomaly: fph, eccentricity: fph) -> fph {
    let (sin_nu, cos_nu) = true_anomaly.sin_cos();
    fph::atan2(
        fph::sqrt(1.0 - eccentricity.powi(2)) * sin_nu,
        cos_nu + eccentricity,
    )
}

fn kepler_residual(eccentric_anomaly: fph, eccentricity: fph, mean_anomaly: fph) -> fph {
    mean_anomaly_from_eccentric(eccentric_anomaly, eccentricity) - mean_anomaly
}
