//! Time-bounded pieces of a predicted trajectory.

use crate::{
    fph,
    kepler::KeplerSolver,
    orbit::{OrbitModel, OrbitVersion},
    quantities::{Displacement, Position},
    sampler::SamplerConfig,
    state::OrbitalState,
};
use apsis_math::consts::f64::TWO_PI;

/// A stretch of a trajectory during which a craft follows a single orbit,
/// beginning at `start_time` [s from now].
#[derive(Clone, Debug, PartialEq)]
pub struct TrajectoryLeg {
    orbit: OrbitModel,
    parent_mu: fph,
    mean_anomaly_at_start: fph,
    start_time: fph,
}

/// An ordered sequence of world-space points forming a continuous arc of a
/// predicted trajectory between two times.
///
/// The points are kept relative to the parent as well, so that the segment
/// can follow a moving parent through [`Self::reanchor`] without being
/// resampled.
#[derive(Clone, Debug, PartialEq)]
pub struct TrajectorySegment {
    points: Vec<Position>,
    relative_points: Vec<Displacement>,
    parent_position: Position,
    start_time: fph,
    end_time: fph,
    source_version: OrbitVersion,
}

impl TrajectoryLeg {
    /// Creates a leg following the given orbit around a parent with
    /// gravitational parameter `parent_mu`, starting at `start_time` with
    /// the given mean anomaly.
    pub fn new(
        orbit: OrbitModel,
        parent_mu: fph,
        mean_anomaly_at_start: fph,
        start_time: fph,
    ) -> Self {
        Self {
            orbit,
            parent_mu,
            mean_anomaly_at_start,
            start_time,
        }
    }

    pub fn orbit(&self) -> &OrbitModel {
        &self.orbit
    }

    pub fn parent_mu(&self) -> fph {
        self.parent_mu
    }

    pub fn mean_anomaly_at_start(&self) -> fph {
        self.mean_anomaly_at_start
    }

    pub fn start_time(&self) -> fph {
        self.start_time
    }

    /// The time [s] for one full revolution of the leg's orbit.
    pub fn period(&self) -> fph {
        self.orbit.period(self.parent_mu)
    }

    /// Computes the parent-relative state on this leg at the given time
    /// [s from now].
    pub fn state_at_time(&self, kepler: &KeplerSolver, time: fph) -> OrbitalState {
        self.orbit.state_at_time(
            kepler,
            self.parent_mu,
            time - self.start_time,
            self.mean_anomaly_at_start,
        )
    }

    /// Tessellates the part of this leg between its start and `end_time`,
    /// or one full period if `end_time` is [`None`] or lies more than a
    /// period after the start.
    ///
    /// Points are spaced evenly in eccentric anomaly, with as many segments
    /// as the corresponding fraction of a full orbit tessellated according
    /// to `config` would have, but no fewer than `min_segments`. The
    /// parent-relative points are moved into world space by adding
    /// `parent_position`.
    pub fn sample_arc(
        &self,
        kepler: &KeplerSolver,
        config: &SamplerConfig,
        min_segments: u32,
        end_time: Option<fph>,
        parent_position: &Position,
    ) -> TrajectorySegment {
        let period = self.period();
        let duration = end_time
            .map_or(period, |end_time| end_time - self.start_time)
            .min(period)
            .max(0.0);

        let end_time = self.start_time + duration;

        let eccentricity = self.orbit.eccentricity();
        let start_mean_anomaly = self.mean_anomaly_at_start;
        let end_mean_anomaly =
            start_mean_anomaly + self.orbit.mean_motion(self.parent_mu) * duration;

        let start_angle = kepler.solve_unwrapped(start_mean_anomaly, eccentricity);
        let end_angle = kepler.solve_unwrapped(end_mean_anomaly, eccentricity);
        let angle_span = (end_angle - start_angle).clamp(0.0, TWO_PI);

        if duration == 0.0 || angle_span == 0.0 {
            return TrajectorySegment::new(
                vec![self.orbit.position_at_angle(start_angle)],
                parent_position,
                self.start_time,
                end_time,
                &self.orbit,
            );
        }

        let segments = arc_segment_count(
            config.segment_count(self.orbit.semi_major_axis()),
            min_segments,
            angle_span,
        );
        let angle_step = angle_span / fph::from(segments);

        let relative_points = (0..=segments)
            .map(|i| {
                self.orbit
                    .position_at_angle(start_angle + fph::from(i) * angle_step)
            })
            .collect();

        TrajectorySegment::new(
            relative_points,
            parent_position,
            self.start_time,
            end_time,
            &self.orbit,
        )
    }
}

impl TrajectorySegment {
    fn new(
        relative_points: Vec<Displacement>,
        parent_position: &Position,
        start_time: fph,
        end_time: fph,
        orbit: &OrbitModel,
    ) -> Self {
        let points = relative_points
            .iter()
            .map(|displacement| parent_position + displacement)
            .collect();
        Self {
            points,
            relative_points,
            parent_position: *parent_position,
            start_time,
            end_time,
            source_version: orbit.version(),
        }
    }

    /// The world-space points of the arc, ordered in time.
    pub fn points(&self) -> &[Position] {
        &self.points
    }

    /// The points of the arc relative to the parent.
    pub fn relative_points(&self) -> &[Displacement] {
        &self.relative_points
    }

    /// The parent position the world-space points are relative to.
    pub fn parent_position(&self) -> &Position {
        &self.parent_position
    }

    /// Recomputes the world-space points for the given parent position.
    pub fn reanchor(&mut self, parent_position: &Position) {
        if self.parent_position == *parent_position {
            return;
        }
        for (point, displacement) in self.points.iter_mut().zip(&self.relative_points) {
            *point = parent_position + displacement;
        }
        self.parent_position = *parent_position;
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The time [s from now] at the first point.
    pub fn start_time(&self) -> fph {
        self.start_time
    }

    /// The time [s from now] at the last point.
    pub fn end_time(&self) -> fph {
        self.end_time
    }

    /// The version of the orbit the arc was sampled from.
    pub fn source_version(&self) -> OrbitVersion {
        self.source_version
    }
}

fn arc_segment_count(full_orbit_segments: u32, min_segments: u32, angle_span: fph) -> u32 {
    let min_segments = min_segments.clamp(1, full_orbit_segments.max(1));
    let proportional = (fph::from(full_orbit_segments) * angle_span / TWO_PI).ceil();
    if proportional <= fph::from(min_segments) {
        min_segments
    } else {
        (proportional as u32).min(full_orbit_segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyHandle;
    use apsis_containers::Arena;
    use approx::assert_abs_diff_eq;
    use nalgebra::point;

    const EARTH_MU: fph = 3.986004418e14;

    fn leg(eccentricity: fph, mean_anomaly_at_start: fph, start_time: fph) -> TrajectoryLeg {
        let mut arena = Arena::new();
        let parent = BodyHandle::from(arena.insert(()));
        let orbit = OrbitModel::new(parent, 1e7, eccentricity, 0.3).unwrap();
        TrajectoryLeg::new(orbit, EARTH_MU, mean_anomaly_at_start, start_time)
    }

    #[test]
    fn arc_without_end_covers_one_period() {
        let leg = leg(0.2, 1.0, 50.0);
        let segment = leg.sample_arc(
            &KeplerSolver::default(),
            &SamplerConfig::default(),
            16,
            None,
            &Position::origin(),
        );
        assert_abs_diff_eq!(
            segment.end_time() - segment.start_time(),
            leg.period(),
            epsilon = 1e-6
        );
        assert_abs_diff_eq!(
            segment.points()[0],
            *segment.points().last().unwrap(),
            epsilon = 1e-3
        );
    }

    #[test]
    fn arc_is_capped_at_one_period() {
        let leg = leg(0.2, 1.0, 0.0);
        let segment = leg.sample_arc(
            &KeplerSolver::default(),
            &SamplerConfig::default(),
            16,
            Some(10.0 * leg.period()),
            &Position::origin(),
        );
        assert_abs_diff_eq!(segment.end_time(), leg.period());
    }

    #[test]
    fn arc_endpoints_match_states_at_window_bounds() {
        let kepler = KeplerSolver::default();
        let leg = leg(0.4, 2.0, 100.0);
        let parent_position = point![3e10, -1e10];
        let end_time = 100.0 + 0.3 * leg.period();

        let segment = leg.sample_arc(
            &kepler,
            &SamplerConfig::default(),
            16,
            Some(end_time),
            &parent_position,
        );

        let start = parent_position + leg.state_at_time(&kepler, 100.0).position;
        let end = parent_position + leg.state_at_time(&kepler, end_time).position;
        assert_abs_diff_eq!(segment.points()[0], start, epsilon = 1e-3);
        assert_abs_diff_eq!(*segment.points().last().unwrap(), end, epsilon = 1e-3);
    }

    #[test]
    fn zero_length_window_gives_single_point() {
        let leg = leg(0.1, 0.0, 10.0);
        let segment = leg.sample_arc(
            &KeplerSolver::default(),
            &SamplerConfig::default(),
            16,
            Some(10.0),
            &Position::origin(),
        );
        assert_eq!(segment.len(), 1);
    }

    #[test]
    fn reanchoring_moves_points_with_parent() {
        let kepler = KeplerSolver::default();
        let leg = leg(0.3, 0.5, 0.0);
        let config = SamplerConfig::default();
        let old_parent = point![1e11, 0.0];
        let new_parent = point![1e11, 2e9];

        let mut segment = leg.sample_arc(&kepler, &config, 16, Some(1000.0), &old_parent);
        segment.reanchor(&new_parent);

        let resampled = leg.sample_arc(&kepler, &config, 16, Some(1000.0), &new_parent);
        assert_eq!(segment, resampled);
    }

    #[test]
    fn short_arcs_use_minimum_segment_count() {
        assert_eq!(arc_segment_count(1000, 16, 1e-6), 16);
        assert_eq!(arc_segment_count(1000, 16, TWO_PI), 1000);
        assert_eq!(arc_segment_count(1000, 16, 1.0), 160);
        assert_eq!(arc_segment_count(8, 16, 1.0), 8);
    }
}
