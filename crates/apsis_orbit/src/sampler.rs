//! Tessellation of orbits into cached point buffers.

use crate::{
    body::{BodyHandle, BodyRegistry},
    fph,
    orbit::{OrbitModel, OrbitVersion},
    quantities::Displacement,
};
use apsis_log::{LogOnce, warn_once};
use apsis_math::consts::f64::TWO_PI;
use nalgebra::vector;
use std::collections::HashMap;

/// Configuration parameters for orbit tessellation.
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
#[derive(Clone, Debug, PartialEq)]
pub struct SamplerConfig {
    /// The desired length [m] of each chord approximating the orbit. The
    /// number of segments grows with the circumference of the orbit so that
    /// chords stay near this length until `max_segments` is reached.
    pub target_chord_length: fph,
    /// The smallest number of segments used for any full orbit.
    pub min_segments: u32,
    /// The largest number of segments used for any full orbit.
    pub max_segments: u32,
}

/// Double-precision tessellation of a single orbit, relative to the orbit's
/// parent.
#[derive(Clone, Debug)]
pub struct OrbitSampleCache {
    points: Vec<fph>,
    segments: u32,
    source_version: OrbitVersion,
}

/// Produces and caches point buffers for the orbits of the bodies in a
/// [`BodyRegistry`].
///
/// A cached buffer is rebuilt only when the version of the body's orbit
/// differs from the one the buffer was built from. Bodies whose orbit cannot
/// be sampled are skipped, and the reason is logged once per class.
#[derive(Debug)]
pub struct OrbitSampler {
    config: SamplerConfig,
    caches: HashMap<BodyHandle, OrbitSampleCache>,
    log_once: LogOnce,
    rebuild_count: u64,
}

const MISSING_ORBIT: &str = "missing orbit";
const MISSING_PARENT: &str = "missing parent";
const DEGENERATE_ORBIT: &str = "degenerate orbit";

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            target_chord_length: 1e6,
            min_segments: 1000,
            max_segments: 100_000,
        }
    }
}

impl SamplerConfig {
    /// Computes the number of segments to use for a full orbit with the
    /// given semi-major axis.
    pub fn segment_count(&self, semi_major_axis: fph) -> u32 {
        let min_segments = self.min_segments.max(1);
        let max_segments = self.max_segments.max(min_segments);

        let ideal = (TWO_PI * semi_major_axis / self.target_chord_length).ceil();
        if !ideal.is_finite() || ideal >= fph::from(max_segments) {
            return max_segments;
        }
        if ideal <= fph::from(min_segments) {
            return min_segments;
        }
        ideal as u32
    }
}

impl OrbitSampleCache {
    /// Tessellates the given orbit into the given number of segments.
    pub fn build(orbit: &OrbitModel, segments: u32) -> Self {
        let mut points = Vec::new();
        sample_orbit_points(orbit, segments, &mut points);
        Self::from_points(points, segments, orbit.version())
    }

    fn from_points(points: Vec<fph>, segments: u32, source_version: OrbitVersion) -> Self {
        Self {
            points,
            segments,
            source_version,
        }
    }

    /// The flat buffer of interleaved parent-relative `x` and `y`
    /// coordinates. The first and last point coincide.
    pub fn points(&self) -> &[fph] {
        &self.points
    }

    pub fn point_count(&self) -> usize {
        self.points.len() / 2
    }

    pub fn segments(&self) -> u32 {
        self.segments
    }

    /// The version of the orbit the points were computed from.
    pub fn source_version(&self) -> OrbitVersion {
        self.source_version
    }

    /// Returns an iterator over the parent-relative points.
    pub fn iter_points(&self) -> impl Iterator<Item = Displacement> + '_ {
        self.points
            .chunks_exact(2)
            .map(|coords| vector![coords[0], coords[1]])
    }
}

impl OrbitSampler {
    pub fn new(config: SamplerConfig) -> Self {
        Self {
            config,
            caches: HashMap::new(),
            log_once: LogOnce::new(),
            rebuild_count: 0,
        }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// The number of times a cache has been (re)built.
    pub fn rebuild_count(&self) -> u64 {
        self.rebuild_count
    }

    /// Registry of warnings already emitted about skipped bodies.
    pub fn log_once(&self) -> &LogOnce {
        &self.log_once
    }

    /// Returns the cached tessellation of the given body's orbit, rebuilding
    /// it first if the orbit has changed since it was built.
    ///
    /// # Returns
    /// [`None`] if the body does not exist, has no orbit, orbits a body that
    /// does not exist or has a degenerate orbit. Any stale cache for the
    /// body is dropped in that case.
    pub fn sample(
        &mut self,
        registry: &BodyRegistry,
        body: BodyHandle,
    ) -> Option<&OrbitSampleCache> {
        let Some(orbit) = sampleable_orbit(&mut self.log_once, registry, body) else {
            self.caches.remove(&body);
            return None;
        };

        let is_stale = self
            .caches
            .get(&body)
            .is_none_or(|cache| cache.source_version != orbit.version());

        if is_stale {
            let segments = self.config.segment_count(orbit.semi_major_axis());

            apsis_log::debug!(
                "Sampling orbit of body {:?} (a = {:.3e} m) with {} segments",
                body,
                orbit.semi_major_axis(),
                segments
            );

            // Reuse the allocation of the stale buffer, but only publish the
            // cache once it is complete
            let mut points = self
                .caches
                .remove(&body)
                .map(|cache| cache.points)
                .unwrap_or_default();

            sample_orbit_points(orbit, segments, &mut points);

            self.caches.insert(
                body,
                OrbitSampleCache::from_points(points, segments, orbit.version()),
            );
            self.rebuild_count += 1;
        }

        self.caches.get(&body)
    }

    /// Returns the current cache for the given body without updating it.
    pub fn cached(&self, body: BodyHandle) -> Option<&OrbitSampleCache> {
        self.caches.get(&body)
    }

    /// Drops the caches of bodies that no longer exist in the registry.
    pub fn evict_removed(&mut self, registry: &BodyRegistry) {
        self.caches.retain(|body, _| registry.contains(*body));
    }

    /// The number of bodies with a cached tessellation.
    pub fn cache_count(&self) -> usize {
        self.caches.len()
    }
}

/// Overwrites the given buffer with the `segments + 1` parent-relative points
/// at eccentric anomalies evenly spaced over a full revolution of the given
/// orbit, stored as interleaved `x` and `y` coordinates.
pub fn sample_orbit_points(orbit: &OrbitModel, segments: u32, points: &mut Vec<fph>) {
    let segments = segments.max(1);

    points.clear();
    points.reserve(2 * (segments as usize + 1));

    let angle_step = TWO_PI / fph::from(segments);

    for i in 0..=segments {
        let position = orbit.position_at_angle(fph::from(i) * angle_step);
        points.push(position.x);
        points.push(position.y);
    }
}

fn sampleable_orbit<'a>(
    log_once: &mut LogOnce,
    registry: &'a BodyRegistry,
    handle: BodyHandle,
) -> Option<&'a OrbitModel> {
    let body = registry.body(handle)?;

    let Some(orbit) = body.orbit() else {
        warn_once!(
            log_once,
            MISSING_ORBIT,
            "Skipping body `{}` without an orbit",
            body.name()
        );
        return None;
    };

    if !registry.contains(orbit.parent()) {
        warn_once!(
            log_once,
            MISSING_PARENT,
            "Skipping orbit of body `{}` whose parent does not exist",
            body.name()
        );
        return None;
    }

    if let Err(error) = orbit.validate() {
        warn_once!(
            log_once,
            DEGENERATE_ORBIT,
            "Skipping degenerate orbit of body `{}`: {}",
            body.name(),
            error
        );
        return None;
    }

    Some(orbit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{Body, BodyKind};
    use apsis_containers::Arena;
    use approx::assert_abs_diff_eq;

    fn registry_with_planet(
        semi_major_axis: fph,
        eccentricity: fph,
    ) -> (BodyRegistry, BodyHandle, BodyHandle) {
        let mut registry = BodyRegistry::new();
        let star = registry
            .add_body(Body::new("Star", BodyKind::Star, 2e30, 7e8))
            .unwrap();
        let orbit = OrbitModel::new(star, semi_major_axis, eccentricity, 0.4).unwrap();
        let planet = registry
            .add_body(Body::new("Planet", BodyKind::Planet, 6e24, 6.4e6).with_orbit(orbit, 0.0))
            .unwrap();
        (registry, star, planet)
    }

    fn segment_distance_to_point(
        start: &Displacement,
        end: &Displacement,
        point: &Displacement,
    ) -> fph {
        let segment = end - start;
        let t = ((point - start).dot(&segment) / segment.norm_squared()).clamp(0.0, 1.0);
        (start + segment * t - point).norm()
    }

    #[test]
    fn segment_count_is_clamped() {
        let config = SamplerConfig::default();
        assert_eq!(config.segment_count(1.0), config.min_segments);
        assert_eq!(config.segment_count(1e15), config.max_segments);
        assert_eq!(config.segment_count(fph::INFINITY), config.max_segments);
        // Circumference of 2π·1e9 m gives 6284 chords of at most 1000 km
        assert_eq!(config.segment_count(1e9), 6284);
    }

    #[test]
    fn circular_orbit_points_all_lie_at_semi_major_axis() {
        let mut arena = Arena::new();
        let parent = BodyHandle::from(arena.insert(()));
        let orbit = OrbitModel::new(parent, 7e6, 0.0, 0.0).unwrap();

        let mut points = Vec::new();
        sample_orbit_points(&orbit, 360, &mut points);
        assert_eq!(points.len(), 2 * 361);

        for coords in points.chunks_exact(2) {
            assert_abs_diff_eq!(fph::hypot(coords[0], coords[1]), 7e6, epsilon = 1e-6);
        }
    }

    #[test]
    fn sampled_orbit_is_closed() {
        let (registry, _, planet) = registry_with_planet(2e9, 0.6);
        let mut sampler = OrbitSampler::new(SamplerConfig::default());
        let cache = sampler.sample(&registry, planet).unwrap();

        let first = cache.iter_points().next().unwrap();
        let last = cache.iter_points().last().unwrap();
        assert_abs_diff_eq!(first, last, epsilon = 1e-4);
        assert_eq!(cache.point_count(), cache.segments() as usize + 1);
    }

    #[test]
    fn chord_error_is_bounded_by_segment_count_and_periapsis_curvature() {
        let (registry, _, planet) = registry_with_planet(5e9, 0.5);
        let mut sampler = OrbitSampler::new(SamplerConfig::default());

        let cache = sampler.sample(&registry, planet).unwrap();
        let coarse: Vec<_> = cache.iter_points().collect();
        let segments = cache.segments();

        let orbit = registry.body(planet).unwrap().orbit().unwrap().clone();
        let a = orbit.semi_major_axis();
        let b = orbit.semi_minor_axis();

        // Each segment spans at most `a·ΔE` of arc, and the curvature never
        // exceeds `a/b²` (at the apsides), so no point of the arc lies
        // farther than `κ·s²/8` from its chord
        let angle_step = TWO_PI / fph::from(segments);
        let max_arc_length = a * angle_step;
        let max_curvature = a / (b * b);
        let bound = max_curvature * max_arc_length.powi(2) / 8.0;
        assert!(bound < 50.0);

        let mut fine = Vec::new();
        sample_orbit_points(&orbit, 10 * segments, &mut fine);

        let mut max_distance: fph = 0.0;
        for (i, coords) in fine.chunks_exact(2).enumerate() {
            let point = vector![coords[0], coords[1]];
            let segment_idx = (i / 10).min(coarse.len() - 2);
            let distance =
                segment_distance_to_point(&coarse[segment_idx], &coarse[segment_idx + 1], &point);
            assert!(
                distance <= bound,
                "Point {} deviates {} m from the tessellation (bound {} m)",
                i,
                distance,
                bound
            );
            max_distance = max_distance.max(distance);
        }

        // The bound is tight to within a factor of two, so halving the
        // segment count would exceed it
        assert!(max_distance > 0.5 * bound);
    }

    #[test]
    fn cache_is_reused_until_orbit_version_changes() {
        let (mut registry, star, planet) = registry_with_planet(1e10, 0.1);
        let mut sampler = OrbitSampler::new(SamplerConfig::default());

        let first_version = sampler.sample(&registry, planet).unwrap().source_version();
        sampler.sample(&registry, planet).unwrap();
        assert_eq!(sampler.rebuild_count(), 1);

        // An orbit with identical elements is still a new orbit
        let same_elements = registry.body(planet).unwrap().orbit().unwrap().elements();
        let replacement = OrbitModel::from_elements(star, &same_elements).unwrap();
        registry.replace_orbit(planet, replacement, 0.0).unwrap();

        let second_version = sampler.sample(&registry, planet).unwrap().source_version();
        assert_ne!(first_version, second_version);
        assert_eq!(sampler.rebuild_count(), 2);
    }

    #[test]
    fn bodies_without_usable_orbit_are_skipped() {
        let (mut registry, star, planet) = registry_with_planet(1e10, 0.1);
        let mut sampler = OrbitSampler::new(SamplerConfig::default());

        assert!(sampler.sample(&registry, star).is_none());
        assert_eq!(sampler.log_once().occurrence_count(MISSING_ORBIT), 1);

        assert!(sampler.sample(&registry, planet).is_some());
        registry.remove_body(star);
        assert!(sampler.sample(&registry, planet).is_none());
        assert!(sampler.sample(&registry, planet).is_none());
        assert_eq!(sampler.log_once().occurrence_count(MISSING_PARENT), 2);
        assert!(sampler.cached(planet).is_none());
    }

    #[test]
    fn caches_of_removed_bodies_are_evicted() {
        let (mut registry, _, planet) = registry_with_planet(1e10, 0.1);
        let mut sampler = OrbitSampler::new(SamplerConfig::default());
        sampler.sample(&registry, planet).unwrap();
        assert_eq!(sampler.cache_count(), 1);

        registry.remove_body(planet);
        sampler.evict_removed(&registry);
        assert_eq!(sampler.cache_count(), 0);
    }
}
