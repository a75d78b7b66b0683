//! Relevance of gravitational spheres of influence to a predicted trajectory.
//!
//! A sphere of influence (SOI) is relevant to a trajectory when the
//! trajectory comes within a configurable multiple of the SOI radius of the
//! body. Relevant spheres are drawn with an opacity that fades with the
//! closest approach, so that spheres the trajectory enters stand out from
//! those it merely passes near.

use crate::{body::BodyHandle, fph, quantities::Position};
use nalgebra::distance;
use std::borrow::Borrow;

/// Configuration parameters for sphere of influence relevance and opacity.
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
#[derive(Clone, Debug, PartialEq)]
pub struct SoiConfig {
    /// A sphere is relevant if the trajectory comes closer to the body than
    /// this multiple of the SOI radius.
    pub threshold_multiple: fph,
    /// Opacity when the trajectory enters the sphere.
    pub inside_opacity: fph,
    /// Opacity when the closest approach is exactly at the SOI radius.
    pub boundary_opacity: fph,
    /// Opacity when the closest approach is at twice the SOI radius or
    /// farther.
    pub floor_opacity: fph,
}

/// Relation of a single point to the sphere of influence of a body.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SoiInfo {
    pub body: BodyHandle,
    pub soi_radius: fph,
    pub is_inside: bool,
}

/// Relevance and opacity of a sphere of influence for a trajectory.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SoiRelevance {
    pub is_relevant: bool,
    pub opacity: fph,
    /// The closest distance from the body to any finite trajectory point, or
    /// [`None`] if there were no such points.
    pub closest_distance: Option<fph>,
}

impl Default for SoiConfig {
    fn default() -> Self {
        Self {
            threshold_multiple: 2.0,
            inside_opacity: 0.8,
            boundary_opacity: 0.5,
            floor_opacity: 0.1,
        }
    }
}

impl SoiConfig {
    /// Computes the opacity of a sphere with the given radius when the
    /// closest approach of the trajectory is at the given distance.
    ///
    /// Inside the sphere the opacity is [`Self::inside_opacity`]. Outside, it
    /// falls linearly from [`Self::boundary_opacity`] at the boundary to
    /// [`Self::floor_opacity`] at twice the radius, and stays there. Spheres
    /// with a radius that is not finite and positive get zero opacity.
    pub fn opacity_at_distance(&self, closest_distance: fph, soi_radius: fph) -> fph {
        if !is_valid_radius(soi_radius) || closest_distance.is_nan() {
            return 0.0;
        }
        if closest_distance < soi_radius {
            return self.inside_opacity;
        }
        let fade = ((closest_distance - soi_radius) / soi_radius).min(1.0);
        self.boundary_opacity + (self.floor_opacity - self.boundary_opacity) * fade
    }
}

impl SoiInfo {
    /// Determines whether the given point lies inside the sphere of influence
    /// of the given body.
    pub fn for_point(
        body: BodyHandle,
        body_position: &Position,
        soi_radius: fph,
        point: &Position,
    ) -> Self {
        Self {
            body,
            soi_radius,
            is_inside: is_valid_radius(soi_radius) && distance(body_position, point) < soi_radius,
        }
    }
}

/// Finds the smallest distance from the body to any of the given points.
/// Points with non-finite coordinates are ignored.
pub fn closest_distance(
    body_position: &Position,
    points: impl IntoIterator<Item = impl Borrow<Position>>,
) -> Option<fph> {
    points
        .into_iter()
        .map(|point| distance(body_position, point.borrow()))
        .filter(|distance| distance.is_finite())
        .reduce(fph::min)
}

/// Whether any of the given points lies closer to the body than
/// `threshold_multiple` times the SOI radius. An empty trajectory is never
/// relevant, and neither is a sphere whose radius is not finite and
/// positive.
pub fn is_relevant(
    body_position: &Position,
    soi_radius: fph,
    points: impl IntoIterator<Item = impl Borrow<Position>>,
    threshold_multiple: fph,
) -> bool {
    is_valid_radius(soi_radius)
        && closest_distance(body_position, points)
            .is_some_and(|distance| distance < soi_radius * threshold_multiple)
}

/// Computes the opacity of the sphere of influence for the given points,
/// which is zero for an empty trajectory.
///
/// See [`SoiConfig::opacity_at_distance`].
pub fn opacity(
    body_position: &Position,
    soi_radius: fph,
    points: impl IntoIterator<Item = impl Borrow<Position>>,
    config: &SoiConfig,
) -> fph {
    closest_distance(body_position, points)
        .map_or(0.0, |distance| config.opacity_at_distance(distance, soi_radius))
}

/// Computes both relevance and opacity with a single pass over the points.
pub fn evaluate(
    body_position: &Position,
    soi_radius: fph,
    points: impl IntoIterator<Item = impl Borrow<Position>>,
    config: &SoiConfig,
) -> SoiRelevance {
    let closest_distance = closest_distance(body_position, points);

    let (is_relevant, opacity) = match closest_distance {
        Some(distance) if is_valid_radius(soi_radius) => (
            distance < soi_radius * config.threshold_multiple,
            config.opacity_at_distance(distance, soi_radius),
        ),
        _ => (false, 0.0),
    };

    SoiRelevance {
        is_relevant,
        opacity,
        closest_distance,
    }
}

fn is_valid_radius(soi_radius: fph) -> bool {
    soi_radius > 0.0 && soi_radius.is_finite()
}
