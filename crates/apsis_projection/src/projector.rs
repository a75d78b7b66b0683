//! Projection of double-precision world coordinates into render points.

use crate::{
    buffer::{RenderPoint, RenderPointBuffer},
    fre,
    view::CameraView,
};
use apsis_log::{LogOnce, warn_once};
use apsis_orbit::{
    fph,
    quantities::{Displacement, Position},
    trajectory::TrajectorySegment,
};

/// What kind of entity a projected point belongs to. Invalid projections
/// are reported once per source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProjectionSource {
    Body,
    Orbit,
    Trajectory,
    Particle,
}

/// Projects world positions into camera-relative single-precision points.
///
/// The camera center is subtracted from the world position in double
/// precision before the result is scaled and truncated to single precision.
/// This keeps points near the camera exact to well below a meter even when
/// both lie billions of meters from the world origin.
///
/// Points that do not project to finite coordinates are replaced with
/// [`RenderPoint::sentinel`], and a warning is logged the first time this
/// happens for each [`ProjectionSource`].
#[derive(Debug, Default)]
pub struct PrecisionProjector {
    log_once: LogOnce,
    sentinel_count: u64,
}

impl ProjectionSource {
    fn log_class(&self) -> &'static str {
        match self {
            Self::Body => "non-finite body projection",
            Self::Orbit => "non-finite orbit projection",
            Self::Trajectory => "non-finite trajectory projection",
            Self::Particle => "non-finite particle projection",
        }
    }
}

impl PrecisionProjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// The total number of points replaced with the sentinel.
    pub fn sentinel_count(&self) -> u64 {
        self.sentinel_count
    }

    /// The number of points from the given source replaced with the
    /// sentinel.
    pub fn sentinel_count_for(&self, source: ProjectionSource) -> u64 {
        self.log_once.occurrence_count(source.log_class())
    }

    /// Projects the given world position, returning [`None`] if the result
    /// is not finite.
    pub fn try_project(world_position: &Position, view: &CameraView) -> Option<RenderPoint> {
        finite_render_point(&view.view_offset(world_position))
    }

    /// Projects the position `parent_position + relative_position *
    /// local_scale` of an entity placed relative to its parent, returning
    /// [`None`] if the result is not finite.
    ///
    /// The camera-relative offset of the parent is computed first, so that
    /// the small relative position is never added to a large world
    /// coordinate.
    pub fn try_project_relative(
        parent_position: &Position,
        relative_position: &Displacement,
        local_scale: fph,
        view: &CameraView,
    ) -> Option<RenderPoint> {
        let parent_offset = parent_position - view.center;
        let offset = (parent_offset + relative_position * local_scale) * view.scale;
        finite_render_point(&offset)
    }

    /// Projects the given world position.
    pub fn project(
        &mut self,
        world_position: &Position,
        view: &CameraView,
        source: ProjectionSource,
    ) -> RenderPoint {
        let projected = Self::try_project(world_position, view);
        self.point_or_sentinel(projected, source)
    }

    /// Projects the position of an entity placed relative to its parent. See
    /// [`Self::try_project_relative`].
    pub fn project_relative(
        &mut self,
        parent_position: &Position,
        relative_position: &Displacement,
        local_scale: fph,
        view: &CameraView,
        source: ProjectionSource,
    ) -> RenderPoint {
        let projected =
            Self::try_project_relative(parent_position, relative_position, local_scale, view);
        self.point_or_sentinel(projected, source)
    }

    /// Overwrites the given buffer with the projections of the given flat
    /// buffer of interleaved parent-relative orbit coordinates.
    pub fn project_orbit_samples(
        &mut self,
        parent_position: &Position,
        relative_points: &[fph],
        local_scale: fph,
        view: &CameraView,
        output: &mut RenderPointBuffer,
    ) {
        output.clear();
        output.reserve(relative_points.len() / 2);
        for coords in relative_points.chunks_exact(2) {
            let relative_position = Displacement::new(coords[0], coords[1]);
            output.push(self.project_relative(
                parent_position,
                &relative_position,
                local_scale,
                view,
                ProjectionSource::Orbit,
            ));
        }
    }

    /// Overwrites the given buffer with the projections of the given world
    /// positions.
    pub fn project_points<'a>(
        &mut self,
        world_positions: impl IntoIterator<Item = &'a Position>,
        view: &CameraView,
        source: ProjectionSource,
        output: &mut RenderPointBuffer,
    ) {
        output.clear();
        for world_position in world_positions {
            output.push(self.project(world_position, view, source));
        }
    }

    /// Overwrites the given buffer with the projection of the given
    /// trajectory segment.
    pub fn project_segment(
        &mut self,
        segment: &TrajectorySegment,
        view: &CameraView,
        output: &mut RenderPointBuffer,
    ) {
        output.clear();
        output.reserve(segment.len());
        let parent_position = segment.parent_position();
        for relative_position in segment.relative_points() {
            output.push(self.project_relative(
                parent_position,
                relative_position,
                1.0,
                view,
                ProjectionSource::Trajectory,
            ));
        }
    }

    /// Overwrites the given buffer with the projections of the given
    /// particle positions.
    pub fn project_particles(
        &mut self,
        particle_positions: &[Position],
        view: &CameraView,
        output: &mut RenderPointBuffer,
    ) {
        output.clear();
        output.reserve(particle_positions.len());
        for position in particle_positions {
            output.push(self.project(position, view, ProjectionSource::Particle));
        }
    }

    fn point_or_sentinel(
        &mut self,
        projected: Option<RenderPoint>,
        source: ProjectionSource,
    ) -> RenderPoint {
        projected.unwrap_or_else(|| {
            self.sentinel_count += 1;
            warn_once!(
                self.log_once,
                source.log_class(),
                "Replacing {:?} point that does not project to finite coordinates with the \
                 sentinel (further occurrences are not reported)",
                source
            );
            RenderPoint::sentinel()
        })
    }
}

fn finite_render_point(offset: &Displacement) -> Option<RenderPoint> {
    let point = RenderPoint::new(offset.x as fre, offset.y as fre);
    point.is_finite().then_some(point)
}
