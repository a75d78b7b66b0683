//! Per-frame orchestration of orbit sampling, maneuver prediction, sphere of
//! influence evaluation and projection.

use crate::scenario::Rocket;
use apsis_log::{LogOnce, warn_once, with_trace_logging};
use apsis_orbit::{
    OrbitError,
    body::{BodyHandle, BodyKind, BodyRegistry},
    fph,
    kepler::KeplerSolver,
    maneuver::{
        FlightPlan, ManeuverConfig, ManeuverPredictor, ManeuverRejection, PlanChange,
        PredictedTrajectory,
    },
    quantities::Position,
    sampler::{OrbitSampler, SamplerConfig},
    soi::{self, SoiConfig, SoiRelevance},
};
use apsis_projection::{
    CameraView, DoubleBufferedRenderPoints, PrecisionProjector, ProjectionSource, RenderPoint,
    RenderPointBuffer,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration parameters for the trajectory pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub kepler: KeplerSolver,
    pub sampler: SamplerConfig,
    pub soi: SoiConfig,
    pub maneuver: ManeuverConfig,
    /// Factor by which the offset of moons from their parent is exaggerated
    /// when drawn, so that they remain distinguishable from their parent
    /// when zoomed out.
    pub moon_offset_scale: fph,
}

/// Turns the current state of the bodies and the flight plan into render
/// buffers every frame.
///
/// Orbit tessellations are cached by the sampler and only rebuilt when an
/// orbit changes. The maneuver prediction is only recomputed when the flight
/// plan or craft state changes, and is otherwise just moved along with the
/// parent of the craft. All render buffers are reused between frames.
#[derive(Debug)]
pub struct TrajectoryPipeline {
    soi_config: SoiConfig,
    moon_offset_scale: fph,
    sampler: OrbitSampler,
    projector: PrecisionProjector,
    predictor: ManeuverPredictor,
    orbit_buffers: HashMap<BodyHandle, DoubleBufferedRenderPoints>,
    segment_buffers: Vec<DoubleBufferedRenderPoints>,
    n_active_segments: usize,
    particle_buffer: RenderPointBuffer,
    prediction: Option<PredictedTrajectory>,
    pending_change: Option<PlanChange>,
    output: FrameOutput,
    frame_count: u64,
    log_once: LogOnce,
}

/// The results of a single frame of the pipeline that are not render
/// buffers.
#[derive(Clone, Debug, Default)]
pub struct FrameOutput {
    /// The projected position of every body.
    pub bodies: Vec<ProjectedBody>,
    /// Relevance and opacity of the sphere of influence of every body with
    /// a parent, evaluated against the predicted trajectory.
    pub soi_overlays: Vec<SoiOverlay>,
    /// The maneuver node that could not be applied, if any.
    pub rejection: Option<ManeuverRejection>,
    /// Why no trajectory could be predicted for the craft, if it could not.
    pub prediction_error: Option<OrbitError>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjectedBody {
    pub body: BodyHandle,
    pub position: RenderPoint,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SoiOverlay {
    pub body: BodyHandle,
    pub soi_radius: fph,
    pub relevance: SoiRelevance,
}

const MISSING_CRAFT_PARENT: &str = "missing craft parent";
const UNPREDICTABLE_CRAFT: &str = "unpredictable craft";

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            kepler: KeplerSolver::default(),
            sampler: SamplerConfig::default(),
            soi: SoiConfig::default(),
            maneuver: ManeuverConfig::default(),
            moon_offset_scale: 1.0,
        }
    }
}

impl TrajectoryPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            soi_config: config.soi,
            moon_offset_scale: config.moon_offset_scale,
            sampler: OrbitSampler::new(config.sampler.clone()),
            projector: PrecisionProjector::new(),
            predictor: ManeuverPredictor::new(config.kepler, config.sampler, config.maneuver),
            orbit_buffers: HashMap::new(),
            segment_buffers: Vec::new(),
            n_active_segments: 0,
            particle_buffer: RenderPointBuffer::new(),
            prediction: None,
            pending_change: None,
            output: FrameOutput::default(),
            frame_count: 0,
            log_once: LogOnce::new(),
        }
    }

    /// The number of frames run so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn sampler(&self) -> &OrbitSampler {
        &self.sampler
    }

    pub fn projector(&self) -> &PrecisionProjector {
        &self.projector
    }

    pub fn predictor(&self) -> &ManeuverPredictor {
        &self.predictor
    }

    /// The current maneuver prediction, if there is a craft with a bound
    /// orbit.
    pub fn prediction(&self) -> Option<&PredictedTrajectory> {
        self.prediction.as_ref()
    }

    /// The output of the most recent frame.
    pub fn output(&self) -> &FrameOutput {
        &self.output
    }

    /// The projected orbit of the given body from the most recent frame.
    pub fn orbit_points(&self, body: BodyHandle) -> Option<&RenderPointBuffer> {
        self.orbit_buffers.get(&body).map(|buffers| buffers.front())
    }

    /// The projected segments of the predicted trajectory from the most
    /// recent frame, in order of time.
    pub fn segment_points(&self) -> impl Iterator<Item = &RenderPointBuffer> {
        self.segment_buffers[..self.n_active_segments]
            .iter()
            .map(|buffers| buffers.front())
    }

    /// Informs the pipeline that the flight plan was changed, so that the
    /// next frame can reuse the part of the prediction preceding the change.
    /// Multiple changes between frames are merged.
    pub fn notify_plan_change(&mut self, change: PlanChange) {
        self.pending_change = Some(match self.pending_change {
            Some(pending) if pending.first_affected_node <= change.first_affected_node => pending,
            _ => change,
        });
    }

    /// Runs the pipeline for the current state of the given bodies, viewed
    /// through the given camera view. If a craft is given, the trajectory
    /// resulting from the given flight plan is predicted and drawn in place
    /// of the craft's orbit.
    pub fn run_frame(
        &mut self,
        registry: &BodyRegistry,
        view: &CameraView,
        craft: Option<(&Rocket, &FlightPlan)>,
    ) -> &FrameOutput {
        with_trace_logging!("Predicting craft trajectory"; self.update_prediction(registry, craft));

        let predicted_craft = craft
            .filter(|_| self.prediction.is_some())
            .map(|(rocket, _)| rocket.body);

        with_trace_logging!("Projecting bodies and orbits"; {
            self.project_bodies_and_orbits(registry, view, predicted_craft);
        });

        with_trace_logging!("Projecting trajectory segments"; self.project_segments(view));

        with_trace_logging!("Evaluating spheres of influence"; self.evaluate_soi_overlays(registry));

        self.output.rejection = self
            .prediction
            .as_ref()
            .and_then(|prediction| prediction.rejection().cloned());

        self.frame_count += 1;
        &self.output
    }

    /// Projects the given particle positions into the particle buffer and
    /// returns the buffer.
    pub fn project_particles(
        &mut self,
        particle_positions: &[Position],
        view: &CameraView,
    ) -> &RenderPointBuffer {
        self.projector
            .project_particles(particle_positions, view, &mut self.particle_buffer);
        &self.particle_buffer
    }

    fn update_prediction(&mut self, registry: &BodyRegistry, craft: Option<(&Rocket, &FlightPlan)>) {
        self.output.prediction_error = None;

        let Some((rocket, plan)) = craft else {
            self.prediction = None;
            return;
        };

        let parent = rocket.state.parent;
        let (Some(parent_mu), Some(parent_body)) =
            (registry.gravitational_parameter(parent), registry.body(parent))
        else {
            warn_once!(
                self.log_once,
                MISSING_CRAFT_PARENT,
                "Not predicting trajectory for craft whose parent does not exist"
            );
            self.prediction = None;
            self.output.prediction_error = Some(OrbitError::MissingParent { parent });
            return;
        };
        let parent_position = *parent_body.position();

        let pending_change = self.pending_change.take();

        let prediction = match self.prediction.take() {
            Some(mut previous)
                if previous.plan_revision() == plan.revision()
                    && previous.rocket() == &rocket.state =>
            {
                previous.reanchor(&parent_position);
                Ok(previous)
            }
            Some(previous) => self.predictor.repredict(
                &previous,
                &rocket.state,
                parent_mu,
                &parent_position,
                plan,
                pending_change.unwrap_or_else(PlanChange::everything),
            ),
            None => self
                .predictor
                .predict(&rocket.state, parent_mu, &parent_position, plan),
        };

        match prediction {
            Ok(prediction) => {
                self.prediction = Some(prediction);
            }
            Err(error) => {
                warn_once!(
                    self.log_once,
                    UNPREDICTABLE_CRAFT,
                    "Could not predict trajectory of craft: {}",
                    error
                );
                self.output.prediction_error = Some(error);
            }
        }
    }

    fn project_bodies_and_orbits(
        &mut self,
        registry: &BodyRegistry,
        view: &CameraView,
        predicted_craft: Option<BodyHandle>,
    ) {
        self.sampler.evict_removed(registry);
        self.orbit_buffers.retain(|body, _| registry.contains(*body));

        self.output.bodies.clear();

        for (handle, body) in registry.iter() {
            let parent_position = body
                .parent()
                .and_then(|parent| registry.body(parent))
                .map(|parent| *parent.position());

            let local_scale = body.kind().local_scale_factor(self.moon_offset_scale);

            let position = match parent_position {
                Some(parent_position) => self.projector.project_relative(
                    &parent_position,
                    &(body.position() - parent_position),
                    local_scale,
                    view,
                    ProjectionSource::Body,
                ),
                None => self
                    .projector
                    .project(body.position(), view, ProjectionSource::Body),
            };
            self.output.bodies.push(ProjectedBody {
                body: handle,
                position,
            });

            if body.orbit().is_none() {
                continue;
            }

            let buffers = self.orbit_buffers.entry(handle).or_default();
            let back = buffers.back_mut();
            back.clear();

            // The predicted trajectory replaces the orbit of the craft
            if predicted_craft != Some(handle) {
                if let (Some(parent_position), Some(cache)) =
                    (parent_position, self.sampler.sample(registry, handle))
                {
                    self.projector.project_orbit_samples(
                        &parent_position,
                        cache.points(),
                        local_scale,
                        view,
                        back,
                    );
                }
            }

            buffers.swap();
        }
    }

    fn project_segments(&mut self, view: &CameraView) {
        let Some(prediction) = &self.prediction else {
            self.n_active_segments = 0;
            return;
        };

        let segments = prediction.segments();
        if self.segment_buffers.len() < segments.len() {
            self.segment_buffers
                .resize_with(segments.len(), DoubleBufferedRenderPoints::default);
        }

        for (segment, buffers) in segments.iter().zip(&mut self.segment_buffers) {
            self.projector
                .project_segment(segment, view, buffers.back_mut());
            buffers.swap();
        }
        self.n_active_segments = segments.len();
    }

    fn evaluate_soi_overlays(&mut self, registry: &BodyRegistry) {
        self.output.soi_overlays.clear();

        for (handle, body) in registry.iter() {
            if body.kind() == BodyKind::Craft {
                continue;
            }
            let Some(soi_radius) = registry.soi_radius(handle) else {
                continue;
            };

            let points = self
                .prediction
                .iter()
                .flat_map(|prediction| prediction.points());

            let relevance = soi::evaluate(body.position(), soi_radius, points, &self.soi_config);

            self.output.soi_overlays.push(SoiOverlay {
                body: handle,
                soi_radius,
                relevance,
            });
        }
    }
}

impl FrameOutput {
    /// The spheres of influence that should be drawn.
    pub fn relevant_soi_overlays(&self) -> impl Iterator<Item = &SoiOverlay> {
        self.soi_overlays
            .iter()
            .filter(|overlay| overlay.relevance.is_relevant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        scenario::{Scenario, ScenarioConfig},
        simulation::OrbitPropagator,
    };
    use apsis_orbit::maneuver::ManeuverNode;
    use nalgebra::vector;

    fn default_scenario() -> Scenario {
        let mut scenario = ScenarioConfig::default().build().unwrap();
        OrbitPropagator::new(KeplerSolver::default()).update_positions(&mut scenario.registry);
        scenario.update_view();
        scenario
    }

    #[test]
    fn every_orbiting_body_gets_an_orbit_buffer() {
        let scenario = default_scenario();
        let mut pipeline = TrajectoryPipeline::new(PipelineConfig::default());
        pipeline.run_frame(&scenario.registry, &scenario.view, None);

        assert_eq!(pipeline.output().bodies.len(), scenario.registry.len());

        let earth = scenario.registry.find_by_name("Earth").unwrap();
        let sun = scenario.registry.find_by_name("Sun").unwrap();
        let earth_orbit = pipeline.orbit_points(earth).unwrap();
        assert!(earth_orbit.len() > 1000);
        assert!(earth_orbit.points().iter().all(RenderPoint::is_finite));
        assert!(pipeline.orbit_points(sun).is_none());
        assert_eq!(pipeline.projector().sentinel_count(), 0);
    }

    #[test]
    fn orbits_are_only_sampled_once_while_unchanged() {
        let scenario = default_scenario();
        let mut pipeline = TrajectoryPipeline::new(PipelineConfig::default());
        for _ in 0..5 {
            pipeline.run_frame(&scenario.registry, &scenario.view, None);
        }
        // Earth, Moon and the craft
        assert_eq!(pipeline.sampler().rebuild_count(), 3);
        assert_eq!(pipeline.frame_count(), 5);
    }

    #[test]
    fn predicted_trajectory_replaces_craft_orbit() {
        let scenario = default_scenario();
        let rocket = scenario.rocket.unwrap();
        let mut pipeline = TrajectoryPipeline::new(PipelineConfig::default());
        pipeline.run_frame(&scenario.registry, &scenario.view, Some((&rocket, &scenario.plan)));

        let prediction = pipeline.prediction().unwrap();
        assert_eq!(prediction.segments().len(), 2);
        assert!(prediction.rejection().is_none());

        assert!(pipeline.orbit_points(rocket.body).unwrap().is_empty());

        let segment_lengths: Vec<_> = pipeline.segment_points().map(|buffer| buffer.len()).collect();
        let expected: Vec<_> = prediction.segments().iter().map(|segment| segment.len()).collect();
        assert_eq!(segment_lengths, expected);
    }

    #[test]
    fn craft_parent_sphere_of_influence_is_relevant() {
        let scenario = default_scenario();
        let rocket = scenario.rocket.unwrap();
        let earth = scenario.registry.find_by_name("Earth").unwrap();
        let sun = scenario.registry.find_by_name("Sun").unwrap();

        let mut pipeline = TrajectoryPipeline::new(PipelineConfig::default());
        let output =
            pipeline.run_frame(&scenario.registry, &scenario.view, Some((&rocket, &scenario.plan)));

        let earth_overlay = output
            .soi_overlays
            .iter()
            .find(|overlay| overlay.body == earth)
            .unwrap();
        assert!(earth_overlay.relevance.is_relevant);
        assert_eq!(earth_overlay.relevance.opacity, SoiConfig::default().inside_opacity);

        // The Sun has no parent and thus no sphere of influence
        assert!(output.soi_overlays.iter().all(|overlay| overlay.body != sun));
        assert!(
            output
                .soi_overlays
                .iter()
                .all(|overlay| overlay.body != rocket.body)
        );
    }

    #[test]
    fn unchanged_plan_reuses_prediction() {
        let scenario = default_scenario();
        let rocket = scenario.rocket.unwrap();
        let mut pipeline = TrajectoryPipeline::new(PipelineConfig::default());

        pipeline.run_frame(&scenario.registry, &scenario.view, Some((&rocket, &scenario.plan)));
        let first = pipeline.prediction().unwrap().clone();
        pipeline.run_frame(&scenario.registry, &scenario.view, Some((&rocket, &scenario.plan)));

        assert_eq!(pipeline.prediction().unwrap(), &first);
    }

    #[test]
    fn edited_plan_keeps_segments_before_the_change() {
        let mut scenario = default_scenario();
        let rocket = scenario.rocket.unwrap();
        scenario
            .plan
            .add_node(ManeuverNode::new("correction", 2e4, vector![10.0, 0.0]))
            .unwrap();

        let mut pipeline = TrajectoryPipeline::new(PipelineConfig::default());
        pipeline.run_frame(&scenario.registry, &scenario.view, Some((&rocket, &scenario.plan)));
        let before = pipeline.prediction().unwrap().clone();
        assert_eq!(before.segments().len(), 3);

        let change = scenario
            .plan
            .edit_node("correction", 2e4, vector![-20.0, 0.0])
            .unwrap();
        pipeline.notify_plan_change(change);
        pipeline.run_frame(&scenario.registry, &scenario.view, Some((&rocket, &scenario.plan)));
        let after = pipeline.prediction().unwrap();

        assert_eq!(after.plan_revision(), scenario.plan.revision());
        assert_eq!(after.segments()[..2], before.segments()[..2]);
        assert_ne!(after.segments()[2], before.segments()[2]);
    }

    #[test]
    fn escaping_node_is_reported_as_rejection() {
        let mut scenario = default_scenario();
        let rocket = scenario.rocket.unwrap();
        scenario
            .plan
            .add_node(ManeuverNode::new("escape", 3e4, vector![2e4, 0.0]))
            .unwrap();

        let mut pipeline = TrajectoryPipeline::new(PipelineConfig::default());
        let output =
            pipeline.run_frame(&scenario.registry, &scenario.view, Some((&rocket, &scenario.plan)));

        let rejection = output.rejection.as_ref().unwrap();
        assert_eq!(rejection.node_id, "escape");
        assert!(matches!(
            rejection.error,
            OrbitError::UnboundTrajectory { .. }
        ));
        assert_eq!(pipeline.prediction().unwrap().segments().len(), 2);
    }

    #[test]
    fn particles_are_projected_relative_to_camera() {
        let mut pipeline = TrajectoryPipeline::new(PipelineConfig::default());
        let view = CameraView::new(Position::new(1e11, 0.0), 1e-3);
        let buffer = pipeline.project_particles(
            &[Position::new(1e11 + 1e3, 0.0), Position::new(1e11, -2e3)],
            &view,
        );
        assert_eq!(
            buffer.points(),
            &[RenderPoint::new(1.0, 0.0), RenderPoint::new(0.0, -2.0)]
        );
    }
}
