//! Running a scenario.

use crate::{
    pipeline::TrajectoryPipeline,
    scenario::ScenarioConfig,
    simulation::OrbitPropagator,
};
use anyhow::Result;
use apsis_log::with_timing_info_logging;
use apsis_orbit::fph;

/// What happened during a scenario run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub frame_count: u64,
    /// Simulated time [s] at the end of the run.
    pub elapsed_time: fph,
    /// Number of times an orbit was tessellated.
    pub orbit_rebuild_count: u64,
    /// Number of projected points replaced with the sentinel.
    pub sentinel_count: u64,
    /// Number of maneuver nodes executed on the craft's orbit.
    pub executed_node_count: usize,
    /// Number of predicted trajectory segments in the final frame.
    pub segment_count: usize,
    /// Number of bodies whose sphere of influence was relevant in the final
    /// frame.
    pub relevant_soi_count: usize,
    /// The ID of the maneuver node that could not be applied, if any.
    pub rejected_node: Option<String>,
}

/// Instantiates the given scenario and runs it for the given number of
/// frames, or for the number in the scenario's simulation configuration if
/// not given. Every frame runs the trajectory pipeline for a camera
/// following the configured target, then advances simulated time, executing
/// the maneuver nodes that come due and repositioning the orbiting bodies
/// and the craft.
///
/// # Errors
/// Returns an error if the scenario is invalid, or if the craft loses its
/// orbit during the run.
pub fn run(config: ScenarioConfig, frames: Option<u64>) -> Result<RunSummary> {
    let mut scenario = config.build()?;
    let frame_count = frames.unwrap_or(config.simulation.frame_count);

    apsis_log::info!(
        "Running scenario with {} bodies and {} maneuver nodes for {} frames",
        scenario.registry.len(),
        scenario.plan.len(),
        frame_count
    );

    let mut propagator = OrbitPropagator::new(config.pipeline.kepler);
    let mut pipeline = TrajectoryPipeline::new(config.pipeline);

    propagator.update_positions(&mut scenario.registry);

    let mut executed_node_count = 0;

    with_timing_info_logging!("Running {} frames", frame_count; {
        for _ in 0..frame_count {
            scenario.update_view();

            let craft = scenario.rocket.as_ref().map(|rocket| (rocket, &scenario.plan));
            pipeline.run_frame(&scenario.registry, &scenario.view, craft);

            let executed = propagator.advance_scenario(
                &mut scenario,
                pipeline.predictor(),
                config.simulation.time_step,
            )?;
            executed_node_count += executed.len();
        }
    });

    let output = pipeline.output();

    let summary = RunSummary {
        frame_count: pipeline.frame_count(),
        elapsed_time: propagator.elapsed_time(),
        orbit_rebuild_count: pipeline.sampler().rebuild_count(),
        sentinel_count: pipeline.projector().sentinel_count(),
        executed_node_count,
        segment_count: pipeline.segment_points().count(),
        relevant_soi_count: output.relevant_soi_overlays().count(),
        rejected_node: output
            .rejection
            .as_ref()
            .map(|rejection| rejection.node_id.clone()),
    };

    if let Some(node_id) = &summary.rejected_node {
        apsis_log::warn!("Maneuver node `{}` could not be applied", node_id);
    }
    if let Some(error) = &output.prediction_error {
        apsis_log::warn!("No trajectory could be predicted for the craft: {}", error);
    }

    apsis_log::info!(
        "Finished after {} frames ({:.0} s simulated): {} orbit tessellations, {} trajectory \
         segments, {} relevant spheres of influence, {} sentinel points",
        summary.frame_count,
        summary.elapsed_time,
        summary.orbit_rebuild_count,
        summary.segment_count,
        summary.relevant_soi_count,
        summary.sentinel_count
    );

    Ok(summary)
}
