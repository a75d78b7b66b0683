//! Advancing bodies along their orbits.

use crate::scenario::Scenario;
use apsis_log::{LogOnce, warn_once};
use apsis_orbit::{
    OrbitError,
    body::{BodyHandle, BodyRegistry},
    fph,
    kepler::KeplerSolver,
    maneuver::{ManeuverNode, ManeuverPredictor, RocketState},
    trajectory::TrajectoryLeg,
};
use serde::{Deserialize, Serialize};

/// Configuration parameters for advancing simulated time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Simulated time [s] that passes per frame.
    pub time_step: fph,
    /// Number of frames to run when no count is given explicitly.
    pub frame_count: u64,
}

/// Places every orbiting body at its position along its orbit at the
/// current simulation time.
///
/// Bodies are updated parents first, so each body is positioned relative to
/// the already updated position of its parent. Bodies whose orbit is
/// unusable keep their previous position.
#[derive(Debug)]
pub struct OrbitPropagator {
    kepler: KeplerSolver,
    elapsed_time: fph,
    update_order: Vec<BodyHandle>,
    log_once: LogOnce,
}

const ORBIT_CYCLE: &str = "orbit cycle";
const UNUSABLE_ORBIT: &str = "unusable orbit";

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            time_step: 60.0,
            frame_count: 600,
        }
    }
}

impl OrbitPropagator {
    pub fn new(kepler: KeplerSolver) -> Self {
        Self {
            kepler,
            elapsed_time: 0.0,
            update_order: Vec::new(),
            log_once: LogOnce::new(),
        }
    }

    /// Simulated time [s] since the epoch.
    pub fn elapsed_time(&self) -> fph {
        self.elapsed_time
    }

    /// Advances the simulation time by the given number of seconds and
    /// repositions all orbiting bodies.
    pub fn advance(&mut self, registry: &mut BodyRegistry, time_step: fph) {
        self.elapsed_time += time_step;
        self.update_positions(registry);
    }

    /// Repositions all orbiting bodies for the current simulation time.
    pub fn update_positions(&mut self, registry: &mut BodyRegistry) {
        self.determine_update_order(registry);

        for &handle in &self.update_order {
            let Some(body) = registry.body(handle) else {
                continue;
            };
            let Some(orbit) = body.orbit() else {
                continue;
            };
            let Some(parent) = registry.body(orbit.parent()) else {
                warn_once!(
                    self.log_once,
                    UNUSABLE_ORBIT,
                    "Not moving body `{}` whose parent does not exist",
                    body.name()
                );
                continue;
            };
            if orbit.validate().is_err() {
                warn_once!(
                    self.log_once,
                    UNUSABLE_ORBIT,
                    "Not moving body `{}` with degenerate orbit",
                    body.name()
                );
                continue;
            }

            let position = parent.position()
                + orbit.position_at_time(
                    &self.kepler,
                    parent.gravitational_parameter(),
                    self.elapsed_time,
                    body.mean_anomaly_at_epoch(),
                );

            if let Err(error) = registry.set_position(handle, position) {
                warn_once!(
                    self.log_once,
                    UNUSABLE_ORBIT,
                    "Could not move orbiting body: {}",
                    error
                );
            }
        }
    }

    /// Advances the scenario by the given number of seconds.
    ///
    /// Maneuver nodes of the flight plan falling within the step are
    /// executed on the craft's orbit at their scheduled time and removed
    /// from the plan, and the remaining nodes are rebased to the new present.
    /// After the bodies have been repositioned, the craft state is set to the
    /// state along its orbit at the new time. Nodes whose burn can not be
    /// executed are dropped with a warning.
    ///
    /// Returns the executed nodes.
    ///
    /// # Errors
    /// Returns an error if the craft body, its orbit or its parent does not
    /// exist.
    pub fn advance_scenario(
        &mut self,
        scenario: &mut Scenario,
        predictor: &ManeuverPredictor,
        time_step: fph,
    ) -> Result<Vec<ManeuverNode>, OrbitError> {
        let due = scenario.plan.advance(time_step);

        let Some(craft) = scenario.rocket.map(|rocket| rocket.body) else {
            self.advance(&mut scenario.registry, time_step);
            return Ok(Vec::new());
        };

        let mut executed = Vec::with_capacity(due.len());
        for node in due {
            let leg = self.current_craft_leg(&scenario.registry, craft)?;
            match predictor.apply_node(&leg, &node) {
                Ok(burned) => {
                    let burn_time = self.elapsed_time + node.time_offset;
                    let mean_anomaly_at_epoch = burned.mean_anomaly_at_start()
                        - burned.orbit().mean_motion(burned.parent_mu()) * burn_time;
                    scenario.registry.replace_orbit(
                        craft,
                        burned.orbit().clone(),
                        mean_anomaly_at_epoch,
                    )?;
                    apsis_log::info!(
                        "Executed maneuver node `{}` at {:.0} s",
                        node.id,
                        burn_time
                    );
                    executed.push(node);
                }
                Err(error) => {
                    apsis_log::warn!("Dropping maneuver node `{}`: {}", node.id, error);
                }
            }
        }

        self.advance(&mut scenario.registry, time_step);

        let leg = self.current_craft_leg(&scenario.registry, craft)?;
        if let Some(rocket) = &mut scenario.rocket {
            rocket.state = RocketState {
                parent: leg.orbit().parent(),
                state: leg.state_at_time(&self.kepler, 0.0),
            };
        }

        Ok(executed)
    }

    /// The leg the given craft follows from the current time.
    fn current_craft_leg(
        &self,
        registry: &BodyRegistry,
        craft: BodyHandle,
    ) -> Result<TrajectoryLeg, OrbitError> {
        let body = registry.require_body(craft)?;
        let orbit = registry.require_orbit(craft)?;
        let parent = orbit.parent();
        let parent_mu = registry
            .gravitational_parameter(parent)
            .ok_or(OrbitError::MissingParent { parent })?;
        let mean_anomaly = orbit.mean_anomaly_at_time(
            parent_mu,
            self.elapsed_time,
            body.mean_anomaly_at_epoch(),
        );
        Ok(TrajectoryLeg::new(
            orbit.clone(),
            parent_mu,
            mean_anomaly,
            0.0,
        ))
    }

    /// Orders the bodies so that every body comes after its parent. Bodies
    /// whose chain of parents never reaches a root are left out.
    fn determine_update_order(&mut self, registry: &BodyRegistry) {
        self.update_order.clear();

        let mut remaining: Vec<BodyHandle> = registry.iter().map(|(handle, _)| handle).collect();

        let placed = |handle: BodyHandle, order: &[BodyHandle]| {
            registry
                .body(handle)
                .and_then(|body| body.parent())
                .is_none_or(|parent| !registry.contains(parent) || order.contains(&parent))
        };

        while !remaining.is_empty() {
            let count_before = remaining.len();
            let mut idx = 0;
            while idx < remaining.len() {
                if placed(remaining[idx], &self.update_order) {
                    self.update_order.push(remaining.swap_remove(idx));
                } else {
                    idx += 1;
                }
            }
            if remaining.len() == count_before {
                warn_once!(
                    self.log_once,
                    ORBIT_CYCLE,
                    "{} bodies orbit each other in a cycle and will not be moved",
                    remaining.len()
                );
                break;
            }
        }
    }
}
