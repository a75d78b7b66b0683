//! Maneuver nodes and prediction of the trajectory they produce.
//!
//! A craft follows its current orbit until the first maneuver node, where
//! the node's delta-v is applied to the predicted velocity and a new orbit
//! is reconstructed from the resulting state. Each subsequent node is
//! applied to the orbit produced by the node before it.

use crate::{
    OrbitError,
    body::BodyHandle,
    fph,
    kepler::KeplerSolver,
    orbit::OrbitModel,
    quantities::{Position, Velocity},
    sampler::SamplerConfig,
    state::OrbitalState,
    trajectory::{TrajectoryLeg, TrajectorySegment},
};

/// A planned impulsive change in velocity.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ManeuverNode {
    /// Stable identifier of the node within its flight plan.
    pub id: String,
    /// Time [s] from now at which the delta-v is applied.
    pub time_offset: fph,
    /// The change in velocity [m/s], interpreted according to the
    /// configured [`DeltaVFrame`].
    pub delta_v: Velocity,
}

/// Reference frame in which the delta-v of a maneuver node is specified.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DeltaVFrame {
    /// The x-component is along the velocity at the node (prograde) and the
    /// y-component is along the velocity rotated a quarter turn
    /// counter-clockwise (normal).
    #[default]
    Prograde,
    /// The components are along the world axes.
    World,
}

/// Configuration parameters for maneuver prediction.
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
#[derive(Clone, Debug, PartialEq)]
pub struct ManeuverConfig {
    /// The frame in which node delta-v values are given.
    pub delta_v_frame: DeltaVFrame,
    /// The smallest number of segments used for the arc of any trajectory
    /// segment, however short.
    pub min_arc_segments: u32,
}

/// The ordered list of maneuver nodes for a craft.
///
/// Nodes are kept sorted by time offset, with nodes at equal time offsets
/// in the order they were added. Every modification bumps the revision of
/// the plan and reports the first node index whose outcome may have changed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlightPlan {
    nodes: Vec<ManeuverNode>,
    revision: u64,
}

/// Description of a modification to a [`FlightPlan`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlanChange {
    /// Index of the first node in the modified plan whose outcome may differ
    /// from before. Legs up to and including this index, and segments before
    /// it, are unaffected.
    pub first_affected_node: usize,
}

/// The current state of a craft relative to the body it orbits.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RocketState {
    pub parent: BodyHandle,
    pub state: OrbitalState,
}

/// A maneuver node that could not be applied.
#[derive(Clone, Debug, PartialEq)]
pub struct ManeuverRejection {
    pub node_id: String,
    pub error: OrbitError,
}

/// The legs and sampled segments predicted for a craft and its flight plan.
///
/// Leg `0` is the current orbit and leg `i + 1` is the orbit after node `i`.
/// Segment `i` covers leg `i` up to node `i`, or one full period for the last
/// leg. If a node is rejected, prediction stops at the leg before it.
#[derive(Clone, Debug, PartialEq)]
pub struct PredictedTrajectory {
    rocket: RocketState,
    parent_mu: fph,
    legs: Vec<TrajectoryLeg>,
    segments: Vec<TrajectorySegment>,
    rejection: Option<ManeuverRejection>,
    plan_revision: u64,
}

/// Applies maneuver nodes to craft orbits and samples the resulting
/// trajectory segments.
#[derive(Clone, Debug, Default)]
pub struct ManeuverPredictor {
    kepler: KeplerSolver,
    sampler_config: SamplerConfig,
    config: ManeuverConfig,
}

impl ManeuverNode {
    pub fn new(id: impl Into<String>, time_offset: fph, delta_v: Velocity) -> Self {
        Self {
            id: id.into(),
            time_offset,
            delta_v,
        }
    }

    fn validate(&self) -> Result<(), OrbitError> {
        if !self.time_offset.is_finite() {
            return Err(OrbitError::NonFiniteElement {
                name: "time_offset",
            });
        }
        if self.time_offset < 0.0 {
            return Err(OrbitError::ManeuverNodeInPast {
                id: self.id.clone(),
                time_offset: self.time_offset,
            });
        }
        if !(self.delta_v.x.is_finite() && self.delta_v.y.is_finite()) {
            return Err(OrbitError::NonFiniteElement { name: "delta_v" });
        }
        Ok(())
    }
}

impl DeltaVFrame {
    /// Converts the given delta-v from this frame into the world frame, for
    /// a craft moving with the given velocity.
    ///
    /// A craft at rest has no prograde direction, in which case the delta-v
    /// is used as given.
    pub fn to_world(&self, delta_v: &Velocity, velocity: &Velocity) -> Velocity {
        match self {
            Self::World => *delta_v,
            Self::Prograde => match velocity.try_normalize(fph::EPSILON) {
                Some(prograde) => {
                    let normal = Velocity::new(-prograde.y, prograde.x);
                    prograde * delta_v.x + normal * delta_v.y
                }
                None => *delta_v,
            },
        }
    }
}

impl Default for ManeuverConfig {
    fn default() -> Self {
        Self {
            delta_v_frame: DeltaVFrame::default(),
            min_arc_segments: 64,
        }
    }
}

impl FlightPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a plan containing the given nodes.
    ///
    /// # Errors
    /// See [`Self::add_node`].
    pub fn from_nodes(nodes: impl IntoIterator<Item = ManeuverNode>) -> Result<Self, OrbitError> {
        let mut plan = Self::new();
        for node in nodes {
            plan.add_node(node)?;
        }
        Ok(plan)
    }

    /// The nodes, sorted by time offset.
    pub fn nodes(&self) -> &[ManeuverNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// A counter incremented by every modification of the plan.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn node(&self, id: &str) -> Option<&ManeuverNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// Inserts the given node in time order.
    ///
    /// # Errors
    /// Returns an error if a node with the same ID exists, or if the node's
    /// time offset is negative or its delta-v is not finite.
    pub fn add_node(&mut self, node: ManeuverNode) -> Result<PlanChange, OrbitError> {
        if self.index_of(&node.id).is_some() {
            return Err(OrbitError::DuplicateManeuverNode { id: node.id });
        }
        node.validate()?;
        let idx = self.insert_sorted(node);
        self.revision += 1;
        Ok(PlanChange {
            first_affected_node: idx,
        })
    }

    /// Changes the time offset and delta-v of the node with the given ID,
    /// moving it to keep the plan in time order.
    ///
    /// # Errors
    /// Returns an error if there is no node with the given ID, or if the new
    /// values are invalid. The plan is unchanged on error.
    pub fn edit_node(
        &mut self,
        id: &str,
        time_offset: fph,
        delta_v: Velocity,
    ) -> Result<PlanChange, OrbitError> {
        let old_idx = self
            .index_of(id)
            .ok_or_else(|| OrbitError::UnknownManeuverNode { id: id.to_string() })?;

        let edited = ManeuverNode {
            id: id.to_string(),
            time_offset,
            delta_v,
        };
        edited.validate()?;

        self.nodes.remove(old_idx);
        let new_idx = self.insert_sorted(edited);
        self.revision += 1;

        Ok(PlanChange {
            first_affected_node: old_idx.min(new_idx),
        })
    }

    /// Removes the node with the given ID. Later nodes remain and will be
    /// applied relative to the node now preceding them.
    ///
    /// # Errors
    /// Returns [`OrbitError::UnknownManeuverNode`] if there is no node with
    /// the given ID.
    pub fn remove_node(&mut self, id: &str) -> Result<(ManeuverNode, PlanChange), OrbitError> {
        let idx = self
            .index_of(id)
            .ok_or_else(|| OrbitError::UnknownManeuverNode { id: id.to_string() })?;
        let node = self.nodes.remove(idx);
        self.revision += 1;
        Ok((
            node,
            PlanChange {
                first_affected_node: idx,
            },
        ))
    }

    /// Moves the plan forward in time by the given number of seconds.
    ///
    /// Nodes falling within the step are removed and returned in time order,
    /// with their time offsets still relative to the start of the step. The
    /// time offsets of the remaining nodes are reduced by the step, so they
    /// stay relative to the present.
    pub fn advance(&mut self, time_step: fph) -> Vec<ManeuverNode> {
        if self.nodes.is_empty() {
            return Vec::new();
        }
        let due_count = self
            .nodes
            .partition_point(|node| node.time_offset < time_step);
        let due = self.nodes.drain(..due_count).collect();

        for node in &mut self.nodes {
            node.time_offset = (node.time_offset - time_step).max(0.0);
        }
        self.revision += 1;

        due
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|node| node.id == id)
    }

    fn insert_sorted(&mut self, node: ManeuverNode) -> usize {
        let idx = self
            .nodes
            .partition_point(|existing| existing.time_offset <= node.time_offset);
        self.nodes.insert(idx, node);
        idx
    }
}

impl PlanChange {
    /// A change that affects every node, requiring a full prediction.
    pub fn everything() -> Self {
        Self {
            first_affected_node: 0,
        }
    }
}

impl PredictedTrajectory {
    pub fn rocket(&self) -> &RocketState {
        &self.rocket
    }

    /// The legs of the trajectory, ordered in time.
    pub fn legs(&self) -> &[TrajectoryLeg] {
        &self.legs
    }

    /// The sampled segments of the trajectory, ordered in time.
    pub fn segments(&self) -> &[TrajectorySegment] {
        &self.segments
    }

    /// The node that stopped the prediction, if any.
    pub fn rejection(&self) -> Option<&ManeuverRejection> {
        self.rejection.as_ref()
    }

    /// The revision of the flight plan the prediction was made for.
    pub fn plan_revision(&self) -> u64 {
        self.plan_revision
    }

    /// Returns an iterator over the world-space points of all segments.
    pub fn points(&self) -> impl Iterator<Item = &Position> {
        self.segments.iter().flat_map(TrajectorySegment::points)
    }

    /// Moves all segments to follow the parent to the given position.
    pub fn reanchor(&mut self, parent_position: &Position) {
        for segment in &mut self.segments {
            segment.reanchor(parent_position);
        }
    }
}

impl ManeuverPredictor {
    pub fn new(
        kepler: KeplerSolver,
        sampler_config: SamplerConfig,
        config: ManeuverConfig,
    ) -> Self {
        Self {
            kepler,
            sampler_config,
            config,
        }
    }

    pub fn config(&self) -> &ManeuverConfig {
        &self.config
    }

    /// Computes the leg the craft is currently following.
    ///
    /// # Errors
    /// Returns an error if the current state does not describe a bound orbit
    /// around the parent.
    pub fn current_leg(
        &self,
        rocket: &RocketState,
        parent_mu: fph,
    ) -> Result<TrajectoryLeg, OrbitError> {
        let (orbit, mean_anomaly) =
            OrbitModel::from_state(rocket.parent, &rocket.state, parent_mu)?;
        Ok(TrajectoryLeg::new(orbit, parent_mu, mean_anomaly, 0.0))
    }

    /// Applies the given node to the given leg, producing the leg followed
    /// after the burn.
    ///
    /// The state at the node's time is predicted on the leg, the node's
    /// delta-v is converted to the world frame using the predicted velocity
    /// and added to it, and the orbit is reconstructed from the new state.
    /// A node with zero delta-v reproduces the orbit of the leg.
    ///
    /// # Errors
    /// Returns [`OrbitError::UnboundTrajectory`] if the burn would put the
    /// craft on an escape trajectory, or another error if the new state is
    /// degenerate.
    pub fn apply_node(
        &self,
        leg: &TrajectoryLeg,
        node: &ManeuverNode,
    ) -> Result<TrajectoryLeg, OrbitError> {
        let pre_burn = leg.state_at_time(&self.kepler, node.time_offset);

        let delta_v = self
            .config
            .delta_v_frame
            .to_world(&node.delta_v, &pre_burn.velocity);

        let post_burn = OrbitalState::new(pre_burn.position, pre_burn.velocity + delta_v);

        let (orbit, mean_anomaly) =
            OrbitModel::from_state(leg.orbit().parent(), &post_burn, leg.parent_mu())?;

        Ok(TrajectoryLeg::new(
            orbit,
            leg.parent_mu(),
            mean_anomaly,
            node.time_offset,
        ))
    }

    /// Computes the legs followed by the craft when executing the given
    /// nodes in order.
    ///
    /// # Errors
    /// Returns an error if the current state or any node produces an orbit
    /// that is not bound.
    pub fn predict_legs(
        &self,
        rocket: &RocketState,
        parent_mu: fph,
        nodes: &[ManeuverNode],
    ) -> Result<Vec<TrajectoryLeg>, OrbitError> {
        let mut legs = Vec::with_capacity(nodes.len() + 1);
        let mut leg = self.current_leg(rocket, parent_mu)?;
        for node in nodes {
            let next_leg = self.apply_node(&leg, node)?;
            legs.push(leg);
            leg = next_leg;
        }
        legs.push(leg);
        Ok(legs)
    }

    /// Computes the sampled trajectory segments for the craft when executing
    /// the given nodes in order. The segments are placed in world space
    /// around the given parent position.
    ///
    /// # Errors
    /// See [`Self::predict_legs`].
    pub fn predict_segments(
        &self,
        rocket: &RocketState,
        parent_mu: fph,
        parent_position: &Position,
        nodes: &[ManeuverNode],
    ) -> Result<Vec<TrajectorySegment>, OrbitError> {
        let legs = self.predict_legs(rocket, parent_mu, nodes)?;
        Ok(self.sample_segments(&legs, nodes, 0, parent_position))
    }

    /// Predicts the full trajectory for the given flight plan.
    ///
    /// A node that cannot be applied is recorded as the rejection of the
    /// returned prediction, and the legs and segments before it are kept.
    ///
    /// # Errors
    /// Returns an error if the current state of the craft does not describe
    /// a bound orbit.
    pub fn predict(
        &self,
        rocket: &RocketState,
        parent_mu: fph,
        parent_position: &Position,
        plan: &FlightPlan,
    ) -> Result<PredictedTrajectory, OrbitError> {
        let first_leg = self.current_leg(rocket, parent_mu)?;
        Ok(self.extend_prediction(
            *rocket,
            parent_mu,
            vec![first_leg],
            Vec::new(),
            parent_position,
            plan,
        ))
    }

    /// Updates a previous prediction after the given change to the flight
    /// plan. Legs and segments preceding the first affected node are reused
    /// as they are, and only the rest is recomputed. A full prediction is
    /// made if the craft state or parent differs from the previous
    /// prediction.
    ///
    /// # Errors
    /// See [`Self::predict`].
    pub fn repredict(
        &self,
        previous: &PredictedTrajectory,
        rocket: &RocketState,
        parent_mu: fph,
        parent_position: &Position,
        plan: &FlightPlan,
        change: PlanChange,
    ) -> Result<PredictedTrajectory, OrbitError> {
        if previous.rocket != *rocket || previous.parent_mu != parent_mu {
            return self.predict(rocket, parent_mu, parent_position, plan);
        }

        let kept_legs = (change.first_affected_node + 1).min(previous.legs.len());
        let kept_segments = kept_legs - 1;

        apsis_log::debug!(
            "Repredicting trajectory from node {} (reusing {} of {} segments)",
            change.first_affected_node,
            kept_segments,
            previous.segments.len()
        );

        let legs = previous.legs[..kept_legs].to_vec();
        let mut segments = previous.segments[..kept_segments].to_vec();
        for segment in &mut segments {
            segment.reanchor(parent_position);
        }

        Ok(self.extend_prediction(*rocket, parent_mu, legs, segments, parent_position, plan))
    }

    /// Applies the nodes following the last of the given legs and samples
    /// every leg lacking a segment.
    fn extend_prediction(
        &self,
        rocket: RocketState,
        parent_mu: fph,
        mut legs: Vec<TrajectoryLeg>,
        mut segments: Vec<TrajectorySegment>,
        parent_position: &Position,
        plan: &FlightPlan,
    ) -> PredictedTrajectory {
        let nodes = plan.nodes();
        let mut rejection = None;

        for node in nodes.iter().skip(legs.len().saturating_sub(1)) {
            let Some(last_leg) = legs.last() else {
                break;
            };
            match self.apply_node(last_leg, node) {
                Ok(leg) => legs.push(leg),
                Err(error) => {
                    apsis_log::warn!("Rejected maneuver node `{}`: {}", node.id, error);
                    rejection = Some(ManeuverRejection {
                        node_id: node.id.clone(),
                        error,
                    });
                    break;
                }
            }
        }

        let first_unsampled = segments.len();
        segments.extend(self.sample_segments(&legs, nodes, first_unsampled, parent_position));

        PredictedTrajectory {
            rocket,
            parent_mu,
            legs,
            segments,
            rejection,
            plan_revision: plan.revision(),
        }
    }

    fn sample_segments(
        &self,
        legs: &[TrajectoryLeg],
        nodes: &[ManeuverNode],
        first_leg: usize,
        parent_position: &Position,
    ) -> Vec<TrajectorySegment> {
        legs.iter()
            .enumerate()
            .skip(first_leg)
            .map(|(idx, leg)| {
                let end_time = if idx + 1 < legs.len() {
                    Some(nodes[idx].time_offset)
                } else {
                    None
                };
                leg.sample_arc(
                    &self.kepler,
                    &self.sampler_config,
                    self.config.min_arc_segments,
                    end_time,
                    parent_position,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apsis_containers::Arena;
    use approx::assert_abs_diff_eq;
    use nalgebra::{point, vector};

    const EARTH_MU: fph = 3.986004418e14;

    fn rocket() -> RocketState {
        let mut arena = Arena::new();
        let parent = BodyHandle::from(arena.insert(()));
        // At periapsis of an orbit with eccentricity 0.3 and periapsis along
        // the y-axis
        RocketState {
            parent,
            state: OrbitalState::new(vector![0.0, 7.0e6], vector![-8.6e3, 0.0]),
        }
    }

    fn predictor() -> ManeuverPredictor {
        ManeuverPredictor::default()
    }

    fn plan(nodes: &[(&str, fph, fph, fph)]) -> FlightPlan {
        FlightPlan::from_nodes(
            nodes
                .iter()
                .map(|&(id, time, x, y)| ManeuverNode::new(id, time, vector![x, y])),
        )
        .unwrap()
    }

    #[test]
    fn nodes_are_kept_in_time_order() {
        let plan = plan(&[
            ("b", 200.0, 0.0, 0.0),
            ("a", 100.0, 0.0, 0.0),
            ("c", 300.0, 0.0, 0.0),
        ]);
        let ids: Vec<_> = plan.nodes().iter().map(|node| node.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn plan_changes_report_first_affected_node() {
        let mut plan = plan(&[("a", 100.0, 0.0, 0.0), ("b", 200.0, 0.0, 0.0)]);
        let revision = plan.revision();

        let change = plan
            .add_node(ManeuverNode::new("c", 150.0, vector![1.0, 0.0]))
            .unwrap();
        assert_eq!(change.first_affected_node, 1);

        let change = plan.edit_node("b", 50.0, vector![0.0, 0.0]).unwrap();
        assert_eq!(change.first_affected_node, 0);
        assert_eq!(plan.nodes()[0].id, "b");

        let (removed, change) = plan.remove_node("c").unwrap();
        assert_eq!(removed.id, "c");
        assert_eq!(change.first_affected_node, 2);

        assert_eq!(plan.revision(), revision + 3);
    }

    #[test]
    fn advancing_plan_returns_due_nodes_and_rebases_the_rest() {
        let mut plan = plan(&[
            ("a", 30.0, 1.0, 0.0),
            ("b", 60.0, 2.0, 0.0),
            ("c", 150.0, 3.0, 0.0),
        ]);
        let revision = plan.revision();

        let due = plan.advance(60.0);
        let due_ids: Vec<_> = due.iter().map(|node| node.id.as_str()).collect();
        assert_eq!(due_ids, ["a"]);
        assert_abs_diff_eq!(due[0].time_offset, 30.0);

        assert_eq!(plan.len(), 2);
        assert_abs_diff_eq!(plan.node("b").unwrap().time_offset, 0.0);
        assert_abs_diff_eq!(plan.node("c").unwrap().time_offset, 90.0);
        assert_eq!(plan.revision(), revision + 1);

        let due = plan.advance(100.0);
        assert_eq!(due.len(), 2);
        assert!(plan.is_empty());

        let revision = plan.revision();
        assert!(plan.advance(100.0).is_empty());
        assert_eq!(plan.revision(), revision);
    }

    #[test]
    fn invalid_plan_modifications_are_rejected() {
        let mut plan = plan(&[("a", 100.0, 0.0, 0.0)]);
        assert!(matches!(
            plan.add_node(ManeuverNode::new("a", 10.0, vector![0.0, 0.0])),
            Err(OrbitError::DuplicateManeuverNode { .. })
        ));
        assert!(matches!(
            plan.add_node(ManeuverNode::new("b", -1.0, vector![0.0, 0.0])),
            Err(OrbitError::ManeuverNodeInPast { .. })
        ));
        assert!(matches!(
            plan.edit_node("a", 10.0, vector![fph::NAN, 0.0]),
            Err(OrbitError::NonFiniteElement { .. })
        ));
        assert!(matches!(
            plan.remove_node("x"),
            Err(OrbitError::UnknownManeuverNode { .. })
        ));
        assert_eq!(plan.nodes()[0].time_offset, 100.0);
    }

    #[test]
    fn prograde_frame_follows_velocity() {
        let velocity = vector![0.0, 7.0e3];
        let world = DeltaVFrame::Prograde.to_world(&vector![10.0, 2.0], &velocity);
        assert_abs_diff_eq!(world, vector![-2.0, 10.0], epsilon = 1e-12);
        assert_eq!(
            DeltaVFrame::World.to_world(&vector![10.0, 2.0], &velocity),
            vector![10.0, 2.0]
        );
    }

    #[test]
    fn zero_delta_v_node_preserves_orbit() {
        let predictor = predictor();
        let leg = predictor.current_leg(&rocket(), EARTH_MU).unwrap();
        assert_abs_diff_eq!(leg.orbit().eccentricity(), 0.3, epsilon = 0.01);

        let node = ManeuverNode::new("coast", 1234.0, vector![0.0, 0.0]);
        let next = predictor.apply_node(&leg, &node).unwrap();

        let before = leg.orbit().elements();
        let after = next.orbit().elements();
        assert_abs_diff_eq!(
            after.semi_major_axis,
            before.semi_major_axis,
            epsilon = 1e-6 * before.semi_major_axis
        );
        assert_abs_diff_eq!(after.eccentricity, before.eccentricity, epsilon = 1e-9);
        assert_abs_diff_eq!(
            after.argument_of_periapsis,
            before.argument_of_periapsis,
            epsilon = 1e-6
        );
        assert_eq!(after.direction, before.direction);

        let kepler = KeplerSolver::default();
        assert_abs_diff_eq!(
            next.state_at_time(&kepler, 3000.0),
            leg.state_at_time(&kepler, 3000.0),
            epsilon = 1e-2
        );
    }

    #[test]
    fn prograde_burn_raises_orbit() {
        let predictor = predictor();
        let leg = predictor.current_leg(&rocket(), EARTH_MU).unwrap();
        let next = predictor
            .apply_node(&leg, &ManeuverNode::new("raise", 0.0, vector![100.0, 0.0]))
            .unwrap();
        assert!(next.orbit().semi_major_axis() > leg.orbit().semi_major_axis());
    }

    #[test]
    fn escape_burn_is_rejected() {
        let predictor = predictor();
        let plan = plan(&[("ok", 100.0, 10.0, 0.0), ("escape", 500.0, 5e3, 0.0)]);

        assert!(matches!(
            predictor.predict_legs(&rocket(), EARTH_MU, plan.nodes()),
            Err(OrbitError::UnboundTrajectory { .. })
        ));

        let prediction = predictor
            .predict(&rocket(), EARTH_MU, &Position::origin(), &plan)
            .unwrap();
        assert_eq!(prediction.legs().len(), 2);
        assert_eq!(prediction.segments().len(), 2);
        assert_eq!(prediction.rejection().unwrap().node_id, "escape");
    }

    #[test]
    fn segments_are_bounded_by_node_times() {
        let predictor = predictor();
        let plan = plan(&[("a", 600.0, 50.0, 0.0), ("b", 1800.0, -20.0, 5.0)]);
        let segments = predictor
            .predict_segments(&rocket(), EARTH_MU, &Position::origin(), plan.nodes())
            .unwrap();

        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].start_time(), 0.0);
        assert_abs_diff_eq!(segments[0].end_time(), 600.0, epsilon = 1e-9);
        assert_eq!(segments[1].start_time(), 600.0);
        assert_abs_diff_eq!(segments[1].end_time(), 1800.0, epsilon = 1e-9);
        assert_eq!(segments[2].start_time(), 1800.0);

        // Consecutive segments meet at the node
        for pair in segments.windows(2) {
            assert_abs_diff_eq!(
                *pair[0].points().last().unwrap(),
                pair[1].points()[0],
                epsilon = 1e-2
            );
        }
    }

    #[test]
    fn editing_node_leaves_earlier_segments_identical() {
        let predictor = predictor();
        let rocket = rocket();
        let parent_position = point![1.5e11, -2.0e10];
        let mut plan = plan(&[
            ("a", 600.0, 50.0, 0.0),
            ("b", 1800.0, -20.0, 5.0),
            ("c", 4000.0, 10.0, -10.0),
        ]);

        let original = predictor
            .predict(&rocket, EARTH_MU, &parent_position, &plan)
            .unwrap();

        let change = plan.edit_node("b", 2000.0, vector![-30.0, 0.0]).unwrap();
        let updated = predictor
            .repredict(&original, &rocket, EARTH_MU, &parent_position, &plan, change)
            .unwrap();

        assert_eq!(updated.segments().len(), 4);
        assert_eq!(updated.segments()[0], original.segments()[0]);
        assert_ne!(updated.segments()[1], original.segments()[1]);
        assert_eq!(updated.plan_revision(), plan.revision());

        // Reprediction agrees with predicting from scratch
        let fresh = predictor
            .predict(&rocket, EARTH_MU, &parent_position, &plan)
            .unwrap();
        assert_eq!(fresh.segments()[0].points(), updated.segments()[0].points());
        for (fresh, updated) in fresh.segments().iter().zip(updated.segments()) {
            assert_eq!(fresh.points(), updated.points());
        }
    }

    #[test]
    fn removing_node_keeps_later_nodes() {
        let predictor = predictor();
        let rocket = rocket();
        let mut plan = plan(&[("a", 600.0, 50.0, 0.0), ("b", 1800.0, -20.0, 5.0)]);
        let original = predictor
            .predict(&rocket, EARTH_MU, &Position::origin(), &plan)
            .unwrap();

        let (_, change) = plan.remove_node("a").unwrap();
        let updated = predictor
            .repredict(&original, &rocket, EARTH_MU, &Position::origin(), &plan, change)
            .unwrap();

        assert_eq!(updated.legs().len(), 2);
        assert_eq!(updated.legs()[1].start_time(), 1800.0);
    }
}
