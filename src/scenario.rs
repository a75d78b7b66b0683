//! Scenario descriptions and their instantiation.

use crate::{pipeline::PipelineConfig, simulation::SimulationConfig};
use anyhow::{Context, Result, anyhow, bail};
use apsis_math::angle::{Angle, Degrees};
use apsis_orbit::{
    body::{Body, BodyHandle, BodyKind, BodyRegistry},
    fph,
    maneuver::{FlightPlan, ManeuverNode, RocketState},
    orbit::{OrbitDirection, OrbitElements, OrbitModel},
    quantities::{Displacement, Position, Velocity},
    state::OrbitalState,
};
use apsis_projection::CameraView;
use nalgebra::vector;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::Path};

/// Configuration of a complete scenario: the bodies, the craft and its
/// flight plan, the camera and the parameters of the simulation and the
/// trajectory pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Bodies in the scenario. Parents must be listed before the bodies
    /// orbiting them.
    pub bodies: Vec<BodySpec>,
    pub rocket: Option<RocketSpec>,
    pub maneuver_nodes: Vec<ManeuverNode>,
    pub camera: CameraSpec,
    pub simulation: SimulationConfig,
    pub pipeline: PipelineConfig,
}

/// Specification of a single body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BodySpec {
    pub name: String,
    pub kind: BodyKind,
    /// Mass [kg].
    pub mass: fph,
    /// Radius [m].
    pub radius: fph,
    /// Gravitational parameter [m³/s²]. Derived from the mass if absent.
    #[serde(default)]
    pub gravitational_parameter: Option<fph>,
    pub placement: Placement,
}

/// Where a body is located.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Placement {
    /// At a fixed world position.
    Fixed { position: Position },
    /// On an orbit around the body with the given name.
    Orbiting { parent: String, orbit: OrbitSpec },
}

/// Keplerian elements of an orbit, with angles in degrees.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitSpec {
    pub semi_major_axis: fph,
    pub eccentricity: fph,
    pub argument_of_periapsis: Degrees,
    pub mean_anomaly_at_epoch: Degrees,
    pub direction: OrbitDirection,
    pub focus_offset: Displacement,
}

/// Specification of the player-controlled craft, given by its state
/// relative to the body it orbits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RocketSpec {
    pub name: String,
    pub parent: String,
    /// Mass [kg].
    pub mass: fph,
    /// Position [m] relative to the parent.
    pub position: Displacement,
    /// Velocity [m/s] relative to the parent.
    pub velocity: Velocity,
}

/// Placement of the camera.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSpec {
    /// Name of the body to center the view on. The world origin is used if
    /// absent.
    pub follow: Option<String>,
    /// Render units per meter.
    pub scale: fph,
}

/// A scenario instantiated from a [`ScenarioConfig`].
#[derive(Clone, Debug)]
pub struct Scenario {
    pub registry: BodyRegistry,
    pub rocket: Option<Rocket>,
    pub plan: FlightPlan,
    pub camera_target: Option<BodyHandle>,
    pub view: CameraView,
}

/// The craft of a scenario.
#[derive(Clone, Copy, Debug)]
pub struct Rocket {
    pub body: BodyHandle,
    pub state: RocketState,
}

impl ScenarioConfig {
    /// Reads the scenario configuration from the given RON file.
    ///
    /// # Errors
    /// Returns an error if the file can not be read or parsed.
    pub fn from_ron_file(file_path: impl AsRef<Path>) -> Result<Self> {
        apsis_io::parse_ron_file(file_path)
    }

    /// Writes the scenario configuration to the given RON file.
    ///
    /// # Errors
    /// Returns an error if the file can not be written.
    pub fn write_ron_file(&self, output_file_path: impl AsRef<Path>) -> Result<()> {
        apsis_io::write_ron_file(self, output_file_path)
    }

    /// Creates the bodies, craft and flight plan described by the
    /// configuration.
    ///
    /// # Errors
    /// Returns an error if a body has an unknown parent, a duplicate name or
    /// invalid orbital elements, if the craft is not on a bound orbit, or if
    /// the maneuver nodes are invalid.
    pub fn build(&self) -> Result<Scenario> {
        let mut registry = BodyRegistry::new();
        let mut handles: HashMap<&str, BodyHandle> = HashMap::new();

        for spec in &self.bodies {
            if handles.contains_key(spec.name.as_str()) {
                bail!("Multiple bodies named `{}`", spec.name);
            }
            let body = spec
                .create_body(&handles)
                .with_context(|| format!("Invalid specification for body `{}`", spec.name))?;
            let handle = registry.add_body(body)?;
            handles.insert(&spec.name, handle);
        }

        let rocket = self
            .rocket
            .as_ref()
            .map(|spec| {
                if handles.contains_key(spec.name.as_str()) {
                    bail!("Multiple bodies named `{}`", spec.name);
                }
                spec.create_rocket(&mut registry, &handles)
                    .with_context(|| format!("Invalid specification for rocket `{}`", spec.name))
            })
            .transpose()?;

        let plan = FlightPlan::from_nodes(self.maneuver_nodes.iter().cloned())
            .context("Invalid maneuver nodes")?;

        if rocket.is_none() && !plan.is_empty() {
            bail!("Maneuver nodes were specified without a rocket");
        }

        let camera_target = match &self.camera.follow {
            Some(name) => Some(
                registry
                    .find_by_name(name)
                    .ok_or_else(|| anyhow!("Camera target `{}` does not exist", name))?,
            ),
            None => None,
        };

        let view = CameraView::new(Position::origin(), self.camera.scale);
        if !view.is_valid() {
            bail!("Invalid camera scale {}", self.camera.scale);
        }

        Ok(Scenario {
            registry,
            rocket,
            plan,
            camera_target,
            view,
        })
    }
}

impl Default for ScenarioConfig {
    /// The Sun, Earth and Moon, with a craft in low Earth orbit planning a
    /// transfer burn.
    fn default() -> Self {
        let bodies = vec![
            BodySpec {
                name: "Sun".to_string(),
                kind: BodyKind::Star,
                mass: 1.989e30,
                radius: 6.957e8,
                gravitational_parameter: Some(1.32712440018e20),
                placement: Placement::Fixed {
                    position: Position::origin(),
                },
            },
            BodySpec {
                name: "Earth".to_string(),
                kind: BodyKind::Planet,
                mass: 5.972e24,
                radius: 6.371e6,
                gravitational_parameter: Some(3.986004418e14),
                placement: Placement::Orbiting {
                    parent: "Sun".to_string(),
                    orbit: OrbitSpec {
                        semi_major_axis: 1.496e11,
                        eccentricity: 0.0167,
                        argument_of_periapsis: Degrees(102.9),
                        mean_anomaly_at_epoch: Degrees(0.0),
                        ..OrbitSpec::default()
                    },
                },
            },
            BodySpec {
                name: "Moon".to_string(),
                kind: BodyKind::Moon,
                mass: 7.342e22,
                radius: 1.737e6,
                gravitational_parameter: Some(4.9048695e12),
                placement: Placement::Orbiting {
                    parent: "Earth".to_string(),
                    orbit: OrbitSpec {
                        semi_major_axis: 3.844e8,
                        eccentricity: 0.0549,
                        argument_of_periapsis: Degrees(0.0),
                        mean_anomaly_at_epoch: Degrees(120.0),
                        ..OrbitSpec::default()
                    },
                },
            },
        ];

        let rocket = Some(RocketSpec {
            name: "Rocket".to_string(),
            parent: "Earth".to_string(),
            mass: 5e5,
            position: vector![6.771e6, 0.0],
            velocity: vector![0.0, 7.67e3],
        });

        let maneuver_nodes = vec![ManeuverNode::new(
            "transfer",
            1800.0,
            vector![3.1e3, 0.0],
        )];

        Self {
            bodies,
            rocket,
            maneuver_nodes,
            camera: CameraSpec {
                follow: Some("Earth".to_string()),
                ..CameraSpec::default()
            },
            simulation: SimulationConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl BodySpec {
    fn create_body(&self, handles: &HashMap<&str, BodyHandle>) -> Result<Body> {
        let mut body = Body::new(&self.name, self.kind, self.mass, self.radius);
        if let Some(gravitational_parameter) = self.gravitational_parameter {
            body = body.with_gravitational_parameter(gravitational_parameter);
        }
        Ok(match &self.placement {
            Placement::Fixed { position } => body.with_position(*position),
            Placement::Orbiting { parent, orbit } => {
                let parent = lookup_parent(handles, parent)?;
                let model = orbit.create_orbit(parent)?;
                body.with_orbit(model, orbit.mean_anomaly_at_epoch.radians())
            }
        })
    }
}

impl OrbitSpec {
    fn create_orbit(&self, parent: BodyHandle) -> Result<OrbitModel> {
        let elements = OrbitElements {
            semi_major_axis: self.semi_major_axis,
            eccentricity: self.eccentricity,
            argument_of_periapsis: self.argument_of_periapsis.radians(),
            focus_offset: self.focus_offset,
            direction: self.direction,
        };
        Ok(OrbitModel::from_elements(parent, &elements)?)
    }
}

impl Default for OrbitSpec {
    fn default() -> Self {
        Self {
            semi_major_axis: 1.0,
            eccentricity: 0.0,
            argument_of_periapsis: Degrees(0.0),
            mean_anomaly_at_epoch: Degrees(0.0),
            direction: OrbitDirection::default(),
            focus_offset: Displacement::zeros(),
        }
    }
}

impl RocketSpec {
    fn create_rocket(
        &self,
        registry: &mut BodyRegistry,
        handles: &HashMap<&str, BodyHandle>,
    ) -> Result<Rocket> {
        let parent = lookup_parent(handles, &self.parent)?;
        let parent_mu = registry
            .gravitational_parameter(parent)
            .ok_or_else(|| anyhow!("Parent `{}` does not exist", self.parent))?;

        let state = RocketState {
            parent,
            state: OrbitalState::new(self.position, self.velocity),
        };

        let (orbit, mean_anomaly) = OrbitModel::from_state(parent, &state.state, parent_mu)?;

        // Crafts are too small to have a meaningful radius
        let body = Body::new(&self.name, BodyKind::Craft, self.mass, 0.0)
            .with_orbit(orbit, mean_anomaly);

        Ok(Rocket {
            body: registry.add_body(body)?,
            state,
        })
    }
}

impl Default for CameraSpec {
    fn default() -> Self {
        Self {
            follow: None,
            scale: 1e-6,
        }
    }
}

impl Scenario {
    /// Moves the view center to the current position of the camera target.
    pub fn update_view(&mut self) {
        if let Some(position) = self
            .camera_target
            .and_then(|target| self.registry.body(target))
            .map(|body| *body.position())
        {
            self.view = self.view.recentered(position);
        }
    }
}

fn lookup_parent(handles: &HashMap<&str, BodyHandle>, name: &str) -> Result<BodyHandle> {
    handles
        .get(name)
        .copied()
        .ok_or_else(|| anyhow!("Parent body `{}` must be specified before its children", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use apsis_orbit::OrbitError;

    fn orbiting(name: &str, parent: &str, semi_major_axis: fph) -> BodySpec {
        BodySpec {
            name: name.to_string(),
            kind: BodyKind::Planet,
            mass: 1e24,
            radius: 1e6,
            gravitational_parameter: None,
            placement: Placement::Orbiting {
                parent: parent.to_string(),
                orbit: OrbitSpec {
                    semi_major_axis,
                    ..OrbitSpec::default()
                },
            },
        }
    }

    fn star() -> BodySpec {
        BodySpec {
            name: "Star".to_string(),
            kind: BodyKind::Star,
            mass: 2e30,
            radius: 7e8,
            gravitational_parameter: None,
            placement: Placement::Fixed {
                position: Position::origin(),
            },
        }
    }

    #[test]
    fn default_scenario_builds() {
        let scenario = ScenarioConfig::default().build().unwrap();
        assert_eq!(scenario.registry.len(), 4);
        assert_eq!(scenario.plan.len(), 1);

        let rocket = scenario.rocket.unwrap();
        let earth = scenario.registry.find_by_name("Earth").unwrap();
        assert_eq!(rocket.state.parent, earth);
        assert_eq!(scenario.camera_target, Some(earth));
    }

    #[test]
    fn children_before_parents_are_rejected() {
        let config = ScenarioConfig {
            bodies: vec![orbiting("Planet", "Star", 1e11), star()],
            rocket: None,
            maneuver_nodes: Vec::new(),
            camera: CameraSpec::default(),
            ..ScenarioConfig::default()
        };
        assert!(config.build().is_err());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let config = ScenarioConfig {
            bodies: vec![star(), star()],
            rocket: None,
            maneuver_nodes: Vec::new(),
            camera: CameraSpec::default(),
            ..ScenarioConfig::default()
        };
        assert!(config.build().is_err());
    }

    #[test]
    fn invalid_orbit_is_reported() {
        let config = ScenarioConfig {
            bodies: vec![star(), orbiting("Planet", "Star", -5.0)],
            rocket: None,
            maneuver_nodes: Vec::new(),
            camera: CameraSpec::default(),
            ..ScenarioConfig::default()
        };
        let error = config.build().unwrap_err();
        assert!(matches!(
            error.root_cause().downcast_ref::<OrbitError>(),
            Some(OrbitError::NonPositiveSemiMajorAxis { .. })
        ));
    }

    #[test]
    fn escaping_rocket_is_rejected() {
        let mut config = ScenarioConfig::default();
        if let Some(rocket) = &mut config.rocket {
            rocket.velocity = vector![0.0, 20e3];
        }
        assert!(config.build().is_err());
    }

    #[test]
    fn configuration_survives_ron_round_trip() {
        let config = ScenarioConfig::default();
        let text = ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::default()).unwrap();
        let parsed: ScenarioConfig = ron::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
