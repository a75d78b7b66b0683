//! Celestial bodies and craft, and the registry holding their parent/child
//! graph.

use crate::{OrbitError, fph, orbit::OrbitModel, quantities::Position};
use apsis_containers::{Arena, Handle};
use apsis_math::consts::f64::GRAVITATIONAL_CONSTANT;

/// Handle to a [`Body`] in a [`BodyRegistry`]. Handles do not borrow the
/// registry and become invalid when the body is removed.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyHandle(Handle);

/// The kind of a body, which determines how it is presented.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BodyKind {
    Star,
    Planet,
    Moon,
    Craft,
}

/// A body moving under the gravity of a single parent, or a fixed root body
/// such as a star.
#[derive(Clone, Debug)]
pub struct Body {
    name: String,
    kind: BodyKind,
    mass: fph,
    radius: fph,
    gravitational_parameter: fph,
    position: Position,
    parent: Option<BodyHandle>,
    orbit: Option<OrbitModel>,
    mean_anomaly_at_epoch: fph,
}

/// Owner of all bodies. Parent references between bodies are
/// [`BodyHandle`]s into the registry.
#[derive(Clone, Debug, Default)]
pub struct BodyRegistry {
    bodies: Arena<Body>,
}

impl From<Handle> for BodyHandle {
    fn from(handle: Handle) -> Self {
        Self(handle)
    }
}

impl BodyKind {
    /// Returns the factor by which the body's offset from its parent is
    /// multiplied when presenting it. Moons use `moon_offset_scale`, which
    /// lets them be pulled away from their planet at zoom levels where they
    /// would otherwise overlap it. All other kinds are presented at true
    /// scale.
    pub fn local_scale_factor(&self, moon_offset_scale: fph) -> fph {
        match self {
            Self::Moon => moon_offset_scale,
            Self::Star | Self::Planet | Self::Craft => 1.0,
        }
    }
}

impl Body {
    /// Creates a body with the given properties at the world origin, without
    /// a parent or orbit. The gravitational parameter is derived from the
    /// mass.
    pub fn new(name: impl Into<String>, kind: BodyKind, mass: fph, radius: fph) -> Self {
        Self {
            name: name.into(),
            kind,
            mass,
            radius,
            gravitational_parameter: GRAVITATIONAL_CONSTANT * mass,
            position: Position::origin(),
            parent: None,
            orbit: None,
            mean_anomaly_at_epoch: 0.0,
        }
    }

    /// Uses the given gravitational parameter [m³/s²] instead of the one
    /// derived from the mass. Measured values are typically known to far
    /// higher precision than the mass.
    pub fn with_gravitational_parameter(mut self, gravitational_parameter: fph) -> Self {
        self.gravitational_parameter = gravitational_parameter;
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    /// Places the body on the given orbit around the orbit's parent, with the
    /// given mean anomaly at the simulation epoch.
    pub fn with_orbit(mut self, orbit: OrbitModel, mean_anomaly_at_epoch: fph) -> Self {
        self.parent = Some(orbit.parent());
        self.orbit = Some(orbit);
        self.mean_anomaly_at_epoch = mean_anomaly_at_epoch;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> BodyKind {
        self.kind
    }

    pub fn mass(&self) -> fph {
        self.mass
    }

    pub fn radius(&self) -> fph {
        self.radius
    }

    pub fn gravitational_parameter(&self) -> fph {
        self.gravitational_parameter
    }

    /// The body's position in world space.
    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn parent(&self) -> Option<BodyHandle> {
        self.parent
    }

    pub fn orbit(&self) -> Option<&OrbitModel> {
        self.orbit.as_ref()
    }

    pub fn mean_anomaly_at_epoch(&self) -> fph {
        self.mean_anomaly_at_epoch
    }
}

impl BodyRegistry {
    pub fn new() -> Self {
        Self {
            bodies: Arena::new(),
        }
    }

    /// Returns the number of bodies in the registry.
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Adds the given body to the registry.
    ///
    /// # Errors
    /// Returns [`OrbitError::MissingParent`] if the body has a parent that is
    /// not in the registry.
    pub fn add_body(&mut self, body: Body) -> Result<BodyHandle, OrbitError> {
        if let Some(parent) = body.parent {
            if !self.contains(parent) {
                return Err(OrbitError::MissingParent { parent });
            }
        }
        Ok(BodyHandle(self.bodies.insert(body)))
    }

    /// Removes the given body. Bodies orbiting it keep their now dangling
    /// parent handle and will be skipped by consumers until given a new
    /// orbit.
    pub fn remove_body(&mut self, body: BodyHandle) -> Option<Body> {
        self.bodies.remove(body.0)
    }

    pub fn contains(&self, body: BodyHandle) -> bool {
        self.bodies.contains(body.0)
    }

    pub fn body(&self, body: BodyHandle) -> Option<&Body> {
        self.bodies.get(body.0)
    }

    /// Returns the body for the given handle.
    ///
    /// # Errors
    /// Returns [`OrbitError::UnknownBody`] if the body does not exist.
    pub fn require_body(&self, body: BodyHandle) -> Result<&Body, OrbitError> {
        self.body(body).ok_or(OrbitError::UnknownBody { body })
    }

    /// Returns the orbit of the given body.
    ///
    /// # Errors
    /// Returns [`OrbitError::UnknownBody`] if the body does not exist, or
    /// [`OrbitError::MissingOrbit`] if it does not orbit anything.
    pub fn require_orbit(&self, body: BodyHandle) -> Result<&OrbitModel, OrbitError> {
        self.require_body(body)?
            .orbit()
            .ok_or(OrbitError::MissingOrbit { body })
    }

    /// Returns the first body with the given name.
    pub fn find_by_name(&self, name: &str) -> Option<BodyHandle> {
        self.iter()
            .find(|(_, body)| body.name() == name)
            .map(|(handle, _)| handle)
    }

    /// Returns an iterator over all bodies and their handles.
    pub fn iter(&self) -> impl Iterator<Item = (BodyHandle, &Body)> {
        self.bodies
            .iter()
            .map(|(handle, body)| (BodyHandle(handle), body))
    }

    /// Returns an iterator over the handles of the bodies whose parent is the
    /// given body.
    pub fn children(&self, parent: BodyHandle) -> impl Iterator<Item = BodyHandle> {
        self.iter()
            .filter(move |(_, body)| body.parent == Some(parent))
            .map(|(handle, _)| handle)
    }

    /// Sets the world-space position of the given body.
    ///
    /// # Errors
    /// Returns [`OrbitError::UnknownBody`] if the body does not exist.
    pub fn set_position(&mut self, body: BodyHandle, position: Position) -> Result<(), OrbitError> {
        self.body_mut(body)?.position = position;
        Ok(())
    }

    /// Replaces the orbit of the given body. The body's parent becomes the
    /// parent of the new orbit.
    ///
    /// # Errors
    /// Returns an error if the body or the orbit's parent does not exist, or
    /// if the orbit would make the body orbit itself.
    pub fn replace_orbit(
        &mut self,
        body: BodyHandle,
        orbit: OrbitModel,
        mean_anomaly_at_epoch: fph,
    ) -> Result<(), OrbitError> {
        let parent = orbit.parent();
        if parent == body || !self.contains(parent) {
            return Err(OrbitError::MissingParent { parent });
        }
        let entry = self.body_mut(body)?;
        entry.parent = Some(parent);
        entry.orbit = Some(orbit);
        entry.mean_anomaly_at_epoch = mean_anomaly_at_epoch;
        Ok(())
    }

    /// Removes the orbit of the given body while keeping its parent, as
    /// happens while the orbit is being recomputed.
    ///
    /// # Errors
    /// Returns [`OrbitError::UnknownBody`] if the body does not exist.
    pub fn clear_orbit(&mut self, body: BodyHandle) -> Result<Option<OrbitModel>, OrbitError> {
        Ok(self.body_mut(body)?.orbit.take())
    }

    /// Returns the gravitational parameter of the given body.
    pub fn gravitational_parameter(&self, body: BodyHandle) -> Option<fph> {
        self.body(body).map(Body::gravitational_parameter)
    }

    /// Computes the radius of the sphere of influence of the given body using
    /// the Laplace approximation `a·(m/M)^(2/5)`, where `a` is the body's
    /// semi-major axis, `m` its mass and `M` the mass of its parent.
    ///
    /// # Returns
    /// [`None`] if the body does not exist, has no orbit or its parent is
    /// missing or massless. Such bodies (notably root stars) have no finite
    /// sphere of influence.
    pub fn soi_radius(&self, body: BodyHandle) -> Option<fph> {
        let body = self.body(body)?;
        let orbit = body.orbit()?;
        let parent = self.body(orbit.parent())?;
        if parent.mass <= 0.0 {
            return None;
        }
        Some(orbit.semi_major_axis() * (body.mass / parent.mass).powf(0.4))
    }

    fn body_mut(&mut self, body: BodyHandle) -> Result<&mut Body, OrbitError> {
        self.bodies
            .get_mut(body.0)
            .ok_or(OrbitError::UnknownBody { body })
    }
}
