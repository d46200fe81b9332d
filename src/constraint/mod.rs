//! Constraints binding two bodies to a shared link.
//!
//! The joint set is closed, so constraints are a plain struct holding the
//! state every joint shares plus a [`Joint`] sum type with the per-joint
//! actuator state. Body A is the anchor side (owns the link), body B is the
//! driven side (its node hangs below the link).

mod hinge;
mod slider;

use crate::error::KinematicError;
use crate::graph::{Graph, LinkId};
use crate::transform::{Axis, Transform};
use crate::world::{BodyId, WorldConfig};

pub use hinge::HingeConstraint;
pub use slider::SliderConstraint;

// below the precision of quaternion distance, treated as "at target"
const RESOLUTION: f64 = 1e-7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintType {
    Fixed,
    Slider,
    Hinge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Joint {
    /// No degrees of freedom; motion comes from outside the constraint.
    Fixed,
    Slider(SliderConstraint),
    Hinge(HingeConstraint),
}

impl Joint {
    pub fn new(kind: ConstraintType) -> Joint {
        match kind {
            ConstraintType::Fixed => Joint::Fixed,
            ConstraintType::Slider => Joint::Slider(SliderConstraint::default()),
            ConstraintType::Hinge => Joint::Hinge(HingeConstraint::default()),
        }
    }

    pub fn kind(&self) -> ConstraintType {
        match self {
            Joint::Fixed => ConstraintType::Fixed,
            Joint::Slider(_) => ConstraintType::Slider,
            Joint::Hinge(_) => ConstraintType::Hinge,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Constraint {
    body_a: BodyId,
    body_b: BodyId,
    link: Option<LinkId>,
    frame_a: Transform,
    frame_b: Transform,
    actuator: bool,
    joint: Joint,
}

impl Constraint {
    /// An unbound constraint; it does nothing until [`Constraint::bind_link`].
    pub fn new(kind: ConstraintType, body_a: BodyId, body_b: BodyId) -> Constraint {
        Constraint {
            body_a,
            body_b,
            link: None,
            frame_a: Transform::identity(),
            frame_b: Transform::identity(),
            actuator: false,
            joint: Joint::new(kind),
        }
    }

    pub fn body_a(&self) -> BodyId {
        self.body_a
    }

    pub fn body_b(&self) -> BodyId {
        self.body_b
    }

    pub fn involves(&self, body: BodyId) -> bool {
        self.body_a == body || self.body_b == body
    }

    pub fn kind(&self) -> ConstraintType {
        self.joint.kind()
    }

    pub fn joint(&self) -> &Joint {
        &self.joint
    }

    pub fn joint_mut(&mut self) -> &mut Joint {
        &mut self.joint
    }

    pub fn link(&self) -> Option<LinkId> {
        self.link
    }

    /// Joint frame in body A's local frame.
    pub fn frame_a(&self) -> &Transform {
        &self.frame_a
    }

    /// Joint frame in body B's local frame, captured at bind time.
    pub fn frame_b(&self) -> &Transform {
        &self.frame_b
    }

    pub(crate) fn set_frames(&mut self, frame_a: Transform, frame_b: Transform) {
        self.frame_a = frame_a;
        self.frame_b = frame_b;
    }

    /// Attach the constraint to its link. A constraint owns exactly one link
    /// for its whole life.
    pub fn bind_link(&mut self, link: LinkId) -> Result<(), KinematicError> {
        match self.link {
            Some(bound) => Err(KinematicError::AlreadyBound {
                bound,
                requested: link,
            }),
            None => {
                self.link = Some(link);
                Ok(())
            }
        }
    }

    pub fn is_actuator(&self) -> bool {
        self.actuator
    }

    pub fn set_actuator(&mut self, actuator: bool) {
        self.actuator = actuator;
    }

    pub fn velocity(&self) -> f64 {
        match &self.joint {
            Joint::Fixed => 0.0,
            Joint::Slider(s) => s.velocity(),
            Joint::Hinge(h) => h.velocity(),
        }
    }

    pub fn speed(&self) -> f64 {
        match &self.joint {
            Joint::Fixed => 0.0,
            Joint::Slider(s) => s.speed(),
            Joint::Hinge(h) => h.speed(),
        }
    }

    /// Signed target-seeking speed: the sign picks the lower or upper limit
    /// as the new target.
    pub fn set_velocity(&mut self, v: f64) {
        match &mut self.joint {
            Joint::Fixed => {}
            Joint::Slider(s) => s.set_velocity(v),
            Joint::Hinge(h) => h.set_velocity(v),
        }
    }

    pub fn add_velocity(&mut self, v: f64) {
        let velocity = self.velocity() + v;
        self.set_velocity(velocity);
    }

    pub fn target(&self) -> Option<f64> {
        match &self.joint {
            Joint::Fixed => None,
            Joint::Slider(s) => Some(s.target()),
            Joint::Hinge(h) => Some(h.target()),
        }
    }

    pub fn set_target(&mut self, target: f64) {
        match &mut self.joint {
            Joint::Fixed => {}
            Joint::Slider(s) => s.set_target(target),
            Joint::Hinge(h) => h.set_target(target),
        }
    }

    /// `None` for fixed joints and for free axes.
    pub fn limits(&self) -> Option<(f64, f64)> {
        match &self.joint {
            Joint::Fixed => None,
            Joint::Slider(s) => s.has_limits().then(|| s.limits()),
            Joint::Hinge(h) => h.has_limits().then(|| h.limits()),
        }
    }

    /// Set `lower > upper` to free the axis.
    pub fn set_limits(&mut self, lower: f64, upper: f64) {
        match &mut self.joint {
            Joint::Fixed => {}
            Joint::Slider(s) => s.set_limits(lower, upper),
            Joint::Hinge(h) => h.set_limits(lower, upper),
        }
    }

    pub fn axis(&self) -> Option<&Axis> {
        match &self.joint {
            Joint::Fixed => None,
            Joint::Slider(s) => Some(s.axis()),
            Joint::Hinge(h) => Some(h.axis()),
        }
    }

    /// Axis in the joint frame.
    pub fn set_axis(&mut self, axis: Axis) {
        match &mut self.joint {
            Joint::Fixed => {}
            Joint::Slider(s) => s.set_axis(axis),
            Joint::Hinge(h) => h.set_axis(axis),
        }
    }

    /// Slider offset or hinge angle relative to the initial state; zero for
    /// fixed or unbound constraints.
    pub fn position(&self, graph: &Graph) -> Result<f64, KinematicError> {
        let Some(id) = self.link else {
            return Ok(0.0);
        };
        let link = graph.link(id).ok_or(KinematicError::UnknownLink(id))?;
        Ok(match &self.joint {
            Joint::Fixed => 0.0,
            Joint::Slider(s) => s.position(link),
            Joint::Hinge(h) => h.angle(link),
        })
    }

    /// Jump straight to `position`, clamped into the limits.
    pub fn set_position(&self, graph: &mut Graph, position: f64) -> Result<(), KinematicError> {
        let Some(id) = self.link else {
            return Ok(());
        };
        match &self.joint {
            Joint::Fixed => Ok(()),
            Joint::Slider(s) => s.set_position(graph, id, position),
            Joint::Hinge(h) => h.set_angle(graph, id, position),
        }
    }

    /// Per-tick entry point.
    pub fn solve(
        &mut self,
        graph: &mut Graph,
        dt: f64,
        config: &WorldConfig,
    ) -> Result<(), KinematicError> {
        self.progress(graph, dt, config)
    }

    fn progress(
        &mut self,
        graph: &mut Graph,
        dt: f64,
        config: &WorldConfig,
    ) -> Result<(), KinematicError> {
        let Some(id) = self.link else {
            return Ok(());
        };
        if !self.actuator {
            return Ok(());
        }
        match &mut self.joint {
            Joint::Fixed => Ok(()),
            Joint::Slider(s) => s.progress(graph, id, dt),
            Joint::Hinge(h) => h.progress(
                graph,
                id,
                dt,
                config.epsilon,
                config.limit_tolerance_scale,
            ),
        }
    }
}
