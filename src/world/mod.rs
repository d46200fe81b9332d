//! The world: owns the graph, the bodies and the constraints, and steps them.
//!
//! Every topology change goes through [`KinematicWorld`]. A freshly created
//! body hangs below the graph root through its own anchor link; attaching a
//! constraint moves the driven body (B) below a new joint link owned by the
//! anchor body (A). A body can only be driven by one constraint: kinematic
//! loops are refused.

mod config;
mod urdf;

use std::fmt;

use tracing::{debug, warn};

use crate::body::{BodyMut, KinematicBody, SceneHandle};
use crate::constraint::{Constraint, ConstraintType};
use crate::error::KinematicError;
use crate::graph::Graph;
use crate::transform::Transform;

pub use config::WorldConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BodyId(pub(crate) u64);

impl BodyId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Body({})", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConstraintId(pub(crate) u64);

impl ConstraintId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConstraintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Constraint({})", self.0)
    }
}

#[derive(Debug)]
pub struct KinematicWorld {
    config: WorldConfig,
    graph: Graph,
    // insertion order is lookup and update order
    bodies: Vec<KinematicBody>,
    constraints: Vec<(ConstraintId, Constraint)>,
    next_body: u64,
    next_constraint: u64,
}

impl Default for KinematicWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl KinematicWorld {
    pub fn new() -> KinematicWorld {
        KinematicWorld {
            config: WorldConfig::default(),
            graph: Graph::new(),
            bodies: vec![],
            constraints: vec![],
            next_body: 0,
            next_constraint: 0,
        }
    }

    pub fn with_config(config: WorldConfig) -> Result<KinematicWorld, KinematicError> {
        config.validate()?;
        Ok(KinematicWorld {
            config,
            ..Self::new()
        })
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Register a scene node, or return the body already registered for it
    /// (same handle or same name).
    pub fn create_kinematic_body(
        &mut self,
        scene_node: SceneHandle,
    ) -> Result<BodyId, KinematicError> {
        if let Some(body) = self.body_by_scene_node(&scene_node) {
            return Ok(body.id());
        }
        let (name, seed) = {
            let scene = scene_node.borrow();
            (scene.name().to_owned(), scene.world_transform())
        };
        if let Some(body) = self.body_by_name(&name) {
            return Ok(body.id());
        }

        let (anchor, node) = self
            .graph
            .create_child(self.graph.root(), Transform::identity(), seed)?;
        let id = BodyId(self.next_body);
        self.next_body += 1;
        self.bodies.push(KinematicBody::new(id, node, scene_node));
        debug!(body = %id, name = %name, ?node, ?anchor, "created kinematic body");
        Ok(id)
    }

    pub fn body(&self, id: BodyId) -> Option<&KinematicBody> {
        self.bodies.iter().find(|b| b.id() == id)
    }

    pub fn body_mut(&mut self, id: BodyId) -> Option<BodyMut<'_>> {
        let body = self.bodies.iter_mut().find(|b| b.id() == id)?;
        Some(BodyMut::new(body, &mut self.graph))
    }

    pub fn body_by_name(&self, name: &str) -> Option<&KinematicBody> {
        self.bodies.iter().find(|b| b.name() == name)
    }

    pub fn body_by_scene_node(&self, scene_node: &SceneHandle) -> Option<&KinematicBody> {
        self.bodies.iter().find(|b| b.is_scene_node(scene_node))
    }

    pub fn bodies(&self) -> &[KinematicBody] {
        &self.bodies
    }

    pub fn body_world_transform(&self, id: BodyId) -> Result<Transform, KinematicError> {
        self.body(id)
            .ok_or(KinematicError::UnknownBody(id))?
            .world_transform(&self.graph)
    }

    /// Remove a body and every constraint it takes part in. Bodies it drove
    /// are re-anchored below the root and keep their world pose.
    pub fn remove_kinematic_body(&mut self, id: BodyId) -> Result<(), KinematicError> {
        let node = self.body(id).ok_or(KinematicError::UnknownBody(id))?.node();
        let involved: Vec<_> = self
            .constraints
            .iter()
            .filter(|(_, c)| c.involves(id))
            .map(|(cid, _)| *cid)
            .collect();
        for cid in involved {
            self.remove_constraint(cid)?;
        }
        if let Some(anchor) = self.graph.node(node).and_then(|n| n.parent()) {
            self.graph.remove_link(anchor)?;
        }
        self.bodies.retain(|b| b.id() != id);
        debug!(body = %id, "removed kinematic body");
        Ok(())
    }

    /// Bind `body_b` to `body_a` through a new joint link placed at
    /// `transform` in body A's frame.
    ///
    /// Precondition violations are errors. A topology conflict (body B is
    /// already driven by another constraint, or the attach would close a
    /// loop) is logged and yields `Ok(None)` with the graph untouched.
    pub fn create_constraint(
        &mut self,
        kind: ConstraintType,
        body_a: BodyId,
        body_b: BodyId,
        transform: &Transform,
    ) -> Result<Option<ConstraintId>, KinematicError> {
        if body_a == body_b {
            return Err(KinematicError::SelfConstraint { kind, body: body_a });
        }
        let node_a = self
            .body(body_a)
            .ok_or(KinematicError::UnknownBody(body_a))?
            .node();
        let node_b = self
            .body(body_b)
            .ok_or(KinematicError::UnknownBody(body_b))?
            .node();

        let root = self.graph.root();
        let parent = self.graph.node(node_b).and_then(|n| n.parent());
        if let Some(owner) = parent.and_then(|l| self.graph.link(l)).map(|l| l.parent()) {
            if owner != root {
                warn!(
                    ?kind,
                    %body_a,
                    %body_b,
                    "body already has a parent, kinematic loops are not supported; \
                     constraint not attached"
                );
                return Ok(None);
            }
        }
        if self.graph.node_is_ancestor(node_b, node_a) {
            warn!(
                ?kind,
                %body_a,
                %body_b,
                "constraint would close a kinematic loop; constraint not attached"
            );
            return Ok(None);
        }

        let world_a = self.graph.world_transform(node_a)?;
        let world_b = self.graph.world_transform(node_b)?;
        let link = self.graph.create_link(node_a, *transform)?;
        if let Some(anchor) = self.graph.set_node_parent(node_b, link)? {
            self.graph.remove_link(anchor)?;
        }

        let mut constraint = Constraint::new(kind, body_a, body_b);
        constraint.set_frames(*transform, world_b.inverse() * world_a * transform);
        constraint.bind_link(link)?;
        self.graph.set_link_initial_state(link)?;
        self.graph.set_node_initial_state(node_a)?;
        self.graph.set_node_initial_state(node_b)?;

        let id = ConstraintId(self.next_constraint);
        self.next_constraint += 1;
        self.constraints.push((id, constraint));
        debug!(constraint = %id, ?kind, %body_a, %body_b, ?link, "attached constraint");
        Ok(Some(id))
    }

    pub fn constraint(&self, id: ConstraintId) -> Option<&Constraint> {
        self.constraints
            .iter()
            .find(|(cid, _)| *cid == id)
            .map(|(_, c)| c)
    }

    pub fn constraint_mut(&mut self, id: ConstraintId) -> Option<&mut Constraint> {
        self.constraints
            .iter_mut()
            .find(|(cid, _)| *cid == id)
            .map(|(_, c)| c)
    }

    pub fn constraints(&self) -> impl Iterator<Item = (ConstraintId, &Constraint)> {
        self.constraints.iter().map(|(id, c)| (*id, c))
    }

    /// Slider offset or hinge angle of a constraint.
    pub fn constraint_position(&self, id: ConstraintId) -> Result<f64, KinematicError> {
        self.constraint(id)
            .ok_or(KinematicError::UnknownConstraint(id))?
            .position(&self.graph)
    }

    pub fn set_constraint_position(
        &mut self,
        id: ConstraintId,
        position: f64,
    ) -> Result<(), KinematicError> {
        let (_, constraint) = self
            .constraints
            .iter()
            .find(|(cid, _)| *cid == id)
            .ok_or(KinematicError::UnknownConstraint(id))?;
        constraint.set_position(&mut self.graph, position)
    }

    /// Detach a constraint. The driven body goes back below the root and
    /// keeps its world pose.
    pub fn remove_constraint(&mut self, id: ConstraintId) -> Result<(), KinematicError> {
        let index = self
            .constraints
            .iter()
            .position(|(cid, _)| *cid == id)
            .ok_or(KinematicError::UnknownConstraint(id))?;
        let (_, constraint) = self.constraints.remove(index);

        if let Some(link) = constraint.link() {
            let child = self.graph.link(link).and_then(|l| l.child());
            if let Some(node) = child {
                let anchor = self
                    .graph
                    .create_link(self.graph.root(), Transform::identity())?;
                self.graph.set_node_parent(node, anchor)?;
                self.graph.set_node_initial_state(node)?;
            }
            self.graph.remove_link(link)?;
        }
        debug!(constraint = %id, "removed constraint");
        Ok(())
    }

    /// Make `follower` rigidly follow the joint link of `constraint` without
    /// changing who owns it.
    pub fn add_auxiliary_parent(
        &mut self,
        follower: BodyId,
        constraint: ConstraintId,
    ) -> Result<bool, KinematicError> {
        let node = self
            .body(follower)
            .ok_or(KinematicError::UnknownBody(follower))?
            .node();
        let link = self
            .constraint(constraint)
            .and_then(Constraint::link)
            .ok_or(KinematicError::UnknownConstraint(constraint))?;
        self.graph.add_auxiliary_parent(node, link)
    }

    pub fn remove_auxiliary_parent(
        &mut self,
        follower: BodyId,
        constraint: ConstraintId,
    ) -> Result<bool, KinematicError> {
        let node = self
            .body(follower)
            .ok_or(KinematicError::UnknownBody(follower))?
            .node();
        let link = self
            .constraint(constraint)
            .and_then(Constraint::link)
            .ok_or(KinematicError::UnknownConstraint(constraint))?;
        Ok(self.graph.remove_auxiliary_parent(node, link))
    }

    /// Undo the last move of a body and its parent chain.
    pub fn pop_last_transform(&mut self, id: BodyId) -> Result<Transform, KinematicError> {
        self.body_mut(id)
            .ok_or(KinematicError::UnknownBody(id))?
            .pop_last_transform()
    }

    /// Snapshot the current pose of every node and link as its initial state.
    pub fn set_initial_state(&mut self) {
        self.graph.set_initial_state();
    }

    /// Put every node and link back to its initial state.
    pub fn reset(&mut self) {
        self.graph.reset();
    }

    /// Advance one tick: progress constraints, move auxiliary followers, then
    /// push every changed body outward.
    pub fn step(&mut self, dt: f64) -> Result<(), KinematicError> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(KinematicError::InvalidTimestep(dt));
        }
        for (_, constraint) in self.constraints.iter_mut() {
            constraint.solve(&mut self.graph, dt, &self.config)?;
        }
        if self.config.follow_auxiliary_parents {
            self.graph.follow_auxiliary_parents()?;
        }
        for body in self.bodies.iter_mut() {
            body.update(&self.graph)?;
        }
        Ok(())
    }
}
