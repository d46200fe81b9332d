//! Bodies: the bridge between graph nodes and the outside world.
//!
//! A [`KinematicBody`] owns one graph node and mirrors its world pose onto an
//! external scene node and, optionally, a physics motion state. Poses only
//! flow outward, except when the body is created and its node is seeded from
//! the scene node.

use std::cell::RefCell;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use nalgebra::{UnitQuaternion, Vector3};
use tracing::trace;

use crate::error::KinematicError;
use crate::graph::{Graph, NodeId};
use crate::transform::Transform;
use crate::world::BodyId;

/// Rendering-side node a body mirrors into.
pub trait SceneNode {
    fn name(&self) -> &str;
    fn world_transform(&self) -> Transform;
    fn set_world_transform(&mut self, transform: &Transform);
}

/// Physics-side proxy (usually a kinematic collision object).
pub trait MotionState {
    fn world_transform(&self) -> Transform;
    fn set_world_transform(&mut self, transform: &Transform);
}

pub type SceneHandle = Rc<RefCell<dyn SceneNode>>;
pub type MotionHandle = Rc<RefCell<dyn MotionState>>;

/// Change listener, called with the body's new world pose.
pub type Listener = Box<dyn FnMut(&Transform)>;

/// A scene node with nothing behind it but its own pose.
#[derive(Debug, Clone, PartialEq)]
pub struct DetachedNode {
    name: String,
    transform: Transform,
}

impl DetachedNode {
    pub fn new(name: impl Into<String>, transform: Transform) -> DetachedNode {
        DetachedNode {
            name: name.into(),
            transform,
        }
    }

    pub fn shared(self) -> Rc<RefCell<DetachedNode>> {
        Rc::new(RefCell::new(self))
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }
}

impl SceneNode for DetachedNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn world_transform(&self) -> Transform {
        self.transform
    }

    fn set_world_transform(&mut self, transform: &Transform) {
        self.transform = *transform;
    }
}

impl MotionState for DetachedNode {
    fn world_transform(&self) -> Transform {
        self.transform
    }

    fn set_world_transform(&mut self, transform: &Transform) {
        self.transform = *transform;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BodyFlags {
    /// Never push anything outward.
    pub disable_updates: bool,
    /// Skip the pose comparison on ticks where the graph did not change.
    pub use_dirty_only: bool,
    /// The external handles already hold the body's pose, so the first
    /// update does not force a push.
    pub assume_in_world: bool,
}

pub struct KinematicBody {
    id: BodyId,
    name: String,
    node: NodeId,
    scene_node: SceneHandle,
    motion_state: Option<MotionHandle>,
    flags: BodyFlags,
    listeners: Vec<Listener>,
    last_pushed: Option<Transform>,
    seen_revision: Option<u64>,
}

impl fmt::Debug for KinematicBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KinematicBody")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("node", &self.node)
            .field("flags", &self.flags)
            .field("listeners", &self.listeners.len())
            .field("last_pushed", &self.last_pushed)
            .finish_non_exhaustive()
    }
}

impl KinematicBody {
    pub(crate) fn new(id: BodyId, node: NodeId, scene_node: SceneHandle) -> KinematicBody {
        let name = scene_node.borrow().name().to_owned();
        KinematicBody {
            id,
            name,
            node,
            scene_node,
            motion_state: None,
            flags: BodyFlags::default(),
            listeners: vec![],
            last_pushed: None,
            seen_revision: None,
        }
    }

    pub fn id(&self) -> BodyId {
        self.id
    }

    /// Name of the scene node, captured at creation.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn scene_node(&self) -> &SceneHandle {
        &self.scene_node
    }

    pub fn is_scene_node(&self, scene_node: &SceneHandle) -> bool {
        Rc::ptr_eq(&self.scene_node, scene_node)
    }

    pub fn motion_state(&self) -> Option<&MotionHandle> {
        self.motion_state.as_ref()
    }

    /// Attach or replace the physics proxy. The next update pushes to it.
    pub fn set_motion_state(&mut self, motion_state: MotionHandle) {
        self.motion_state = Some(motion_state);
        self.last_pushed = None;
        self.seen_revision = None;
    }

    pub fn flags(&self) -> BodyFlags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: BodyFlags) {
        self.flags = flags;
    }

    pub fn add_listener(&mut self, listener: impl FnMut(&Transform) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// The pose most recently pushed outward.
    pub fn last_pushed(&self) -> Option<&Transform> {
        self.last_pushed.as_ref()
    }

    pub fn world_transform(&self, graph: &Graph) -> Result<Transform, KinematicError> {
        graph.world_transform(self.node)
    }

    fn notify(&mut self, transform: &Transform) {
        for listener in self.listeners.iter_mut() {
            listener(transform);
        }
    }

    /// Push the node's world pose outward if it changed since the last push.
    ///
    /// Returns whether anything was pushed.
    pub fn update(&mut self, graph: &Graph) -> Result<bool, KinematicError> {
        if self.flags.disable_updates {
            return Ok(false);
        }
        if self.flags.use_dirty_only && self.seen_revision == Some(graph.revision()) {
            return Ok(false);
        }
        self.seen_revision = Some(graph.revision());

        let world = graph.world_transform(self.node)?;
        match self.last_pushed {
            None if self.flags.assume_in_world => {
                self.last_pushed = Some(world);
                return Ok(false);
            }
            Some(last) if last == world => return Ok(false),
            _ => {}
        }

        if let Some(motion_state) = &self.motion_state {
            motion_state.borrow_mut().set_world_transform(&world);
        }
        self.scene_node.borrow_mut().set_world_transform(&world);
        self.notify(&world);
        self.last_pushed = Some(world);
        trace!(body = %self.id, name = %self.name, "pushed pose");
        Ok(true)
    }
}

/// Mutable access to a body together with the graph its node lives in.
pub struct BodyMut<'w> {
    body: &'w mut KinematicBody,
    graph: &'w mut Graph,
}

impl<'w> BodyMut<'w> {
    pub(crate) fn new(body: &'w mut KinematicBody, graph: &'w mut Graph) -> BodyMut<'w> {
        BodyMut { body, graph }
    }

    pub fn world_transform(&self) -> Result<Transform, KinematicError> {
        self.body.world_transform(self.graph)
    }

    fn changed(&mut self) -> Result<Transform, KinematicError> {
        let world = self.graph.world_transform(self.body.node)?;
        self.body.notify(&world);
        Ok(world)
    }

    /// Translate in the parent frame.
    pub fn translate(&mut self, offset: &Vector3<f64>) -> Result<Transform, KinematicError> {
        self.graph.translate_node(self.body.node, offset)?;
        self.changed()
    }

    /// Rotate in the body's own frame.
    pub fn rotate(&mut self, q: &UnitQuaternion<f64>) -> Result<Transform, KinematicError> {
        self.graph.rotate_node(self.body.node, q)?;
        self.changed()
    }

    /// Compose `transform` onto the local transform.
    pub fn transform(&mut self, transform: &Transform) -> Result<Transform, KinematicError> {
        self.graph.transform_node(self.body.node, transform)?;
        self.changed()
    }

    pub fn set_world_transform(
        &mut self,
        transform: &Transform,
    ) -> Result<Transform, KinematicError> {
        self.graph.set_world_transform(self.body.node, transform)?;
        self.changed()
    }

    pub fn set_position(&mut self, position: &Vector3<f64>) -> Result<Transform, KinematicError> {
        let mut world = self.world_transform()?;
        world.translation.vector = *position;
        self.set_world_transform(&world)
    }

    pub fn set_orientation(
        &mut self,
        q: &UnitQuaternion<f64>,
    ) -> Result<Transform, KinematicError> {
        let mut world = self.world_transform()?;
        world.rotation = *q;
        self.set_world_transform(&world)
    }

    /// Undo the last move of the body and of its parent chain, e.g. after the
    /// collision side reported a penetration.
    pub fn pop_last_transform(&mut self) -> Result<Transform, KinematicError> {
        self.graph.pop_last_transform(self.body.node)?;
        self.changed()
    }

    pub fn update(&mut self) -> Result<bool, KinematicError> {
        self.body.update(self.graph)
    }
}

impl Deref for BodyMut<'_> {
    type Target = KinematicBody;

    fn deref(&self) -> &Self::Target {
        self.body
    }
}

impl DerefMut for BodyMut<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.body
    }
}
