use nalgebra::{UnitQuaternion, Vector3};

use crate::transform::{self, Transform};

use super::{LinkId, NodeId};

/// The edge between a parent node and its single child node.
///
/// `transform` is the joint's current offset in the parent node's frame.
/// `initial_transform` is the zero point actuators measure from and the pose
/// [`Graph::reset_link`](super::Graph::reset_link) restores.
#[derive(Debug, Clone)]
pub struct Link {
    pub(crate) id: LinkId,
    pub(crate) transform: Transform,
    pub(crate) initial_transform: Transform,
    pub(crate) last_transform: Transform,
    pub(crate) parent: NodeId,
    pub(crate) child: Option<NodeId>,
}

impl Link {
    pub(crate) fn new(id: LinkId, parent: NodeId, transform: Transform) -> Link {
        Link {
            id,
            transform,
            initial_transform: transform,
            last_transform: transform,
            parent,
            child: None,
        }
    }

    pub fn id(&self) -> LinkId {
        self.id
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn initial_transform(&self) -> &Transform {
        &self.initial_transform
    }

    pub fn last_transform(&self) -> &Transform {
        &self.last_transform
    }

    pub fn parent(&self) -> NodeId {
        self.parent
    }

    pub fn child(&self) -> Option<NodeId> {
        self.child
    }

    pub fn position(&self) -> Vector3<f64> {
        self.transform.translation.vector
    }

    pub fn orientation(&self) -> UnitQuaternion<f64> {
        self.transform.rotation
    }

    pub(crate) fn set_transform(&mut self, transform: Transform) {
        self.last_transform = self.transform;
        self.transform = transform;
    }

    /// Translate in the parent node's frame.
    pub(crate) fn translate(&mut self, offset: &Vector3<f64>) {
        let mut t = self.transform;
        t.translation.vector += offset;
        self.set_transform(t);
    }

    /// Rotate in the link's own frame.
    pub(crate) fn rotate(&mut self, q: &UnitQuaternion<f64>) {
        let mut t = self.transform;
        t.rotation *= q;
        self.set_transform(t);
    }

    /// Orientation relative to the initial joint frame, never relative to the
    /// current one, so repeated calls do not drift.
    pub(crate) fn set_orientation(&mut self, q: &UnitQuaternion<f64>) {
        let t = transform::from_parts(
            self.initial_transform.translation.vector,
            self.initial_transform.rotation * q,
        );
        self.set_transform(t);
    }

    pub(crate) fn pop_last_transform(&mut self) {
        self.transform = self.last_transform;
    }

    pub(crate) fn set_initial_state(&mut self) {
        self.initial_transform = self.transform;
    }

    pub(crate) fn reset(&mut self) {
        self.set_transform(self.initial_transform);
    }
}
