use std::collections::HashMap;

use crate::transform::Transform;

use super::{LinkId, NodeId};

/// A point in the kinematic tree.
///
/// The world pose of a node is `parent_link_world * transform`, or just
/// `transform` for the root. Nodes are only mutated through [`Graph`](super::Graph)
/// so that ownership and the change counter stay consistent.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) transform: Transform,
    pub(crate) last_transform: Transform,
    pub(crate) initial_transform: Transform,
    pub(crate) parent: Option<LinkId>,
    pub(crate) children: Vec<LinkId>,
    // auxiliary parent -> its world pose when this node last followed it
    pub(crate) auxiliary_parents: HashMap<LinkId, Transform>,
}

impl Node {
    pub(crate) fn new(id: NodeId, transform: Transform) -> Node {
        Node {
            id,
            transform,
            last_transform: transform,
            initial_transform: transform,
            parent: None,
            children: vec![],
            auxiliary_parents: HashMap::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Local transform relative to the parent link.
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Local transform before the most recent mutation.
    pub fn last_transform(&self) -> &Transform {
        &self.last_transform
    }

    pub fn initial_transform(&self) -> &Transform {
        &self.initial_transform
    }

    pub fn parent(&self) -> Option<LinkId> {
        self.parent
    }

    pub fn children(&self) -> &[LinkId] {
        &self.children
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn auxiliary_parents(&self) -> impl Iterator<Item = LinkId> + '_ {
        self.auxiliary_parents.keys().copied()
    }

    pub(crate) fn set_transform(&mut self, transform: Transform) {
        self.last_transform = self.transform;
        self.transform = transform;
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
