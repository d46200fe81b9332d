//! Transform graph: nodes connected by links, owned as a strict tree.
//!
//! Nodes and links are stored in arenas keyed by stable ids. Ownership is
//! mirrored in a `petgraph` topology (node -> child link -> child node) which
//! is used for ancestry checks and sub-tree removal. Every element has at most
//! one incoming edge, so the topology is always a tree rooted at [`Graph::root`].
//!
//! World poses are never cached: every query walks the parent chain.

mod link;
mod node;

use std::collections::{HashMap, HashSet};

use nalgebra::{UnitQuaternion, Vector3};
use petgraph::{graphmap::DiGraphMap, visit::Bfs, Direction};
use tracing::debug;

use crate::error::KinematicError;
use crate::transform::Transform;

pub use link::Link;
pub use node::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinkId(usize);

impl LinkId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Element {
    Node(NodeId),
    Link(LinkId),
}

type Topology = DiGraphMap<Element, ()>;

struct BfsIter<'a> {
    graph: &'a Topology,
    bfs: Bfs<Element, HashSet<Element>>,
}

impl<'a> Iterator for BfsIter<'a> {
    type Item = Element;

    fn next(&mut self) -> Option<Self::Item> {
        self.bfs.next(self.graph)
    }
}

#[derive(Debug, Clone)]
pub struct Graph {
    topology: Topology,
    nodes: HashMap<NodeId, Node>,
    links: HashMap<LinkId, Link>,
    root: NodeId,
    next_index: usize,
    // bumped on every mutation, lets bodies skip unchanged ticks
    revision: u64,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    pub fn new() -> Graph {
        let root = NodeId(0);
        let mut topology = DiGraphMap::new();
        topology.add_node(Element::Node(root));
        let mut nodes = HashMap::new();
        nodes.insert(root, Node::new(root, Transform::identity()));
        Graph {
            topology,
            nodes,
            links: HashMap::new(),
            root,
            next_index: 1,
            revision: 0,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Nodes in breadth-first order from the root.
    pub fn nodes(&self) -> Vec<NodeId> {
        self.subtree(Element::Node(self.root))
            .into_iter()
            .filter_map(|e| match e {
                Element::Node(id) => Some(id),
                Element::Link(_) => None,
            })
            .collect()
    }

    fn node_ref(&self, id: NodeId) -> Result<&Node, KinematicError> {
        self.nodes.get(&id).ok_or(KinematicError::UnknownNode(id))
    }

    fn node_entry(&mut self, id: NodeId) -> Result<&mut Node, KinematicError> {
        self.nodes.get_mut(&id).ok_or(KinematicError::UnknownNode(id))
    }

    fn link_ref(&self, id: LinkId) -> Result<&Link, KinematicError> {
        self.links.get(&id).ok_or(KinematicError::UnknownLink(id))
    }

    fn link_entry(&mut self, id: LinkId) -> Result<&mut Link, KinematicError> {
        self.links.get_mut(&id).ok_or(KinematicError::UnknownLink(id))
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    fn parent_element(&self, element: Element) -> Option<Element> {
        self.topology
            .neighbors_directed(element, Direction::Incoming)
            .next()
    }

    fn is_ancestor(&self, ancestor: Element, of: Element) -> bool {
        let mut current = self.parent_element(of);
        while let Some(element) = current {
            if element == ancestor {
                return true;
            }
            current = self.parent_element(element);
        }
        false
    }

    fn subtree(&self, start: Element) -> Vec<Element> {
        let iter = BfsIter {
            graph: &self.topology,
            bfs: Bfs::new(&self.topology, start),
        };
        iter.collect()
    }

    /// True when `ancestor` lies on the parent chain of `node`.
    pub fn node_is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.is_ancestor(Element::Node(ancestor), Element::Node(node))
    }

    /// True when `link` lies on the parent chain of `node`.
    pub fn link_is_ancestor(&self, link: LinkId, node: NodeId) -> bool {
        self.is_ancestor(Element::Link(link), Element::Node(node))
    }

    /// Number of links between `node` and the root.
    pub fn depth(&self, node: NodeId) -> Result<usize, KinematicError> {
        let mut depth = 0;
        let mut current = self.node_ref(node)?;
        while let Some(link) = current.parent {
            depth += 1;
            current = self.node_ref(self.link_ref(link)?.parent)?;
        }
        Ok(depth)
    }

    fn alloc_node(&mut self, transform: Transform) -> NodeId {
        let id = NodeId(self.next_index);
        self.next_index += 1;
        self.nodes.insert(id, Node::new(id, transform));
        self.topology.add_node(Element::Node(id));
        id
    }

    // raw ownership edge, callers validate both ends and re-anchor
    fn bind_child(&mut self, link: LinkId, node: NodeId) -> Result<(), KinematicError> {
        self.link_entry(link)?.child = Some(node);
        self.node_entry(node)?.parent = Some(link);
        self.topology
            .add_edge(Element::Link(link), Element::Node(node), ());
        Ok(())
    }

    fn detach_node(&mut self, node: NodeId) -> Result<Option<LinkId>, KinematicError> {
        let previous = self.node_entry(node)?.parent.take();
        if let Some(link) = previous {
            self.link_entry(link)?.child = None;
            self.topology
                .remove_edge(Element::Link(link), Element::Node(node));
        }
        Ok(previous)
    }

    /// Create a childless link under `parent` with the given local transform.
    ///
    /// The link only becomes part of a chain once a node is attached to it
    /// with [`Graph::set_link_child`].
    pub fn create_link(
        &mut self,
        parent: NodeId,
        transform: Transform,
    ) -> Result<LinkId, KinematicError> {
        self.node_ref(parent)?;
        let id = LinkId(self.next_index);
        self.next_index += 1;
        self.links.insert(id, Link::new(id, parent, transform));
        self.topology
            .add_edge(Element::Node(parent), Element::Link(id), ());
        self.node_entry(parent)?.children.push(id);
        self.touch();
        debug!(?id, ?parent, "created link");
        Ok(id)
    }

    /// Create a link under `parent` and a new node owned by it.
    pub fn create_child(
        &mut self,
        parent: NodeId,
        link_transform: Transform,
        node_transform: Transform,
    ) -> Result<(LinkId, NodeId), KinematicError> {
        let link = self.create_link(parent, link_transform)?;
        let node = self.alloc_node(node_transform);
        self.bind_child(link, node)?;
        debug!(?node, ?link, "created node");
        Ok((link, node))
    }

    /// World pose of a node: every ancestor's local transform composed
    /// right-to-left.
    pub fn world_transform(&self, node: NodeId) -> Result<Transform, KinematicError> {
        let mut current = self.node_ref(node)?;
        let mut pose = current.transform;
        while let Some(link_id) = current.parent {
            let link = self.link_ref(link_id)?;
            current = self.node_ref(link.parent)?;
            pose = current.transform * link.transform * pose;
        }
        Ok(pose)
    }

    pub fn link_world_transform(&self, link: LinkId) -> Result<Transform, KinematicError> {
        let link = self.link_ref(link)?;
        Ok(self.world_transform(link.parent)? * link.transform)
    }

    fn parent_world_transform(&self, node: NodeId) -> Result<Transform, KinematicError> {
        match self.node_ref(node)?.parent {
            Some(link) => self.link_world_transform(link),
            None => Ok(Transform::identity()),
        }
    }

    /// Store the local transform that places `node` at `transform` in world space.
    pub fn set_world_transform(
        &mut self,
        node: NodeId,
        transform: &Transform,
    ) -> Result<(), KinematicError> {
        let parent = self.parent_world_transform(node)?;
        self.node_entry(node)?
            .set_transform(parent.inverse() * transform);
        self.touch();
        Ok(())
    }

    pub fn set_link_world_transform(
        &mut self,
        link: LinkId,
        transform: &Transform,
    ) -> Result<(), KinematicError> {
        let parent = self.world_transform(self.link_ref(link)?.parent)?;
        self.link_entry(link)?
            .set_transform(parent.inverse() * transform);
        self.touch();
        Ok(())
    }

    /// Move `node` under `link`, keeping its world pose.
    ///
    /// Returns the link that owned the node before; it is left childless.
    pub fn set_link_child(
        &mut self,
        link: LinkId,
        node: NodeId,
    ) -> Result<Option<LinkId>, KinematicError> {
        if node == self.root {
            return Err(KinematicError::RootReparent);
        }
        self.node_ref(node)?;
        match self.link_ref(link)?.child {
            Some(child) if child == node => return Ok(None),
            Some(child) => return Err(KinematicError::LinkOccupied { link, child }),
            None => {}
        }
        if self.is_ancestor(Element::Node(node), Element::Link(link)) {
            return Err(KinematicError::Cycle { node, link });
        }

        let world = self.world_transform(node)?;
        let previous = self.detach_node(node)?;
        self.bind_child(link, node)?;
        self.set_world_transform(node, &world)?;
        debug!(?node, ?link, ?previous, "re-anchored node");
        Ok(previous)
    }

    /// Same as [`Graph::set_link_child`], seen from the node.
    pub fn set_node_parent(
        &mut self,
        node: NodeId,
        link: LinkId,
    ) -> Result<Option<LinkId>, KinematicError> {
        self.set_link_child(link, node)
    }

    /// Move `link` (and everything below it) under `node`, keeping its world pose.
    pub fn set_link_parent(&mut self, link: LinkId, node: NodeId) -> Result<(), KinematicError> {
        self.node_ref(node)?;
        let previous = self.link_ref(link)?.parent;
        if previous == node {
            return Ok(());
        }
        if self.is_ancestor(Element::Link(link), Element::Node(node)) {
            return Err(KinematicError::Cycle { node, link });
        }

        let world = self.link_world_transform(link)?;
        self.node_entry(previous)?.children.retain(|c| *c != link);
        self.topology
            .remove_edge(Element::Node(previous), Element::Link(link));
        self.node_entry(node)?.children.push(link);
        self.topology
            .add_edge(Element::Node(node), Element::Link(link), ());
        self.link_entry(link)?.parent = node;
        self.set_link_world_transform(link, &world)?;
        debug!(?link, ?previous, ?node, "re-anchored link");
        Ok(())
    }

    /// Remove `link` together with every node and link it owns.
    ///
    /// Returns the removed nodes.
    pub fn remove_link(&mut self, link: LinkId) -> Result<Vec<NodeId>, KinematicError> {
        let parent = self.link_ref(link)?.parent;
        let subtree = self.subtree(Element::Link(link));

        let mut removed_nodes = vec![];
        let mut removed_links = HashSet::new();
        for element in subtree {
            self.topology.remove_node(element);
            match element {
                Element::Node(id) => {
                    self.nodes.remove(&id);
                    removed_nodes.push(id);
                }
                Element::Link(id) => {
                    self.links.remove(&id);
                    removed_links.insert(id);
                }
            }
        }
        self.node_entry(parent)?.children.retain(|c| *c != link);
        for node in self.nodes.values_mut() {
            node.auxiliary_parents
                .retain(|l, _| !removed_links.contains(l));
        }
        self.touch();
        debug!(?link, nodes = removed_nodes.len(), "removed link");
        Ok(removed_nodes)
    }

    pub fn set_node_transform(
        &mut self,
        node: NodeId,
        transform: &Transform,
    ) -> Result<(), KinematicError> {
        self.node_entry(node)?.set_transform(*transform);
        self.touch();
        Ok(())
    }

    /// Translate a node in its parent link's frame.
    pub fn translate_node(
        &mut self,
        node: NodeId,
        offset: &Vector3<f64>,
    ) -> Result<(), KinematicError> {
        let mut t = *self.node_ref(node)?.transform();
        t.translation.vector += offset;
        self.set_node_transform(node, &t)
    }

    /// Rotate a node in its own frame.
    pub fn rotate_node(
        &mut self,
        node: NodeId,
        q: &UnitQuaternion<f64>,
    ) -> Result<(), KinematicError> {
        let mut t = *self.node_ref(node)?.transform();
        t.rotation *= q;
        self.set_node_transform(node, &t)
    }

    /// Compose `transform` onto the node's local transform.
    pub fn transform_node(
        &mut self,
        node: NodeId,
        transform: &Transform,
    ) -> Result<(), KinematicError> {
        let t = self.node_ref(node)?.transform() * transform;
        self.set_node_transform(node, &t)
    }

    pub fn set_link_transform(
        &mut self,
        link: LinkId,
        transform: &Transform,
    ) -> Result<(), KinematicError> {
        self.link_entry(link)?.set_transform(*transform);
        self.touch();
        Ok(())
    }

    pub fn translate_link(
        &mut self,
        link: LinkId,
        offset: &Vector3<f64>,
    ) -> Result<(), KinematicError> {
        self.link_entry(link)?.translate(offset);
        self.touch();
        Ok(())
    }

    pub fn rotate_link(
        &mut self,
        link: LinkId,
        q: &UnitQuaternion<f64>,
    ) -> Result<(), KinematicError> {
        self.link_entry(link)?.rotate(q);
        self.touch();
        Ok(())
    }

    /// Orient the link relative to its initial joint frame.
    pub fn set_link_orientation(
        &mut self,
        link: LinkId,
        q: &UnitQuaternion<f64>,
    ) -> Result<(), KinematicError> {
        self.link_entry(link)?.set_orientation(q);
        self.touch();
        Ok(())
    }

    pub fn set_link_initial_state(&mut self, link: LinkId) -> Result<(), KinematicError> {
        self.link_entry(link)?.set_initial_state();
        Ok(())
    }

    pub fn reset_link(&mut self, link: LinkId) -> Result<(), KinematicError> {
        self.link_entry(link)?.reset();
        self.touch();
        Ok(())
    }

    pub fn set_node_initial_state(&mut self, node: NodeId) -> Result<(), KinematicError> {
        self.node_entry(node)?.set_initial_state();
        Ok(())
    }

    pub fn reset_node(&mut self, node: NodeId) -> Result<(), KinematicError> {
        self.node_entry(node)?.reset();
        self.touch();
        Ok(())
    }

    /// Snapshot every node and link as its initial state.
    pub fn set_initial_state(&mut self) {
        self.nodes.values_mut().for_each(Node::set_initial_state);
        self.links.values_mut().for_each(Link::set_initial_state);
    }

    /// Restore every node and link to its initial state.
    pub fn reset(&mut self) {
        self.nodes.values_mut().for_each(Node::reset);
        self.links.values_mut().for_each(Link::reset);
        self.touch();
    }

    /// Undo the last local mutation of `node` and of every link and node on
    /// its parent chain.
    pub fn pop_last_transform(&mut self, node: NodeId) -> Result<(), KinematicError> {
        let mut current = Some(node);
        while let Some(id) = current {
            let node = self.node_entry(id)?;
            node.pop_last_transform();
            let parent = node.parent;
            current = match parent {
                Some(link) => {
                    let link = self.link_entry(link)?;
                    link.pop_last_transform();
                    Some(link.parent)
                }
                None => None,
            };
        }
        self.touch();
        Ok(())
    }

    /// Register `node` as a follower of `link` without changing ownership.
    ///
    /// Returns `false` when the link is already on the node's parent chain,
    /// in which case the node follows it anyway.
    pub fn add_auxiliary_parent(
        &mut self,
        node: NodeId,
        link: LinkId,
    ) -> Result<bool, KinematicError> {
        self.node_ref(node)?;
        self.link_ref(link)?;
        if self.is_ancestor(Element::Node(node), Element::Link(link)) {
            return Err(KinematicError::Cycle { node, link });
        }
        if self.is_ancestor(Element::Link(link), Element::Node(node)) {
            return Ok(false);
        }
        let link_world = self.link_world_transform(link)?;
        self.node_entry(node)?
            .auxiliary_parents
            .insert(link, link_world);
        Ok(true)
    }

    pub fn remove_auxiliary_parent(&mut self, node: NodeId, link: LinkId) -> bool {
        self.nodes
            .get_mut(&node)
            .map(|n| n.auxiliary_parents.remove(&link).is_some())
            .unwrap_or(false)
    }

    /// Nodes following `link` as an auxiliary parent, ordered by id.
    pub fn auxiliary_followers(&self, link: LinkId) -> Vec<NodeId> {
        let mut followers: Vec<_> = self
            .nodes
            .values()
            .filter(|n| n.auxiliary_parents.contains_key(&link))
            .map(|n| n.id)
            .collect();
        followers.sort();
        followers
    }

    /// Move every follower by the motion its auxiliary parents made since the
    /// last call. Returns the number of nodes moved.
    pub fn follow_auxiliary_parents(&mut self) -> Result<usize, KinematicError> {
        let mut followers: Vec<_> = self
            .nodes
            .values()
            .filter(|n| !n.auxiliary_parents.is_empty())
            .map(|n| n.id)
            .collect();
        followers.sort();

        let mut moved = 0;
        for id in followers {
            let mut parents: Vec<(LinkId, Transform)> = self
                .node_ref(id)?
                .auxiliary_parents
                .iter()
                .map(|(l, t)| (*l, *t))
                .collect();
            parents.sort_by_key(|(l, _)| *l);

            let mut followed = false;
            for (link, last) in parents {
                let now = self.link_world_transform(link)?;
                if now == last {
                    continue;
                }
                let world = self.world_transform(id)?;
                self.set_world_transform(id, &(now * last.inverse() * world))?;
                self.node_entry(id)?.auxiliary_parents.insert(link, now);
                followed = true;
            }
            if followed {
                moved += 1;
            }
        }
        Ok(moved)
    }
}
