//! Error types for graph and world operations.

use thiserror::Error;

use crate::constraint::ConstraintType;
use crate::graph::{LinkId, NodeId};
use crate::world::{BodyId, ConstraintId};

/// Precondition violations reported by the graph, constraints and the world.
///
/// Topology conflicts while attaching a constraint are not errors: they are
/// logged and the attach returns no constraint.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum KinematicError {
    #[error("unknown body: {0}")]
    UnknownBody(BodyId),

    #[error("unknown constraint: {0}")]
    UnknownConstraint(ConstraintId),

    #[error("unknown node: {0:?}")]
    UnknownNode(NodeId),

    #[error("unknown link: {0:?}")]
    UnknownLink(LinkId),

    /// A constraint between a body and itself was requested.
    #[error("cannot create a {kind:?} constraint between {body} and itself")]
    SelfConstraint { kind: ConstraintType, body: BodyId },

    /// `bind_link` was called on a constraint that already owns a link.
    #[error("constraint is already bound to link {bound:?}, refusing {requested:?}")]
    AlreadyBound { bound: LinkId, requested: LinkId },

    /// A topology change would make an element its own ancestor.
    #[error("connecting {node:?} and {link:?} would create a cycle")]
    Cycle { node: NodeId, link: LinkId },

    /// A link owns a single child and already has a different one.
    #[error("{link:?} already owns {child:?}")]
    LinkOccupied { link: LinkId, child: NodeId },

    /// The root node can not be moved under another link.
    #[error("the root node can not be re-parented")]
    RootReparent,

    #[error("invalid timestep: {0} (must be finite and non-negative)")]
    InvalidTimestep(f64),

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("failed to load assembly: {reason}")]
    Assembly { reason: String },
}

impl KinematicError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an assembly loading error.
    #[must_use]
    pub fn assembly(reason: impl Into<String>) -> Self {
        Self::Assembly {
            reason: reason.into(),
        }
    }
}

impl From<urdf_rs::UrdfError> for KinematicError {
    fn from(e: urdf_rs::UrdfError) -> Self {
        Self::assembly(e.to_string())
    }
}
