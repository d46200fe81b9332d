//! # kinegraph is a kinematic transform graph for mechanical assemblies.
//! Hinges, sliders and fixed joints are animated without rigid-body dynamics,
//! and every body's pose is mirrored onto external scene and physics handles.

// #![deny(missing_docs)]
#![deny(unsafe_code)]

mod body;
mod constraint;
mod error;
mod graph;
mod transform;
mod world;

pub use body::{
    BodyFlags, BodyMut, DetachedNode, KinematicBody, Listener, MotionHandle, MotionState,
    SceneHandle, SceneNode,
};
pub use constraint::{Constraint, ConstraintType, HingeConstraint, Joint, SliderConstraint};
pub use error::KinematicError;
pub use graph::{Graph, Link, LinkId, Node, NodeId};
pub use transform::{
    axis_angle, from_orientation, from_parts, from_position, quaternion_distance, Axis,
    Transform, EPSILON,
};
pub use world::{BodyId, ConstraintId, KinematicWorld, WorldConfig};
