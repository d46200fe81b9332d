//! Building a world from a URDF description.
//!
//! Every URDF link becomes a body backed by a [`DetachedNode`] placed at its
//! zero pose. Joints become constraints: revolute and continuous joints are
//! hinges, prismatic joints are sliders, fixed joints are fixed. Other joint
//! types are skipped.

use std::collections::HashMap;
use std::path::Path;

use nalgebra::{Unit, UnitQuaternion, Vector3};
use petgraph::{graphmap::DiGraphMap, visit::Bfs};
use tracing::{debug, warn};
use urdf_rs::{read_file, read_from_string, JointType, Robot};

use crate::body::DetachedNode;
use crate::constraint::ConstraintType;
use crate::error::KinematicError;
use crate::transform::{self, Transform};

use super::{BodyId, KinematicWorld};

impl KinematicWorld {
    pub fn from_urdf(path: impl AsRef<Path>) -> Result<KinematicWorld, KinematicError> {
        let robot = read_file(path)?;
        Self::from_robot(&robot)
    }

    pub fn from_urdf_str(xml: &str) -> Result<KinematicWorld, KinematicError> {
        let robot = read_from_string(xml)?;
        Self::from_robot(&robot)
    }

    pub fn from_robot(robot: &Robot) -> Result<KinematicWorld, KinematicError> {
        let mut world = KinematicWorld::new();
        world.load_robot(robot)?;
        Ok(world)
    }

    /// Add the links and joints of `robot` to this world.
    pub fn load_robot(&mut self, robot: &Robot) -> Result<Vec<BodyId>, KinematicError> {
        let index: HashMap<&str, usize> = robot
            .links
            .iter()
            .enumerate()
            .map(|(i, link)| (link.name.as_str(), i))
            .collect();

        // link index graph, edge weight is the joint index
        let mut graph = DiGraphMap::<usize, usize>::new();
        for i in 0..robot.links.len() {
            graph.add_node(i);
        }
        for (j, joint) in robot.joints.iter().enumerate() {
            let parent = link_index(&index, &joint.parent.link)?;
            let child = link_index(&index, &joint.child.link)?;
            if has_parent(&graph, child) {
                return Err(KinematicError::assembly(format!(
                    "link '{}' has more than one parent joint",
                    joint.child.link
                )));
            }
            graph.add_edge(parent, child, j);
        }

        let roots: Vec<usize> = (0..robot.links.len())
            .filter(|i| !has_parent(&graph, *i))
            .collect();
        if roots.is_empty() {
            return Err(KinematicError::assembly("no root link"));
        }

        // zero poses, breadth first from every root
        let mut order = vec![];
        let mut zero_pose: HashMap<usize, Transform> = HashMap::new();
        for root in roots {
            zero_pose.insert(root, Transform::identity());
            let mut bfs = Bfs::new(&graph, root);
            while let Some(link) = bfs.next(&graph) {
                let pose = zero_pose[&link];
                for (_, child, j) in graph.edges(link) {
                    zero_pose.insert(child, pose * origin_to_transform(&robot.joints[*j].origin));
                }
                order.push(link);
            }
        }
        if order.len() != robot.links.len() {
            return Err(KinematicError::assembly("joint graph contains a loop"));
        }

        let mut bodies = HashMap::new();
        for link in &order {
            let node = DetachedNode::new(robot.links[*link].name.clone(), zero_pose[link]);
            bodies.insert(*link, self.create_kinematic_body(node.shared())?);
        }

        for link in &order {
            for (parent, child, j) in graph.edges(*link) {
                let joint = &robot.joints[*j];
                let kind = match joint.joint_type {
                    JointType::Revolute | JointType::Continuous => ConstraintType::Hinge,
                    JointType::Prismatic => ConstraintType::Slider,
                    JointType::Fixed => ConstraintType::Fixed,
                    _ => {
                        warn!(
                            joint = %joint.name,
                            "unsupported joint type {:?}, skipped",
                            joint.joint_type
                        );
                        continue;
                    }
                };
                let frame = origin_to_transform(&joint.origin);
                let (a, b) = (bodies[&parent], bodies[&child]);
                let Some(id) = self.create_constraint(kind, a, b, &frame)? else {
                    continue;
                };
                let Some(constraint) = self.constraint_mut(id) else {
                    continue;
                };
                if kind != ConstraintType::Fixed {
                    match joint_axis(&joint.axis.xyz.0) {
                        Some(axis) => constraint.set_axis(axis),
                        None => warn!(joint = %joint.name, "zero joint axis, keeping +Z"),
                    }
                }
                if matches!(joint.joint_type, JointType::Revolute | JointType::Prismatic) {
                    constraint.set_limits(joint.limit.lower, joint.limit.upper);
                }
                debug!(joint = %joint.name, constraint = %id, ?kind, "loaded joint");
            }
        }

        Ok(order.iter().map(|link| bodies[link]).collect())
    }
}

fn link_index(index: &HashMap<&str, usize>, name: &str) -> Result<usize, KinematicError> {
    index
        .get(name)
        .copied()
        .ok_or_else(|| KinematicError::assembly(format!("joint refers to unknown link '{name}'")))
}

fn has_parent(graph: &DiGraphMap<usize, usize>, link: usize) -> bool {
    graph
        .neighbors_directed(link, petgraph::Direction::Incoming)
        .next()
        .is_some()
}

fn joint_axis(xyz: &[f64; 3]) -> Option<Unit<Vector3<f64>>> {
    Unit::try_new(Vector3::new(xyz[0], xyz[1], xyz[2]), f64::EPSILON)
}

fn origin_to_transform(origin: &urdf_rs::Pose) -> Transform {
    let rpy = origin.rpy.0;
    let xyz = origin.xyz.0;
    transform::from_parts(
        Vector3::new(xyz[0], xyz[1], xyz[2]),
        UnitQuaternion::from_euler_angles(rpy[0], rpy[1], rpy[2]),
    )
}
