use approx::relative_eq;
use core::f64::consts::FRAC_PI_2;
use kinegraph::{
    from_parts, ConstraintType, DetachedNode, Graph, KinematicWorld, NodeId, Transform,
    EPSILON,
};
use nalgebra::{UnitQuaternion, Vector3};
use proptest::prelude::*;

// =============================================================================
// Strategies
// =============================================================================

fn arb_transform() -> impl Strategy<Value = Transform> {
    (
        prop::array::uniform3(-10.0f64..10.0),
        prop::array::uniform3(-3.0f64..3.0),
    )
        .prop_map(|(p, r)| {
            from_parts(
                Vector3::new(p[0], p[1], p[2]),
                UnitQuaternion::from_scaled_axis(Vector3::new(r[0], r[1], r[2])),
            )
        })
}

fn arb_chain(max_depth: usize) -> impl Strategy<Value = Vec<(Transform, Transform)>> {
    prop::collection::vec((arb_transform(), arb_transform()), 0..=max_depth)
}

fn build_chain(graph: &mut Graph, chain: &[(Transform, Transform)]) -> NodeId {
    let mut node = graph.root();
    for (link, local) in chain {
        node = graph.create_child(node, *link, *local).unwrap().1;
    }
    node
}

fn arb_dts() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.001f64..0.5, 1..40)
}

// =============================================================================
// Property Tests: World Transform Algebra
// =============================================================================

proptest! {
    /// Setting a world pose and reading it back is the identity, for any depth.
    #[test]
    fn world_transform_round_trip(chain in arb_chain(10), target in arb_transform()) {
        let mut graph = Graph::new();
        let node = build_chain(&mut graph, &chain);
        graph.set_world_transform(node, &target).unwrap();
        let world = graph.world_transform(node).unwrap();
        prop_assert!(relative_eq!(world, target, epsilon = 1e-8));
    }

    /// Re-parenting changes the local transform but never the world pose.
    #[test]
    fn reparenting_keeps_world_pose(
        chain in arb_chain(6).prop_filter("needs a non-root node", |c| !c.is_empty()),
        anchor in arb_chain(4),
        link_transform in arb_transform(),
    ) {
        let mut graph = Graph::new();
        let node = build_chain(&mut graph, &chain);
        let anchor = build_chain(&mut graph, &anchor);
        let world = graph.world_transform(node).unwrap();
        let local = *graph.node(node).unwrap().transform();
        let old_parent = graph.node(node).unwrap().parent().unwrap();
        let old_parent_world = graph.link_world_transform(old_parent).unwrap();

        let link = graph.create_link(anchor, link_transform).unwrap();
        let new_parent_world = graph.link_world_transform(link).unwrap();
        graph.set_node_parent(node, link).unwrap();

        prop_assert!(relative_eq!(graph.world_transform(node).unwrap(), world, epsilon = 1e-8));
        if !relative_eq!(old_parent_world, new_parent_world, epsilon = 1e-6) {
            prop_assert_ne!(*graph.node(node).unwrap().transform(), local);
        }
    }
}

// =============================================================================
// Property Tests: Actuators
// =============================================================================

fn rail_world(kind: ConstraintType) -> (KinematicWorld, kinegraph::ConstraintId) {
    let mut world = KinematicWorld::new();
    let a = world
        .create_kinematic_body(DetachedNode::new("a", Transform::identity()).shared())
        .unwrap();
    let b = world
        .create_kinematic_body(DetachedNode::new("b", Transform::identity()).shared())
        .unwrap();
    let id = world
        .create_constraint(kind, a, b, &Transform::identity())
        .unwrap()
        .unwrap();
    world.constraint_mut(id).unwrap().set_actuator(true);
    (world, id)
}

proptest! {
    /// A slider driven to its lower limit never leaves its limits and ends on it.
    #[test]
    fn slider_clamp_law(start in 0.0f64..=10.0, dts in arb_dts()) {
        let (mut world, id) = rail_world(ConstraintType::Slider);
        world.constraint_mut(id).unwrap().set_limits(0., 10.);
        world.set_constraint_position(id, start).unwrap();
        world.constraint_mut(id).unwrap().set_velocity(-5.);

        // the trailing tick makes sure more than 10 / 5 seconds elapse
        for dt in dts.iter().chain([2.5].iter()) {
            world.step(*dt).unwrap();
            let position = world.constraint_position(id).unwrap();
            prop_assert!(position >= -1e-12 && position <= 10.0 + 1e-12);
        }
        prop_assert!(relative_eq!(world.constraint_position(id).unwrap(), 0.0, epsilon = 1e-9));
    }

    /// A hinge opening towards its upper limit is monotone, never overshoots
    /// and settles inside the tolerance band below the limit.
    #[test]
    fn hinge_does_not_overshoot(dts in arb_dts()) {
        let speed = 30f64.to_radians();
        let (mut world, id) = rail_world(ConstraintType::Hinge);
        {
            let hinge = world.constraint_mut(id).unwrap();
            hinge.set_limits(0., FRAC_PI_2);
            hinge.set_velocity(speed);
        }

        // trailing display-rate ticks to finish the opening
        let settle = 1. / 60.;
        let mut previous = 0.0;
        for dt in dts.iter().copied().chain(std::iter::repeat(settle).take(400)) {
            world.step(dt).unwrap();
            let angle = world.constraint_position(id).unwrap();
            prop_assert!(angle >= previous - 1e-9);
            prop_assert!(angle <= FRAC_PI_2 + EPSILON);
            previous = angle;
        }
        let band = EPSILON * speed * 10. + speed * settle;
        prop_assert!(previous >= FRAC_PI_2 - band - 1e-9);
        prop_assert!(previous <= FRAC_PI_2);
    }
}
