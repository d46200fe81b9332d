use std::cell::RefCell;
use std::rc::Rc;

use approx::assert_relative_eq;
use core::f64::consts::FRAC_PI_2;
use kinegraph::{
    axis_angle, from_parts, from_position, BodyFlags, ConstraintType, DetachedNode,
    KinematicWorld, Transform, EPSILON,
};
use nalgebra::Vector3;

fn scene(name: &str, at: Transform) -> Rc<RefCell<DetachedNode>> {
    DetachedNode::new(name, at).shared()
}

#[test]
fn fixed_tube_segment_does_not_drift() {
    let mut world = KinematicWorld::new();
    let a = world
        .create_kinematic_body(scene("tube_0", Transform::identity()))
        .unwrap();
    let segment = scene(
        "tube_1",
        from_parts(Vector3::new(0., 0., 2.), axis_angle(&Vector3::x_axis(), 0.2)),
    );
    let b = world.create_kinematic_body(segment.clone()).unwrap();
    let id = world
        .create_constraint(ConstraintType::Fixed, a, b, &Transform::identity())
        .unwrap()
        .unwrap();
    world.constraint_mut(id).unwrap().set_actuator(true);

    let pushes = Rc::new(RefCell::new(0));
    let counter = pushes.clone();
    world
        .body_mut(b)
        .unwrap()
        .add_listener(move |_| *counter.borrow_mut() += 1);

    let offset = world.body_world_transform(a).unwrap().inverse()
        * world.body_world_transform(b).unwrap();
    let bound = world.body_world_transform(b).unwrap();
    for i in 0..500 {
        world.step(0.001 * (i % 7) as f64).unwrap();
        assert_eq!(world.body_world_transform(b).unwrap(), bound);
        assert_eq!(world.body_world_transform(a).unwrap() * offset, bound);
    }
    // only the initial synchronisation is pushed
    assert_eq!(*pushes.borrow(), 1);
    assert_eq!(segment.borrow().transform(), &bound);
}

#[test]
fn loop_rejection_keeps_existing_parent() {
    let mut world = KinematicWorld::new();
    let a = world.create_kinematic_body(scene("a", Transform::identity())).unwrap();
    let b = world
        .create_kinematic_body(scene("b", from_position(Vector3::new(1., 0., 0.))))
        .unwrap();
    let c = world
        .create_kinematic_body(scene("c", from_position(Vector3::new(2., 0., 0.))))
        .unwrap();
    world
        .create_constraint(ConstraintType::Hinge, a, b, &Transform::identity())
        .unwrap()
        .unwrap();

    let node_b = world.body(b).unwrap().node();
    let parent = world.graph().node(node_b).unwrap().parent();
    let links = world.graph().link_count();

    let rejected = world
        .create_constraint(ConstraintType::Slider, c, b, &Transform::identity())
        .unwrap();
    assert!(rejected.is_none());
    assert_eq!(world.constraints().count(), 1);
    assert_eq!(world.graph().node(node_b).unwrap().parent(), parent);
    assert_eq!(world.graph().link_count(), links);
    let owner = world.graph().link(parent.unwrap()).unwrap().parent();
    assert_eq!(owner, world.body(a).unwrap().node());

    // closing the loop from the other side is refused as well
    let closing = world
        .create_constraint(ConstraintType::Fixed, b, a, &Transform::identity())
        .unwrap();
    assert!(closing.is_none());
}

#[test]
fn slider_converges_to_lower_limit() {
    let mut world = KinematicWorld::new();
    let rail = world.create_kinematic_body(scene("rail", Transform::identity())).unwrap();
    let carriage = world
        .create_kinematic_body(scene("carriage", Transform::identity()))
        .unwrap();
    let id = world
        .create_constraint(ConstraintType::Slider, rail, carriage, &Transform::identity())
        .unwrap()
        .unwrap();
    {
        let slider = world.constraint_mut(id).unwrap();
        slider.set_limits(0., 10.);
        slider.set_actuator(true);
        slider.set_velocity(5.);
    }
    for _ in 0..30 {
        world.step(0.1).unwrap();
    }
    assert_relative_eq!(world.constraint_position(id).unwrap(), 10., epsilon = 1e-9);

    world.constraint_mut(id).unwrap().set_velocity(-5.);
    for dt in [0.1, 0.37, 0.05, 0.9, 0.6, 0.3] {
        world.step(dt).unwrap();
        let position = world.constraint_position(id).unwrap();
        assert!((0.0..=10.0).contains(&position), "{position} out of range");
    }
    assert_relative_eq!(world.constraint_position(id).unwrap(), 0., epsilon = 1e-9);
    let carriage_pose = world.body_world_transform(carriage).unwrap();
    assert_relative_eq!(carriage_pose.translation.vector, Vector3::zeros(), epsilon = 1e-9);
}

#[test]
fn hinge_door_opens_towards_limit() {
    let mut world = KinematicWorld::new();
    let frame = world.create_kinematic_body(scene("frame", Transform::identity())).unwrap();
    let door = scene("door", from_position(Vector3::new(1., 0., 0.)));
    let leaf = world.create_kinematic_body(door.clone()).unwrap();
    let id = world
        .create_constraint(ConstraintType::Hinge, frame, leaf, &Transform::identity())
        .unwrap()
        .unwrap();
    {
        let hinge = world.constraint_mut(id).unwrap();
        hinge.set_limits(0., FRAC_PI_2);
        hinge.set_actuator(true);
        hinge.set_velocity(FRAC_PI_2 / 3.);
    }

    let speed = FRAC_PI_2 / 3.;
    let dt = 1. / 60.;
    let band = EPSILON * speed * 10. + speed * dt;
    let mut previous = 0.0;
    for _ in 0..240 {
        world.step(dt).unwrap();
        let angle = world.constraint_position(id).unwrap();
        assert!(angle >= previous - 1e-9);
        assert!(angle <= FRAC_PI_2);
        previous = angle;
    }
    // the hinge holds inside the tolerance band below its limit
    assert!(previous >= FRAC_PI_2 - band);
    let opened = door.borrow().transform().translation.vector;
    assert_relative_eq!(opened, Vector3::new(previous.cos(), previous.sin(), 0.), epsilon = 1e-9);
    assert!(opened.x < band);

    // and closes again, stopping short of the lower limit the same way
    let speed = FRAC_PI_2;
    world.constraint_mut(id).unwrap().set_velocity(-speed);
    for _ in 0..90 {
        world.step(dt).unwrap();
        let angle = world.constraint_position(id).unwrap();
        assert!(angle <= previous + 1e-9);
        assert!(angle >= 0.0);
        previous = angle;
    }
    assert!(previous <= EPSILON * speed * 10. + speed * dt);
}

#[test]
fn reset_restores_initial_link_exactly() {
    let mut world = KinematicWorld::new();
    let a = world.create_kinematic_body(scene("a", Transform::identity())).unwrap();
    let b = world
        .create_kinematic_body(scene("b", from_position(Vector3::new(0., 2., 0.))))
        .unwrap();
    let joint = from_parts(Vector3::new(0., 1., 0.), axis_angle(&Vector3::y_axis(), 0.7));
    let id = world
        .create_constraint(ConstraintType::Hinge, a, b, &joint)
        .unwrap()
        .unwrap();
    let link = world.constraint(id).unwrap().link().unwrap();
    let initial = *world.graph().link(link).unwrap().initial_transform();

    {
        let hinge = world.constraint_mut(id).unwrap();
        hinge.set_actuator(true);
        hinge.set_velocity(0.8);
    }
    for _ in 0..10 {
        world.step(0.05).unwrap();
    }
    assert_ne!(*world.graph().link(link).unwrap().transform(), initial);

    world.reset();
    assert_eq!(*world.graph().link(link).unwrap().transform(), initial);
    assert_eq!(world.constraint_position(id).unwrap(), 0.);
}

#[test]
fn motion_state_mirrors_driven_body() {
    let mut world = KinematicWorld::new();
    let base = world.create_kinematic_body(scene("base", Transform::identity())).unwrap();
    let arm = world
        .create_kinematic_body(scene("arm", from_position(Vector3::new(0., 0., 1.))))
        .unwrap();
    let proxy = DetachedNode::new("arm_proxy", Transform::identity()).shared();
    world.body_mut(arm).unwrap().set_motion_state(proxy.clone());
    let id = world
        .create_constraint(ConstraintType::Slider, base, arm, &Transform::identity())
        .unwrap()
        .unwrap();
    {
        let slider = world.constraint_mut(id).unwrap();
        slider.set_limits(0., 1.);
        slider.set_actuator(true);
        slider.set_velocity(2.);
    }

    world.step(0.25).unwrap();
    assert_relative_eq!(
        proxy.borrow().transform().translation.vector,
        Vector3::new(0., 0., 1.5),
        epsilon = 1e-12
    );

    world.body_mut(arm).unwrap().set_flags(BodyFlags {
        disable_updates: true,
        ..Default::default()
    });
    world.step(0.25).unwrap();
    assert_relative_eq!(
        proxy.borrow().transform().translation.vector,
        Vector3::new(0., 0., 1.5),
        epsilon = 1e-12
    );
    assert_relative_eq!(
        world.body_world_transform(arm).unwrap().translation.vector,
        Vector3::new(0., 0., 2.),
        epsilon = 1e-12
    );
}
