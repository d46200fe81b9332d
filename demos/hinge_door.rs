use std::error::Error;
use std::f64::consts::FRAC_PI_2;

use kinegraph::{from_position, ConstraintType, DetachedNode, KinematicWorld, Transform};
use nalgebra::Vector3;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("kinegraph=debug".parse()?))
        .init();

    let mut world = KinematicWorld::new();
    let frame = DetachedNode::new("frame", Transform::identity()).shared();
    let frame = world.create_kinematic_body(frame)?;
    let door = DetachedNode::new("door", from_position(Vector3::new(0.8, 0., 0.))).shared();
    let leaf = world.create_kinematic_body(door.clone())?;

    let hinge =
        world.create_constraint(ConstraintType::Hinge, frame, leaf, &Transform::identity())?;
    let Some(hinge) = hinge else {
        return Err("door is already attached".into());
    };
    if let Some(constraint) = world.constraint_mut(hinge) {
        constraint.set_limits(0., FRAC_PI_2);
        constraint.set_actuator(true);
        constraint.set_velocity(FRAC_PI_2 / 2.);
    }

    for tick in 0..150 {
        world.step(1. / 60.)?;
        if tick % 30 == 0 {
            let angle = world.constraint_position(hinge)?;
            let position = door.borrow().transform().translation.vector;
            println!(
                "t={:.2}s angle={:.3} door={}",
                tick as f64 / 60.,
                angle,
                position.transpose()
            );
        }
    }
    println!("open at {:.4} rad", world.constraint_position(hinge)?);
    Ok(())
}
