//! Rigid transforms used throughout the graph.
//!
//! Kinematics here is rigid-only: a [`Transform`] is a translation plus a unit
//! quaternion. `a * b` applies `b` first, so a world pose is always
//! `parent_world * local`.

use nalgebra::{Isometry3, Translation3, Unit, UnitQuaternion, Vector3};

pub type Transform = Isometry3<f64>;
pub type Axis = Unit<Vector3<f64>>;

/// Numeric tolerance (radians or metres) used to absorb floating accumulation.
pub const EPSILON: f64 = 0.001;

pub fn from_parts(position: Vector3<f64>, orientation: UnitQuaternion<f64>) -> Transform {
    Isometry3::from_parts(Translation3::from(position), orientation)
}

pub fn from_position(position: Vector3<f64>) -> Transform {
    from_parts(position, UnitQuaternion::identity())
}

pub fn from_orientation(orientation: UnitQuaternion<f64>) -> Transform {
    from_parts(Vector3::zeros(), orientation)
}

/// Rotation of `angle` radians around `axis`.
pub fn axis_angle(axis: &Axis, angle: f64) -> UnitQuaternion<f64> {
    UnitQuaternion::from_axis_angle(axis, angle)
}

/// Absolute rotation angle between two orientations, in `[0, π]`.
///
/// Both quaternion covers of the same rotation are at distance zero.
pub fn quaternion_distance(a: &UnitQuaternion<f64>, b: &UnitQuaternion<f64>) -> f64 {
    a.angle_to(b)
}

/// Signed rotation of `current` relative to `reference` around `axis`.
///
/// Only meaningful when the relative rotation is (close to) a pure rotation
/// around `axis`, which is what a hinge produces.
pub fn signed_angle(
    reference: &UnitQuaternion<f64>,
    current: &UnitQuaternion<f64>,
    axis: &Axis,
) -> f64 {
    (reference.inverse() * current)
        .scaled_axis()
        .dot(&axis.into_inner())
}

pub fn is_identity(q: &UnitQuaternion<f64>) -> bool {
    q.angle() == 0.0
}
