use nalgebra::{UnitQuaternion, Vector3};

use crate::error::KinematicError;
use crate::graph::{Graph, Link, LinkId};
use crate::transform::{self, axis_angle, quaternion_distance, Axis};

use super::RESOLUTION;

/// Single rotation axis, angles measured from the link's initial frame.
///
/// Limits are disabled while `upper_limit < lower_limit`; a free hinge driven
/// as an actuator spins continuously in the direction of its velocity.
#[derive(Debug, Clone, PartialEq)]
pub struct HingeConstraint {
    axis: Axis,
    lower_limit: f64,
    upper_limit: f64,
    target: f64,
    speed: f64,
    velocity: f64,
}

impl Default for HingeConstraint {
    fn default() -> Self {
        Self {
            axis: Vector3::z_axis(),
            lower_limit: 1.0,
            upper_limit: -1.0,
            target: 0.0,
            speed: 0.0,
            velocity: 0.0,
        }
    }
}

impl HingeConstraint {
    pub fn axis(&self) -> &Axis {
        &self.axis
    }

    pub fn set_axis(&mut self, axis: Axis) {
        self.axis = axis;
    }

    pub fn has_limits(&self) -> bool {
        self.lower_limit <= self.upper_limit
    }

    pub fn limits(&self) -> (f64, f64) {
        (self.lower_limit, self.upper_limit)
    }

    pub fn set_limits(&mut self, lower: f64, upper: f64) {
        self.lower_limit = lower;
        self.upper_limit = upper;
        self.target = self.clamp(self.target);
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn set_target(&mut self, target: f64) {
        self.target = self.clamp(target);
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    /// Drive towards the lower limit for negative `v`, the upper one otherwise.
    /// A free axis keeps turning in the direction of `v`.
    pub fn set_velocity(&mut self, v: f64) {
        self.velocity = v;
        self.speed = v.abs();
        self.target = match (self.has_limits(), v < 0.0) {
            (true, true) => self.lower_limit,
            (true, false) => self.upper_limit,
            (false, true) => f64::NEG_INFINITY,
            (false, false) => f64::INFINITY,
        };
    }

    fn clamp(&self, value: f64) -> f64 {
        if self.has_limits() {
            value.clamp(self.lower_limit, self.upper_limit)
        } else {
            value
        }
    }

    /// Orientation of the joint at `angle`, in the link's parent frame.
    fn orientation_at(&self, link: &Link, angle: f64) -> UnitQuaternion<f64> {
        link.initial_transform().rotation * axis_angle(&self.axis, angle)
    }

    /// Signed angle around the axis relative to the initial transform.
    pub fn angle(&self, link: &Link) -> f64 {
        transform::signed_angle(
            &link.initial_transform().rotation,
            &link.orientation(),
            &self.axis,
        )
    }

    pub(crate) fn set_angle(
        &self,
        graph: &mut Graph,
        id: LinkId,
        angle: f64,
    ) -> Result<(), KinematicError> {
        graph.set_link_orientation(id, &axis_angle(&self.axis, self.clamp(angle)))
    }

    /// Rotate towards the target by at most `speed * dt`.
    ///
    /// The hinge stops (the tick is skipped) when the candidate orientation
    /// comes within `epsilon * speed * tolerance_scale` of a limit it is
    /// approaching. The band grows with speed, so it is an approximation
    /// rather than a hard bound, and a fast hinge stops short of its limit.
    pub(crate) fn progress(
        &mut self,
        graph: &mut Graph,
        id: LinkId,
        dt: f64,
        epsilon: f64,
        tolerance_scale: f64,
    ) -> Result<(), KinematicError> {
        if self.speed <= 0.0 {
            return Ok(());
        }
        let link = graph.link(id).ok_or(KinematicError::UnknownLink(id))?;
        let current = link.orientation();

        // free axis driven by velocity alone
        if self.target.is_infinite() {
            let q = axis_angle(&self.axis, self.target.signum() * self.speed * dt);
            return graph.rotate_link(id, &q);
        }

        let target = self.orientation_at(link, self.target);
        let distance = quaternion_distance(&current, &target);
        if distance < RESOLUTION {
            return Ok(());
        }

        let mut q = axis_angle(&self.axis, (self.speed * dt).min(distance));
        // both directions can give the same absolute distance, keep the one
        // that approaches the target
        if quaternion_distance(&(current * q), &target) > distance {
            q = q.inverse();
        }

        if self.has_limits() {
            let tolerance = epsilon * self.speed * tolerance_scale;
            let candidate = current * q;
            for limit in [self.lower_limit, self.upper_limit] {
                let limit = self.orientation_at(link, limit);
                let before = quaternion_distance(&current, &limit);
                let after = quaternion_distance(&candidate, &limit);
                // moving away from a limit is always allowed
                if after < before && after < tolerance {
                    q = UnitQuaternion::identity();
                    break;
                }
            }
        }

        if transform::is_identity(&q) {
            return Ok(());
        }
        graph.rotate_link(id, &q)
    }
}
