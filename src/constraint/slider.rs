use nalgebra::Vector3;

use crate::error::KinematicError;
use crate::graph::{Graph, Link, LinkId};
use crate::transform::Axis;

use super::RESOLUTION;

/// Single linear axis, measured from the link's initial frame.
///
/// Limits are disabled while `lower_limit > upper_limit`.
#[derive(Debug, Clone, PartialEq)]
pub struct SliderConstraint {
    axis: Axis,
    lower_limit: f64,
    upper_limit: f64,
    target: f64,
    speed: f64,
    velocity: f64,
}

impl Default for SliderConstraint {
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

impl SliderConstraint {
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
    /// A free axis keeps moving in the direction of `v`.
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

    /// Axis expressed in the link's parent frame.
    fn parent_axis(&self, link: &Link) -> Vector3<f64> {
        link.initial_transform().rotation * self.axis.into_inner()
    }

    /// Signed offset along the axis relative to the initial transform.
    pub fn position(&self, link: &Link) -> f64 {
        (link.position() - link.initial_transform().translation.vector).dot(&self.parent_axis(link))
    }

    pub(crate) fn set_position(
        &self,
        graph: &mut Graph,
        id: LinkId,
        position: f64,
    ) -> Result<(), KinematicError> {
        let link = graph.link(id).ok_or(KinematicError::UnknownLink(id))?;
        let mut t = *link.transform();
        t.translation.vector = link.initial_transform().translation.vector
            + self.parent_axis(link) * self.clamp(position);
        graph.set_link_transform(id, &t)
    }

    pub(crate) fn progress(
        &mut self,
        graph: &mut Graph,
        id: LinkId,
        dt: f64,
    ) -> Result<(), KinematicError> {
        if self.speed <= 0.0 {
            return Ok(());
        }
        let link = graph.link(id).ok_or(KinematicError::UnknownLink(id))?;
        let position = self.position(link);
        let remaining = self.target - position;
        if remaining.abs() < RESOLUTION {
            return Ok(());
        }

        let step = remaining.signum() * (self.speed * dt).min(remaining.abs());
        let next = self.clamp(position + step);
        let moved = next - position;
        if moved == 0.0 {
            return Ok(());
        }

        let mut t = *link.transform();
        t.translation.vector += self.parent_axis(link) * moved;
        graph.set_link_transform(id, &t)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::transform::{axis_angle, from_parts, Transform};
    use approx::assert_relative_eq;
    use core::f64::consts::FRAC_PI_2;

    fn slider_link(graph: &mut Graph) -> LinkId {
        let frame = from_parts(
            Vector3::new(1., 2., 3.),
            axis_angle(&Vector3::y_axis(), FRAC_PI_2),
        );
        let (link, _) = graph
            .create_child(graph.root(), frame, Transform::identity())
            .unwrap();
        link
    }

    #[test]
    fn test_velocity_selects_limit() {
        let mut slider = SliderConstraint::default();
        slider.set_limits(0., 10.);
        slider.set_velocity(-5.);
        assert_eq!(slider.target(), 0.);
        assert_eq!(slider.speed(), 5.);
        slider.set_velocity(2.);
        assert_eq!(slider.target(), 10.);
        slider.set_limits(1., -1.);
        slider.set_velocity(-1.);
        assert_eq!(slider.target(), f64::NEG_INFINITY);
        slider.set_limits(0., 10.);
        slider.set_target(42.);
        assert_eq!(slider.target(), 10.);
    }

    #[test]
    fn test_moves_along_rotated_axis() {
        let mut graph = Graph::new();
        let link = slider_link(&mut graph);
        let mut slider = SliderConstraint::default();
        slider.set_limits(0., 10.);
        slider.set_velocity(4.);
        slider.progress(&mut graph, link, 0.5).unwrap();

        let l = graph.link(link).unwrap();
        assert_relative_eq!(slider.position(l), 2., epsilon = 1e-12);
        // local +Z of a frame turned a quarter around Y points along +X
        assert_relative_eq!(l.position(), Vector3::new(3., 2., 3.), epsilon = 1e-12);
    }

    #[test]
    fn test_stops_exactly_at_target() {
        let mut graph = Graph::new();
        let link = slider_link(&mut graph);
        let mut slider = SliderConstraint::default();
        slider.set_limits(-1., 1.);
        slider.set_velocity(0.75);
        for _ in 0..10 {
            slider.progress(&mut graph, link, 0.5).unwrap();
        }
        assert_relative_eq!(slider.position(graph.link(link).unwrap()), 1., epsilon = 1e-12);
        let revision = graph.revision();
        slider.progress(&mut graph, link, 0.5).unwrap();
        assert_eq!(graph.revision(), revision);
    }

    #[test]
    fn test_free_axis_keeps_moving() {
        let mut graph = Graph::new();
        let link = slider_link(&mut graph);
        let mut slider = SliderConstraint::default();
        slider.set_velocity(-2.);
        for _ in 0..4 {
            slider.progress(&mut graph, link, 0.25).unwrap();
        }
        assert_relative_eq!(slider.position(graph.link(link).unwrap()), -2., epsilon = 1e-12);
    }

    #[test]
    fn test_set_position_clamps() {
        let mut graph = Graph::new();
        let link = slider_link(&mut graph);
        let mut slider = SliderConstraint::default();
        slider.set_limits(0., 3.);
        slider.set_position(&mut graph, link, 7.).unwrap();
        assert_relative_eq!(slider.position(graph.link(link).unwrap()), 3., epsilon = 1e-12);
    }
}
