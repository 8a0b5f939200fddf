use rapier3d::math::Vector;
use rapier3d::na::{Rotation3, Unit, UnitQuaternion};
use rapier3d::prelude::Real;

const DEGENERATE: Real = 1.0e-6;

/// Rotation whose local +Z is `forward` and local +Y leans towards `up`.
pub fn look_rotation(forward: Vector<Real>, up: Vector<Real>) -> UnitQuaternion<Real> {
    let Some(forward) = forward.try_normalize(DEGENERATE) else {
        return UnitQuaternion::identity();
    };
    let right = up.cross(&forward).try_normalize(DEGENERATE).unwrap_or_else(|| {
        let helper = if forward.x.abs() < 0.9 {
            Vector::x()
        } else {
            Vector::z()
        };
        helper.cross(&forward).cross(&forward).normalize()
    });
    let up = forward.cross(&right);
    UnitQuaternion::from_rotation_matrix(&Rotation3::from_basis_unchecked(&[right, up, forward]))
}

/// Component of `vector` orthogonal to the unit `normal`.
pub fn project_on_plane(vector: Vector<Real>, normal: Vector<Real>) -> Vector<Real> {
    vector - normal * vector.dot(&normal)
}

/// World look direction steered by yaw about the perceived up and pitch
/// about the look's right axis.
#[derive(Clone, Copy, Debug)]
pub struct LookState {
    direction: Vector<Real>,
}

impl LookState {
    pub fn new(forward: Vector<Real>) -> Self {
        Self {
            direction: forward.try_normalize(DEGENERATE).unwrap_or_else(Vector::z),
        }
    }

    pub fn direction(&self) -> Vector<Real> {
        self.direction
    }

    /// `delta` is in degrees before sensitivity. Positive x turns right,
    /// positive y looks up. Returns the new look rotation.
    pub fn apply(
        &mut self,
        delta: [Real; 2],
        sensitivity: Real,
        up: Vector<Real>,
        margin_deg: Real,
    ) -> UnitQuaternion<Real> {
        let yaw = delta[0] * sensitivity;
        let requested_pitch = -delta[1] * sensitivity;
        let angle_to_up = up.angle(&self.direction).to_degrees();
        let angle_to_down = (-up).angle(&self.direction).to_degrees();
        let pitch = if requested_pitch < -angle_to_up + margin_deg {
            -angle_to_up + margin_deg
        } else if requested_pitch > angle_to_down - margin_deg {
            angle_to_down - margin_deg
        } else {
            requested_pitch
        };

        if let Some(up_axis) = Unit::try_new(up, DEGENERATE) {
            self.direction = UnitQuaternion::from_axis_angle(&up_axis, yaw.to_radians())
                * self.direction;
        }
        if let Some(right_axis) = Unit::try_new(up.cross(&self.direction), DEGENERATE) {
            self.direction = UnitQuaternion::from_axis_angle(&right_axis, pitch.to_radians())
                * self.direction;
        }
        self.direction = self
            .direction
            .try_normalize(DEGENERATE)
            .unwrap_or(self.direction);
        look_rotation(self.direction, up)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn look_rotation_maps_axes() {
        let rotation = look_rotation(Vector::z(), Vector::y());
        assert!(rotation.angle() < 1.0e-6);
        let sideways = look_rotation(Vector::x(), Vector::y());
        assert!((sideways * Vector::z() - Vector::x()).norm() < 1.0e-5);
        assert!((sideways * Vector::y() - Vector::y()).norm() < 1.0e-5);
        let straight_up = look_rotation(Vector::y(), Vector::y());
        assert!((straight_up * Vector::z() - Vector::y()).norm() < 1.0e-5);
    }

    #[test]
    fn yaw_turns_right_about_up() {
        let mut look = LookState::new(Vector::z());
        look.apply([90.0, 0.0], 1.0, Vector::y(), 10.0);
        assert!((look.direction() - Vector::x()).norm() < 1.0e-5);
    }

    #[test]
    fn pitch_stops_at_margin_from_up() {
        let mut look = LookState::new(Vector::z());
        look.apply([0.0, 1000.0], 1.0, Vector::y(), 10.0);
        let angle = Vector::y().angle(&look.direction()).to_degrees();
        assert!((angle - 10.0).abs() < 1.0e-2);

        look.apply([0.0, 5.0], 1.0, Vector::y(), 10.0);
        let angle = Vector::y().angle(&look.direction()).to_degrees();
        assert!(angle >= 10.0 - 1.0e-2);

        look.apply([0.0, -1000.0], 1.0, Vector::y(), 10.0);
        let angle = (-Vector::y()).angle(&look.direction()).to_degrees();
        assert!((angle - 10.0).abs() < 1.0e-2);
    }

    #[test]
    fn pitch_follows_tilted_up() {
        let up = Vector::x();
        let mut look = LookState::new(Vector::z());
        look.apply([0.0, 1000.0], 2.0, up, 10.0);
        assert!((up.angle(&look.direction()).to_degrees() - 10.0).abs() < 1.0e-2);
    }
}
