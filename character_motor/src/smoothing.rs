//! Critically damped smoothing for scalars, vectors and rotations.

use rapier3d::math::Vector;
use rapier3d::na::{Quaternion, UnitQuaternion, Vector4};
use rapier3d::prelude::Real;

const MIN_SMOOTH_TIME: Real = 1.0e-4;

/// Moves `current` towards `target`, carrying `velocity` between calls.
/// Never overshoots the target.
pub fn smooth_damp(
    current: Real,
    target: Real,
    velocity: &mut Real,
    smooth_time: Real,
    dt: Real,
) -> Real {
    if dt <= 0.0 {
        return current;
    }
    let smooth_time = smooth_time.max(MIN_SMOOTH_TIME);
    let omega = 2.0 / smooth_time;
    let x = omega * dt;
    let decay = 1.0 / (1.0 + x + 0.48 * x * x + 0.235 * x * x * x);
    let change = current - target;
    let temp = (*velocity + omega * change) * dt;
    *velocity = (*velocity - omega * temp) * decay;
    let mut output = target + (change + temp) * decay;
    if (target - current > 0.0) == (output > target) {
        output = target;
        *velocity = 0.0;
    }
    output
}

pub fn smooth_damp_vector(
    current: Vector<Real>,
    target: Vector<Real>,
    velocity: &mut Vector<Real>,
    smooth_time: Real,
    dt: Real,
) -> Vector<Real> {
    Vector::new(
        smooth_damp(current.x, target.x, &mut velocity.x, smooth_time, dt),
        smooth_damp(current.y, target.y, &mut velocity.y, smooth_time, dt),
        smooth_damp(current.z, target.z, &mut velocity.z, smooth_time, dt),
    )
}

/// Component-wise damping on the quaternion with renormalization. `derivative`
/// is kept tangent to the result.
pub fn smooth_damp_rotation(
    current: UnitQuaternion<Real>,
    target: UnitQuaternion<Real>,
    derivative: &mut Vector4<Real>,
    smooth_time: Real,
    dt: Real,
) -> UnitQuaternion<Real> {
    if dt < Real::EPSILON {
        return current;
    }
    let from = current.coords;
    let mut to = target.coords;
    // q and -q are the same rotation; damp towards the nearer one.
    if from.dot(&to) <= 0.0 {
        to = -to;
    }
    let blended = Vector4::new(
        smooth_damp(from.x, to.x, &mut derivative.x, smooth_time, dt),
        smooth_damp(from.y, to.y, &mut derivative.y, smooth_time, dt),
        smooth_damp(from.z, to.z, &mut derivative.z, smooth_time, dt),
        smooth_damp(from.w, to.w, &mut derivative.w, smooth_time, dt),
    );
    let result = blended.try_normalize(1.0e-9).unwrap_or(to);
    let along = result * derivative.dot(&result);
    *derivative -= along;
    UnitQuaternion::from_quaternion(Quaternion::from_vector(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rapier3d::na::Unit;

    #[test]
    fn scalar_converges_without_overshoot() {
        let mut value = 0.0;
        let mut velocity = 0.0;
        for _ in 0..600 {
            value = smooth_damp(value, 10.0, &mut velocity, 0.3, 1.0 / 60.0);
            assert!(value <= 10.0);
        }
        assert!((value - 10.0).abs() < 1.0e-3);
    }

    #[test]
    fn zero_dt_keeps_current() {
        let mut velocity = 4.0;
        assert_eq!(smooth_damp(2.0, 8.0, &mut velocity, 0.5, 0.0), 2.0);
        let rotation = UnitQuaternion::from_axis_angle(&Vector::y_axis(), 1.0);
        let mut derivative = Vector4::zeros();
        let same = smooth_damp_rotation(
            rotation,
            UnitQuaternion::identity(),
            &mut derivative,
            0.2,
            0.0,
        );
        assert_eq!(same, rotation);
    }

    #[test]
    fn rotation_reaches_target_through_short_arc() {
        let axis = Unit::new_normalize(Vector::new(0.0, 1.0, 0.0));
        let target = UnitQuaternion::from_axis_angle(&axis, 1.2);
        // Same rotation as identity, opposite sign.
        let mut current = UnitQuaternion::from_quaternion(Quaternion::new(-1.0, 0.0, 0.0, 0.0));
        let mut derivative = Vector4::zeros();
        for _ in 0..600 {
            current = smooth_damp_rotation(current, target, &mut derivative, 0.2, 1.0 / 60.0);
        }
        assert!(current.angle_to(&target) < 1.0e-2);
    }

    #[test]
    fn vector_damps_each_axis() {
        let mut velocity = Vector::zeros();
        let mut value = Vector::zeros();
        let target = Vector::new(1.0, -2.0, 3.0);
        for _ in 0..600 {
            value = smooth_damp_vector(value, target, &mut velocity, 0.25, 1.0 / 60.0);
        }
        assert!((value - target).norm() < 1.0e-3);
    }
}
