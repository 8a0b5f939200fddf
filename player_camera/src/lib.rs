//! Third-person camera following the character's camera node.
#![forbid(unsafe_code)]

use character_motor::smoothing::{smooth_damp, smooth_damp_vector};
use rapier3d::math::{Point, Vector};
use rapier3d::na::UnitQuaternion;
use rapier3d::prelude::Real;
use serde::{Deserialize, Serialize};

const MAX_FOV: Real = 170.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Vertical field of view at rest, in degrees.
    pub fov_base: Real,
    /// Field of view grows by this factor per unit of speed.
    pub fov_power_factor: Real,
    pub fov_smoothing: Real,
    pub position_smoothing: Real,
    /// Camera node position in the look frame.
    pub node_offset: [Real; 3],
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_base: 60.0,
            fov_power_factor: 1.1,
            fov_smoothing: 0.5,
            position_smoothing: 0.5,
            node_offset: [0.0, 1.5, -4.0],
        }
    }
}

impl CameraConfig {
    pub fn target_fov(&self, speed: Real) -> Real {
        (self.fov_base * self.fov_power_factor.powf(speed)).clamp(1.0, MAX_FOV)
    }

    pub fn node_offset(&self) -> Vector<Real> {
        Vector::from(self.node_offset)
    }
}

/// Published by the player after each motion tick.
#[derive(Clone, Copy, Debug)]
pub struct MotionUpdate {
    pub dt: Real,
    pub body_position: Point<Real>,
    pub speed: Real,
    pub look_rotation: UnitQuaternion<Real>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraPose {
    pub position: Point<Real>,
    pub rotation: UnitQuaternion<Real>,
    pub fov_deg: Real,
}

#[derive(Clone, Debug)]
pub struct FollowCamera {
    config: CameraConfig,
    pose: CameraPose,
    fov_velocity: Real,
    position_velocity: Vector<Real>,
}

impl FollowCamera {
    pub fn new(config: CameraConfig, position: Point<Real>) -> Self {
        let fov_deg = config.fov_base;
        Self {
            config,
            pose: CameraPose {
                position,
                rotation: UnitQuaternion::identity(),
                fov_deg,
            },
            fov_velocity: 0.0,
            position_velocity: Vector::zeros(),
        }
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn pose(&self) -> CameraPose {
        self.pose
    }

    /// Where the camera is heading for the given motion.
    pub fn camera_node(&self, motion: &MotionUpdate) -> Point<Real> {
        motion.body_position + motion.look_rotation * self.config.node_offset()
    }

    pub fn on_motion(&mut self, motion: &MotionUpdate) -> CameraPose {
        let target_fov = self.config.target_fov(motion.speed);
        self.pose.fov_deg = smooth_damp(
            self.pose.fov_deg,
            target_fov,
            &mut self.fov_velocity,
            self.config.fov_smoothing,
            motion.dt,
        );
        let node = self.camera_node(motion);
        self.pose.position = Point::from(smooth_damp_vector(
            self.pose.position.coords,
            node.coords,
            &mut self.position_velocity,
            self.config.position_smoothing,
            motion.dt,
        ));
        self.pose.rotation = motion.look_rotation;
        self.pose
    }
}
