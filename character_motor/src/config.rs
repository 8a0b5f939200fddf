use rapier3d::prelude::Real;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Projectiles fired per grapple press.
    pub grapple_spawns: u32,
    pub grapple_speed: Real,
    pub grapple_force: Real,
    pub jetpack_force: Real,
    pub walk_move_force: Real,
    pub jump_force: Real,
    /// Seconds the jump impulse keeps firing after the last armed tick.
    pub max_jump_time: Real,
    pub walk_drag: Real,
    pub air_drag: Real,
    pub jet_drag: Real,
    pub stationary_friction_speed: Real,
    pub rotation_smoothing: Real,
    pub high_friction: Real,
    pub no_friction: Real,
    /// Projectile spawn offset in the look frame.
    pub grapple_nozzle: [Real; 3],
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            grapple_spawns: 1,
            grapple_speed: 1.0,
            grapple_force: 1.0,
            jetpack_force: 1.0,
            walk_move_force: 1.0,
            jump_force: 1.0,
            max_jump_time: 0.1,
            walk_drag: 1.0,
            air_drag: 0.0,
            jet_drag: 0.0,
            stationary_friction_speed: 0.1,
            rotation_smoothing: 0.2,
            high_friction: 1.0,
            no_friction: 0.0,
            grapple_nozzle: [0.0, 0.0, 0.5],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Degrees of rotation per unit of look delta.
    pub mouse_sensitivity: Real,
    /// Closest the look direction may get to straight up or down, in degrees.
    pub pitch_margin_deg: Real,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            mouse_sensitivity: 1.0,
            pitch_margin_deg: 10.0,
        }
    }
}
