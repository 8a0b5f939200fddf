//! Surface-relative locomotion: look, walk, jetpack, jump, friction and
//! gravity, producing forces for a dynamic rigid body.
#![forbid(unsafe_code)]

pub mod config;
pub mod grapple;
pub mod look;
pub mod smoothing;

pub use config::{ControlConfig, PlayerConfig};
pub use grapple::{GrappleController, GrappleTarget, ProjectileSpawner};
pub use look::{look_rotation, project_on_plane, LookState};

use character_surface::{SurfaceSampler, SurfaceState};
use physics_rapier::AppliedForce;
use rapier3d::math::Vector;
use rapier3d::na::{UnitQuaternion, Vector4};
use rapier3d::prelude::Real;

/// Squared length under which the move axis counts as released.
const MOVE_DEADZONE_SQ: Real = 1.0e-4;
const JUMP_TIMER_EPSILON: Real = 1.0e-5;

#[derive(Clone, Copy, Debug, Default)]
pub struct MotorInput {
    /// Strafe (x) and forward (y).
    pub move_axis: [Real; 2],
    pub look_delta: [Real; 2],
    pub jump: bool,
    pub crouch: bool,
    pub alt_mode: bool,
    pub grapple: bool,
}

impl MotorInput {
    fn has_move(&self) -> bool {
        let [x, y] = self.move_axis;
        x * x + y * y >= MOVE_DEADZONE_SQ
    }

    fn vertical(&self) -> Real {
        match (self.jump, self.crouch) {
            (true, false) => 1.0,
            (false, true) => -1.0,
            _ => 0.0,
        }
    }
}

/// Body state sampled at the start of the tick.
#[derive(Clone, Copy, Debug)]
pub struct BodySnapshot {
    pub rotation: UnitQuaternion<Real>,
    pub velocity: Vector<Real>,
    pub gravity: Vector<Real>,
}

impl BodySnapshot {
    pub fn perceived_up(&self) -> Vector<Real> {
        self.rotation * Vector::y()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrictionMode {
    HighFriction,
    NoFriction,
}

#[derive(Clone, Debug)]
pub struct MotorOutput {
    /// Forces to apply this tick, in order.
    pub forces: Vec<AppliedForce>,
    pub look_rotation: UnitQuaternion<Real>,
    /// Facing frame used for movement, tilted onto the ground when grounded.
    pub move_rotation: UnitQuaternion<Real>,
    /// New body orientation; `None` leaves the body as is.
    pub body_rotation: Option<UnitQuaternion<Real>>,
    /// Set only when the friction mode changes.
    pub friction_change: Option<FrictionMode>,
    pub linear_damping: Real,
    pub jumped: bool,
    pub moving: bool,
    pub grounded: bool,
}

pub struct LocomotionController {
    player: PlayerConfig,
    control: ControlConfig,
    look: LookState,
    jump_timer: Real,
    jump_normal: Vector<Real>,
    rotation_derivative: Vector4<Real>,
    friction: Option<FrictionMode>,
}

impl LocomotionController {
    pub fn new(player: PlayerConfig, control: ControlConfig, forward: Vector<Real>) -> Self {
        Self {
            player,
            control,
            look: LookState::new(forward),
            jump_timer: 0.0,
            jump_normal: Vector::zeros(),
            rotation_derivative: Vector4::zeros(),
            friction: None,
        }
    }

    pub fn player_config(&self) -> &PlayerConfig {
        &self.player
    }

    pub fn control_config(&self) -> &ControlConfig {
        &self.control
    }

    pub fn look_direction(&self) -> Vector<Real> {
        self.look.direction()
    }

    pub fn friction_mode(&self) -> Option<FrictionMode> {
        self.friction
    }

    pub fn jump_timer(&self) -> Real {
        self.jump_timer
    }

    pub fn step(
        &mut self,
        input: &MotorInput,
        surfaces: &SurfaceSampler,
        body: &BodySnapshot,
        attraction: Vector<Real>,
        dt: Real,
    ) -> MotorOutput {
        let ground = surfaces.ground();
        let up = body
            .perceived_up()
            .try_normalize(1.0e-6)
            .unwrap_or_else(Vector::y);
        let speed = body.velocity.norm();
        let mut forces = Vec::new();

        let linear_damping = if input.alt_mode {
            self.player.jet_drag
        } else if ground.is_contacting_raw() {
            self.player.walk_drag
        } else {
            self.player.air_drag
        };

        let jumped = self.update_jump(input.jump, surfaces, dt, &mut forces);

        let look = self.look.apply(
            input.look_delta,
            self.control.mouse_sensitivity,
            up,
            self.control.pitch_margin_deg,
        );
        let planar = project_on_plane(self.look.direction(), up);
        let facing = look_rotation(planar, up);
        let mut move_rotation = facing;

        let gravity = ground_gravity(body.gravity, ground);

        let mut friction = FrictionMode::NoFriction;
        let mut body_rotation = None;
        let moving = input.has_move();
        if !moving {
            if ground.is_contacting() && speed < self.player.stationary_friction_speed {
                friction = FrictionMode::HighFriction;
            }
        } else {
            body_rotation = Some(smoothing::smooth_damp_rotation(
                body.rotation,
                facing,
                &mut self.rotation_derivative,
                self.player.rotation_smoothing,
                dt,
            ));
            let [x, y] = input.move_axis;
            if ground.is_contacting() {
                if let Some(tilt) = UnitQuaternion::rotation_between(&up, &ground.normal()) {
                    move_rotation = tilt * move_rotation;
                }
                let direction = move_rotation * Vector::new(x, 0.0, y);
                push_nonzero(
                    &mut forces,
                    AppliedForce::acceleration(direction * self.player.walk_move_force),
                );
            } else {
                let local = Vector::new(x, input.vertical(), y);
                let direction = move_rotation * local.try_normalize(1.0e-6).unwrap_or(local);
                push_nonzero(
                    &mut forces,
                    AppliedForce::acceleration(direction * self.player.jetpack_force),
                );
            }
        }

        let friction_change = if self.friction != Some(friction) {
            self.friction = Some(friction);
            Some(friction)
        } else {
            None
        };

        push_nonzero(&mut forces, AppliedForce::acceleration(gravity));
        push_nonzero(&mut forces, AppliedForce::acceleration(attraction));

        MotorOutput {
            forces,
            look_rotation: look,
            move_rotation,
            body_rotation,
            friction_change,
            linear_damping,
            jumped,
            moving,
            grounded: ground.is_contacting_raw(),
        }
    }

    /// Holding jump on a contacting surface re-arms the timer; the impulse
    /// fires every tick while the timer runs.
    fn update_jump(
        &mut self,
        held: bool,
        surfaces: &SurfaceSampler,
        dt: Real,
        forces: &mut Vec<AppliedForce>,
    ) -> bool {
        if held {
            let ground = surfaces.ground();
            let wall = surfaces.wall();
            if ground.is_contacting() {
                self.jump_timer = self.player.max_jump_time;
                self.jump_normal = ground.normal();
            } else if wall.is_contacting() {
                self.jump_timer = self.player.max_jump_time;
                self.jump_normal = wall.normal();
            }
        } else {
            self.jump_timer = 0.0;
        }
        if self.jump_timer <= JUMP_TIMER_EPSILON {
            return false;
        }
        self.jump_timer -= dt;
        forces.push(AppliedForce::velocity_change(
            self.jump_normal * self.player.jump_force,
        ));
        true
    }
}

/// Gravity pressing into the ground is reduced to its component along the
/// ground normal so the body does not slide down slopes.
fn ground_gravity(gravity: Vector<Real>, ground: &SurfaceState) -> Vector<Real> {
    if !ground.is_contacting() {
        return gravity;
    }
    let normal = ground.normal();
    let Some(direction) = gravity.try_normalize(1.0e-6) else {
        return gravity;
    };
    if direction.dot(&-normal) <= 0.0 {
        return gravity;
    }
    let length_sq = normal.norm_squared();
    if length_sq <= 0.0 {
        return gravity;
    }
    normal * (gravity.dot(&normal) / length_sq)
}

fn push_nonzero(forces: &mut Vec<AppliedForce>, force: AppliedForce) {
    if force.vector.norm_squared() > 0.0 {
        forces.push(force);
    }
}
