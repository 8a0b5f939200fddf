//! Player composition: surfaces, attraction, motor and grapple driving a
//! dynamic Rapier body.
//!
//! A tick is split around the physics step: [`PlayerController::begin_tick`]
//! decays surface state and applies this tick's forces, the world steps, then
//! [`PlayerController::end_tick`] classifies the contacts the step produced
//! and resolves grapple hits.
#![forbid(unsafe_code)]

use character_motor::{
    BodySnapshot, ControlConfig, FrictionMode, GrappleController, LocomotionController,
    MotorInput, PlayerConfig, ProjectileSpawner,
};
use character_surface::{SurfaceBands, SurfaceSampler};
use engine_core::logging;
use engine_core::observers::{ObserverId, Observers};
use physics_rapier::{FrictionMaterial, PhysicsWorld};
use player_camera::MotionUpdate;
use proximity_field::{AttractionInput, ProximityConfig, ProximityField, WorldProbe};
use rapier3d::math::{Point, Vector};
use rapier3d::na::UnitQuaternion;
use rapier3d::prelude::{
    ColliderBuilder, Group, InteractionGroups, Real, RigidBodyBuilder, RigidBodyHandle,
};
use serde::{Deserialize, Serialize};

const LOG_TARGET: &str = "player";
/// Player and projectiles share this group; projectiles ignore it.
const CHARACTER_GROUP: Group = Group::GROUP_2;

/// Proximity rays see the level but not the player or its projectiles.
fn proximity_groups() -> InteractionGroups {
    InteractionGroups::new(Group::ALL, !CHARACTER_GROUP)
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RawInput {
    pub move_x: Real,
    pub move_y: Real,
    pub look_delta: [Real; 2],
    pub jump: bool,
    pub crouch: bool,
    pub alt_mode: bool,
    pub grapple: bool,
}

pub trait InputAdapter {
    fn intent(&mut self, raw: RawInput) -> MotorInput;
}

#[derive(Default)]
pub struct DirectInputAdapter;

impl DirectInputAdapter {
    fn normalize_axis(axis: [Real; 2]) -> [Real; 2] {
        let len = (axis[0] * axis[0] + axis[1] * axis[1]).sqrt();
        if len > 1.0 {
            [axis[0] / len, axis[1] / len]
        } else {
            axis
        }
    }
}

impl InputAdapter for DirectInputAdapter {
    fn intent(&mut self, raw: RawInput) -> MotorInput {
        MotorInput {
            move_axis: Self::normalize_axis([raw.move_x, raw.move_y]),
            look_delta: raw.look_delta,
            jump: raw.jump,
            crouch: raw.crouch,
            alt_mode: raw.alt_mode,
            grapple: raw.grapple,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyShape {
    pub capsule_radius: Real,
    /// Half the distance between the capsule's sphere centers.
    pub capsule_half_height: Real,
    pub density: Real,
    pub projectile_radius: Real,
}

impl Default for BodyShape {
    fn default() -> Self {
        Self {
            capsule_radius: 0.4,
            capsule_half_height: 0.5,
            density: 1.0,
            projectile_radius: 0.05,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct PlayerSettings {
    pub bands: SurfaceBands,
    pub proximity: ProximityConfig,
    pub player: PlayerConfig,
    pub control: ControlConfig,
    pub shape: BodyShape,
}

#[derive(Clone, Copy, Debug)]
pub struct PlayerFrame {
    pub position: Point<Real>,
    pub velocity: Vector<Real>,
    pub look_rotation: UnitQuaternion<Real>,
    pub attraction: Vector<Real>,
    pub grounded: bool,
    pub on_wall: bool,
    pub jumped: bool,
    pub grappling: bool,
    pub projectiles_spawned: usize,
}

/// Grapple projectiles as small dynamic balls in the physics world.
struct WorldProjectiles<'a> {
    world: &'a mut PhysicsWorld,
    radius: Real,
}

impl ProjectileSpawner for WorldProjectiles<'_> {
    type Projectile = RigidBodyHandle;

    fn spawn(
        &mut self,
        origin: Point<Real>,
        direction: Vector<Real>,
        speed: Real,
    ) -> RigidBodyHandle {
        let body = RigidBodyBuilder::dynamic()
            .translation(origin.coords)
            .linvel(direction * speed)
            .ccd_enabled(true)
            .build();
        let handle = self.world.insert_body(body);
        let collider = ColliderBuilder::ball(self.radius)
            .collision_groups(InteractionGroups::new(
                CHARACTER_GROUP,
                !CHARACTER_GROUP,
            ))
            .build();
        self.world.insert_collider_with_parent(collider, handle);
        handle
    }

    fn despawn(&mut self, projectile: RigidBodyHandle) {
        self.world.remove_body(projectile);
    }
}

pub struct PlayerController<A: InputAdapter> {
    input: A,
    settings: PlayerSettings,
    body: RigidBodyHandle,
    surfaces: SurfaceSampler,
    proximity: ProximityField,
    motor: LocomotionController,
    grapple: GrappleController<RigidBodyHandle>,
    motion_observers: Observers<MotionUpdate>,
    wind_velocity: Vector<Real>,
}

impl<A: InputAdapter> PlayerController<A> {
    /// Inserts the character body. World gravity is applied by the motor, so
    /// the body itself ignores it.
    pub fn spawn(
        world: &mut PhysicsWorld,
        input: A,
        settings: PlayerSettings,
        position: Point<Real>,
        forward: Vector<Real>,
    ) -> Self {
        let body = RigidBodyBuilder::dynamic()
            .translation(position.coords)
            .gravity_scale(0.0)
            .lock_rotations()
            .build();
        let body = world.insert_body(body);
        let collider = ColliderBuilder::capsule_y(
            settings.shape.capsule_half_height,
            settings.shape.capsule_radius,
        )
        .density(settings.shape.density)
        .collision_groups(InteractionGroups::new(CHARACTER_GROUP, Group::ALL))
        .build();
        world.insert_collider_with_parent(collider, body);
        world.assign_material(body, FrictionMaterial::gripping(settings.player.high_friction));

        let motor =
            LocomotionController::new(settings.player.clone(), settings.control.clone(), forward);
        Self {
            input,
            settings,
            body,
            surfaces: SurfaceSampler::new(),
            proximity: ProximityField::new(),
            motor,
            grapple: GrappleController::new(),
            motion_observers: Observers::new(),
            wind_velocity: Vector::zeros(),
        }
    }

    pub fn body(&self) -> RigidBodyHandle {
        self.body
    }

    pub fn settings(&self) -> &PlayerSettings {
        &self.settings
    }

    pub fn surfaces(&self) -> &SurfaceSampler {
        &self.surfaces
    }

    pub fn motor(&self) -> &LocomotionController {
        &self.motor
    }

    pub fn grapple(&self) -> &GrappleController<RigidBodyHandle> {
        &self.grapple
    }

    pub fn set_wind_velocity(&mut self, wind: Vector<Real>) {
        self.wind_velocity = wind;
    }

    pub fn add_motion_observer(
        &mut self,
        observer: impl FnMut(&MotionUpdate) + 'static,
    ) -> ObserverId {
        self.motion_observers.add(observer)
    }

    pub fn remove_motion_observer(&mut self, id: ObserverId) -> bool {
        self.motion_observers.remove(id)
    }

    /// Runs the motor for this tick and applies its output to the body.
    /// Returns `None` if the body no longer exists.
    pub fn begin_tick(
        &mut self,
        world: &mut PhysicsWorld,
        raw: RawInput,
        dt: Real,
    ) -> Option<PlayerFrame> {
        let intent = self.input.intent(raw);
        self.surfaces.decay(dt, self.settings.bands.coyote_time);

        let rigid_body = world.body(self.body)?;
        let snapshot = BodySnapshot {
            rotation: *rigid_body.rotation(),
            velocity: *rigid_body.linvel(),
            gravity: world.gravity,
        };
        let position = Point::from(*rigid_body.translation());
        let center = *rigid_body.center_of_mass();

        let attraction = self.proximity.compute_attraction(
            &AttractionInput {
                center,
                velocity: snapshot.velocity,
                wind_velocity: self.wind_velocity,
            },
            &WorldProbe::new(world, Some(self.body)).with_groups(proximity_groups()),
            &self.settings.proximity,
        );

        let output = self
            .motor
            .step(&intent, &self.surfaces, &snapshot, attraction, dt);

        world.reset_forces(self.body);
        world.set_linear_damping(self.body, output.linear_damping);
        if let Some(rotation) = output.body_rotation {
            world.set_rotation(self.body, rotation);
        }
        if let Some(mode) = output.friction_change {
            let material = match mode {
                FrictionMode::HighFriction => {
                    FrictionMaterial::gripping(self.settings.player.high_friction)
                }
                FrictionMode::NoFriction => {
                    FrictionMaterial::sliding(self.settings.player.no_friction)
                }
            };
            world.assign_material(self.body, material);
        }
        for force in &output.forces {
            world.apply_force(self.body, *force);
        }

        let nozzle =
            position + output.look_rotation * Vector::from(self.settings.player.grapple_nozzle);
        let aim = self.motor.look_direction();
        let projectiles_spawned = {
            let mut spawner = WorldProjectiles {
                world: &mut *world,
                radius: self.settings.shape.projectile_radius,
            };
            self.grapple.update(
                intent.grapple,
                nozzle,
                aim,
                &self.settings.player,
                &mut spawner,
            )
        };
        if projectiles_spawned > 0 {
            logging::debug(
                LOG_TARGET,
                format!("fired {} grapple projectile(s)", projectiles_spawned),
            );
        }
        if let Some(pull) = self.grapple.force(position, &self.settings.player) {
            world.apply_force(self.body, pull);
        }

        self.motion_observers.notify(&MotionUpdate {
            dt,
            body_position: position,
            speed: snapshot.velocity.norm(),
            look_rotation: output.look_rotation,
        });

        Some(PlayerFrame {
            position,
            velocity: snapshot.velocity,
            look_rotation: output.look_rotation,
            attraction,
            grounded: output.grounded,
            on_wall: self.surfaces.wall().is_contacting(),
            jumped: output.jumped,
            grappling: self.grapple.is_grappling(),
            projectiles_spawned,
        })
    }

    /// Feeds the contacts of the step that just ran. Returns whether the
    /// grapple attached this tick.
    pub fn end_tick(&mut self, world: &mut PhysicsWorld) -> bool {
        let Some(rigid_body) = world.body(self.body) else {
            return false;
        };
        let perceived_up = rigid_body.rotation() * Vector::y();
        let position = Point::from(*rigid_body.translation());
        let contacts = world.contacts_of_body(self.body);
        self.surfaces
            .classify(&contacts, perceived_up, &self.settings.bands);

        let outstanding = self.grapple.outstanding().to_vec();
        for projectile in outstanding {
            let Some(hit) = world.contacts_of_body(projectile).into_iter().next() else {
                continue;
            };
            let mut spawner = WorldProjectiles {
                world: &mut *world,
                radius: self.settings.shape.projectile_radius,
            };
            if self
                .grapple
                .on_projectile_hit(projectile, hit.point, hit.normal, position, &mut spawner)
            {
                logging::debug(
                    LOG_TARGET,
                    format!(
                        "grapple attached at ({:.2}, {:.2}, {:.2})",
                        hit.point.x, hit.point.y, hit.point.z
                    ),
                );
                return true;
            }
        }
        false
    }

    /// `begin_tick`, one physics step, `end_tick`.
    pub fn tick(
        &mut self,
        world: &mut PhysicsWorld,
        raw: RawInput,
        dt: Real,
    ) -> Option<PlayerFrame> {
        let frame = self.begin_tick(world, raw, dt)?;
        world.step(dt);
        self.end_tick(world);
        Some(frame)
    }

    /// Removes the body and any grapple projectiles.
    pub fn despawn(mut self, world: &mut PhysicsWorld) {
        let mut spawner = WorldProjectiles {
            world: &mut *world,
            radius: self.settings.shape.projectile_radius,
        };
        self.grapple.release(&mut spawner);
        world.remove_body(self.body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use player_camera::{CameraConfig, FollowCamera};
    use std::cell::RefCell;
    use std::rc::Rc;

    const DT: Real = 1.0 / 60.0;

    fn build_scene(world: &mut PhysicsWorld) {
        let floor = ColliderBuilder::cuboid(30.0, 0.1, 30.0)
            .translation(Vector::new(0.0, -0.1, 0.0))
            .build();
        world.insert_static_collider(floor);
        world.step(DT);
    }

    fn spawn(
        world: &mut PhysicsWorld,
        settings: PlayerSettings,
        height: Real,
    ) -> PlayerController<DirectInputAdapter> {
        PlayerController::spawn(
            world,
            DirectInputAdapter,
            settings,
            Point::new(0.0, height, 0.0),
            Vector::z(),
        )
    }

    #[test]
    fn falls_and_lands_on_floor() {
        let mut world = PhysicsWorld::new(Vector::new(0.0, -9.81, 0.0));
        build_scene(&mut world);
        let mut player = spawn(&mut world, PlayerSettings::default(), 2.0);
        for _ in 0..180 {
            player.tick(&mut world, RawInput::default(), DT);
        }
        let position = world.body(player.body()).unwrap().translation().y;
        assert!((position - 0.9).abs() < 0.1, "rest height {position}");
        assert!(player.surfaces().ground().is_contacting());
        assert!(player.surfaces().ground().normal().y > 0.9);
        assert_eq!(player.motor().friction_mode(), Some(FrictionMode::HighFriction));
    }

    #[test]
    fn walking_moves_forward_and_feeds_camera() {
        let mut world = PhysicsWorld::new(Vector::new(0.0, -9.81, 0.0));
        build_scene(&mut world);
        let mut settings = PlayerSettings::default();
        settings.player.walk_move_force = 20.0;
        let mut player = spawn(&mut world, settings, 0.95);

        let camera = Rc::new(RefCell::new(FollowCamera::new(
            CameraConfig::default(),
            Point::origin(),
        )));
        let camera_for_observer = Rc::clone(&camera);
        player.add_motion_observer(move |motion| {
            camera_for_observer.borrow_mut().on_motion(motion);
        });

        for _ in 0..30 {
            player.tick(&mut world, RawInput::default(), DT);
        }
        let walk = RawInput {
            move_y: 1.0,
            ..RawInput::default()
        };
        for _ in 0..90 {
            player.tick(&mut world, walk, DT);
        }
        let body = world.body(player.body()).unwrap();
        assert!(body.translation().z > 1.0);
        assert!(body.translation().x.abs() < 0.2);
        assert!(camera.borrow().pose().fov_deg > CameraConfig::default().fov_base);
        assert_eq!(player.motor().friction_mode(), Some(FrictionMode::NoFriction));
    }

    #[test]
    fn grapple_attaches_to_wall_ahead() {
        let mut world = PhysicsWorld::new(Vector::new(0.0, -9.81, 0.0));
        build_scene(&mut world);
        let wall = ColliderBuilder::cuboid(10.0, 5.0, 1.0)
            .translation(Vector::new(0.0, 5.0, 6.0))
            .build();
        world.insert_static_collider(wall);
        world.step(DT);

        let mut settings = PlayerSettings::default();
        settings.player.grapple_spawns = 2;
        settings.player.grapple_speed = 20.0;
        settings.player.grapple_force = 5.0;
        let mut player = spawn(&mut world, settings, 0.95);

        let hold = RawInput {
            grapple: true,
            ..RawInput::default()
        };
        let first = player.tick(&mut world, hold, DT).unwrap();
        assert_eq!(first.projectiles_spawned, 2);
        for _ in 0..60 {
            player.tick(&mut world, hold, DT);
            if player.grapple().is_grappling() {
                break;
            }
        }
        assert!(player.grapple().is_grappling());
        assert!(player.grapple().outstanding().is_empty());
        let target = player.grapple().target().unwrap();
        assert!((target.point.z - 5.0).abs() < 0.5);
        // Only the character body remains.
        assert_eq!(world.bodies().len(), 1);

        player.tick(&mut world, RawInput::default(), DT);
        assert!(!player.grapple().is_grappling());
    }

    #[test]
    fn own_projectiles_do_not_attract() {
        let mut world = PhysicsWorld::new(Vector::zeros());
        let mut settings = PlayerSettings::default();
        settings.player.grapple_nozzle = [0.0, 0.0, 2.0];
        settings.shape.projectile_radius = 1.0;
        let mut player = spawn(&mut world, settings, 0.0);
        player.set_wind_velocity(Vector::x());

        let hold = RawInput {
            grapple: true,
            ..RawInput::default()
        };
        let first = player.tick(&mut world, hold, DT).unwrap();
        assert_eq!(first.projectiles_spawned, 1);
        let second = player.tick(&mut world, hold, DT).unwrap();
        assert!(player.grapple().is_travelling());
        assert_eq!(player.grapple().outstanding().len(), 1);
        assert_eq!(second.attraction, Vector::zeros());
    }

    #[test]
    fn removed_observer_stops_hearing_motion() {
        let mut world = PhysicsWorld::new(Vector::new(0.0, -9.81, 0.0));
        build_scene(&mut world);
        let mut player = spawn(&mut world, PlayerSettings::default(), 0.95);
        let heard = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&heard);
        let id = player.add_motion_observer(move |_| *counter.borrow_mut() += 1);
        player.tick(&mut world, RawInput::default(), DT);
        assert!(player.remove_motion_observer(id));
        player.tick(&mut world, RawInput::default(), DT);
        assert_eq!(*heard.borrow(), 1);

        player.despawn(&mut world);
        assert_eq!(world.bodies().len(), 0);
    }
}
