//! Rapier world hosting the character: bodies, rays, contacts and forces.
#![forbid(unsafe_code)]

use rapier3d::prelude::*;

/// How a force vector is turned into a change of motion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ForceMode {
    /// Continuous force in newtons, applied over the next step.
    Force,
    /// Continuous acceleration, independent of mass.
    Acceleration,
    /// Instant impulse in newton-seconds.
    Impulse,
    /// Instant change of velocity, independent of mass.
    VelocityChange,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AppliedForce {
    pub vector: Vector<Real>,
    pub mode: ForceMode,
}

impl AppliedForce {
    pub fn new(vector: Vector<Real>, mode: ForceMode) -> Self {
        Self { vector, mode }
    }

    pub fn acceleration(vector: Vector<Real>) -> Self {
        Self::new(vector, ForceMode::Acceleration)
    }

    pub fn velocity_change(vector: Vector<Real>) -> Self {
        Self::new(vector, ForceMode::VelocityChange)
    }
}

/// Surface response assigned to a body's colliders.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrictionMaterial {
    pub friction: Real,
    pub combine_rule: CoefficientCombineRule,
}

impl FrictionMaterial {
    /// Wins over the other surface's friction when higher.
    pub fn gripping(friction: Real) -> Self {
        Self {
            friction,
            combine_rule: CoefficientCombineRule::Max,
        }
    }

    /// Wins over the other surface's friction when lower.
    pub fn sliding(friction: Real) -> Self {
        Self {
            friction,
            combine_rule: CoefficientCombineRule::Min,
        }
    }
}

/// Contact on a body as seen from that body: `normal` points from the other
/// surface towards the body.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContactPoint {
    pub normal: Vector<Real>,
    pub point: Point<Real>,
    pub other: ColliderHandle,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    pub collider: ColliderHandle,
    pub distance: Real,
    pub normal: Vector<Real>,
    pub point: Point<Real>,
}

pub struct PhysicsWorld {
    pub gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: BroadPhaseMultiSap,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
}

impl PhysicsWorld {
    pub fn new(gravity: Vector<Real>) -> Self {
        Self {
            gravity,
            integration_parameters: IntegrationParameters::default(),
            pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: BroadPhaseMultiSap::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
        }
    }

    pub fn bodies(&self) -> &RigidBodySet {
        &self.bodies
    }

    pub fn colliders(&self) -> &ColliderSet {
        &self.colliders
    }

    pub fn query_pipeline(&self) -> &QueryPipeline {
        &self.query_pipeline
    }

    pub fn body(&self, handle: RigidBodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle)
    }

    pub fn body_mut(&mut self, handle: RigidBodyHandle) -> Option<&mut RigidBody> {
        self.bodies.get_mut(handle)
    }

    pub fn step(&mut self, dt: Real) {
        self.integration_parameters.dt = dt;
        let physics_hooks = ();
        let event_handler = ();
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &physics_hooks,
            &event_handler,
        );
    }

    pub fn insert_static_collider(&mut self, collider: Collider) -> ColliderHandle {
        self.colliders.insert(collider)
    }

    pub fn insert_body(&mut self, body: RigidBody) -> RigidBodyHandle {
        self.bodies.insert(body)
    }

    pub fn insert_collider_with_parent(
        &mut self,
        collider: Collider,
        parent: RigidBodyHandle,
    ) -> ColliderHandle {
        self.colliders
            .insert_with_parent(collider, parent, &mut self.bodies)
    }

    /// Removes a body with its attached colliders.
    pub fn remove_body(&mut self, handle: RigidBodyHandle) -> bool {
        self.bodies
            .remove(
                handle,
                &mut self.island_manager,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            )
            .is_some()
    }

    /// Casts a ray against every collider except those attached to `exclude`.
    pub fn cast_ray(
        &self,
        origin: Point<Real>,
        direction: Vector<Real>,
        max_distance: Real,
        exclude: Option<RigidBodyHandle>,
    ) -> Option<RayHit> {
        self.cast_ray_in_groups(origin, direction, max_distance, exclude, None)
    }

    /// Like [`PhysicsWorld::cast_ray`], but only colliders whose collision
    /// groups interact with `groups` can be hit.
    pub fn cast_ray_in_groups(
        &self,
        origin: Point<Real>,
        direction: Vector<Real>,
        max_distance: Real,
        exclude: Option<RigidBodyHandle>,
        groups: Option<InteractionGroups>,
    ) -> Option<RayHit> {
        if direction.norm_squared() <= 0.0 || max_distance <= 0.0 {
            return None;
        }
        let ray = Ray::new(origin, direction.normalize());
        let mut filter = QueryFilter::default();
        if let Some(handle) = exclude {
            filter = filter.exclude_rigid_body(handle);
        }
        if let Some(groups) = groups {
            filter = filter.groups(groups);
        }
        let (collider, hit) = self.query_pipeline.cast_ray_and_get_normal(
            &self.bodies,
            &self.colliders,
            &ray,
            max_distance,
            true,
            filter,
        )?;
        Some(RayHit {
            collider,
            distance: hit.time_of_impact,
            normal: hit.normal,
            point: ray.point_at(hit.time_of_impact),
        })
    }

    /// Active contacts touching any collider of `body`, in the body's frame of
    /// reference (normals point towards the body).
    pub fn contacts_of_body(&self, body: RigidBodyHandle) -> Vec<ContactPoint> {
        let Some(rigid_body) = self.bodies.get(body) else {
            return Vec::new();
        };
        let mut contacts = Vec::new();
        for &collider in rigid_body.colliders() {
            self.collect_contacts(collider, &mut contacts);
        }
        contacts
    }

    fn collect_contacts(&self, collider: ColliderHandle, out: &mut Vec<ContactPoint>) {
        for pair in self.narrow_phase.contact_pairs_with(collider) {
            if !pair.has_any_active_contact {
                continue;
            }
            let (sign, other) = if pair.collider1 == collider {
                (-1.0, pair.collider2)
            } else {
                (1.0, pair.collider1)
            };
            for manifold in &pair.manifolds {
                let normal = manifold.data.normal * sign;
                for contact in &manifold.data.solver_contacts {
                    out.push(ContactPoint {
                        normal,
                        point: contact.point,
                        other,
                    });
                }
            }
        }
    }

    /// Applies `force` to a dynamic body. Continuous modes accumulate until
    /// [`PhysicsWorld::reset_forces`] is called.
    pub fn apply_force(&mut self, handle: RigidBodyHandle, force: AppliedForce) {
        let Some(body) = self.bodies.get_mut(handle) else {
            return;
        };
        let mass = body.mass();
        match force.mode {
            ForceMode::Force => body.add_force(force.vector, true),
            ForceMode::Acceleration => body.add_force(force.vector * mass, true),
            ForceMode::Impulse => body.apply_impulse(force.vector, true),
            ForceMode::VelocityChange => body.apply_impulse(force.vector * mass, true),
        }
    }

    pub fn reset_forces(&mut self, handle: RigidBodyHandle) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.reset_forces(false);
        }
    }

    pub fn set_linear_damping(&mut self, handle: RigidBodyHandle, damping: Real) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_linear_damping(damping.max(0.0));
        }
    }

    pub fn set_rotation(&mut self, handle: RigidBodyHandle, rotation: Rotation<Real>) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_rotation(rotation, true);
        }
    }

    /// Assigns `material` to every collider attached to `body`.
    pub fn assign_material(&mut self, body: RigidBodyHandle, material: FrictionMaterial) {
        let Some(rigid_body) = self.bodies.get(body) else {
            return;
        };
        let handles: Vec<ColliderHandle> = rigid_body.colliders().to_vec();
        for handle in handles {
            if let Some(collider) = self.colliders.get_mut(handle) {
                collider.set_friction(material.friction);
                collider.set_friction_combine_rule(material.combine_rule);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: Real = 1.0 / 60.0;

    fn build_floor(world: &mut PhysicsWorld) -> ColliderHandle {
        let floor = ColliderBuilder::cuboid(5.0, 0.1, 5.0)
            .translation(vector![0.0, -0.1, 0.0])
            .build();
        world.insert_static_collider(floor)
    }

    fn spawn_ball(world: &mut PhysicsWorld, position: Vector<Real>) -> RigidBodyHandle {
        let body = RigidBodyBuilder::dynamic().translation(position).build();
        let handle = world.insert_body(body);
        world.insert_collider_with_parent(ColliderBuilder::ball(0.5).build(), handle);
        handle
    }

    #[test]
    fn ray_hits_floor_and_skips_excluded_body() {
        let mut world = PhysicsWorld::new(Vector::zeros());
        build_floor(&mut world);
        let ball = spawn_ball(&mut world, vector![0.0, 2.0, 0.0]);
        world.step(DT);

        let origin = point![0.0, 2.0, 0.0];
        let hit = world
            .cast_ray(origin, -Vector::y(), 10.0, Some(ball))
            .expect("floor below");
        assert!((hit.distance - 2.0).abs() < 1.0e-3);
        assert!(hit.normal.y > 0.99);

        let unfiltered = world.cast_ray(origin, -Vector::y(), 10.0, None).unwrap();
        assert!(unfiltered.distance < 1.0e-3);
        assert!(world.cast_ray(origin, Vector::y(), 10.0, Some(ball)).is_none());
    }

    #[test]
    fn ray_skips_colliders_outside_query_groups() {
        let mut world = PhysicsWorld::new(Vector::zeros());
        build_floor(&mut world);
        let marker = world.insert_static_collider(
            ColliderBuilder::ball(0.5)
                .translation(vector![0.0, 1.0, 0.0])
                .collision_groups(InteractionGroups::new(Group::GROUP_2, Group::ALL))
                .build(),
        );
        world.step(DT);

        let origin = point![0.0, 3.0, 0.0];
        let hit = world.cast_ray(origin, -Vector::y(), 10.0, None).unwrap();
        assert_eq!(hit.collider, marker);

        let skip_marker = InteractionGroups::new(Group::ALL, !Group::GROUP_2);
        let hit = world
            .cast_ray_in_groups(origin, -Vector::y(), 10.0, None, Some(skip_marker))
            .expect("floor below marker");
        assert_ne!(hit.collider, marker);
        assert!((hit.distance - 3.0).abs() < 1.0e-3);
    }

    #[test]
    fn resting_body_reports_upward_contact() {
        let mut world = PhysicsWorld::new(vector![0.0, -9.81, 0.0]);
        build_floor(&mut world);
        let ball = spawn_ball(&mut world, vector![0.0, 0.55, 0.0]);
        for _ in 0..30 {
            world.step(DT);
        }
        let contacts = world.contacts_of_body(ball);
        assert!(!contacts.is_empty());
        assert!(contacts.iter().all(|contact| contact.normal.y > 0.9));
    }

    #[test]
    fn acceleration_ignores_mass() {
        let mut world = PhysicsWorld::new(Vector::zeros());
        let ball = spawn_ball(&mut world, vector![0.0, 5.0, 0.0]);
        world.step(DT);
        world.apply_force(ball, AppliedForce::acceleration(vector![6.0, 0.0, 0.0]));
        world.step(DT);
        let velocity = world.body(ball).unwrap().linvel().x;
        assert!((velocity - 6.0 * DT).abs() < 1.0e-3);
    }

    #[test]
    fn velocity_change_is_immediate() {
        let mut world = PhysicsWorld::new(Vector::zeros());
        let ball = spawn_ball(&mut world, vector![0.0, 5.0, 0.0]);
        world.step(DT);
        world.apply_force(ball, AppliedForce::velocity_change(vector![0.0, 3.0, 0.0]));
        let velocity = world.body(ball).unwrap().linvel().y;
        assert!((velocity - 3.0).abs() < 1.0e-4);
    }

    #[test]
    fn material_assignment_reaches_colliders() {
        let mut world = PhysicsWorld::new(Vector::zeros());
        let ball = spawn_ball(&mut world, vector![0.0, 5.0, 0.0]);
        world.assign_material(ball, FrictionMaterial::sliding(0.0));
        let collider = world.body(ball).unwrap().colliders()[0];
        assert_eq!(world.colliders().get(collider).unwrap().friction(), 0.0);
    }

    #[test]
    fn remove_body_drops_colliders() {
        let mut world = PhysicsWorld::new(Vector::zeros());
        let ball = spawn_ball(&mut world, vector![0.0, 5.0, 0.0]);
        assert!(world.remove_body(ball));
        assert_eq!(world.colliders().len(), 0);
        assert!(!world.remove_body(ball));
    }
}
