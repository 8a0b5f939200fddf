use physics_rapier::AppliedForce;
use rapier3d::math::{Point, Vector};
use rapier3d::prelude::Real;

use crate::config::PlayerConfig;

/// Creates and destroys grapple projectiles in the host world.
pub trait ProjectileSpawner {
    type Projectile: Copy + Eq;

    /// Spawns a projectile at `origin` with an initial velocity change of
    /// `direction * speed`.
    fn spawn(&mut self, origin: Point<Real>, direction: Vector<Real>, speed: Real)
        -> Self::Projectile;

    fn despawn(&mut self, projectile: Self::Projectile);
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GrappleTarget {
    pub point: Point<Real>,
    pub normal: Vector<Real>,
    pub desired_distance: Real,
}

/// Fire, attach and release cycle of the grapple. One episode at a time:
/// pressing again while travelling or attached does nothing.
#[derive(Clone, Debug)]
pub struct GrappleController<P> {
    grappling: bool,
    travelling: bool,
    target: Option<GrappleTarget>,
    outstanding: Vec<P>,
}

impl<P> Default for GrappleController<P> {
    fn default() -> Self {
        Self {
            grappling: false,
            travelling: false,
            target: None,
            outstanding: Vec::new(),
        }
    }
}

impl<P: Copy + Eq> GrappleController<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_grappling(&self) -> bool {
        self.grappling
    }

    pub fn is_travelling(&self) -> bool {
        self.travelling
    }

    pub fn target(&self) -> Option<GrappleTarget> {
        self.target
    }

    pub fn outstanding(&self) -> &[P] {
        &self.outstanding
    }

    /// Applies the grapple button for this tick. Returns how many projectiles
    /// were spawned.
    pub fn update<S>(
        &mut self,
        pressed: bool,
        nozzle: Point<Real>,
        aim: Vector<Real>,
        config: &PlayerConfig,
        spawner: &mut S,
    ) -> usize
    where
        S: ProjectileSpawner<Projectile = P>,
    {
        if !pressed {
            self.release(spawner);
            return 0;
        }
        if self.grappling || self.travelling {
            return 0;
        }
        self.travelling = true;
        let count = config.grapple_spawns.max(1) as usize;
        for _ in 0..count {
            let projectile = spawner.spawn(nozzle, aim, config.grapple_speed);
            self.outstanding.push(projectile);
        }
        count
    }

    /// First collision of any tracked projectile attaches the grapple and
    /// despawns every outstanding projectile. Untracked projectiles are
    /// ignored.
    pub fn on_projectile_hit<S>(
        &mut self,
        projectile: P,
        point: Point<Real>,
        normal: Vector<Real>,
        position: Point<Real>,
        spawner: &mut S,
    ) -> bool
    where
        S: ProjectileSpawner<Projectile = P>,
    {
        if !self.outstanding.contains(&projectile) {
            return false;
        }
        self.grappling = true;
        self.target = Some(GrappleTarget {
            point,
            normal,
            desired_distance: (point - position).norm(),
        });
        self.clear_projectiles(spawner);
        true
    }

    pub fn release<S>(&mut self, spawner: &mut S)
    where
        S: ProjectileSpawner<Projectile = P>,
    {
        self.clear_projectiles(spawner);
        self.grappling = false;
        self.travelling = false;
    }

    /// Pull towards the attachment point while grappling.
    pub fn force(&self, position: Point<Real>, config: &PlayerConfig) -> Option<AppliedForce> {
        if !self.grappling {
            return None;
        }
        let target = self.target?;
        let direction = (target.point - position).try_normalize(1.0e-6)?;
        Some(AppliedForce::acceleration(direction * config.grapple_force))
    }

    fn clear_projectiles<S>(&mut self, spawner: &mut S)
    where
        S: ProjectileSpawner<Projectile = P>,
    {
        for projectile in self.outstanding.drain(..) {
            spawner.despawn(projectile);
        }
    }
}
