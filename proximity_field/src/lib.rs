//! Attraction towards nearby geometry sampled with rays on a Fibonacci sphere.
#![forbid(unsafe_code)]

mod curve;
mod directions;

pub use curve::{Keyframe, ResponseCurve, WeightedCurve};
pub use directions::{fibonacci_directions, fibonacci_directions_partial};

use physics_rapier::{PhysicsWorld, RayHit};
use rapier3d::math::{Point, Vector};
use rapier3d::prelude::{InteractionGroups, Real, RigidBodyHandle};
use serde::{Deserialize, Serialize};

pub const MIN_SAMPLE_COUNT: usize = 8;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProximityConfig {
    pub sample_count: usize,
    /// Ray length in meters.
    pub range: Real,
    pub speed: WeightedCurve,
    pub angle: WeightedCurve,
    pub proximity: WeightedCurve,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            sample_count: 150,
            range: 4.0,
            speed: WeightedCurve::default(),
            angle: WeightedCurve::default(),
            proximity: WeightedCurve::default(),
        }
    }
}

impl ProximityConfig {
    pub fn effective_sample_count(&self) -> usize {
        self.sample_count.max(MIN_SAMPLE_COUNT)
    }
}

/// Anything that can answer a ray query from the body's position.
pub trait RayProbe {
    fn cast(&self, origin: Point<Real>, direction: Vector<Real>, max_distance: Real)
        -> Option<RayHit>;
}

/// Ray probe over a physics world that ignores the casting body.
pub struct WorldProbe<'a> {
    world: &'a PhysicsWorld,
    exclude: Option<RigidBodyHandle>,
    groups: Option<InteractionGroups>,
}

impl<'a> WorldProbe<'a> {
    pub fn new(world: &'a PhysicsWorld, exclude: Option<RigidBodyHandle>) -> Self {
        Self {
            world,
            exclude,
            groups: None,
        }
    }

    /// Restricts hits to colliders whose groups interact with `groups`.
    pub fn with_groups(mut self, groups: InteractionGroups) -> Self {
        self.groups = Some(groups);
        self
    }
}

impl RayProbe for WorldProbe<'_> {
    fn cast(
        &self,
        origin: Point<Real>,
        direction: Vector<Real>,
        max_distance: Real,
    ) -> Option<RayHit> {
        self.world
            .cast_ray_in_groups(origin, direction, max_distance, self.exclude, self.groups)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct AttractionInput {
    pub center: Point<Real>,
    pub velocity: Vector<Real>,
    pub wind_velocity: Vector<Real>,
}

/// Sample directions cached per count.
#[derive(Clone, Debug, Default)]
pub struct ProximityField {
    directions: Vec<Vector<Real>>,
}

impl ProximityField {
    pub fn new() -> Self {
        Self::default()
    }

    /// Regenerates the cached directions only when the count changes.
    pub fn sample_directions(&mut self, config: &ProximityConfig) -> &[Vector<Real>] {
        let count = config.effective_sample_count();
        if self.directions.len() != count {
            self.directions = fibonacci_directions(count);
        }
        &self.directions
    }

    /// Sum of the weighted pulls of every ray that hits within range.
    pub fn compute_attraction(
        &mut self,
        input: &AttractionInput,
        probe: &impl RayProbe,
        config: &ProximityConfig,
    ) -> Vector<Real> {
        let range = config.range;
        if range.is_nan() || range <= 0.0 {
            return Vector::zeros();
        }
        let air_velocity = input.velocity - input.wind_velocity;
        let air_speed = air_velocity.norm();
        let air_direction = if air_speed > 0.0 {
            air_velocity / air_speed
        } else {
            Vector::zeros()
        };
        let speed_force = config.speed.evaluate(air_speed);

        let mut attraction = Vector::zeros();
        for &direction in self.sample_directions(config) {
            let Some(hit) = probe.cast(input.center, direction, range) else {
                continue;
            };
            let proximity_factor = 1.0 - hit.distance / range;
            let mut angle_factor = 1.0 - air_direction.dot(&hit.normal).abs();
            if air_speed == 0.0 || angle_factor.is_nan() {
                angle_factor = 0.0;
            }
            let angle_force = config.angle.evaluate(angle_factor);
            let proximity_force = config.proximity.evaluate(proximity_factor);
            attraction += direction * angle_force * speed_force * proximity_force;
        }
        attraction
    }
}
