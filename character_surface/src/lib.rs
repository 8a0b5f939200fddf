//! Ground, wall and ceiling tracking from physics contacts.
//!
//! Ordering within a fixed tick: [`SurfaceSampler::decay`] runs first, then
//! the contacts produced by that tick's physics step are fed to
//! [`SurfaceSampler::classify`]. A contact is therefore first observed by the
//! decay of the following tick, which reports it as raw.
#![forbid(unsafe_code)]

mod window;

pub use window::SlidingWindowAverage;

use physics_rapier::ContactPoint;
use rapier3d::math::{Point, Vector};
use rapier3d::prelude::Real;
use serde::{Deserialize, Serialize};

pub const NORMAL_WINDOW: usize = 4;

/// Slack for accumulated tick time when comparing against the coyote window.
const COYOTE_EPSILON: Real = 1.0e-5;

/// Angle bands measured between a contact normal and the perceived up.
/// Bands are inclusive and may overlap.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceBands {
    pub max_ground_angle_deg: Real,
    pub min_wall_angle_deg: Real,
    pub max_wall_angle_deg: Real,
    pub min_ceiling_angle_deg: Real,
    /// Seconds a surface stays contacting after the last contact.
    pub coyote_time: Real,
}

impl Default for SurfaceBands {
    fn default() -> Self {
        Self {
            max_ground_angle_deg: 45.0,
            min_wall_angle_deg: 45.0,
            max_wall_angle_deg: 100.0,
            min_ceiling_angle_deg: 100.0,
            coyote_time: 0.1,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct BandCosines {
    ground: Real,
    min_wall: Real,
    max_wall: Real,
    ceiling: Real,
}

impl From<&SurfaceBands> for BandCosines {
    fn from(bands: &SurfaceBands) -> Self {
        Self {
            ground: bands.max_ground_angle_deg.to_radians().cos(),
            min_wall: bands.min_wall_angle_deg.to_radians().cos(),
            max_wall: bands.max_wall_angle_deg.to_radians().cos(),
            ceiling: bands.min_ceiling_angle_deg.to_radians().cos(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceClass {
    Ground,
    Wall,
    Ceiling,
}

#[derive(Clone, Debug)]
pub struct SurfaceState {
    is_contacting_raw: bool,
    is_contacting: bool,
    normal: Vector<Real>,
    point: Point<Real>,
    time_since_contact: Real,
    normals: SlidingWindowAverage,
}

impl Default for SurfaceState {
    fn default() -> Self {
        Self {
            is_contacting_raw: false,
            is_contacting: false,
            normal: Vector::zeros(),
            point: Point::origin(),
            time_since_contact: Real::INFINITY,
            normals: SlidingWindowAverage::new(NORMAL_WINDOW, Vector::zeros()),
        }
    }
}

impl SurfaceState {
    /// Contact happened exactly at the last decay.
    pub fn is_contacting_raw(&self) -> bool {
        self.is_contacting_raw
    }

    pub fn is_contacting(&self) -> bool {
        self.is_contacting
    }

    /// Smoothed contact normal. Only meaningful while contacting.
    pub fn normal(&self) -> Vector<Real> {
        self.normal
    }

    pub fn point(&self) -> Point<Real> {
        self.point
    }

    pub fn time_since_contact(&self) -> Real {
        self.time_since_contact
    }

    fn record(&mut self, contact: &ContactPoint) {
        if self.is_contacting {
            self.normals.push(contact.normal);
        } else {
            self.normals.reset(contact.normal);
        }
        let average = self.normals.average();
        self.normal = average.try_normalize(1.0e-6).unwrap_or(average);
        self.point = contact.point;
        self.time_since_contact = 0.0;
    }

    fn decay(&mut self, dt: Real, coyote_time: Real) {
        self.is_contacting_raw = self.time_since_contact == 0.0;
        self.is_contacting =
            self.is_contacting_raw || self.time_since_contact + COYOTE_EPSILON < coyote_time;
        self.time_since_contact += dt;
    }
}

#[derive(Clone, Debug, Default)]
pub struct SurfaceSampler {
    ground: SurfaceState,
    wall: SurfaceState,
    ceiling: SurfaceState,
}

impl SurfaceSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ground(&self) -> &SurfaceState {
        &self.ground
    }

    pub fn wall(&self) -> &SurfaceState {
        &self.wall
    }

    pub fn ceiling(&self) -> &SurfaceState {
        &self.ceiling
    }

    pub fn surface(&self, class: SurfaceClass) -> &SurfaceState {
        match class {
            SurfaceClass::Ground => &self.ground,
            SurfaceClass::Wall => &self.wall,
            SurfaceClass::Ceiling => &self.ceiling,
        }
    }

    /// Classes a single normal falls into, in ground, wall, ceiling order.
    pub fn classes_of(
        normal: Vector<Real>,
        perceived_up: Vector<Real>,
        bands: &SurfaceBands,
    ) -> Vec<SurfaceClass> {
        let cosines = BandCosines::from(bands);
        Self::classes_with(normal.dot(&perceived_up), &cosines)
    }

    fn classes_with(dot: Real, cosines: &BandCosines) -> Vec<SurfaceClass> {
        let mut classes = Vec::with_capacity(3);
        if dot >= cosines.ground {
            classes.push(SurfaceClass::Ground);
        }
        if dot <= cosines.min_wall && dot >= cosines.max_wall {
            classes.push(SurfaceClass::Wall);
        }
        if dot <= cosines.ceiling {
            classes.push(SurfaceClass::Ceiling);
        }
        classes
    }

    /// Feeds the contacts of one physics step. Returns how many class
    /// updates were made.
    pub fn classify(
        &mut self,
        contacts: &[ContactPoint],
        perceived_up: Vector<Real>,
        bands: &SurfaceBands,
    ) -> usize {
        let cosines = BandCosines::from(bands);
        let mut updates = 0usize;
        for contact in contacts {
            let dot = contact.normal.dot(&perceived_up);
            for class in Self::classes_with(dot, &cosines) {
                self.surface_mut(class).record(contact);
                updates += 1;
            }
        }
        updates
    }

    pub fn decay(&mut self, dt: Real, coyote_time: Real) {
        self.ground.decay(dt, coyote_time);
        self.wall.decay(dt, coyote_time);
        self.ceiling.decay(dt, coyote_time);
    }

    fn surface_mut(&mut self, class: SurfaceClass) -> &mut SurfaceState {
        match class {
            SurfaceClass::Ground => &mut self.ground,
            SurfaceClass::Wall => &mut self.wall,
            SurfaceClass::Ceiling => &mut self.ceiling,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rapier3d::prelude::ColliderHandle;

    fn contact(normal: Vector<Real>) -> ContactPoint {
        ContactPoint {
            normal,
            point: Point::new(1.0, 0.0, 2.0),
            other: ColliderHandle::invalid(),
        }
    }

    fn ticks_contacting(coyote_time: Real, dt: Real) -> usize {
        let bands = SurfaceBands {
            coyote_time,
            ..SurfaceBands::default()
        };
        let mut sampler = SurfaceSampler::new();
        sampler.decay(dt, coyote_time);
        sampler.classify(&[contact(Vector::y())], Vector::y(), &bands);
        let mut count = 0;
        for tick in 0..100 {
            sampler.decay(dt, coyote_time);
            if !sampler.ground().is_contacting() {
                break;
            }
            assert_eq!(sampler.ground().is_contacting_raw(), tick == 0);
            count += 1;
        }
        count
    }

    #[test]
    fn starts_without_contact() {
        let mut sampler = SurfaceSampler::new();
        sampler.decay(0.02, 0.1);
        assert!(!sampler.ground().is_contacting());
        assert!(!sampler.wall().is_contacting_raw());
        assert_eq!(sampler.ceiling().normal(), Vector::zeros());
    }

    #[test]
    fn coyote_time_counts_whole_ticks() {
        assert_eq!(ticks_contacting(0.1, 0.02), 5);
        assert_eq!(ticks_contacting(0.05, 0.02), 3);
        assert_eq!(ticks_contacting(0.0, 0.02), 1);
    }

    #[test]
    fn raw_implies_contacting() {
        let bands = SurfaceBands::default();
        let mut sampler = SurfaceSampler::new();
        for tick in 0..20 {
            sampler.decay(0.02, bands.coyote_time);
            let ground = sampler.ground();
            assert!(!ground.is_contacting_raw() || ground.is_contacting());
            if tick % 7 == 0 {
                sampler.classify(&[contact(Vector::y())], Vector::y(), &bands);
            }
        }
    }

    #[test]
    fn boundary_normal_is_ground_and_wall() {
        let bands = SurfaceBands::default();
        let cos = bands.max_ground_angle_deg.to_radians().cos();
        let normal = Vector::new((1.0 - cos * cos).sqrt(), cos, 0.0);
        let classes = SurfaceSampler::classes_of(normal, Vector::y(), &bands);
        assert_eq!(classes, vec![SurfaceClass::Ground, SurfaceClass::Wall]);

        let mut sampler = SurfaceSampler::new();
        assert_eq!(sampler.classify(&[contact(normal)], Vector::y(), &bands), 2);
        sampler.decay(0.02, bands.coyote_time);
        assert!(sampler.ground().is_contacting_raw());
        assert!(sampler.wall().is_contacting_raw());
        assert!(!sampler.ceiling().is_contacting());
    }

    #[test]
    fn classification_follows_perceived_up() {
        let bands = SurfaceBands::default();
        let up = Vector::x();
        assert_eq!(
            SurfaceSampler::classes_of(Vector::x(), up, &bands),
            vec![SurfaceClass::Ground]
        );
        assert_eq!(
            SurfaceSampler::classes_of(Vector::y(), up, &bands),
            vec![SurfaceClass::Wall]
        );
        assert_eq!(
            SurfaceSampler::classes_of(-Vector::x(), up, &bands),
            vec![SurfaceClass::Ceiling]
        );
    }

    #[test]
    fn first_contact_resets_normal_then_averages() {
        let bands = SurfaceBands::default();
        let mut sampler = SurfaceSampler::new();
        let tilted = Vector::new(0.3, 1.0, 0.0).normalize();
        sampler.classify(&[contact(tilted)], Vector::y(), &bands);
        assert!((sampler.ground().normal() - tilted).norm() < 1.0e-5);

        sampler.decay(0.02, bands.coyote_time);
        sampler.classify(&[contact(Vector::y())], Vector::y(), &bands);
        let expected = (tilted * 3.0 + Vector::y()).normalize();
        assert!((sampler.ground().normal() - expected).norm() < 1.0e-5);
        assert_eq!(sampler.ground().point(), Point::new(1.0, 0.0, 2.0));
        assert_eq!(sampler.ground().time_since_contact(), 0.0);
    }

    #[test]
    fn contact_after_expiry_resets_average() {
        let bands = SurfaceBands::default();
        let mut sampler = SurfaceSampler::new();
        sampler.classify(&[contact(Vector::new(0.5, 1.0, 0.0).normalize())], Vector::y(), &bands);
        for _ in 0..10 {
            sampler.decay(0.02, bands.coyote_time);
        }
        assert!(!sampler.ground().is_contacting());
        sampler.classify(&[contact(Vector::y())], Vector::y(), &bands);
        assert!((sampler.ground().normal() - Vector::y()).norm() < 1.0e-5);
    }
}
