use rapier3d::math::Point;
use rapier3d::prelude::Real;

use crate::bezier::cubic;

/// Segments in the arc-length table.
pub const CURVE_SEGMENTS: usize = 20;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CurveSample {
    pub position: Point<Real>,
    /// Arc length from the start of the curve.
    pub distance: Real,
    /// Bezier parameter in [0, 1].
    pub time: Real,
}

impl CurveSample {
    fn lerp(a: &CurveSample, b: &CurveSample, t: Real) -> CurveSample {
        CurveSample {
            position: a.position + (b.position - a.position) * t,
            distance: a.distance + (b.distance - a.distance) * t,
            time: a.time + (b.time - a.time) * t,
        }
    }
}

/// Cubic Bezier segment with a piecewise-linear arc-length table.
#[derive(Clone, Debug)]
pub struct BezierCurve {
    controls: [Point<Real>; 4],
    samples: Vec<CurveSample>,
    length: Real,
}

impl BezierCurve {
    pub fn new(controls: [Point<Real>; 4]) -> Self {
        let mut curve = Self {
            controls,
            samples: Vec::with_capacity(CURVE_SEGMENTS + 1),
            length: 0.0,
        };
        curve.rebuild();
        curve
    }

    pub fn controls(&self) -> &[Point<Real>; 4] {
        &self.controls
    }

    pub fn set_control(&mut self, index: usize, position: Point<Real>) -> bool {
        let Some(slot) = self.controls.get_mut(index) else {
            return false;
        };
        *slot = position;
        self.rebuild();
        true
    }

    pub fn length(&self) -> Real {
        self.length
    }

    pub fn samples(&self) -> &[CurveSample] {
        &self.samples
    }

    pub fn position(&self, t: Real) -> Point<Real> {
        let [p0, p1, p2, p3] = self.controls;
        Point::from(cubic(p0.coords, p1.coords, p2.coords, p3.coords, t))
    }

    pub fn sample_by_time(&self, time: Real) -> CurveSample {
        self.lookup(time.clamp(0.0, 1.0), |sample| sample.time)
    }

    pub fn sample_by_distance(&self, distance: Real) -> CurveSample {
        self.lookup(distance.clamp(0.0, self.length), |sample| sample.distance)
    }

    /// Closest point of the sampled polyline to `point`.
    pub fn project(&self, point: Point<Real>) -> CurveSample {
        let closest = self
            .samples
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                let da = (a.position - point).norm_squared();
                let db = (b.position - point).norm_squared();
                da.total_cmp(&db)
            })
            .map(|(index, _)| index)
            .unwrap_or(0);
        let last = self.samples.len() - 1;
        let start = if closest == 0 {
            0
        } else if closest == last {
            last - 1
        } else {
            let to_previous = (point - self.samples[closest - 1].position).norm_squared();
            let to_next = (point - self.samples[closest + 1].position).norm_squared();
            if to_previous < to_next {
                closest - 1
            } else {
                closest
            }
        };
        let previous = &self.samples[start];
        let next = &self.samples[start + 1];
        let segment = next.position - previous.position;
        let length_sq = segment.norm_squared();
        if length_sq <= Real::EPSILON {
            return *previous;
        }
        let rate = ((point - previous.position).dot(&segment) / length_sq).clamp(0.0, 1.0);
        CurveSample::lerp(previous, next, rate)
    }

    fn lookup(&self, key: Real, field: impl Fn(&CurveSample) -> Real) -> CurveSample {
        let upper = self.samples.partition_point(|sample| field(sample) < key);
        if upper == 0 {
            return self.samples[0];
        }
        if upper >= self.samples.len() {
            return self.samples[self.samples.len() - 1];
        }
        let previous = &self.samples[upper - 1];
        let next = &self.samples[upper];
        let span = field(next) - field(previous);
        if span <= 0.0 {
            return *next;
        }
        CurveSample::lerp(previous, next, (key - field(previous)) / span)
    }

    fn rebuild(&mut self) {
        self.samples.clear();
        self.length = 0.0;
        let mut previous = self.controls[0];
        self.samples.push(CurveSample {
            position: previous,
            distance: 0.0,
            time: 0.0,
        });
        for i in 1..=CURVE_SEGMENTS {
            let time = i as Real / CURVE_SEGMENTS as Real;
            let position = if i == CURVE_SEGMENTS {
                self.controls[3]
            } else {
                self.position(time)
            };
            self.length += (position - previous).norm();
            self.samples.push(CurveSample {
                position,
                distance: self.length,
                time,
            });
            previous = position;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn straight() -> BezierCurve {
        BezierCurve::new([
            Point::new(0.0, 0.0, 0.0),
            Point::new(1.0, 0.0, 0.0),
            Point::new(2.0, 0.0, 0.0),
            Point::new(3.0, 0.0, 0.0),
        ])
    }

    #[test]
    fn table_ends_at_last_control() {
        let curve = straight();
        assert_eq!(curve.samples().len(), CURVE_SEGMENTS + 1);
        let end = curve.samples()[CURVE_SEGMENTS];
        assert_eq!(end.position, Point::new(3.0, 0.0, 0.0));
        assert_eq!(end.time, 1.0);
        assert!((curve.length() - 3.0).abs() < 1.0e-5);
    }

    #[test]
    fn distance_and_time_lookups_agree_on_a_line() {
        let curve = straight();
        let by_distance = curve.sample_by_distance(1.5);
        assert!((by_distance.position.x - 1.5).abs() < 1.0e-4);
        let by_time = curve.sample_by_time(by_distance.time);
        assert!((by_time.distance - 1.5).abs() < 1.0e-4);
        assert_eq!(curve.sample_by_distance(99.0).time, 1.0);
    }

    #[test]
    fn projection_lands_on_curve() {
        let curve = straight();
        let sample = curve.project(Point::new(2.2, 4.0, 0.0));
        assert!((sample.position - Point::new(2.2, 0.0, 0.0)).norm() < 1.0e-4);
        assert_eq!(curve.project(Point::new(-5.0, 0.0, 0.0)).distance, 0.0);
    }

    #[test]
    fn editing_a_control_rebuilds_length() {
        let mut curve = straight();
        assert!(curve.set_control(3, Point::new(6.0, 0.0, 0.0)));
        assert!(curve.length() > 3.0);
        assert!(!curve.set_control(4, Point::origin()));
    }
}
