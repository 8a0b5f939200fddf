use rapier3d::prelude::Real;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub time: Real,
    pub value: Real,
    #[serde(default)]
    pub in_tangent: Real,
    #[serde(default)]
    pub out_tangent: Real,
}

impl Keyframe {
    pub fn new(time: Real, value: Real, in_tangent: Real, out_tangent: Real) -> Self {
        Self {
            time,
            value,
            in_tangent,
            out_tangent,
        }
    }
}

/// Keyframed 1D function with cubic Hermite segments. Input outside the
/// authored range clamps to the first or last key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Keyframe>", into = "Vec<Keyframe>")]
pub struct ResponseCurve {
    keys: Vec<Keyframe>,
}

impl From<Vec<Keyframe>> for ResponseCurve {
    fn from(keys: Vec<Keyframe>) -> Self {
        Self::new(keys)
    }
}

impl From<ResponseCurve> for Vec<Keyframe> {
    fn from(curve: ResponseCurve) -> Self {
        curve.keys
    }
}

impl Default for ResponseCurve {
    fn default() -> Self {
        Self::identity()
    }
}

impl ResponseCurve {
    pub fn new(mut keys: Vec<Keyframe>) -> Self {
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { keys }
    }

    /// Straight line through two keys.
    pub fn linear(t0: Real, v0: Real, t1: Real, v1: Real) -> Self {
        let span = t1 - t0;
        let slope = if span == 0.0 { 0.0 } else { (v1 - v0) / span };
        Self::new(vec![
            Keyframe::new(t0, v0, slope, slope),
            Keyframe::new(t1, v1, slope, slope),
        ])
    }

    /// `f(t) = t` on `[0, 1]`.
    pub fn identity() -> Self {
        Self::linear(0.0, 0.0, 1.0, 1.0)
    }

    pub fn constant(value: Real) -> Self {
        Self::new(vec![Keyframe::new(0.0, value, 0.0, 0.0)])
    }

    pub fn keys(&self) -> &[Keyframe] {
        &self.keys
    }

    pub fn evaluate(&self, t: Real) -> Real {
        let (Some(first), Some(last)) = (self.keys.first(), self.keys.last()) else {
            return 0.0;
        };
        if t.is_nan() || t <= first.time {
            return first.value;
        }
        if t >= last.time {
            return last.value;
        }
        let index = self.keys.partition_point(|key| key.time <= t);
        let a = self.keys[index - 1];
        let b = self.keys[index];
        let span = b.time - a.time;
        if span <= 0.0 {
            return b.value;
        }
        let s = (t - a.time) / span;
        let s2 = s * s;
        let s3 = s2 * s;
        let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
        let h10 = s3 - 2.0 * s2 + s;
        let h01 = -2.0 * s3 + 3.0 * s2;
        let h11 = s3 - s2;
        h00 * a.value + h10 * span * a.out_tangent + h01 * b.value + h11 * span * b.in_tangent
    }
}

/// Response curve scaled by a weight in `[0, 1]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightedCurve {
    pub curve: ResponseCurve,
    pub weight: Real,
}

impl Default for WeightedCurve {
    fn default() -> Self {
        Self {
            curve: ResponseCurve::identity(),
            weight: 1.0,
        }
    }
}

impl WeightedCurve {
    pub fn evaluate(&self, t: Real) -> Real {
        self.curve.evaluate(t) * self.weight
    }
}
