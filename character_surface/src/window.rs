use rapier3d::math::Vector;
use rapier3d::prelude::Real;

/// Fixed-size circular running average of vectors.
#[derive(Clone, Debug)]
pub struct SlidingWindowAverage {
    values: Vec<Vector<Real>>,
    index: usize,
}

impl SlidingWindowAverage {
    /// `size` is clamped to at least one slot.
    pub fn new(size: usize, initial: Vector<Real>) -> Self {
        let size = size.max(1);
        Self {
            values: vec![initial; size],
            index: 0,
        }
    }

    pub fn window_size(&self) -> usize {
        self.values.len()
    }

    /// Fills every slot with `value`.
    pub fn reset(&mut self, value: Vector<Real>) {
        self.values.fill(value);
        self.index = 0;
    }

    /// Replaces the oldest slot.
    pub fn push(&mut self, value: Vector<Real>) {
        self.values[self.index] = value;
        self.index = (self.index + 1) % self.values.len();
    }

    /// Summed from the slots each call so evicted values leave no rounding
    /// residue behind.
    pub fn average(&self) -> Vector<Real> {
        let sum: Vector<Real> = self.values.iter().sum();
        sum / self.values.len() as Real
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vector<Real>, b: Vector<Real>) -> bool {
        (a - b).norm() < 1.0e-5
    }

    #[test]
    fn full_window_forgets_history() {
        let mut window = SlidingWindowAverage::new(4, Vector::new(100.0, -50.0, 7.0));
        for value in [Vector::x(), Vector::y(), Vector::z(), Vector::zeros(), Vector::x()] {
            window.push(value);
        }
        // Last four pushes: y, z, 0, x.
        let expected = (Vector::y() + Vector::z() + Vector::x()) / 4.0;
        assert!(close(window.average(), expected));
    }

    #[test]
    fn large_seed_leaves_no_residue() {
        let mut window = SlidingWindowAverage::new(4, Vector::new(1.0e6, 1.0e6, 1.0e6));
        let pushed = [
            Vector::new(0.1, 0.7, 0.25),
            Vector::new(0.9, 0.2, 0.5),
            Vector::new(0.3, 0.05, 0.125),
            Vector::new(0.25, 0.35, 0.375),
        ];
        for value in pushed {
            window.push(value);
        }
        let expected: Vector<Real> = pushed.iter().sum::<Vector<Real>>() / 4.0;
        assert!(close(window.average(), expected));
    }

    #[test]
    fn reset_replaces_all_slots() {
        let mut window = SlidingWindowAverage::new(4, Vector::zeros());
        window.push(Vector::x() * 8.0);
        window.reset(Vector::y());
        assert!(close(window.average(), Vector::y()));
        window.push(Vector::x());
        assert!(close(window.average(), (Vector::y() * 3.0 + Vector::x()) / 4.0));
    }

    #[test]
    fn zero_size_acts_as_single_slot() {
        let mut window = SlidingWindowAverage::new(0, Vector::zeros());
        assert_eq!(window.window_size(), 1);
        window.push(Vector::z());
        assert!(close(window.average(), Vector::z()));
    }
}
