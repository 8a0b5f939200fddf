use rapier3d::math::Vector;
use rapier3d::prelude::Real;

/// `count` unit vectors spread evenly over the sphere on a Fibonacci spiral.
pub fn fibonacci_directions(count: usize) -> Vec<Vector<Real>> {
    spiral(count, count)
}

/// The first `ceil(density * amount_occupied)` directions of a
/// `density`-point spiral. The spiral starts at +Z, so half the density
/// covers the +Z hemisphere.
pub fn fibonacci_directions_partial(density: usize, amount_occupied: Real) -> Vec<Vector<Real>> {
    let cutoff = (density as Real * amount_occupied.clamp(0.0, 1.0)).ceil() as usize;
    spiral(density, cutoff.min(density))
}

fn spiral(density: usize, cutoff: usize) -> Vec<Vector<Real>> {
    let golden_ratio = (1.0 + (5.0 as Real).sqrt()) / 2.0;
    let angle_increment = std::f32::consts::TAU * golden_ratio;
    (0..cutoff)
        .map(|i| {
            let t = i as Real / density as Real;
            let inclination = (1.0 - 2.0 * t).acos();
            let azimuth = angle_increment * i as Real;
            Vector::new(
                inclination.sin() * azimuth.cos(),
                inclination.sin() * azimuth.sin(),
                inclination.cos(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directions_are_unit_and_deterministic() {
        let directions = fibonacci_directions(150);
        assert_eq!(directions.len(), 150);
        assert!(directions
            .iter()
            .all(|direction| (direction.norm() - 1.0).abs() < 1.0e-5));
        assert_eq!(directions, fibonacci_directions(150));
        assert_eq!(directions[0], Vector::z());
    }

    #[test]
    fn spiral_is_roughly_balanced() {
        let sum: Vector<Real> = fibonacci_directions(400).iter().sum();
        assert!(sum.norm() / 400.0 < 0.05);
    }

    #[test]
    fn partial_is_prefix_of_full_spiral() {
        let full = fibonacci_directions(100);
        let half = fibonacci_directions_partial(100, 0.5);
        assert_eq!(half.len(), 50);
        assert_eq!(&full[..50], &half[..]);
        assert!(half.iter().all(|direction| direction.z >= -1.0e-5));
        assert_eq!(fibonacci_directions_partial(10, 0.01).len(), 1);
        assert_eq!(fibonacci_directions_partial(10, 3.0).len(), 10);
        assert!(fibonacci_directions_partial(0, 1.0).is_empty());
    }
}
