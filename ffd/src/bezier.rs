use rapier3d::math::Vector;
use rapier3d::prelude::Real;

use crate::lattice::{LatticeSnapshot, MAX_AXIS_POINTS};

pub fn linear(p0: Vector<Real>, p1: Vector<Real>, t: Real) -> Vector<Real> {
    p0 + (p1 - p0) * t
}

pub fn quadratic(p0: Vector<Real>, p1: Vector<Real>, p2: Vector<Real>, t: Real) -> Vector<Real> {
    let inv = 1.0 - t;
    p0 * (inv * inv) + p1 * (2.0 * inv * t) + p2 * (t * t)
}

pub fn cubic(
    p0: Vector<Real>,
    p1: Vector<Real>,
    p2: Vector<Real>,
    p3: Vector<Real>,
    t: Real,
) -> Vector<Real> {
    let inv = 1.0 - t;
    let inv2 = inv * inv;
    let t2 = t * t;
    p0 * (inv2 * inv) + p1 * (3.0 * inv2 * t) + p2 * (3.0 * inv * t2) + p3 * (t2 * t)
}

/// Bezier of degree `points.len() - 1`, using at most the first four points.
pub fn blend(points: &[Vector<Real>], t: Real) -> Vector<Real> {
    match points {
        [] => Vector::zeros(),
        [p0] => *p0,
        [p0, p1] => linear(*p0, *p1, t),
        [p0, p1, p2] => quadratic(*p0, *p1, *p2, t),
        [p0, p1, p2, p3, ..] => cubic(*p0, *p1, *p2, *p3, t),
    }
}

/// Maps a lattice-space point through the cage, collapsing Z, then Y, then
/// X, and blends the result with `point` by the lattice factor. Malformed
/// lattices leave the point unchanged.
pub fn evaluate(lattice: &LatticeSnapshot, point: Vector<Real>) -> Vector<Real> {
    if !lattice.is_well_formed() {
        return point;
    }
    let [nx, ny, nz] = lattice.dims();
    let nx = nx.min(MAX_AXIS_POINTS);
    let ny = ny.min(MAX_AXIS_POINTS);
    let nz = nz.min(MAX_AXIS_POINTS);
    let points = lattice.points();

    let mut along_x = [Vector::zeros(); MAX_AXIS_POINTS];
    for (x, slot_x) in along_x.iter_mut().enumerate().take(nx) {
        let mut along_y = [Vector::zeros(); MAX_AXIS_POINTS];
        for (y, slot_y) in along_y.iter_mut().enumerate().take(ny) {
            let start = lattice.index(x, y, 0);
            *slot_y = blend(&points[start..start + nz], point.z);
        }
        *slot_x = blend(&along_y[..ny], point.y);
    }
    let deformed = blend(&along_x[..nx], point.x);
    linear(point, deformed, lattice.factor())
}
