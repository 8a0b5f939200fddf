use rapier3d::math::Point;
use rapier3d::na::Matrix4;
use rapier3d::prelude::Real;
use rayon::prelude::*;

use crate::bezier::evaluate;
use crate::lattice::LatticeSnapshot;

/// Batches at or below this size are deformed on the calling thread.
pub const PARALLEL_THRESHOLD: usize = 1024;

/// Deforms mesh-space points in place. `mesh_to_lattice` maps the mesh into
/// the lattice's unit cube; results are mapped back with its inverse.
/// Returns false and leaves `points` untouched when the matrix is singular.
pub fn deform_points(
    lattice: &LatticeSnapshot,
    points: &mut [Point<Real>],
    mesh_to_lattice: &Matrix4<Real>,
) -> bool {
    let Some(lattice_to_mesh) = mesh_to_lattice.try_inverse() else {
        return false;
    };
    let deform_one = |point: &mut Point<Real>| {
        let local = mesh_to_lattice.transform_point(point);
        let deformed = Point::from(evaluate(lattice, local.coords));
        *point = lattice_to_mesh.transform_point(&deformed);
    };
    if points.len() > PARALLEL_THRESHOLD {
        points.par_iter_mut().for_each(deform_one);
    } else {
        points.iter_mut().for_each(deform_one);
    }
    true
}

/// Copying variant of [`deform_points`].
pub fn deformed(
    lattice: &LatticeSnapshot,
    points: &[Point<Real>],
    mesh_to_lattice: &Matrix4<Real>,
) -> Option<Vec<Point<Real>>> {
    let mut out = points.to_vec();
    deform_points(lattice, &mut out, mesh_to_lattice).then_some(out)
}
