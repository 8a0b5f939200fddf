use std::fmt;
use std::sync::Arc;

use engine_core::observers::{ObserverId, Observers};
use rapier3d::math::Vector;
use rapier3d::prelude::Real;

/// Control points per axis are capped at cubic Bezier.
pub const MAX_AXIS_POINTS: usize = 4;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LatticeError {
    DimensionOutOfRange { axis: usize, count: usize },
    PointCountMismatch { expected: usize, actual: usize },
    IndexOutOfRange { index: [usize; 3], dims: [usize; 3] },
}

impl fmt::Display for LatticeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LatticeError::DimensionOutOfRange { axis, count } => write!(
                f,
                "lattice axis {axis} has {count} points, expected 1..={MAX_AXIS_POINTS}"
            ),
            LatticeError::PointCountMismatch { expected, actual } => {
                write!(f, "expected {expected} control points, got {actual}")
            }
            LatticeError::IndexOutOfRange { index, dims } => {
                write!(f, "control point {index:?} outside lattice {dims:?}")
            }
        }
    }
}

impl std::error::Error for LatticeError {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShapeChange {
    PointMoved { index: usize },
    Resized { dims: [usize; 3] },
    Reset,
}

/// Immutable copy of a lattice handed to evaluation jobs.
#[derive(Clone, Debug)]
pub struct LatticeSnapshot {
    dims: [usize; 3],
    points: Arc<[Vector<Real>]>,
    factor: Real,
}

impl LatticeSnapshot {
    /// Builds a snapshot without validation; malformed snapshots evaluate as
    /// pass-through.
    pub fn new(dims: [usize; 3], points: Vec<Vector<Real>>, factor: Real) -> Self {
        Self {
            dims,
            points: points.into(),
            factor,
        }
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn points(&self) -> &[Vector<Real>] {
        &self.points
    }

    pub fn factor(&self) -> Real {
        self.factor
    }

    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        flat_index(self.dims, x, y, z)
    }

    pub fn is_well_formed(&self) -> bool {
        self.dims.iter().all(|count| *count >= 1)
            && self.dims.iter().product::<usize>() == self.points.len()
    }
}

/// Editable control cage. Points live in lattice space, where the undeformed
/// cage spans the unit cube.
pub struct FfdLattice {
    dims: [usize; 3],
    points: Vec<Vector<Real>>,
    factor: Real,
    observers: Observers<ShapeChange>,
}

impl fmt::Debug for FfdLattice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FfdLattice")
            .field("dims", &self.dims)
            .field("points", &self.points)
            .field("factor", &self.factor)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl FfdLattice {
    pub fn new(dims: [usize; 3]) -> Result<Self, LatticeError> {
        validate_dims(dims)?;
        Ok(Self {
            dims,
            points: default_grid(dims),
            factor: 1.0,
            observers: Observers::new(),
        })
    }

    pub fn from_points(dims: [usize; 3], points: Vec<Vector<Real>>) -> Result<Self, LatticeError> {
        validate_dims(dims)?;
        let expected = dims.iter().product();
        if points.len() != expected {
            return Err(LatticeError::PointCountMismatch {
                expected,
                actual: points.len(),
            });
        }
        Ok(Self {
            dims,
            points,
            factor: 1.0,
            observers: Observers::new(),
        })
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn points(&self) -> &[Vector<Real>] {
        &self.points
    }

    pub fn factor(&self) -> Real {
        self.factor
    }

    /// Blend weight between the undeformed point (0) and the deformed one (1).
    pub fn set_factor(&mut self, factor: Real) {
        self.factor = factor.clamp(0.0, 1.0);
    }

    pub fn index(&self, x: usize, y: usize, z: usize) -> Result<usize, LatticeError> {
        let [nx, ny, nz] = self.dims;
        if x >= nx || y >= ny || z >= nz {
            return Err(LatticeError::IndexOutOfRange {
                index: [x, y, z],
                dims: self.dims,
            });
        }
        Ok(flat_index(self.dims, x, y, z))
    }

    pub fn coords(&self, index: usize) -> Option<[usize; 3]> {
        let [_, ny, nz] = self.dims;
        if index >= self.points.len() {
            return None;
        }
        Some([index / (ny * nz), (index / nz) % ny, index % nz])
    }

    pub fn point(&self, x: usize, y: usize, z: usize) -> Result<Vector<Real>, LatticeError> {
        Ok(self.points[self.index(x, y, z)?])
    }

    pub fn set_point(
        &mut self,
        x: usize,
        y: usize,
        z: usize,
        position: Vector<Real>,
    ) -> Result<(), LatticeError> {
        let index = self.index(x, y, z)?;
        if self.points[index] != position {
            self.points[index] = position;
            self.observers.notify(&ShapeChange::PointMoved { index });
        }
        Ok(())
    }

    /// Changes the per-axis point counts, discarding edits.
    pub fn resize(&mut self, dims: [usize; 3]) -> Result<(), LatticeError> {
        validate_dims(dims)?;
        self.dims = dims;
        self.points = default_grid(dims);
        self.observers.notify(&ShapeChange::Resized { dims });
        Ok(())
    }

    pub fn reset(&mut self) {
        self.points = default_grid(self.dims);
        self.observers.notify(&ShapeChange::Reset);
    }

    pub fn add_observer(&mut self, observer: impl FnMut(&ShapeChange) + 'static) -> ObserverId {
        self.observers.add(observer)
    }

    pub fn remove_observer(&mut self, id: ObserverId) -> bool {
        self.observers.remove(id)
    }

    pub fn snapshot(&self) -> LatticeSnapshot {
        LatticeSnapshot::new(self.dims, self.points.clone(), self.factor)
    }
}

fn validate_dims(dims: [usize; 3]) -> Result<(), LatticeError> {
    for (axis, count) in dims.iter().enumerate() {
        if !(1..=MAX_AXIS_POINTS).contains(count) {
            return Err(LatticeError::DimensionOutOfRange {
                axis,
                count: *count,
            });
        }
    }
    Ok(())
}

fn flat_index(dims: [usize; 3], x: usize, y: usize, z: usize) -> usize {
    x * dims[1] * dims[2] + y * dims[2] + z
}

fn grid_coordinate(i: usize, count: usize) -> Real {
    if count > 1 {
        i as Real / (count - 1) as Real
    } else {
        0.5
    }
}

/// Evenly spaced points over the unit cube; a lone point on an axis sits at
/// the middle.
pub fn default_grid(dims: [usize; 3]) -> Vec<Vector<Real>> {
    let [nx, ny, nz] = dims;
    let mut points = Vec::with_capacity(nx * ny * nz);
    for x in 0..nx {
        for y in 0..ny {
            for z in 0..nz {
                points.push(Vector::new(
                    grid_coordinate(x, nx),
                    grid_coordinate(y, ny),
                    grid_coordinate(z, nz),
                ));
            }
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn rejects_out_of_range_dims() {
        assert_eq!(
            FfdLattice::new([4, 5, 4]).unwrap_err(),
            LatticeError::DimensionOutOfRange { axis: 1, count: 5 }
        );
        assert!(FfdLattice::new([0, 2, 2]).is_err());
        assert!(FfdLattice::from_points([2, 2, 2], vec![Vector::zeros(); 7]).is_err());
    }

    #[test]
    fn index_is_x_major() {
        let lattice = FfdLattice::new([2, 3, 4]).unwrap();
        assert_eq!(lattice.index(1, 2, 3).unwrap(), 23);
        assert_eq!(lattice.coords(23), Some([1, 2, 3]));
        assert_eq!(lattice.coords(24), None);
        assert_eq!(
            lattice.point(1, 2, 3).unwrap(),
            Vector::new(1.0, 1.0, 1.0)
        );
        assert!(lattice.index(2, 0, 0).is_err());
    }

    #[test]
    fn single_axis_point_sits_in_middle() {
        let lattice = FfdLattice::new([1, 2, 1]).unwrap();
        assert_eq!(lattice.points()[1], Vector::new(0.5, 1.0, 0.5));
    }

    #[test]
    fn edits_notify_observers() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut lattice = FfdLattice::new([2, 2, 2]).unwrap();
        let sink = seen.clone();
        let id = lattice.add_observer(move |change| sink.borrow_mut().push(*change));

        lattice.set_point(1, 0, 1, Vector::new(2.0, 0.0, 1.0)).unwrap();
        lattice.set_point(1, 0, 1, Vector::new(2.0, 0.0, 1.0)).unwrap();
        lattice.resize([3, 3, 3]).unwrap();
        assert!(lattice.remove_observer(id));
        lattice.reset();

        assert_eq!(
            *seen.borrow(),
            vec![
                ShapeChange::PointMoved { index: 5 },
                ShapeChange::Resized { dims: [3, 3, 3] },
            ]
        );
        assert_eq!(lattice.points().len(), 27);
    }

    #[test]
    fn snapshot_copies_state() {
        let mut lattice = FfdLattice::new([2, 2, 2]).unwrap();
        lattice.set_factor(2.0);
        let snapshot = lattice.snapshot();
        lattice.set_point(0, 0, 0, Vector::new(-1.0, 0.0, 0.0)).unwrap();
        assert_eq!(snapshot.factor(), 1.0);
        assert_eq!(snapshot.points()[0], Vector::zeros());
        assert!(snapshot.is_well_formed());
    }
}
