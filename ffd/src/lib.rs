//! Free-form deformation: a Bezier control cage of up to 4x4x4 points that
//! bends mesh points, evaluated in parallel over vertex batches.
//!
//! Lattice space is the unit cube. [`deform_points`] takes the affine map
//! from mesh space into that cube and maps the results back with its
//! inverse. Evaluation never fails: a lattice whose point count does not
//! match its dimensions returns its input unchanged.
#![forbid(unsafe_code)]

pub mod bezier;
pub mod curve;
pub mod deform;
pub mod lattice;

use rapier3d::math::Vector;
use rapier3d::na::Matrix4;
use rapier3d::prelude::Real;
use serde::{Deserialize, Serialize};

pub use bezier::evaluate;
pub use curve::{BezierCurve, CurveSample};
pub use deform::{deform_points, deformed};
pub use lattice::{FfdLattice, LatticeError, LatticeSnapshot, ShapeChange, MAX_AXIS_POINTS};

/// Lattice as stored in game config files.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatticeConfig {
    pub dims: [usize; 3],
    pub factor: Real,
    /// Mesh-space corner mapped to the lattice origin.
    pub origin: [Real; 3],
    /// Mesh-space extent mapped onto the unit cube.
    pub size: [Real; 3],
    /// Control point overrides.
    pub points: Vec<ControlPointOverride>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControlPointOverride {
    pub index: [usize; 3],
    pub position: [Real; 3],
}

impl Default for LatticeConfig {
    fn default() -> Self {
        Self {
            dims: [MAX_AXIS_POINTS; 3],
            factor: 1.0,
            origin: [0.0; 3],
            size: [1.0; 3],
            points: Vec::new(),
        }
    }
}

impl LatticeConfig {
    pub fn build(&self) -> Result<FfdLattice, LatticeError> {
        let mut lattice = FfdLattice::new(self.dims)?;
        lattice.set_factor(self.factor);
        for point in &self.points {
            let [x, y, z] = point.index;
            lattice.set_point(x, y, z, Vector::from(point.position))?;
        }
        Ok(lattice)
    }

    /// Mesh to lattice map; singular when any extent is zero.
    pub fn mesh_to_lattice(&self) -> Matrix4<Real> {
        let scale = Vector::from(self.size).map(|extent| {
            if extent == 0.0 {
                0.0
            } else {
                1.0 / extent
            }
        });
        Matrix4::new_nonuniform_scaling(&scale)
            * Matrix4::new_translation(&-Vector::from(self.origin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rapier3d::math::Point;

    fn probe_points() -> Vec<Vector<Real>> {
        vec![
            Vector::new(0.0, 0.0, 0.0),
            Vector::new(0.25, 0.5, 0.75),
            Vector::new(1.0, 0.1, 0.9),
            Vector::new(0.6, 1.0, 0.3),
        ]
    }

    #[test]
    fn factor_zero_is_identity() {
        let mut lattice = FfdLattice::new([3, 3, 3]).unwrap();
        lattice.set_point(1, 1, 1, Vector::new(5.0, 5.0, 5.0)).unwrap();
        lattice.set_factor(0.0);
        let snapshot = lattice.snapshot();
        for point in probe_points() {
            assert_eq!(evaluate(&snapshot, point), point);
        }
    }

    #[test]
    fn single_point_lattice_collapses_to_it() {
        let target = Vector::new(2.0, -1.0, 3.0);
        let lattice = FfdLattice::from_points([1, 1, 1], vec![target]).unwrap();
        let snapshot = lattice.snapshot();
        for point in probe_points() {
            assert!((evaluate(&snapshot, point) - target).norm() < 1.0e-6);
        }
    }

    #[test]
    fn default_grid_is_identity() {
        for dims in [[4, 4, 4], [3, 3, 3], [2, 4, 3]] {
            let snapshot = FfdLattice::new(dims).unwrap().snapshot();
            for point in probe_points() {
                assert!((evaluate(&snapshot, point) - point).norm() < 1.0e-5);
            }
        }
    }

    #[test]
    fn half_factor_blends_halfway() {
        let target = Vector::new(1.0, 1.0, 1.0);
        let mut lattice = FfdLattice::from_points([1, 1, 1], vec![target]).unwrap();
        lattice.set_factor(0.5);
        let got = evaluate(&lattice.snapshot(), Vector::zeros());
        assert!((got - Vector::new(0.5, 0.5, 0.5)).norm() < 1.0e-6);
    }

    #[test]
    fn mismatched_snapshot_passes_through() {
        let snapshot = LatticeSnapshot::new([2, 2, 2], vec![Vector::zeros(); 5], 1.0);
        let point = Vector::new(0.3, 0.2, 0.1);
        assert_eq!(evaluate(&snapshot, point), point);
    }

    #[test]
    fn config_builds_lattice_and_transform() {
        let config = LatticeConfig {
            dims: [2, 2, 2],
            origin: [-1.0, 0.0, 0.0],
            size: [2.0, 2.0, 2.0],
            points: vec![ControlPointOverride {
                index: [1, 1, 1],
                position: [1.0, 2.0, 1.0],
            }],
            ..LatticeConfig::default()
        };
        let lattice = config.build().unwrap();
        assert_eq!(lattice.point(1, 1, 1).unwrap(), Vector::new(1.0, 2.0, 1.0));
        let local = config
            .mesh_to_lattice()
            .transform_point(&Point::new(1.0, 2.0, 2.0));
        assert!((local - Point::new(1.0, 1.0, 1.0)).norm() < 1.0e-6);

        let bad = LatticeConfig {
            points: vec![ControlPointOverride {
                index: [4, 0, 0],
                position: [0.0; 3],
            }],
            ..LatticeConfig::default()
        };
        assert!(matches!(
            bad.build(),
            Err(LatticeError::IndexOutOfRange { .. })
        ));
    }
}
