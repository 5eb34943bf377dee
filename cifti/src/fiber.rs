//! Reader for fiber orientation files.
//!
//! Each row of a fiber orientation matrix describes one location: an XYZ coordinate followed by
//! a fixed number of fibers, each stored as 7 floats (meanF, varF, theta, phi, k1, k2, psi).

use std::path::Path;
use std::slice;

use num_traits::Float;

use crate::{
    errors::{Error, Result},
    header::MatrixHeader,
    matrix::MatrixFile,
};

/// Number of values at the start of each row giving the location
pub const XYZ_ELEMENTS: usize = 3;

/// Number of values per fiber
pub const FIBER_ELEMENTS: usize = 7;

#[derive(Clone, Debug, PartialEq)]
pub struct Fiber {
    pub mean_f: f32,
    pub var_f: f32,
    pub theta: f32,
    pub phi: f32,
    pub k1: f32,
    pub k2: f32,
    pub psi: f32,
}

impl Fiber {
    fn from_slice(values: &[f32]) -> Self {
        Self {
            mean_f: values[0],
            var_f: values[1],
            theta: values[2],
            phi: values[3],
            k1: values[4],
            k2: values[5],
            psi: values[6],
        }
    }

    fn values(&self) -> [f32; FIBER_ELEMENTS] {
        [
            self.mean_f,
            self.var_f,
            self.theta,
            self.phi,
            self.k1,
            self.k2,
            self.psi,
        ]
    }

    /// Unit vector along the fiber, from its spherical angles.
    pub fn direction(&self) -> [f32; 3] {
        let (sin_theta, cos_theta) = self.theta.sin_cos();
        let (sin_phi, cos_phi) = self.phi.sin_cos();

        [sin_theta * cos_phi, sin_theta * sin_phi, cos_theta]
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if let Some(value) = self.values().iter().find(|value| !value.is_finite()) {
            return Err(format!("fiber has non-finite value {value}"));
        }
        if self.mean_f < 0.0 {
            return Err(format!("fiber has negative mean fraction {}", self.mean_f));
        }
        if self.var_f < 0.0 {
            return Err(format!("fiber has negative variance {}", self.var_f));
        }

        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FiberOrientation {
    pub xyz: [f32; 3],
    pub fibers: Vec<Fiber>,
}

impl FiberOrientation {
    /// Interpret one row of a fiber orientation file.
    ///
    /// Returns a description of the problem if the row doesn't hold valid data.
    ///
    pub fn from_row(row: &[f32], fibers: usize) -> std::result::Result<Self, String> {
        let expected = XYZ_ELEMENTS + fibers * FIBER_ELEMENTS;
        if row.len() != expected {
            return Err(format!("row has {} values, expected {expected}", row.len()));
        }

        let xyz = [row[0], row[1], row[2]];
        if xyz.iter().any(|value| !value.is_finite()) {
            return Err(format!("coordinate {xyz:?} is not finite"));
        }

        let fibers: Vec<Fiber> = row[XYZ_ELEMENTS..]
            .chunks_exact(FIBER_ELEMENTS)
            .map(Fiber::from_slice)
            .collect();
        for fiber in &fibers {
            fiber.validate()?;
        }

        Ok(Self { xyz, fibers })
    }
}

fn distance_squared<F: Float>(a: &[F; 3], b: &[F; 3]) -> F {
    a.iter()
        .zip(b)
        .fold(F::zero(), |sum, (&a, &b)| sum + (a - b) * (a - b))
}

/// The fiber orientations in a matrix file, one per valid row.
///
/// Writing is not supported.
///
pub struct FiberOrientationFile {
    header: MatrixHeader,
    fibers_per_orientation: usize,
    orientations: Vec<FiberOrientation>,
}

impl FiberOrientationFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut matrix = MatrixFile::open(path)?;
        Self::read(&mut matrix)
    }

    /// Read every row of `matrix`.
    ///
    /// Invalid rows are logged and skipped, an empty matrix or a column count that doesn't
    /// fit a whole number of fibers is an error.
    ///
    pub fn read(matrix: &mut MatrixFile) -> Result<Self> {
        let rows = matrix.row_count();
        if rows == 0 {
            return Err(Error::Fiber(String::from("does not contain any data (no rows)")));
        }
        let cols = matrix.column_count();
        if cols == 0 {
            return Err(Error::Fiber(String::from(
                "does not contain any data (no columns)",
            )));
        }

        let fibers = cols.saturating_sub(XYZ_ELEMENTS) / FIBER_ELEMENTS;
        let expected = fibers * FIBER_ELEMENTS + XYZ_ELEMENTS;
        if expected != cols {
            return Err(Error::Fiber(format!(
                "validation of column count failed: expected {expected} but have {cols} columns"
            )));
        }

        let mut row = vec![0.0; cols];
        let mut orientations = Vec::with_capacity(rows);
        for index in 0..rows {
            matrix.read_row(index, &mut row)?;
            match FiberOrientation::from_row(&row, fibers) {
                Ok(orientation) => orientations.push(orientation),
                Err(message) => tracing::error!(row = index, "invalid fiber orientation: {message}"),
            }
        }

        Ok(Self {
            header: matrix.header().clone(),
            fibers_per_orientation: fibers,
            orientations,
        })
    }

    pub fn header(&self) -> &MatrixHeader {
        &self.header
    }

    pub fn fibers_per_orientation(&self) -> usize {
        self.fibers_per_orientation
    }

    pub fn len(&self) -> usize {
        self.orientations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orientations.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&FiberOrientation> {
        self.orientations.get(index)
    }

    pub fn iter(&self) -> slice::Iter<'_, FiberOrientation> {
        self.orientations.iter()
    }

    /// The orientation closest to `xyz`.
    ///
    /// If `max_distance` is positive, orientations further away than that are ignored.
    ///
    pub fn nearest(&self, xyz: [f32; 3], max_distance: f32) -> Option<&FiberOrientation> {
        let limit = if max_distance > 0.0 {
            Some(max_distance * max_distance)
        } else {
            None
        };

        self.orientations
            .iter()
            .map(|orientation| (distance_squared(&xyz, &orientation.xyz), orientation))
            .filter(|(distance, _)| limit.map_or(true, |limit| *distance <= limit))
            .fold(None, |nearest: Option<(f32, &FiberOrientation)>, candidate| match nearest {
                Some(nearest) if nearest.0 <= candidate.0 => Some(nearest),
                _ => Some(candidate),
            })
            .map(|(_, orientation)| orientation)
    }
}
