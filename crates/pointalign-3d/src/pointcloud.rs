use serde::{Deserialize, Serialize};

use crate::linalg;

/// Error types for the point cloud container.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum PointCloudError {
    /// The point cloud has no points.
    #[error("Pointcloud data is empty")]
    EmptyData,

    /// The flat buffer cannot be read as rows of 3d points.
    #[error("Invalid pointcloud shape: {len} values with {ncols} columns, expected rows of 3")]
    InvalidShape {
        /// Number of values in the buffer.
        len: usize,
        /// Number of columns requested by the caller.
        ncols: usize,
    },

    /// A coordinate is NaN or infinite.
    #[error("Point {index} has a non-finite coordinate")]
    NonFinite {
        /// Index of the offending point.
        index: usize,
    },
}

/// An ordered set of 3d points.
///
/// Points are addressed by their position in the cloud, which stays stable
/// across transformations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointCloud {
    // The points in the point cloud.
    points: Vec<[f64; 3]>,
}

impl PointCloud {
    /// Create a new point cloud from a list of points.
    pub fn new(points: Vec<[f64; 3]>) -> Self {
        Self { points }
    }

    /// Create a point cloud from a dense row-major `N x ncols` buffer.
    ///
    /// # Arguments
    ///
    /// * `values` - The flattened coordinates, one row per point.
    /// * `ncols` - The number of columns per row. Must be 3.
    ///
    /// # Errors
    ///
    /// Returns [`PointCloudError::InvalidShape`] if the buffer is not made of rows
    /// of three coordinates.
    pub fn from_row_major(values: &[f64], ncols: usize) -> Result<Self, PointCloudError> {
        if ncols != 3 || values.len() % 3 != 0 {
            return Err(PointCloudError::InvalidShape {
                len: values.len(),
                ncols,
            });
        }

        let points = values
            .chunks_exact(3)
            .map(|row| [row[0], row[1], row[2]])
            .collect();

        Ok(Self { points })
    }

    /// Check that the cloud is not empty and that every coordinate is finite.
    pub fn validate(&self) -> Result<(), PointCloudError> {
        if self.points.is_empty() {
            return Err(PointCloudError::EmptyData);
        }

        match self
            .points
            .iter()
            .position(|p| !p.iter().all(|v| v.is_finite()))
        {
            Some(index) => Err(PointCloudError::NonFinite { index }),
            None => Ok(()),
        }
    }

    /// Get the number of points in the point cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the point cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Get as reference the points in the point cloud.
    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    /// Apply `p <- R * p + t` to every point, in place.
    pub fn transform_inplace(&mut self, rotation: &[[f64; 3]; 3], translation: &[f64; 3]) {
        linalg::transform_points_inplace(&mut self.points, rotation, translation);
    }
}

impl From<Vec<[f64; 3]>> for PointCloud {
    fn from(points: Vec<[f64; 3]>) -> Self {
        Self::new(points)
    }
}
