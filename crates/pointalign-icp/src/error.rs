use pointalign_3d::pointcloud::PointCloudError;

/// Error types for the alignment engine.
///
/// Reaching the iteration budget is not an error; see
/// [`crate::ICPStatus::MaxIterationsReached`].
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ICPError {
    /// Empty cloud, wrong dimensionality or an out of range configuration value.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A point cloud failed validation.
    #[error("Invalid point cloud ({role}): {source}")]
    PointCloud {
        /// Which cloud failed, `data` or `model`.
        role: &'static str,
        /// The underlying validation error.
        source: PointCloudError,
    },

    /// A nearest neighbour query was issued before the spatial index was built.
    #[error("Spatial index queried before it was built")]
    IndexNotBuilt,

    /// Every sampled pair was rejected, or no pair was sampled.
    #[error("No correspondences accepted at iteration {iteration} ({sampled} pairs sampled)")]
    InsufficientCorrespondences {
        /// Iteration at which the estimator failed.
        iteration: usize,
        /// Number of sampled data points.
        sampled: usize,
    },

    /// The rotation is not determined by the correspondence set.
    #[error("Numerical degeneracy at iteration {iteration}: {reason}")]
    NumericalDegeneracy {
        /// Iteration at which the estimator failed.
        iteration: usize,
        /// What made the estimate ill-determined.
        reason: String,
    },
}

impl ICPError {
    /// Attach the iteration index to an error raised inside an estimator.
    pub(crate) fn at_iteration(self, iteration: usize) -> Self {
        match self {
            ICPError::InsufficientCorrespondences { sampled, .. } => {
                ICPError::InsufficientCorrespondences { iteration, sampled }
            }
            ICPError::NumericalDegeneracy { reason, .. } => {
                ICPError::NumericalDegeneracy { iteration, reason }
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_iteration() {
        let err = ICPError::NumericalDegeneracy {
            iteration: 0,
            reason: "collinear".to_string(),
        };
        assert_eq!(
            err.at_iteration(4),
            ICPError::NumericalDegeneracy {
                iteration: 4,
                reason: "collinear".to_string()
            }
        );
        assert_eq!(ICPError::IndexNotBuilt.at_iteration(2), ICPError::IndexNotBuilt);
    }

    #[test]
    fn test_display() {
        let err = ICPError::InsufficientCorrespondences {
            iteration: 3,
            sampled: 10,
        };
        assert_eq!(
            err.to_string(),
            "No correspondences accepted at iteration 3 (10 pairs sampled)"
        );
    }
}
