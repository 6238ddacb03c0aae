use serde::{Deserialize, Serialize};

use crate::error::ICPError;

/// Distance used by the spatial index for nearest neighbour queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// L2 distance. Queries report the squared distance.
    #[default]
    Euclidean,
    /// L1 distance.
    Manhattan,
}

/// Parameters of an alignment run.
///
/// Every field has a default, so a partial JSON document deserializes into a
/// complete configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ICPConfig {
    /// Maximum number of iterations to perform.
    pub max_iterations: usize,
    /// Convergence tolerance as the difference in error between two consecutive iterations.
    pub tolerance: f64,
    /// Fraction of the data points sampled at each iteration, in `(0, 1]`.
    pub sampling_fraction: f64,
    /// Pairs whose nearest neighbour distance deviates from the sample mean by
    /// more than this many standard deviations are rejected.
    pub rejection_sigma: f64,
    /// Distance used by the spatial index.
    pub metric: DistanceMetric,
    /// Minimum relative gap between the two largest eigenvalues of the
    /// quaternion matrix.
    pub degeneracy_tolerance: f64,
    /// Seed of the index sampler. `None` draws from the thread rng.
    pub seed: Option<u64>,
}

impl Default for ICPConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            tolerance: 1e-6,
            sampling_fraction: 1.0,
            rejection_sigma: 1.5,
            metric: DistanceMetric::Euclidean,
            degeneracy_tolerance: 1e-12,
            seed: None,
        }
    }
}

impl ICPConfig {
    /// Set the maximum number of iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the convergence tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the sampling fraction.
    pub fn with_sampling_fraction(mut self, sampling_fraction: f64) -> Self {
        self.sampling_fraction = sampling_fraction;
        self
    }

    /// Set the outlier rejection threshold, in standard deviations.
    pub fn with_rejection_sigma(mut self, rejection_sigma: f64) -> Self {
        self.rejection_sigma = rejection_sigma;
        self
    }

    /// Set the distance metric of the spatial index.
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Set the sampler seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Check that every value is in range.
    pub fn validate(&self) -> Result<(), ICPError> {
        if self.max_iterations == 0 {
            return Err(ICPError::InvalidInput(
                "max_iterations must be positive".to_string(),
            ));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(ICPError::InvalidInput(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if !(self.sampling_fraction > 0.0 && self.sampling_fraction <= 1.0) {
            return Err(ICPError::InvalidInput(format!(
                "sampling_fraction must be in (0, 1], got {}",
                self.sampling_fraction
            )));
        }
        if !(self.rejection_sigma.is_finite() && self.rejection_sigma >= 0.0) {
            return Err(ICPError::InvalidInput(format!(
                "rejection_sigma must be non-negative, got {}",
                self.rejection_sigma
            )));
        }
        if !(self.degeneracy_tolerance.is_finite() && self.degeneracy_tolerance >= 0.0) {
            return Err(ICPError::InvalidInput(format!(
                "degeneracy_tolerance must be non-negative, got {}",
                self.degeneracy_tolerance
            )));
        }
        Ok(())
    }

    /// Number of indices drawn from a cloud of `num_points` points.
    pub fn sample_size(&self, num_points: usize) -> usize {
        (self.sampling_fraction * num_points as f64).ceil() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(ICPConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let bad = [
            ICPConfig::default().with_max_iterations(0),
            ICPConfig::default().with_tolerance(0.0),
            ICPConfig::default().with_tolerance(f64::NAN),
            ICPConfig::default().with_sampling_fraction(0.0),
            ICPConfig::default().with_sampling_fraction(1.5),
            ICPConfig::default().with_rejection_sigma(-1.0),
        ];
        for config in bad {
            assert!(
                matches!(config.validate(), Err(ICPError::InvalidInput(_))),
                "{config:?}"
            );
        }
        assert!(ICPConfig::default()
            .with_rejection_sigma(0.0)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_sample_size() {
        let config = ICPConfig::default().with_sampling_fraction(0.5);
        assert_eq!(config.sample_size(10), 5);
        assert_eq!(config.sample_size(11), 6);
        assert_eq!(ICPConfig::default().sample_size(7), 7);
    }

    #[test]
    fn test_deserialize_partial() -> Result<(), serde_json::Error> {
        let config: ICPConfig =
            serde_json::from_str(r#"{"max_iterations": 20, "metric": "manhattan"}"#)?;
        assert_eq!(config.max_iterations, 20);
        assert_eq!(config.metric, DistanceMetric::Manhattan);
        assert_eq!(config.rejection_sigma, 1.5);
        assert_eq!(config.seed, None);
        Ok(())
    }
}
