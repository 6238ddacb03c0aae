use std::collections::BTreeMap;

use crate::error::ICPError;
use crate::kdtree::KdTree;
use crate::sampler::IndexSampler;

/// Accepted nearest neighbour pairs, from data point index to model point index.
///
/// Rejected or unsampled data points have no entry.
pub type CorrespondenceMap = BTreeMap<usize, usize>;

/// Mean and population standard deviation of a set of distances.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceStats {
    /// Sample mean.
    pub mean: f64,
    /// Population standard deviation.
    pub std_dev: f64,
}

/// Diagnostics of one correspondence search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrespondenceStats {
    /// Number of sampled data indices, duplicates included.
    pub sampled: usize,
    /// Number of distinct data indices kept in the map.
    pub accepted: usize,
    /// Fraction of sampled pairs rejected as outliers.
    pub rejection_rate: f64,
    /// Statistics of the nearest neighbour lengths over the whole sample.
    pub distances: DistanceStats,
}

/// Output of [`find_correspondences`].
#[derive(Debug, Clone)]
pub struct Correspondences {
    /// The accepted pairs.
    pub map: CorrespondenceMap,
    /// Search diagnostics.
    pub stats: CorrespondenceStats,
}

/// Compute the mean and population standard deviation of `distances`.
///
/// Returns zeros for an empty slice.
pub fn distance_stats(distances: &[f64]) -> DistanceStats {
    if distances.is_empty() {
        return DistanceStats {
            mean: 0.0,
            std_dev: 0.0,
        };
    }
    let n = distances.len() as f64;
    let mean = distances.iter().sum::<f64>() / n;
    let var = distances.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;
    DistanceStats {
        mean,
        std_dev: var.sqrt(),
    }
}

/// Flag the distances lying within `sigma_threshold` standard deviations of the mean.
///
/// Returns one flag per distance, `true` for an accepted (inlier) distance.
/// A threshold of `0` accepts only the distances equal to the mean.
pub fn reject_outliers(distances: &[f64], sigma_threshold: f64) -> Vec<bool> {
    let stats = distance_stats(distances);
    let max_deviation = sigma_threshold * stats.std_dev;
    distances
        .iter()
        .map(|d| (d - stats.mean).abs() <= max_deviation)
        .collect()
}

/// Pair sampled data points with their nearest model points and drop the outliers.
///
/// # Arguments
///
/// * `data` - The current (moving) data points.
/// * `kdtree` - Spatial index over the model points.
/// * `sampler` - Source of the visited data indices.
/// * `sample_size` - Number of indices to draw.
/// * `sigma_threshold` - Outlier rejection threshold, in standard deviations.
///
/// # Errors
///
/// Returns [`ICPError::InsufficientCorrespondences`] if nothing was sampled or
/// every sampled pair was rejected. The iteration field is left at zero.
pub fn find_correspondences<S: IndexSampler + ?Sized>(
    data: &[[f64; 3]],
    kdtree: &KdTree,
    sampler: &mut S,
    sample_size: usize,
    sigma_threshold: f64,
) -> Result<Correspondences, ICPError> {
    let indices = sampler.sample(data.len(), sample_size);
    if indices.is_empty() {
        return Err(ICPError::InsufficientCorrespondences {
            iteration: 0,
            sampled: 0,
        });
    }

    // find the nearest model point of every sampled data point
    let metric = kdtree.metric();
    let neighbors = indices
        .iter()
        .map(|&i| kdtree.query(&data[i]))
        .collect::<Vec<_>>();
    let lengths = neighbors
        .iter()
        .map(|nn| metric.length(nn.distance))
        .collect::<Vec<_>>();

    let inliers = reject_outliers(&lengths, sigma_threshold);

    let mut map = CorrespondenceMap::new();
    let mut num_inliers = 0;
    for ((&data_idx, nn), inlier) in indices.iter().zip(neighbors.iter()).zip(inliers) {
        if inlier {
            map.insert(data_idx, nn.index);
            num_inliers += 1;
        }
    }

    if map.is_empty() {
        return Err(ICPError::InsufficientCorrespondences {
            iteration: 0,
            sampled: indices.len(),
        });
    }

    let stats = CorrespondenceStats {
        sampled: indices.len(),
        accepted: map.len(),
        rejection_rate: 1.0 - num_inliers as f64 / indices.len() as f64,
        distances: distance_stats(&lengths),
    };

    Ok(Correspondences { map, stats })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DistanceMetric;
    use crate::sampler::{SequenceSampler, UniformSampler};
    use approx::assert_relative_eq;

    #[test]
    fn test_distance_stats() {
        let stats = distance_stats(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_relative_eq!(stats.mean, 5.0);
        assert_relative_eq!(stats.std_dev, 2.0);
    }

    #[test]
    fn test_reject_injected_outlier() {
        // nine inliers around 1.0 and one far outlier
        let mut distances = vec![0.9, 1.0, 1.1, 0.95, 1.05, 1.0, 0.98, 1.02, 1.0];
        distances.push(10.0);

        let stats = distance_stats(&distances);
        assert!(10.0 > stats.mean + 1.5 * stats.std_dev);

        let inliers = reject_outliers(&distances, 1.5);
        assert_eq!(inliers.iter().filter(|&&f| !f).count(), 1);
        assert!(!inliers[9]);
        assert!(inliers[..9].iter().all(|&f| f));
    }

    #[test]
    fn test_reject_zero_threshold() {
        let inliers = reject_outliers(&[1.0, 2.0, 4.0, 7.0], 0.0);
        assert!(inliers.iter().all(|&f| !f));

        // the exact mean survives
        let inliers = reject_outliers(&[1.0, 2.0, 3.0], 0.0);
        assert_eq!(inliers, vec![false, true, false]);
    }

    #[test]
    fn test_reject_constant_distances() {
        let inliers = reject_outliers(&[0.0; 6], 1.5);
        assert!(inliers.iter().all(|&f| f));
    }

    #[test]
    fn test_find_correspondences() -> Result<(), ICPError> {
        let model = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ];
        let data = vec![
            [0.25, 0.0, 0.0],
            [1.0, 0.25, 0.0],
            [0.0, 1.0, 0.25],
            [0.0, 0.0, 1.25],
        ];
        let kdtree = KdTree::build(&model, DistanceMetric::Euclidean)?;
        let mut sampler = UniformSampler::seeded(0);

        let res = find_correspondences(&data, &kdtree, &mut sampler, 4, 1.5)?;

        assert_eq!(res.map.len(), 4);
        for (data_idx, model_idx) in res.map.iter() {
            assert_eq!(data_idx, model_idx);
        }
        assert_eq!(res.stats.sampled, 4);
        assert_eq!(res.stats.accepted, 4);
        assert_relative_eq!(res.stats.rejection_rate, 0.0);
        assert_relative_eq!(res.stats.distances.mean, 0.25);
        Ok(())
    }

    #[test]
    fn test_find_correspondences_rejects_far_point() -> Result<(), ICPError> {
        let model = (0..10).map(|i| [i as f64, 0.0, 0.0]).collect::<Vec<_>>();
        let mut data = (0..10)
            .map(|i| [i as f64, 0.1, 0.0])
            .collect::<Vec<_>>();
        data[4] = [4.0, 5.0, 0.0];

        let kdtree = KdTree::build(&model, DistanceMetric::Euclidean)?;
        let mut sampler = SequenceSampler::new((0..10).collect());

        let res = find_correspondences(&data, &kdtree, &mut sampler, 10, 1.5)?;

        assert_eq!(res.map.len(), 9);
        assert!(!res.map.contains_key(&4));
        assert_relative_eq!(res.stats.rejection_rate, 0.1);
        Ok(())
    }

    #[test]
    fn test_find_correspondences_duplicates_overwrite() -> Result<(), ICPError> {
        let model = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let kdtree = KdTree::build(&model, DistanceMetric::Euclidean)?;
        let mut sampler = SequenceSampler::new(vec![1, 1, 2]);

        let res = find_correspondences(&model, &kdtree, &mut sampler, 3, 1.5)?;

        assert_eq!(res.stats.sampled, 3);
        assert_eq!(res.map.len(), 2);
        assert_eq!(res.map.get(&1), Some(&1));
        Ok(())
    }

    #[test]
    fn test_find_correspondences_all_rejected() -> Result<(), ICPError> {
        let model = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let data = vec![[0.0, 0.0, 0.1], [1.0, 0.0, 0.2], [0.0, 1.0, 0.4]];
        let kdtree = KdTree::build(&model, DistanceMetric::Euclidean)?;
        let mut sampler = SequenceSampler::new(vec![0, 1, 2]);

        let res = find_correspondences(&data, &kdtree, &mut sampler, 3, 0.0);
        assert_eq!(
            res.err(),
            Some(ICPError::InsufficientCorrespondences {
                iteration: 0,
                sampled: 3
            })
        );
        Ok(())
    }

    #[test]
    fn test_find_correspondences_zero_samples() -> Result<(), ICPError> {
        let model = vec![[0.0, 0.0, 0.0]];
        let kdtree = KdTree::build(&model, DistanceMetric::Euclidean)?;
        let mut sampler = UniformSampler::seeded(0);

        let res = find_correspondences(&model, &kdtree, &mut sampler, 0, 1.5);
        assert!(matches!(
            res,
            Err(ICPError::InsufficientCorrespondences { sampled: 0, .. })
        ));
        Ok(())
    }
}
