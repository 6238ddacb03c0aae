use kiddo::float::distance::{Manhattan, SquaredEuclidean};
use kiddo::immutable::float::kdtree::ImmutableKdTree;

use crate::config::DistanceMetric;
use crate::error::ICPError;

/// Number of points stored in a leaf bucket of the tree.
pub const LEAF_SIZE: usize = 32;

/// Result of a nearest neighbour query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Index of the nearest point in the indexed cloud.
    pub index: usize,
    /// Distance in the units of the metric: squared for `Euclidean`, plain for `Manhattan`.
    pub distance: f64,
}

impl DistanceMetric {
    /// Convert a distance reported by a query into a length.
    #[inline]
    pub fn length(&self, distance: f64) -> f64 {
        match self {
            DistanceMetric::Euclidean => distance.sqrt(),
            DistanceMetric::Manhattan => distance,
        }
    }
}

/// Immutable k-d tree over a fixed set of 3d points.
///
/// Built once from the model cloud; queries never modify it, so a shared
/// reference can be used from several threads.
pub struct KdTree {
    tree: ImmutableKdTree<f64, u32, 3, LEAF_SIZE>,
    metric: DistanceMetric,
    num_points: usize,
}

impl KdTree {
    /// Build the tree over `points`.
    ///
    /// # Errors
    ///
    /// Returns [`ICPError::InvalidInput`] if `points` is empty or does not fit in a `u32` index.
    pub fn build(points: &[[f64; 3]], metric: DistanceMetric) -> Result<Self, ICPError> {
        if points.is_empty() {
            return Err(ICPError::InvalidInput(
                "cannot build a spatial index over an empty cloud".to_string(),
            ));
        }
        if points.len() > u32::MAX as usize {
            return Err(ICPError::InvalidInput(format!(
                "cannot index {} points",
                points.len()
            )));
        }

        let tree = ImmutableKdTree::new_from_slice(points);
        log::debug!("Built kd-tree over {} points", points.len());

        Ok(Self {
            tree,
            metric,
            num_points: points.len(),
        })
    }

    /// Returns the number of indexed points.
    pub fn len(&self) -> usize {
        self.num_points
    }

    /// Returns true if the tree is empty.
    pub fn is_empty(&self) -> bool {
        self.num_points == 0
    }

    /// The metric used by [`KdTree::query`].
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Find the nearest indexed point to `point`.
    pub fn query(&self, point: &[f64; 3]) -> Neighbor {
        let nn = match self.metric {
            DistanceMetric::Euclidean => self.tree.nearest_one::<SquaredEuclidean>(point),
            DistanceMetric::Manhattan => self.tree.nearest_one::<Manhattan>(point),
        };
        Neighbor {
            index: nn.item as usize,
            distance: nn.distance,
        }
    }
}
