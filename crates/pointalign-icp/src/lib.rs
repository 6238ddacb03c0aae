#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Run configuration.
pub mod config;
pub use config::{DistanceMetric, ICPConfig};

/// Nearest neighbour pairing and outlier rejection.
pub mod correspondence;
pub use correspondence::{find_correspondences, CorrespondenceMap, Correspondences};

mod error;
pub use error::ICPError;

mod icp;
pub use icp::*;

/// Spatial index over the model cloud.
pub mod kdtree;
pub use kdtree::KdTree;

mod ops;
pub use ops::RigidTransform;

/// Closed-form rigid transform estimation.
pub mod registration;
pub use registration::fit_transformation;

/// Index sampling strategies.
pub mod sampler;
pub use sampler::{IndexSampler, SequenceSampler, UniformSampler};
