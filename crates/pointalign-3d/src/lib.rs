#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Linear algebra utilities for 3x3 matrices and 3d points.
pub mod linalg;

/// Point cloud container.
pub mod pointcloud;

/// 3D rotation parametrizations.
pub mod transforms;
