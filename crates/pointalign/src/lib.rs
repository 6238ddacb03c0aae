#![doc = include_str!(concat!("../", env!("CARGO_PKG_README")))]

#[doc(inline)]
pub use pointalign_3d as cloud3d;

#[doc(inline)]
pub use pointalign_icp as icp;
