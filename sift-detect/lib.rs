//! SIFT keypoint detection and descriptor extraction.
//!
//! The extractor builds a Gaussian scale space on an upsampled copy of the
//! input, refines difference-of-Gaussian extrema to subpixel accuracy,
//! assigns dominant orientations and computes 128-element descriptors.

pub mod builder;
pub mod config;
pub mod descriptor;
pub mod detector;
pub mod error;
mod extrema;
pub mod orientation;
pub mod pyramid;
pub mod types;

pub use builder::DetectorBuilder;
pub use config::DetectorConfig;
pub use detector::{validate_config, SiftDetector};
pub use error::{ExtractionError, ExtractionResult};
#[cfg(feature = "serde")]
pub use error::ConfigError;
pub use pyramid::{ImagePyramid, ScaleSpace};
pub use types::Plane;
