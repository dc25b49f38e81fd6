//! Geometry for pairwise rotation estimation: robust homography fitting
//! from point correspondences and the in-plane rotation it encodes.

pub mod angle;
pub mod error;
pub mod homography;

pub use angle::rotation_angle_degrees;
pub use error::{GeometryError, GeometryResult};
pub use homography::{
    estimate_homography_dlt, fit_homography_ransac, Homography, HomographyFit, RansacConfig,
    MIN_CORRESPONDENCES,
};
