//! Descriptor matching for SIFT features: two-nearest-neighbour search,
//! Lowe's ratio test and rejection of matches near the image border.

pub mod kdtree;
pub mod matcher;
pub mod region;

pub use kdtree::DescriptorTree;
pub use matcher::{
    passes_ratio_test, ratio_filter, DescriptorMatcher, MatchStrategy, RATIO_THRESHOLD,
};
pub use region::{within_region, Region, RegionFilter, BOUNDARY_PERCENTAGE};
