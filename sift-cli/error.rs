use sift_detect::ExtractionError;
use sift_geom::GeometryError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("feature extraction failed: {0}")]
    Extraction(#[from] ExtractionError),
    #[error("geometry estimation failed: {0}")]
    Geometry(#[from] GeometryError),
    #[error("a sequence needs at least 2 images, got {got}")]
    SequenceTooShort { got: usize },
    #[error("computation cancelled")]
    Cancelled,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid settings: {0}")]
    Settings(String),
    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl PipelineError {
    /// Too few surviving correspondences to fit a homography
    pub fn is_no_reliable_match(&self) -> bool {
        matches!(self, PipelineError::Geometry(GeometryError::InsufficientCorrespondence { .. }))
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_reliable_match_classification() {
        let e: PipelineError =
            GeometryError::InsufficientCorrespondence { needed: 4, got: 1 }.into();
        assert!(e.is_no_reliable_match());
        let e: PipelineError = GeometryError::DegenerateGeometry("collinear".into()).into();
        assert!(!e.is_no_reliable_match());
        assert!(!PipelineError::Cancelled.is_no_reliable_match());
    }

    #[test]
    fn test_messages() {
        let e = PipelineError::SequenceTooShort { got: 1 };
        assert_eq!(e.to_string(), "a sequence needs at least 2 images, got 1");
        let e: PipelineError = ExtractionError::UnsupportedChannels(2).into();
        assert!(e.to_string().contains("Unsupported channel count: 2"));
    }
}
