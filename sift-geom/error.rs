use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("too few correspondences: need {needed}, got {got}")]
    InsufficientCorrespondence { needed: usize, got: usize },
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),
}

pub type GeometryResult<T> = Result<T, GeometryError>;
