use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractionError {
    #[error("Invalid image dimensions: {width}x{height} (must be > 0)")]
    EmptyImage { width: usize, height: usize },
    #[error("Unsupported channel count: {0} (expected 1, 3 or 4)")]
    UnsupportedChannels(usize),
    #[error("Image data length mismatch: expected {expected_len}, got {actual_len}")]
    BufferSize { expected_len: usize, actual_len: usize },
    #[error("Invalid extractor configuration: {0}")]
    InvalidConfig(String),
    #[error("Cannot start {threads} extraction threads: {reason}")]
    ThreadPool { threads: usize, reason: String },
}

pub type ExtractionResult<T> = Result<T, ExtractionError>;

/// Failure reading or writing a [`crate::DetectorConfig`] file
#[cfg(feature = "serde")]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("bad JSON config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("bad TOML config: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("cannot encode TOML config: {0}")]
    TomlEncode(#[from] toml::ser::Error),
    #[error(transparent)]
    Invalid(#[from] ExtractionError),
}
