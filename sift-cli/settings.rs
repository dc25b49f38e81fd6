use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use sift_detect::DetectorConfig;
use sift_geom::RansacConfig;
use sift_match::MatchStrategy;
use std::path::Path;

/// Everything a workflow needs besides its images
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Extractor used by the two-image workflow
    pub pair_detector: DetectorConfig,
    /// Extractor used by the image-chain workflow
    pub sequence_detector: DetectorConfig,
    pub matching: MatchStrategy,
    pub ransac: RansacConfig,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            pair_detector: DetectorConfig::pair_preset(),
            sequence_detector: DetectorConfig::sequence_preset(),
            matching: MatchStrategy::default(),
            ransac: RansacConfig::default(),
        }
    }
}

impl PipelineSettings {
    pub fn validate(&self) -> PipelineResult<()> {
        self.pair_detector.validate()?;
        self.sequence_detector.validate()?;
        let r = &self.ransac;
        if !(r.inlier_threshold.is_finite() && r.inlier_threshold > 0.0) {
            return Err(PipelineError::Settings(format!(
                "ransac.inlier_threshold must be positive, got {}",
                r.inlier_threshold
            )));
        }
        if !(r.confidence > 0.0 && r.confidence < 1.0) {
            return Err(PipelineError::Settings(format!(
                "ransac.confidence must be in (0, 1), got {}",
                r.confidence
            )));
        }
        if r.max_iterations == 0 {
            return Err(PipelineError::Settings("ransac.max_iterations must be at least 1".into()));
        }
        Ok(())
    }

    /// Load from a `.json` file, anything else is read as TOML
    pub fn load<P: AsRef<Path>>(path: P) -> PipelineResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let is_json = path.extension().is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json(&content)
        } else {
            Self::from_toml(&content)
        }
    }

    pub fn from_toml(s: &str) -> PipelineResult<Self> {
        let settings: Self = toml::from_str(s).map_err(|e| PipelineError::Settings(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_json(s: &str) -> PipelineResult<Self> {
        let settings: Self =
            serde_json::from_str(s).map_err(|e| PipelineError::Settings(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_toml(&self) -> PipelineResult<String> {
        toml::to_string_pretty(self).map_err(|e| PipelineError::Settings(e.to_string()))
    }

    pub fn to_json(&self) -> PipelineResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| PipelineError::Settings(e.to_string()))
    }
}
