use crate::builder::DetectorBuilder;
use crate::detector::validate_config;
use crate::error::ExtractionResult;
use sift_core::SiftConfig;

#[cfg(feature = "serde")]
use crate::error::ConfigError;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
#[cfg(feature = "serde")]
use std::path::Path;

/// Extractor configuration with optional metadata, loadable from JSON or TOML
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DetectorConfig {
    /// Core SIFT parameters
    pub core: SiftConfig,
    /// Metadata
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub name: Option<String>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub description: Option<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorConfig {
    /// Standard SIFT parameters, unlimited features
    pub fn new() -> Self {
        Self { core: SiftConfig::default(), name: None, description: None }
    }

    /// Two-image workflow: 100 strongest features, 5 layers per octave
    pub fn pair_preset() -> Self {
        Self {
            core: SiftConfig {
                max_features: 100,
                octave_layers: 5,
                contrast_threshold: 0.04,
                edge_threshold: 10.0,
                sigma: 1.56,
                ..SiftConfig::default()
            },
            name: Some("Pair".to_string()),
            description: Some("Strongest 100 features for a single source/target pair".to_string()),
        }
    }

    /// Image-chain workflow: like the pair preset with a permissive edge threshold
    pub fn sequence_preset() -> Self {
        Self {
            core: SiftConfig {
                max_features: 100,
                octave_layers: 5,
                contrast_threshold: 0.04,
                edge_threshold: 100.0,
                sigma: 1.56,
                ..SiftConfig::default()
            },
            name: Some("Sequence".to_string()),
            description: Some("Permissive edge rejection for chains of images".to_string()),
        }
    }

    /// All features the standard parameters find
    pub fn dense_preset() -> Self {
        Self {
            core: SiftConfig::default(),
            name: Some("Dense".to_string()),
            description: Some("Standard SIFT parameters without a feature limit".to_string()),
        }
    }

    /// Add metadata to configuration
    pub fn with_metadata(mut self, name: &str, description: &str) -> Self {
        self.name = Some(name.to_string());
        self.description = Some(description.to_string());
        self
    }

    /// Convert to DetectorBuilder for further customization
    pub fn to_builder(self) -> DetectorBuilder {
        DetectorBuilder::from_config(self)
    }

    /// Generate human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "DetectorConfig{}: max_features={}, layers={}, contrast={}, edge={}, sigma={}, \
             threads={}",
            self.name.as_deref().map(|n| format!(" [{}]", n)).unwrap_or_default(),
            self.core.max_features,
            self.core.octave_layers,
            self.core.contrast_threshold,
            self.core.edge_threshold,
            self.core.sigma,
            self.core.n_threads
        )
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> ExtractionResult<()> {
        validate_config(&self.core)
    }

    /// Write to `path` as JSON when the extension is `json`, TOML otherwise
    #[cfg(feature = "serde")]
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let text = if is_json(path) { self.to_json()? } else { self.to_toml()? };
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Read and validate a file written by [`DetectorConfig::save`]
    #[cfg(feature = "serde")]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        if is_json(path) {
            Self::from_json(&content)
        } else {
            Self::from_toml(&content)
        }
    }

    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "serde")]
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    #[cfg(feature = "serde")]
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(feature = "serde")]
fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        let presets = [
            DetectorConfig::pair_preset(),
            DetectorConfig::sequence_preset(),
            DetectorConfig::dense_preset(),
        ];
        for cfg in presets {
            assert!(cfg.validate().is_ok(), "{}", cfg.summary());
        }
    }

    #[test]
    fn test_pair_and_sequence_presets_differ_in_edge_threshold() {
        let pair = DetectorConfig::pair_preset().core;
        let seq = DetectorConfig::sequence_preset().core;
        assert_eq!(pair.max_features, 100);
        assert_eq!(pair.octave_layers, 5);
        assert_eq!(pair.edge_threshold, 10.0);
        assert_eq!(seq.edge_threshold, 100.0);
        assert_eq!(pair.sigma, seq.sigma);
    }

    #[test]
    fn test_summary_mentions_name() {
        let summary = DetectorConfig::pair_preset().summary();
        assert!(summary.contains("[Pair]"));
        assert!(summary.contains("max_features=100"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_toml_and_json_round_trip() {
        let cfg = DetectorConfig::sequence_preset();
        let parsed = DetectorConfig::from_toml(&cfg.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, cfg);
        let parsed = DetectorConfig::from_json(&cfg.to_json().unwrap()).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_invalid_config_is_rejected_on_load() {
        let mut cfg = DetectorConfig::pair_preset();
        cfg.core.octave_layers = 0;
        let json = cfg.to_json().unwrap();
        assert!(matches!(DetectorConfig::from_json(&json), Err(ConfigError::Invalid(_))));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_save_and_load_pick_format_by_extension() {
        let dir = std::env::temp_dir().join(format!("sift-detect-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let cfg = DetectorConfig::dense_preset().with_metadata("Dense", "every feature");
        for name in ["detector.json", "detector.toml"] {
            let path = dir.join(name);
            cfg.save(&path).unwrap();
            assert_eq!(DetectorConfig::load(&path).unwrap(), cfg);
        }
        let json = std::fs::read_to_string(dir.join("detector.json")).unwrap();
        assert!(json.trim_start().starts_with('{'));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_load_missing_file_is_io_error() {
        assert!(matches!(DetectorConfig::load("no/such/detector.toml"), Err(ConfigError::Io(_))));
    }
}
