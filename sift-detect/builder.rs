use crate::config::DetectorConfig;
use crate::detector::SiftDetector;
use crate::error::ExtractionResult;
use sift_core::SiftConfig;

/// Fluent API builder for detector configuration
#[derive(Debug, Clone)]
pub struct DetectorBuilder {
    config: SiftConfig,
}

impl Default for DetectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBuilder {
    /// Create new builder with default settings
    pub fn new() -> Self {
        Self { config: SiftConfig::default() }
    }

    /// Keep at most `n` keypoints, 0 = unlimited
    pub fn max_features(mut self, n: usize) -> Self {
        self.config.max_features = n;
        self
    }

    /// Set number of scale layers per octave
    pub fn octave_layers(mut self, layers: usize) -> Self {
        self.config.octave_layers = layers;
        self
    }

    /// Set DoG contrast threshold
    pub fn contrast_threshold(mut self, threshold: f32) -> Self {
        self.config.contrast_threshold = threshold;
        self
    }

    /// Set principal curvature ratio used to reject edges
    pub fn edge_threshold(mut self, threshold: f32) -> Self {
        self.config.edge_threshold = threshold;
        self
    }

    /// Set blur of the base octave
    pub fn sigma(mut self, sigma: f32) -> Self {
        self.config.sigma = sigma;
        self
    }

    /// Set number of threads for parallel processing
    pub fn threads(mut self, n_threads: usize) -> Self {
        self.config.n_threads = n_threads;
        self
    }

    /// Apply pair preset
    pub fn preset_pair(self) -> Self {
        self.with_core(DetectorConfig::pair_preset().core)
    }

    /// Apply sequence preset
    pub fn preset_sequence(self) -> Self {
        self.with_core(DetectorConfig::sequence_preset().core)
    }

    /// Apply dense preset
    pub fn preset_dense(self) -> Self {
        self.with_core(DetectorConfig::dense_preset().core)
    }

    // presets leave the thread count alone
    fn with_core(mut self, core: SiftConfig) -> Self {
        let n_threads = self.config.n_threads;
        self.config = SiftConfig { n_threads, ..core };
        self
    }

    /// Build configured detector
    pub fn build(self) -> ExtractionResult<SiftDetector> {
        SiftDetector::new(self.config)
    }

    /// Generate summary of current configuration
    pub fn summary(&self) -> String {
        format!(
            "DetectorBuilder: max_features={}, layers={}, contrast={}, edge={}, sigma={}, \
             threads={}",
            self.config.max_features,
            self.config.octave_layers,
            self.config.contrast_threshold,
            self.config.edge_threshold,
            self.config.sigma,
            self.config.n_threads
        )
    }

    /// Create builder from existing configuration
    pub fn from_config(config: DetectorConfig) -> Self {
        Self { config: config.core }
    }

    /// Convert to DetectorConfig
    pub fn to_config(self) -> DetectorConfig {
        DetectorConfig { core: self.config, name: None, description: None }
    }
}
