use crate::descriptor::compute_descriptor;
use crate::error::{ExtractionError, ExtractionResult};
use crate::extrema::find_scale_space_extrema;
use crate::pyramid::ImagePyramid;
use crate::types::{Plane, ScaleSpaceKeypoint};
use rayon::prelude::*;
use sift_core::{DescriptorSet, Features, ImageView, Keypoint, SiftConfig, DESCRIPTOR_LEN};
use std::cmp::Ordering;
use std::sync::Arc;

/// SIFT keypoint detector and descriptor extractor
#[derive(Debug, Clone)]
pub struct SiftDetector {
    cfg: SiftConfig,
    /// Dedicated workers when `n_threads > 0`
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl SiftDetector {
    /// Creates a new detector, rejecting unusable parameters
    pub fn new(cfg: SiftConfig) -> ExtractionResult<Self> {
        validate_config(&cfg)?;
        let pool = match cfg.n_threads {
            0 => None,
            threads => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| ExtractionError::ThreadPool { threads, reason: e.to_string() })?;
                Some(Arc::new(pool))
            }
        };
        Ok(Self { cfg, pool })
    }

    /// Workers available to one extraction
    pub fn thread_count(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }

    fn run<T, F>(&self, op: F) -> T
    where
        T: Send,
        F: FnOnce() -> T + Send,
    {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    /// Validates image layout before processing
    fn validate_image(&self, img: &ImageView<'_>) -> ExtractionResult<()> {
        if img.area() == 0 {
            return Err(ExtractionError::EmptyImage { width: img.width, height: img.height });
        }
        if !matches!(img.channels, 1 | 3 | 4) {
            return Err(ExtractionError::UnsupportedChannels(img.channels));
        }
        let expected_len = img.expected_len();
        if img.data.len() != expected_len {
            return Err(ExtractionError::BufferSize { expected_len, actual_len: img.data.len() });
        }
        Ok(())
    }

    /// Detect keypoints without computing descriptors
    pub fn detect(&self, img: &ImageView<'_>) -> ExtractionResult<Vec<Keypoint>> {
        self.run(|| {
            let (_, found) = self.detect_in_scale_space(img)?;
            Ok(found.into_iter().map(|k| to_input_coordinates(k.keypoint)).collect())
        })
    }

    /// Detect keypoints and compute one 128-element descriptor per keypoint.
    /// Row `i` of the descriptor set belongs to keypoint `i`.
    pub fn detect_and_compute(&self, img: &ImageView<'_>) -> ExtractionResult<Features> {
        self.run(|| self.compute_features(img))
    }

    fn compute_features(&self, img: &ImageView<'_>) -> ExtractionResult<Features> {
        let (space, found) = self.detect_in_scale_space(img)?;

        let rows: Vec<[f32; DESCRIPTOR_LEN]> = found
            .par_iter()
            .map(|k| {
                let scale = 1.0 / (1u32 << k.octave) as f32;
                let ptf = (k.keypoint.x * scale, k.keypoint.y * scale);
                let scl = k.keypoint.size * 0.5 * scale;
                let mut angle = 360.0 - k.keypoint.angle;
                if (angle - 360.0).abs() < f32::EPSILON {
                    angle = 0.0;
                }
                compute_descriptor(&space.gaussians[k.octave][k.layer], ptf, angle, scl)
            })
            .collect();

        let mut descriptors = DescriptorSet::with_capacity(DESCRIPTOR_LEN, rows.len());
        for row in &rows {
            descriptors.push(row);
        }
        let keypoints = found.into_iter().map(|k| to_input_coordinates(k.keypoint)).collect();

        Ok(Features { keypoints, descriptors })
    }

    fn detect_in_scale_space(
        &self,
        img: &ImageView<'_>,
    ) -> ExtractionResult<(crate::pyramid::ScaleSpace, Vec<ScaleSpaceKeypoint>)> {
        self.validate_image(img)?;

        let gray = Plane::from_vec(img.width, img.height, img.to_gray_f32());
        let base = ImagePyramid::base_image(&gray, self.cfg.sigma);
        let n_octaves = ImagePyramid::number_of_octaves(base.width, base.height);
        let space = ImagePyramid::build(base, n_octaves, self.cfg.octave_layers, self.cfg.sigma);

        let mut found = find_scale_space_extrema(&space, &self.cfg);
        let raw = found.len();
        found.sort_by(compare_keypoints);
        found.dedup_by(|a, b| {
            let (a, b) = (&a.keypoint, &b.keypoint);
            a.x == b.x && a.y == b.y && a.size == b.size && a.angle == b.angle
        });
        retain_best(&mut found, self.cfg.max_features);

        log::debug!(
            "sift: {}x{} image, {} octaves, {} candidates, {} keypoints kept",
            img.width,
            img.height,
            n_octaves,
            raw,
            found.len()
        );
        Ok((space, found))
    }

    /// Get detector configuration
    pub fn config(&self) -> &SiftConfig {
        &self.cfg
    }
}

/// Validate extractor parameters
pub fn validate_config(cfg: &SiftConfig) -> ExtractionResult<()> {
    if cfg.octave_layers == 0 {
        return Err(ExtractionError::InvalidConfig("octave_layers must be at least 1".into()));
    }
    let positive = |name: &str, v: f32| {
        if v.is_finite() && v > 0.0 {
            Ok(())
        } else {
            let msg = format!("{} must be positive and finite, got {}", name, v);
            Err(ExtractionError::InvalidConfig(msg))
        }
    };
    positive("contrast_threshold", cfg.contrast_threshold)?;
    positive("edge_threshold", cfg.edge_threshold)?;
    positive("sigma", cfg.sigma)?;
    Ok(())
}

/// Position first, then larger size, angle and stronger response
fn compare_keypoints(a: &ScaleSpaceKeypoint, b: &ScaleSpaceKeypoint) -> Ordering {
    let (ka, kb) = (&a.keypoint, &b.keypoint);
    ka.x.total_cmp(&kb.x)
        .then(ka.y.total_cmp(&kb.y))
        .then(kb.size.total_cmp(&ka.size))
        .then(ka.angle.total_cmp(&kb.angle))
        .then(kb.response.total_cmp(&ka.response))
        .then(b.octave.cmp(&a.octave))
}

/// Keep the `max` strongest keypoints; the input order is the tie breaker
fn retain_best(found: &mut Vec<ScaleSpaceKeypoint>, max: usize) {
    if max == 0 || found.len() <= max {
        return;
    }
    found.sort_by(|a, b| b.keypoint.response.total_cmp(&a.keypoint.response));
    found.truncate(max);
}

/// Pyramid coordinates are twice the input resolution
fn to_input_coordinates(kp: Keypoint) -> Keypoint {
    Keypoint {
        x: kp.x * 0.5,
        y: kp.y * 0.5,
        size: kp.size * 0.5,
        octave: kp.octave - 1,
        ..kp
    }
}
