//! Pair and sequence workflows tying extraction, matching, filtering and
//! homography fitting together.

use crate::annotate::{draw_box, BoundingBox, GREEN, RED, STROKE};
use crate::contours::{render_contours, ContourRendering};
use crate::error::{PipelineError, PipelineResult};
use crate::raster::{image_view, load_rgb};
use crate::settings::PipelineSettings;
use image::RgbImage;
use rayon::prelude::*;
use sift_core::{Correspondences, Features};
use sift_detect::SiftDetector;
use sift_geom::{
    fit_homography_ransac, rotation_angle_degrees, GeometryError, Homography, MIN_CORRESPONDENCES,
};
use sift_match::{ratio_filter, DescriptorMatcher, RegionFilter};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Points used for the bounding boxes drawn by the pair workflow
const BOX_POINTS: usize = 4;

/// Outcome of the two-image workflow
#[derive(Debug, Clone)]
pub struct PairEstimate {
    /// Rotation from source to target in degrees, in (-180, 180]
    pub angle: f64,
    pub homography: Homography,
    pub source_box: BoundingBox,
    pub target_box: BoundingBox,
    /// Ratio-tested, region-filtered correspondences fed to RANSAC
    pub correspondences: Correspondences,
    pub inliers: usize,
}

/// One consecutive pair of a sequence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequenceStep {
    /// 0-based index of the first image of the pair
    pub pair: usize,
    pub raw_angle: f64,
    pub weighted_angle: f64,
}

/// Outcome of the image-chain workflow
#[derive(Debug)]
pub struct SequenceEstimate {
    /// Successful pairs in order
    pub steps: Vec<SequenceStep>,
    pub sum: f64,
    /// `"a1 + a2 + ... = sum"` over the weighted angles
    pub derivation: String,
    /// One per input image
    pub renderings: Vec<ContourRendering>,
    /// Pairs that were skipped, with the reason
    pub failures: Vec<(usize, PipelineError)>,
}

impl SequenceEstimate {
    pub fn weighted_angles(&self) -> Vec<f64> {
        self.steps.iter().map(|s| s.weighted_angle).collect()
    }
}

/// Shared flag for aborting a running sequence between pairs
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> PipelineResult<()> {
        if self.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        Ok(())
    }
}

/// Append-only list of loaded images
#[derive(Debug, Clone, Default)]
pub struct ImageSeries {
    images: Vec<Arc<RgbImage>>,
}

impl ImageSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, img: RgbImage) {
        self.images.push(Arc::new(img));
    }

    /// Decode `path` and append it
    pub fn push_file<P: AsRef<Path>>(&mut self, path: P) -> PipelineResult<()> {
        self.push(load_rgb(path)?);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Immutable view of the images loaded so far; later pushes do not affect it
    pub fn snapshot(&self) -> Vec<Arc<RgbImage>> {
        self.images.clone()
    }
}

#[derive(Debug, Clone)]
pub enum Workflow {
    Pair { source: Arc<RgbImage>, target: Arc<RgbImage> },
    Sequence(Vec<Arc<RgbImage>>),
}

#[derive(Debug)]
pub enum WorkflowOutput {
    Pair(PairEstimate),
    Sequence(SequenceEstimate),
}

pub fn run_workflow(
    workflow: &Workflow,
    settings: &PipelineSettings,
    cancel: &Cancellation,
) -> PipelineResult<WorkflowOutput> {
    match workflow {
        Workflow::Pair { source, target } => {
            cancel.check()?;
            estimate_pair(source, target, settings).map(WorkflowOutput::Pair)
        }
        Workflow::Sequence(images) => {
            estimate_sequence(images, settings, cancel).map(WorkflowOutput::Sequence)
        }
    }
}

/// Estimate the in-plane rotation taking `source` to `target`
pub fn estimate_pair(
    source: &RgbImage,
    target: &RgbImage,
    settings: &PipelineSettings,
) -> PipelineResult<PairEstimate> {
    settings.validate()?;
    let detector = SiftDetector::new(settings.pair_detector.core.clone())?;
    let (src_features, dst_features) = rayon::join(
        || detector.detect_and_compute(&image_view(source)),
        || detector.detect_and_compute(&image_view(target)),
    );
    estimate_from_features(&src_features?, &dst_features?, source, target, settings)
}

/// Copies of both images with the match regions outlined, red on the source
/// and green on the target
pub fn annotate_pair(
    source: &RgbImage,
    target: &RgbImage,
    estimate: &PairEstimate,
) -> (RgbImage, RgbImage) {
    let mut src = source.clone();
    let mut dst = target.clone();
    draw_box(&mut src, &estimate.source_box, RED, STROKE);
    draw_box(&mut dst, &estimate.target_box, GREEN, STROKE);
    (src, dst)
}

/// Chain rotation estimates over consecutive images.
///
/// The angle of pair `i` is divided by `i + 1` before summing. Pairs that
/// fail are logged, recorded in `failures` and left out of the sum.
pub fn estimate_sequence(
    images: &[Arc<RgbImage>],
    settings: &PipelineSettings,
    cancel: &Cancellation,
) -> PipelineResult<SequenceEstimate> {
    if images.len() < 2 {
        return Err(PipelineError::SequenceTooShort { got: images.len() });
    }
    settings.validate()?;
    cancel.check()?;

    let detector = SiftDetector::new(settings.sequence_detector.core.clone())?;
    let features: Vec<_> = images
        .par_iter()
        .map(|img| detector.detect_and_compute(&image_view(img)))
        .collect();
    let renderings: Vec<ContourRendering> =
        images.par_iter().map(|img| render_contours(img)).collect();

    let mut steps = Vec::with_capacity(images.len() - 1);
    let mut failures = Vec::new();
    for i in 0..images.len() - 1 {
        cancel.check()?;
        let outcome = match (&features[i], &features[i + 1]) {
            (Ok(a), Ok(b)) => estimate_from_features(a, b, &images[i], &images[i + 1], settings),
            (Err(e), _) | (_, Err(e)) => Err(e.clone().into()),
        };
        match outcome {
            Ok(est) => {
                let weighted_angle = weighted_angle(est.angle, i);
                log::debug!("pair {}: raw {:.3} weighted {:.3}", i, est.angle, weighted_angle);
                steps.push(SequenceStep { pair: i, raw_angle: est.angle, weighted_angle });
            }
            Err(e) => {
                log::warn!("skipping pair {} -> {}: {}", i, i + 1, e);
                failures.push((i, e));
            }
        }
    }

    let weighted: Vec<f64> = steps.iter().map(|s| s.weighted_angle).collect();
    let (sum, derivation) = sum_with_derivation(&weighted);
    Ok(SequenceEstimate { steps, sum, derivation, renderings, failures })
}

/// Angle of pair `index` scaled by `1 / (index + 1)`
pub fn weighted_angle(angle: f64, index: usize) -> f64 {
    angle / (index + 1) as f64
}

/// Sum the weighted angles and spell the addition out, e.g. `"30 + 30 = 60"`.
/// An empty list yields `"0 = 0"`.
pub fn sum_with_derivation(weighted: &[f64]) -> (f64, String) {
    // start from +0.0 so an empty sum prints as "0"
    let sum = weighted.iter().fold(0.0, |acc, a| acc + a);
    let terms = if weighted.is_empty() {
        "0".to_string()
    } else {
        weighted.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(" + ")
    };
    (sum, format!("{} = {}", terms, sum))
}

fn estimate_from_features(
    src: &Features,
    dst: &Features,
    source: &RgbImage,
    target: &RgbImage,
    settings: &PipelineSettings,
) -> PipelineResult<PairEstimate> {
    let matcher = DescriptorMatcher::new(settings.matching);
    let knn = matcher.knn_match(&src.descriptors, &dst.descriptors);
    let good = ratio_filter(&knn);

    let region = RegionFilter::new(
        (source.width() as usize, source.height() as usize),
        (target.width() as usize, target.height() as usize),
    );
    let correspondences = region.correspondences(&good, &src.keypoints, &dst.keypoints);
    log::debug!(
        "pair: {} / {} keypoints, {} knn, {} ratio-tested, {} in region",
        src.len(),
        dst.len(),
        knn.len(),
        good.len(),
        correspondences.len()
    );

    if correspondences.len() < MIN_CORRESPONDENCES {
        let got = correspondences.len();
        let needed = MIN_CORRESPONDENCES;
        return Err(GeometryError::InsufficientCorrespondence { needed, got }.into());
    }

    let fit = fit_homography_ransac(&correspondences, &settings.ransac)?;
    let angle = rotation_angle_degrees(&fit.homography);

    let n = correspondences.len().min(BOX_POINTS);
    let source_box = BoundingBox::enclosing(&correspondences.src()[..n]).unwrap_or_default();
    let target_box = BoundingBox::enclosing(&correspondences.dst()[..n]).unwrap_or_default();

    Ok(PairEstimate {
        angle,
        homography: fit.homography,
        source_box,
        target_box,
        correspondences,
        inliers: fit.inliers,
    })
}
