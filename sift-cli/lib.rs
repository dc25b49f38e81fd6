//! Rotation-angle estimation between images: pair and sequence workflows,
//! contour rendering and annotation on top of the SIFT crates.

pub mod annotate;
pub mod contours;
pub mod error;
pub mod pipeline;
pub mod raster;
pub mod settings;

pub use annotate::{draw_box, BoundingBox, GREEN, RED, STROKE};
pub use contours::{render_contours, ContourRendering};
pub use error::{PipelineError, PipelineResult};
pub use pipeline::{
    annotate_pair, estimate_pair, estimate_sequence, run_workflow, sum_with_derivation,
    weighted_angle, Cancellation, ImageSeries, PairEstimate, SequenceEstimate, SequenceStep,
    Workflow, WorkflowOutput,
};
pub use raster::{image_view, load_image, load_rgb, to_gray};
pub use settings::PipelineSettings;

use image::RgbImage;

/// Size the global rayon pool; `0` uses every logical CPU
pub fn init_threads(n_threads: usize) -> PipelineResult<()> {
    let n = if n_threads == 0 { num_cpus::get() } else { n_threads };
    sift_core::init_thread_pool(n)?;
    log::debug!("rayon pool: {} threads", n);
    Ok(())
}

/// Validated settings bundled with the workflows that use them
#[derive(Debug, Clone)]
pub struct RotationEstimator {
    settings: PipelineSettings,
}

impl RotationEstimator {
    pub fn new(settings: PipelineSettings) -> PipelineResult<Self> {
        settings.validate()?;
        Ok(Self { settings })
    }

    pub fn estimate_pair(
        &self,
        source: &RgbImage,
        target: &RgbImage,
    ) -> PipelineResult<PairEstimate> {
        estimate_pair(source, target, &self.settings)
    }

    /// Run the sequence workflow over a snapshot of `series`
    pub fn estimate_series(
        &self,
        series: &ImageSeries,
        cancel: &Cancellation,
    ) -> PipelineResult<SequenceEstimate> {
        estimate_sequence(&series.snapshot(), &self.settings, cancel)
    }

    pub fn run(
        &self,
        workflow: &Workflow,
        cancel: &Cancellation,
    ) -> PipelineResult<WorkflowOutput> {
        run_workflow(workflow, &self.settings, cancel)
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }
}
