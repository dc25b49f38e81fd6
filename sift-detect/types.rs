use sift_core::Keypoint;

/// Single-channel `f32` image, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl Plane {
    pub fn zeros(width: usize, height: usize) -> Self {
        Self { width, height, data: vec![0.0; width * height] }
    }

    pub fn from_vec(width: usize, height: usize, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), width * height);
        Self { width, height, data }
    }

    #[inline(always)]
    pub fn at(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }
}

/// Keypoint still expressed in pyramid coordinates (upsampled base image),
/// together with the pyramid slot it was refined to
#[derive(Debug, Clone, Copy)]
pub(crate) struct ScaleSpaceKeypoint {
    pub keypoint: Keypoint,
    pub octave: usize,
    pub layer: usize,
}
