#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of floats in one SIFT descriptor (4x4 spatial cells, 8 orientation bins)
pub const DESCRIPTOR_LEN: usize = 128;

/// Borrowed row-major raster with interleaved 8-bit channels.
///
/// One channel is gray, three are RGB, four are RGBA. The view never owns or
/// mutates the pixels; annotated output is always produced on a copy.
#[derive(Debug, Clone, Copy)]
pub struct ImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub data: &'a [u8],
}

impl<'a> ImageView<'a> {
    pub fn new(width: usize, height: usize, channels: usize, data: &'a [u8]) -> Self {
        Self { width, height, channels, data }
    }

    pub fn gray(width: usize, height: usize, data: &'a [u8]) -> Self {
        Self::new(width, height, 1, data)
    }

    pub fn area(&self) -> usize {
        self.width * self.height
    }

    /// Buffer length implied by the dimensions and channel count
    pub fn expected_len(&self) -> usize {
        self.area() * self.channels
    }

    /// Luma in `[0, 255]` using ITU-R 601 weights; alpha is ignored.
    ///
    /// Unsupported channel counts and buffers shorter than the dimensions
    /// imply yield an empty buffer.
    pub fn to_gray_f32(&self) -> Vec<f32> {
        let n = self.area();
        if self.data.len() < self.expected_len() {
            return Vec::new();
        }
        match self.channels {
            1 => self.data[..n].iter().map(|&v| v as f32).collect(),
            3 | 4 => self.data[..n * self.channels]
                .chunks_exact(self.channels)
                .map(|px| 0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32)
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Scale-space keypoint with subpixel location
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    /// Diameter of the described neighbourhood in input pixels
    pub size: f32,
    /// Dominant gradient orientation in degrees, `[0, 360)`
    pub angle: f32,
    pub response: f32,
    /// Octave of detection relative to the input resolution, -1 is the upsampled base
    pub octave: i32,
}

impl Keypoint {
    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Dense descriptor matrix, one row per keypoint
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DescriptorSet {
    width: usize,
    data: Vec<f32>,
}

impl DescriptorSet {
    pub fn new(width: usize) -> Self {
        Self { width, data: Vec::new() }
    }

    pub fn with_capacity(width: usize, rows: usize) -> Self {
        Self { width, data: Vec::with_capacity(width * rows) }
    }

    /// Build from row vectors. Every row must have exactly `width` entries.
    pub fn from_rows<I>(width: usize, rows: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<[f32]>,
    {
        let mut set = Self::new(width);
        for row in rows {
            set.push(row.as_ref());
        }
        set
    }

    pub fn push(&mut self, row: &[f32]) {
        assert_eq!(row.len(), self.width, "descriptor row width mismatch");
        self.data.extend_from_slice(row);
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn len(&self) -> usize {
        if self.width == 0 { 0 } else { self.data.len() / self.width }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.width..(i + 1) * self.width]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.width.max(1))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// Extractor output: keypoints and their descriptors, row `i` describes keypoint `i`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Features {
    pub keypoints: Vec<Keypoint>,
    pub descriptors: DescriptorSet,
}

impl Features {
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

/// Correspondence between query row `query` and train row `train`
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Match {
    pub query: usize,
    pub train: usize,
    pub distance: f32,
}

/// Best and second-best neighbour for one query descriptor.
/// `second` is `None` when the train set has fewer than two rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KnnMatch {
    pub best: Match,
    pub second: Option<Match>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Index-aligned point pairs, source image to target image
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Correspondences {
    src: Vec<Point>,
    dst: Vec<Point>,
}

impl Correspondences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, src: Point, dst: Point) {
        self.src.push(src);
        self.dst.push(dst);
    }

    pub fn len(&self) -> usize {
        self.src.len()
    }

    pub fn is_empty(&self) -> bool {
        self.src.is_empty()
    }

    pub fn src(&self) -> &[Point] {
        &self.src
    }

    pub fn dst(&self) -> &[Point] {
        &self.dst
    }

    pub fn pairs(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        self.src.iter().copied().zip(self.dst.iter().copied())
    }
}

impl FromIterator<(Point, Point)> for Correspondences {
    fn from_iter<T: IntoIterator<Item = (Point, Point)>>(iter: T) -> Self {
        let mut c = Self::new();
        for (s, d) in iter {
            c.push(s, d);
        }
        c
    }
}

/// SIFT extractor parameters
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SiftConfig {
    /// Keep at most this many keypoints (strongest response first), 0 = unlimited
    pub max_features: usize,
    pub octave_layers: usize,
    pub contrast_threshold: f32,
    pub edge_threshold: f32,
    /// Blur of the base octave image
    pub sigma: f32,
    /// Size of a dedicated worker pool for extraction, 0 = the global rayon pool
    pub n_threads: usize,
}

impl Default for SiftConfig {
    fn default() -> Self {
        Self {
            max_features: 0,
            octave_layers: 3,
            contrast_threshold: 0.04,
            edge_threshold: 10.0,
            sigma: 1.6,
            n_threads: 0,
        }
    }
}

/// Initialize Rayon thread pool with the specified number of threads
pub fn init_thread_pool(n_threads: usize) -> Result<(), rayon::ThreadPoolBuildError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build_global()
}
