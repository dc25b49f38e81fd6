use crate::types::Plane;
use rayon::prelude::*;

/// Blur assumed to be already present in the input image
pub const INIT_SIGMA: f32 = 0.5;

/// Gaussian and difference-of-Gaussian scale space for one image
pub struct ScaleSpace {
    /// `octaves x (layers + 3)` Gaussian images
    pub gaussians: Vec<Vec<Plane>>,
    /// `octaves x (layers + 2)` difference images
    pub dogs: Vec<Vec<Plane>>,
}

/// Image pyramid operations for multi-scale feature detection
pub struct ImagePyramid;

impl ImagePyramid {
    /// Upsample the input by two and blur it up to `sigma`. The detector
    /// starts at octave -1 so that small structures survive.
    pub fn base_image(gray: &Plane, sigma: f32) -> Plane {
        let up = Self::upsample_2x(gray);
        let sig_diff = (sigma * sigma - 4.0 * INIT_SIGMA * INIT_SIGMA).max(0.01).sqrt();
        Self::gaussian_blur(&up, sig_diff)
    }

    /// Number of octaves for a base image of the given size
    pub fn number_of_octaves(width: usize, height: usize) -> usize {
        let min_dim = width.min(height).max(1) as f32;
        let n = (min_dim.log2() - 2.0).round() + 1.0;
        (n.max(1.0)) as usize
    }

    /// Incremental blur applied between consecutive layers of an octave.
    /// Entry 0 is the absolute blur of the first layer.
    pub fn gaussian_sigmas(sigma: f32, octave_layers: usize) -> Vec<f32> {
        let n = octave_layers + 3;
        let k = 2f32.powf(1.0 / octave_layers as f32);
        let mut sigmas = Vec::with_capacity(n);
        sigmas.push(sigma);
        for i in 1..n {
            let sig_prev = k.powi(i as i32 - 1) * sigma;
            let sig_total = sig_prev * k;
            sigmas.push((sig_total * sig_total - sig_prev * sig_prev).sqrt());
        }
        sigmas
    }

    /// Build the Gaussian pyramid and its difference images
    pub fn build(base: Plane, n_octaves: usize, octave_layers: usize, sigma: f32) -> ScaleSpace {
        let sigmas = Self::gaussian_sigmas(sigma, octave_layers);
        let mut gaussians: Vec<Vec<Plane>> = Vec::with_capacity(n_octaves);

        for o in 0..n_octaves {
            let first = if o == 0 {
                base.clone()
            } else {
                Self::downsample_2x(&gaussians[o - 1][octave_layers])
            };
            let mut octave = Vec::with_capacity(octave_layers + 3);
            octave.push(first);
            for sig in sigmas.iter().skip(1) {
                let next = Self::gaussian_blur(&octave[octave.len() - 1], *sig);
                octave.push(next);
            }
            gaussians.push(octave);
        }

        let dogs = gaussians
            .par_iter()
            .map(|octave| {
                octave
                    .windows(2)
                    .map(|pair| Self::subtract(&pair[1], &pair[0]))
                    .collect()
            })
            .collect();

        ScaleSpace { gaussians, dogs }
    }

    /// Pixel-wise `a - b`
    pub fn subtract(a: &Plane, b: &Plane) -> Plane {
        let data = a.data.iter().zip(b.data.iter()).map(|(x, y)| x - y).collect();
        Plane::from_vec(a.width, a.height, data)
    }

    /// Separable Gaussian blur with reflect-101 borders
    pub fn gaussian_blur(img: &Plane, sigma: f32) -> Plane {
        let kernel = Self::gaussian_kernel(sigma);
        let radius = (kernel.len() / 2) as isize;
        let (w, h) = (img.width, img.height);

        let mut tmp = vec![0f32; w * h];
        tmp.par_chunks_mut(w.max(1)).enumerate().for_each(|(y, row)| {
            let src = &img.data[y * w..(y + 1) * w];
            for (x, out) in row.iter_mut().enumerate() {
                let mut acc = 0.0;
                for (k, &kv) in kernel.iter().enumerate() {
                    let xx = reflect101(x as isize + k as isize - radius, w);
                    acc += kv * src[xx];
                }
                *out = acc;
            }
        });

        let mut out = vec![0f32; w * h];
        out.par_chunks_mut(w.max(1)).enumerate().for_each(|(y, row)| {
            for (x, o) in row.iter_mut().enumerate() {
                let mut acc = 0.0;
                for (k, &kv) in kernel.iter().enumerate() {
                    let yy = reflect101(y as isize + k as isize - radius, h);
                    acc += kv * tmp[yy * w + x];
                }
                *o = acc;
            }
        });

        Plane::from_vec(w, h, out)
    }

    fn gaussian_kernel(sigma: f32) -> Vec<f32> {
        let radius = ((sigma * 4.0).round() as usize).max(1);
        let scale = -0.5 / (sigma * sigma);
        let mut kernel: Vec<f32> = (0..=2 * radius)
            .map(|i| {
                let d = i as f32 - radius as f32;
                (d * d * scale).exp()
            })
            .collect();
        let sum: f32 = kernel.iter().sum();
        kernel.iter_mut().for_each(|v| *v /= sum);
        kernel
    }

    /// Double the resolution using bilinear interpolation (pixel-centre aligned)
    pub fn upsample_2x(img: &Plane) -> Plane {
        let (tw, th) = (img.width * 2, img.height * 2);
        let mut out = vec![0f32; tw * th];
        out.par_chunks_mut(tw.max(1)).enumerate().for_each(|(y, row)| {
            let sy = (y as f32 + 0.5) * 0.5 - 0.5;
            for (x, o) in row.iter_mut().enumerate() {
                let sx = (x as f32 + 0.5) * 0.5 - 0.5;
                *o = Self::bilinear_sample(img, sx, sy);
            }
        });
        Plane::from_vec(tw, th, out)
    }

    /// Halve the resolution by keeping every second pixel
    pub fn downsample_2x(img: &Plane) -> Plane {
        let tw = (img.width / 2).max(1);
        let th = (img.height / 2).max(1);
        let mut out = Vec::with_capacity(tw * th);
        for y in 0..th {
            let sy = (y * 2).min(img.height - 1);
            for x in 0..tw {
                let sx = (x * 2).min(img.width - 1);
                out.push(img.at(sx, sy));
            }
        }
        Plane::from_vec(tw, th, out)
    }

    /// Sample image at fractional coordinates, clamping to the border
    fn bilinear_sample(img: &Plane, x: f32, y: f32) -> f32 {
        let x = x.clamp(0.0, (img.width - 1) as f32);
        let y = y.clamp(0.0, (img.height - 1) as f32);
        let x1 = x.floor() as usize;
        let y1 = y.floor() as usize;
        let x2 = (x1 + 1).min(img.width - 1);
        let y2 = (y1 + 1).min(img.height - 1);

        let fx = x - x1 as f32;
        let fy = y - y1 as f32;

        let top = img.at(x1, y1) * (1.0 - fx) + img.at(x2, y1) * fx;
        let bottom = img.at(x1, y2) * (1.0 - fx) + img.at(x2, y2) * fx;

        top * (1.0 - fy) + bottom * fy
    }
}

#[inline(always)]
fn reflect101(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let n = n as isize;
    let mut i = i;
    loop {
        if i < 0 {
            i = -i;
        } else if i >= n {
            i = 2 * n - 2 - i;
        } else {
            return i as usize;
        }
    }
}
