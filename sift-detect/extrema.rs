use crate::orientation::{dominant_orientations, orientation_histogram, ORI_RADIUS, ORI_SIG_FCTR};
use crate::pyramid::ScaleSpace;
use crate::types::{Plane, ScaleSpaceKeypoint};
use rayon::prelude::*;
use sift_core::{Keypoint, SiftConfig};

/// Pixels excluded from extrema search at every octave border
pub const IMG_BORDER: usize = 5;
pub const MAX_INTERP_STEPS: usize = 5;

/// Locate, refine and orient all DoG extrema of a scale space.
///
/// Output order depends only on the input (octave, layer, row, column), so the
/// parallel search stays deterministic.
pub(crate) fn find_scale_space_extrema(
    space: &ScaleSpace,
    cfg: &SiftConfig,
) -> Vec<ScaleSpaceKeypoint> {
    let layers = cfg.octave_layers;
    let threshold = (0.5 * cfg.contrast_threshold / layers as f32 * 255.0).floor();

    let jobs: Vec<(usize, usize)> = (0..space.dogs.len())
        .flat_map(|o| (1..=layers).map(move |i| (o, i)))
        .collect();

    jobs.into_par_iter()
        .flat_map_iter(|(o, i)| {
            let dog = &space.dogs[o];
            let img = &dog[i];
            let (w, h) = (img.width, img.height);
            let mut found = Vec::new();
            if w <= 2 * IMG_BORDER || h <= 2 * IMG_BORDER {
                return found.into_iter();
            }

            for r in IMG_BORDER..h - IMG_BORDER {
                for c in IMG_BORDER..w - IMG_BORDER {
                    let val = img.at(c, r);
                    if val.abs() <= threshold || !is_local_extremum(dog, i, c, r, val) {
                        continue;
                    }
                    let refined = adjust_local_extrema(dog, o, i, c, r, cfg);
                    let Some((kp, layer, (rc, rr))) = refined else {
                        continue;
                    };

                    let scl_octv = kp.size * 0.5 / (1u32 << o) as f32;
                    let (hist, max) = orientation_histogram(
                        &space.gaussians[o][layer],
                        rc as isize,
                        rr as isize,
                        (ORI_RADIUS * scl_octv).round() as isize,
                        ORI_SIG_FCTR * scl_octv,
                    );
                    for angle in dominant_orientations(&hist, max) {
                        found.push(ScaleSpaceKeypoint {
                            keypoint: Keypoint { angle, ..kp },
                            octave: o,
                            layer,
                        });
                    }
                }
            }
            found.into_iter()
        })
        .collect()
}

/// `val` is >= (or <=, for negative values) all 26 neighbours in the 3x3x3 cube
fn is_local_extremum(dog: &[Plane], layer: usize, c: usize, r: usize, val: f32) -> bool {
    let cube = [&dog[layer - 1], &dog[layer], &dog[layer + 1]];
    for (k, plane) in cube.iter().enumerate() {
        for y in r - 1..=r + 1 {
            for x in c - 1..=c + 1 {
                if k == 1 && x == c && y == r {
                    continue;
                }
                let n = plane.at(x, y);
                if val > 0.0 && val < n {
                    return false;
                }
                if val < 0.0 && val > n {
                    return false;
                }
            }
        }
    }
    true
}

const IMG_SCALE: f32 = 1.0 / 255.0;
const DERIV_SCALE: f32 = IMG_SCALE * 0.5;
const SECOND_DERIV_SCALE: f32 = IMG_SCALE;
const CROSS_DERIV_SCALE: f32 = IMG_SCALE * 0.25;

/// Finite-difference derivatives of the DoG at one sample, scaled to `[0, 1]` intensities
struct Derivatives {
    value: f32,
    dx: f32,
    dy: f32,
    ds: f32,
    dxx: f32,
    dyy: f32,
    dss: f32,
    dxy: f32,
    dxs: f32,
    dys: f32,
}

impl Derivatives {
    fn at(dog: &[Plane], layer: usize, c: usize, r: usize) -> Self {
        let img = &dog[layer];
        let prev = &dog[layer - 1];
        let next = &dog[layer + 1];
        let v2 = img.at(c, r) * 2.0;
        Self {
            value: img.at(c, r),
            dx: (img.at(c + 1, r) - img.at(c - 1, r)) * DERIV_SCALE,
            dy: (img.at(c, r + 1) - img.at(c, r - 1)) * DERIV_SCALE,
            ds: (next.at(c, r) - prev.at(c, r)) * DERIV_SCALE,
            dxx: (img.at(c + 1, r) + img.at(c - 1, r) - v2) * SECOND_DERIV_SCALE,
            dyy: (img.at(c, r + 1) + img.at(c, r - 1) - v2) * SECOND_DERIV_SCALE,
            dss: (next.at(c, r) + prev.at(c, r) - v2) * SECOND_DERIV_SCALE,
            dxy: (img.at(c + 1, r + 1) - img.at(c - 1, r + 1) - img.at(c + 1, r - 1)
                + img.at(c - 1, r - 1))
                * CROSS_DERIV_SCALE,
            dxs: (next.at(c + 1, r) - next.at(c - 1, r) - prev.at(c + 1, r) + prev.at(c - 1, r))
                * CROSS_DERIV_SCALE,
            dys: (next.at(c, r + 1) - next.at(c, r - 1) - prev.at(c, r + 1) + prev.at(c, r - 1))
                * CROSS_DERIV_SCALE,
        }
    }

    fn gradient(&self) -> [f32; 3] {
        [self.dx, self.dy, self.ds]
    }

    fn hessian(&self) -> [[f32; 3]; 3] {
        [
            [self.dxx, self.dxy, self.dxs],
            [self.dxy, self.dyy, self.dys],
            [self.dxs, self.dys, self.dss],
        ]
    }
}

/// Fit a 3D quadratic to the DoG around a candidate and move the candidate
/// until the offset is below half a pixel. Rejects unstable, low contrast and
/// edge-like extrema. Returns the keypoint in base image coordinates, the
/// final layer and the final integer `(column, row)` within the octave.
fn adjust_local_extrema(
    dog: &[Plane],
    octave: usize,
    layer: usize,
    c: usize,
    r: usize,
    cfg: &SiftConfig,
) -> Option<(Keypoint, usize, (usize, usize))> {
    let layers = cfg.octave_layers;
    let (w, h) = (dog[0].width, dog[0].height);
    let (mut c, mut r, mut layer) = (c as isize, r as isize, layer as isize);
    let (mut xc, mut xr, mut xi) = (0f32, 0f32, 0f32);
    let mut converged = false;

    for _ in 0..MAX_INTERP_STEPS {
        let d = Derivatives::at(dog, layer as usize, c as usize, r as usize);
        let x = solve3(&d.hessian(), &d.gradient());
        xc = -x[0];
        xr = -x[1];
        xi = -x[2];

        if xi.abs() < 0.5 && xr.abs() < 0.5 && xc.abs() < 0.5 {
            converged = true;
            break;
        }
        let limit = (i32::MAX / 3) as f32;
        if xi.abs() > limit || xr.abs() > limit || xc.abs() > limit {
            return None;
        }

        c += xc.round() as isize;
        r += xr.round() as isize;
        layer += xi.round() as isize;

        let border = IMG_BORDER as isize;
        if layer < 1
            || layer > layers as isize
            || c < border
            || c >= w as isize - border
            || r < border
            || r >= h as isize - border
        {
            return None;
        }
    }
    if !converged {
        return None;
    }

    let (cu, ru, lu) = (c as usize, r as usize, layer as usize);
    let d = Derivatives::at(dog, lu, cu, ru);
    let g = d.gradient();
    let contrast = d.value * IMG_SCALE + 0.5 * (g[0] * xc + g[1] * xr + g[2] * xi);
    if contrast.abs() * (layers as f32) < cfg.contrast_threshold {
        return None;
    }

    let tr = d.dxx + d.dyy;
    let det = d.dxx * d.dyy - d.dxy * d.dxy;
    let edge = cfg.edge_threshold;
    if det <= 0.0 || tr * tr * edge >= (edge + 1.0) * (edge + 1.0) * det {
        return None;
    }

    let scale = (1u32 << octave) as f32;
    let keypoint = Keypoint {
        x: (c as f32 + xc) * scale,
        y: (r as f32 + xr) * scale,
        size: cfg.sigma * 2f32.powf((layer as f32 + xi) / layers as f32) * scale * 2.0,
        angle: 0.0,
        response: contrast.abs(),
        octave: octave as i32,
    };
    Some((keypoint, lu, (cu, ru)))
}

/// Solve `a * x = b` by Cramer's rule; a singular system yields zero
fn solve3(a: &[[f32; 3]; 3], b: &[f32; 3]) -> [f32; 3] {
    let det3 = |m: &[[f32; 3]; 3]| {
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    };
    let det = det3(a);
    if det.abs() < 1e-12 {
        return [0.0; 3];
    }
    let mut x = [0f32; 3];
    for (col, xv) in x.iter_mut().enumerate() {
        let mut m = *a;
        for row in 0..3 {
            m[row][col] = b[row];
        }
        *xv = det3(&m) / det;
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pyramid::ImagePyramid;

    #[test]
    fn test_solve3_identity() {
        let a = [[1.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, 4.0]];
        let x = solve3(&a, &[1.0, 1.0, 1.0]);
        assert_eq!(x, [1.0, 0.5, 0.25]);
    }

    #[test]
    fn test_solve3_singular_is_zero() {
        let a = [[1.0, 2.0, 3.0], [2.0, 4.0, 6.0], [0.0, 0.0, 1.0]];
        assert_eq!(solve3(&a, &[1.0, 1.0, 1.0]), [0.0; 3]);
    }

    #[test]
    fn test_flat_image_has_no_extrema() {
        let base = Plane::from_vec(64, 64, vec![80.0; 64 * 64]);
        let space = ImagePyramid::build(base, 2, 3, 1.6);
        let cfg = SiftConfig { n_threads: 1, ..SiftConfig::default() };
        assert!(find_scale_space_extrema(&space, &cfg).is_empty());
    }

    #[test]
    fn test_blob_is_detected_near_its_centre() {
        let (w, h) = (64usize, 64usize);
        // slightly elliptical and off-grid so the orientation histogram has a strict peak
        let data = (0..w * h)
            .map(|i| {
                let (x, y) = ((i % w) as f32 - 31.7, (i / w) as f32 - 32.4);
                200.0 * (-(x * x) / (2.0 * 14.0) - (y * y) / (2.0 * 18.0)).exp()
            })
            .collect();
        let base = Plane::from_vec(w, h, data);
        let n = ImagePyramid::number_of_octaves(w, h);
        let space = ImagePyramid::build(base, n, 3, 1.6);
        let cfg = SiftConfig { n_threads: 1, ..SiftConfig::default() };
        let found = find_scale_space_extrema(&space, &cfg);
        assert!(!found.is_empty());
        assert!(found
            .iter()
            .any(|k| (k.keypoint.x - 31.7).abs() < 2.0 && (k.keypoint.y - 32.4).abs() < 2.0));
    }
}
