use crate::types::Plane;
use sift_core::DESCRIPTOR_LEN;

/// Spatial cells per side
pub const DESCR_WIDTH: usize = 4;
pub const DESCR_HIST_BINS: usize = 8;
/// Cell width in units of keypoint scale
const DESCR_SCL_FCTR: f32 = 3.0;
/// Clamp applied to normalized entries before renormalization
const DESCR_MAG_THR: f32 = 0.2;
const INT_DESCR_FCTR: f32 = 512.0;

/// Compute one 128-element descriptor.
///
/// * `img` - Gaussian image the keypoint was refined in.
/// * `ptf` - keypoint location in that image's coordinates.
/// * `ori` - descriptor orientation in degrees (counter-clockwise convention).
/// * `scl` - keypoint scale in that image's coordinates.
pub fn compute_descriptor(
    img: &Plane,
    ptf: (f32, f32),
    ori: f32,
    scl: f32,
) -> [f32; DESCRIPTOR_LEN] {
    let d = DESCR_WIDTH;
    let n = DESCR_HIST_BINS;
    let (px, py) = (ptf.0.round() as isize, ptf.1.round() as isize);
    let (rows, cols) = (img.height as isize, img.width as isize);

    let (sin_t, cos_t) = ori.to_radians().sin_cos();
    let bins_per_deg = n as f32 / 360.0;
    let exp_scale = -1.0 / (d as f32 * d as f32 * 0.5);
    let hist_width = DESCR_SCL_FCTR * scl;
    let max_radius = ((rows * rows + cols * cols) as f32).sqrt();
    let radius = (hist_width * std::f32::consts::SQRT_2 * (d as f32 + 1.0) * 0.5).round();
    let radius = radius.min(max_radius) as isize;
    let (cos_t, sin_t) = (cos_t / hist_width, sin_t / hist_width);

    // (d + 2) x (d + 2) x (n + 2) so that trilinear spill never needs bounds checks
    let stride_o = n + 2;
    let stride_c = (d + 2) * stride_o;
    let mut hist = vec![0f32; (d + 2) * stride_c];

    for i in -radius..=radius {
        for j in -radius..=radius {
            let c_rot = j as f32 * cos_t - i as f32 * sin_t;
            let r_rot = j as f32 * sin_t + i as f32 * cos_t;
            let rbin = r_rot + d as f32 / 2.0 - 0.5;
            let cbin = c_rot + d as f32 / 2.0 - 0.5;
            let (r, c) = (py + i, px + j);

            if !(rbin > -1.0 && rbin < d as f32 && cbin > -1.0 && cbin < d as f32) {
                continue;
            }
            if r <= 0 || r >= rows - 1 || c <= 0 || c >= cols - 1 {
                continue;
            }

            let (ru, cu) = (r as usize, c as usize);
            let dx = img.at(cu + 1, ru) - img.at(cu - 1, ru);
            let dy = img.at(cu, ru - 1) - img.at(cu, ru + 1);
            let grad_ori = dy.atan2(dx).to_degrees().rem_euclid(360.0);
            let weight = ((c_rot * c_rot + r_rot * r_rot) * exp_scale).exp();
            let mag = (dx * dx + dy * dy).sqrt() * weight;

            let obin = (grad_ori - ori) * bins_per_deg;
            let (r0, c0, o0) = (rbin.floor(), cbin.floor(), obin.floor());
            let (fr, fc, fo) = (rbin - r0, cbin - c0, obin - o0);
            let mut o0 = o0 as isize;
            if o0 < 0 {
                o0 += n as isize;
            }
            if o0 >= n as isize {
                o0 -= n as isize;
            }

            let v_r1 = mag * fr;
            let v_r0 = mag - v_r1;
            let v_rc11 = v_r1 * fc;
            let v_rc10 = v_r1 - v_rc11;
            let v_rc01 = v_r0 * fc;
            let v_rc00 = v_r0 - v_rc01;
            let v_rco111 = v_rc11 * fo;
            let v_rco110 = v_rc11 - v_rco111;
            let v_rco101 = v_rc10 * fo;
            let v_rco100 = v_rc10 - v_rco101;
            let v_rco011 = v_rc01 * fo;
            let v_rco010 = v_rc01 - v_rco011;
            let v_rco001 = v_rc00 * fo;
            let v_rco000 = v_rc00 - v_rco001;

            let idx = ((r0 as isize + 1) as usize) * stride_c
                + ((c0 as isize + 1) as usize) * stride_o
                + o0 as usize;
            hist[idx] += v_rco000;
            hist[idx + 1] += v_rco001;
            hist[idx + stride_o] += v_rco010;
            hist[idx + stride_o + 1] += v_rco011;
            hist[idx + stride_c] += v_rco100;
            hist[idx + stride_c + 1] += v_rco101;
            hist[idx + stride_c + stride_o] += v_rco110;
            hist[idx + stride_c + stride_o + 1] += v_rco111;
        }
    }

    let mut dst = [0f32; DESCRIPTOR_LEN];
    for i in 0..d {
        for j in 0..d {
            let idx = (i + 1) * stride_c + (j + 1) * stride_o;
            // orientation histogram is circular
            hist[idx] += hist[idx + n];
            hist[idx + 1] += hist[idx + n + 1];
            for k in 0..n {
                dst[(i * d + j) * n + k] = hist[idx + k];
            }
        }
    }

    normalize_descriptor(&mut dst);
    dst
}

/// Unit-normalize, clamp large entries, renormalize and quantize to `[0, 255]`
fn normalize_descriptor(dst: &mut [f32; DESCRIPTOR_LEN]) {
    let nrm2: f32 = dst.iter().map(|v| v * v).sum();
    let thr = nrm2.sqrt() * DESCR_MAG_THR;
    let mut nrm2 = 0.0;
    for v in dst.iter_mut() {
        *v = v.min(thr);
        nrm2 += *v * *v;
    }
    let scale = INT_DESCR_FCTR / nrm2.sqrt().max(f32::EPSILON);
    for v in dst.iter_mut() {
        *v = (*v * scale).round().clamp(0.0, 255.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn textured(width: usize, height: usize) -> Plane {
        let data = (0..width * height)
            .map(|i| {
                let (x, y) = ((i % width) as f32, (i / width) as f32);
                128.0
                    + 60.0 * (x * 0.35).sin() * (y * 0.21).cos()
                    + 30.0 * ((x + 2.0 * y) * 0.13).sin()
            })
            .collect();
        Plane::from_vec(width, height, data)
    }

    #[test]
    fn test_descriptor_is_normalized_and_bounded() {
        let img = textured(64, 64);
        let desc = compute_descriptor(&img, (32.0, 32.0), 30.0, 3.0);
        assert!(desc.iter().all(|&v| (0.0..=255.0).contains(&v)));
        assert!(desc.iter().any(|&v| v > 0.0));
        let nrm: f32 = desc.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((nrm - 512.0).abs() < 20.0, "norm {}", nrm);
    }

    #[test]
    fn test_flat_patch_gives_zero_descriptor() {
        let img = Plane::from_vec(32, 32, vec![10.0; 32 * 32]);
        let desc = compute_descriptor(&img, (16.0, 16.0), 0.0, 2.0);
        assert!(desc.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_descriptor_is_deterministic() {
        let img = textured(48, 48);
        let a = compute_descriptor(&img, (20.3, 25.7), 123.0, 2.5);
        let b = compute_descriptor(&img, (20.3, 25.7), 123.0, 2.5);
        assert_eq!(a, b);
    }
}
