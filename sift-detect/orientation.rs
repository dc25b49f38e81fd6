use crate::types::Plane;

pub const ORI_HIST_BINS: usize = 36;
/// Gaussian weighting of the orientation window, relative to keypoint scale
pub const ORI_SIG_FCTR: f32 = 1.5;
pub const ORI_RADIUS: f32 = 3.0 * ORI_SIG_FCTR;
/// Secondary peaks above this fraction of the maximum spawn extra keypoints
pub const ORI_PEAK_RATIO: f32 = 0.8;

/// Gradient orientation histogram around `(cx, cy)`, smoothed, with its maximum.
pub fn orientation_histogram(
    img: &Plane,
    cx: isize,
    cy: isize,
    radius: isize,
    sigma: f32,
) -> ([f32; ORI_HIST_BINS], f32) {
    let n = ORI_HIST_BINS;
    let expf_scale = -1.0 / (2.0 * sigma * sigma);
    let mut raw = [0f32; ORI_HIST_BINS];
    let (w, h) = (img.width as isize, img.height as isize);

    for i in -radius..=radius {
        let y = cy + i;
        if y <= 0 || y >= h - 1 {
            continue;
        }
        for j in -radius..=radius {
            let x = cx + j;
            if x <= 0 || x >= w - 1 {
                continue;
            }
            let (xu, yu) = (x as usize, y as usize);
            let dx = img.at(xu + 1, yu) - img.at(xu - 1, yu);
            let dy = img.at(xu, yu - 1) - img.at(xu, yu + 1);
            let weight = (((i * i + j * j) as f32) * expf_scale).exp();
            let mag = (dx * dx + dy * dy).sqrt();
            let ori = dy.atan2(dx).to_degrees().rem_euclid(360.0);

            let mut bin = (ori * n as f32 / 360.0).round() as isize;
            if bin >= n as isize {
                bin -= n as isize;
            }
            if bin < 0 {
                bin += n as isize;
            }
            raw[bin as usize] += weight * mag;
        }
    }

    // circular [1 4 6 4 1] smoothing
    let mut hist = [0f32; ORI_HIST_BINS];
    for i in 0..n {
        let at = |k: isize| raw[(i as isize + k).rem_euclid(n as isize) as usize];
        hist[i] = (at(-2) + at(2)) * (1.0 / 16.0)
            + (at(-1) + at(1)) * (4.0 / 16.0)
            + at(0) * (6.0 / 16.0);
    }

    let max = hist.iter().cloned().fold(0.0, f32::max);
    (hist, max)
}

/// Keypoint angles (degrees) for every histogram peak above `ORI_PEAK_RATIO * max`,
/// interpolated with a parabola through the neighbouring bins
pub fn dominant_orientations(hist: &[f32; ORI_HIST_BINS], max: f32) -> Vec<f32> {
    let n = ORI_HIST_BINS;
    let threshold = max * ORI_PEAK_RATIO;
    let mut angles = Vec::new();

    for j in 0..n {
        let l = if j > 0 { j - 1 } else { n - 1 };
        let r = if j < n - 1 { j + 1 } else { 0 };
        if hist[j] > hist[l] && hist[j] > hist[r] && hist[j] >= threshold {
            let curvature = hist[l] - 2.0 * hist[j] + hist[r];
            let mut bin = j as f32 + 0.5 * (hist[l] - hist[r]) / curvature;
            if bin < 0.0 {
                bin += n as f32;
            } else if bin >= n as f32 {
                bin -= n as f32;
            }
            let mut angle = 360.0 - (360.0 / n as f32) * bin;
            if (angle - 360.0).abs() < f32::EPSILON {
                angle = 0.0;
            }
            angles.push(angle);
        }
    }
    angles
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Horizontal ramp: gradient points along +x everywhere
    fn ramp(width: usize, height: usize) -> Plane {
        let data = (0..width * height).map(|i| (i % width) as f32 * 4.0).collect();
        Plane::from_vec(width, height, data)
    }

    #[test]
    fn test_histogram_peaks_at_gradient_direction() {
        let img = ramp(31, 31);
        let (hist, max) = orientation_histogram(&img, 15, 15, 6, 3.0);
        assert!(max > 0.0);
        let peak = hist
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 0);
    }

    #[test]
    fn test_single_peak_orientation() {
        let mut hist = [0f32; ORI_HIST_BINS];
        hist[9] = 10.0;
        hist[8] = 5.0;
        hist[10] = 5.0;
        let angles = dominant_orientations(&hist, 10.0);
        assert_eq!(angles.len(), 1);
        assert!((angles[0] - (360.0 - 90.0)).abs() < 1e-4);
    }

    #[test]
    fn test_secondary_peak_spawns_second_orientation() {
        let mut hist = [0f32; ORI_HIST_BINS];
        hist[3] = 10.0;
        hist[20] = 9.0;
        let angles = dominant_orientations(&hist, 10.0);
        assert_eq!(angles.len(), 2);
    }

    #[test]
    fn test_flat_histogram_has_no_peak() {
        let hist = [1f32; ORI_HIST_BINS];
        assert!(dominant_orientations(&hist, 1.0).is_empty());
    }
}
