//! Homography estimation via DLT with Hartley normalization, wrapped in an
//! adaptive RANSAC loop for outlier-robust fitting.

use crate::error::{GeometryError, GeometryResult};
use nalgebra::{DMatrix, Matrix3, SymmetricEigen, Vector3};
use rand::prelude::*;
use sift_core::{Correspondences, Point};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Minimal sample size for a homography
pub const MIN_CORRESPONDENCES: usize = 4;

/// Planar projective transform mapping source points onto target points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography(Matrix3<f64>);

impl Homography {
    pub fn new(m: Matrix3<f64>) -> Self {
        Self(m)
    }

    pub fn identity() -> Self {
        Self(Matrix3::identity())
    }

    pub fn from_rows(rows: [[f64; 3]; 3]) -> Self {
        Self(Matrix3::from_fn(|r, c| rows[r][c]))
    }

    pub fn rows(&self) -> [[f64; 3]; 3] {
        let m = &self.0;
        [
            [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
            [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
            [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
        ]
    }

    /// Entry at `(row, col)`
    #[inline]
    pub fn at(&self, row: usize, col: usize) -> f64 {
        self.0[(row, col)]
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.0
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }

    /// H * [x, y, 1]^T → [u, v]; NaN when the point maps to infinity
    pub fn project(&self, x: f64, y: f64) -> [f64; 2] {
        let p = self.0 * Vector3::new(x, y, 1.0);
        if p[2].abs() < 1e-15 {
            return [f64::NAN, f64::NAN];
        }
        [p[0] / p[2], p[1] / p[2]]
    }

    /// ||project(src) - dst||
    pub fn reprojection_error(&self, src: Point, dst: Point) -> f64 {
        let p = self.project(src.x as f64, src.y as f64);
        let dx = p[0] - dst.x as f64;
        let dy = p[1] - dst.y as f64;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Robust fitting parameters
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RansacConfig {
    /// Maximum reprojection error in pixels for a correspondence to count as inlier
    pub inlier_threshold: f64,
    /// Probability that at least one all-inlier sample is drawn
    pub confidence: f64,
    pub max_iterations: usize,
    pub seed: u64,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self { inlier_threshold: 3.0, confidence: 0.995, max_iterations: 2000, seed: 0 }
    }
}

/// Result of robust homography fitting
#[derive(Debug, Clone)]
pub struct HomographyFit {
    pub homography: Homography,
    /// `true` for inliers of the final model, aligned with the input
    pub inlier_mask: Vec<bool>,
    pub inliers: usize,
    /// Hypotheses evaluated
    pub iterations: usize,
}

/// Translate the centroid to the origin and scale the mean distance to sqrt(2)
fn normalize_points(pts: &[[f64; 2]]) -> (Matrix3<f64>, Vec<[f64; 2]>) {
    let n = pts.len() as f64;
    let cx: f64 = pts.iter().map(|p| p[0]).sum::<f64>() / n;
    let cy: f64 = pts.iter().map(|p| p[1]).sum::<f64>() / n;

    let mean_dist: f64 =
        pts.iter().map(|p| ((p[0] - cx).powi(2) + (p[1] - cy).powi(2)).sqrt()).sum::<f64>() / n;
    let s = if mean_dist > 1e-15 { std::f64::consts::SQRT_2 / mean_dist } else { 1.0 };

    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let normalized = pts.iter().map(|p| [s * (p[0] - cx), s * (p[1] - cy)]).collect();
    (t, normalized)
}

fn to_f64(points: &[Point]) -> Vec<[f64; 2]> {
    points.iter().map(|p| [p.x as f64, p.y as f64]).collect()
}

/// Least-squares homography through all correspondences.
///
/// Solves the normalized DLT system via the eigenvector of the smallest
/// eigenvalue of `AᵀA`; the result is scaled so `H[2][2] = 1` when possible.
pub fn estimate_homography_dlt(correspondences: &Correspondences) -> GeometryResult<Homography> {
    dlt(&to_f64(correspondences.src()), &to_f64(correspondences.dst()))
}

fn dlt(src: &[[f64; 2]], dst: &[[f64; 2]]) -> GeometryResult<Homography> {
    let n = src.len();
    if n < MIN_CORRESPONDENCES {
        let needed = MIN_CORRESPONDENCES;
        return Err(GeometryError::InsufficientCorrespondence { needed, got: n });
    }

    let (t_src, src_n) = normalize_points(src);
    let (t_dst, dst_n) = normalize_points(dst);

    let mut a = DMatrix::zeros(2 * n, 9);
    for i in 0..n {
        let (sx, sy) = (src_n[i][0], src_n[i][1]);
        let (dx, dy) = (dst_n[i][0], dst_n[i][1]);

        a[(2 * i, 3)] = -sx;
        a[(2 * i, 4)] = -sy;
        a[(2 * i, 5)] = -1.0;
        a[(2 * i, 6)] = dy * sx;
        a[(2 * i, 7)] = dy * sy;
        a[(2 * i, 8)] = dy;

        a[(2 * i + 1, 0)] = sx;
        a[(2 * i + 1, 1)] = sy;
        a[(2 * i + 1, 2)] = 1.0;
        a[(2 * i + 1, 6)] = -dx * sx;
        a[(2 * i + 1, 7)] = -dx * sy;
        a[(2 * i + 1, 8)] = -dx;
    }

    let eig = SymmetricEigen::new(a.transpose() * &a);
    let min_idx = eig
        .eigenvalues
        .iter()
        .enumerate()
        .min_by(|x, y| x.1.abs().total_cmp(&y.1.abs()))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let h_norm = Matrix3::from_fn(|r, c| eig.eigenvectors[(r * 3 + c, min_idx)]);

    let t_dst_inv = t_dst
        .try_inverse()
        .ok_or_else(|| {
            GeometryError::DegenerateGeometry("target normalization not invertible".into())
        })?;
    let h = t_dst_inv * h_norm * t_src;

    let scale = h[(2, 2)];
    let h = if scale.abs() < 1e-15 { h } else { h / scale };
    let h = Homography(h);
    if !h.is_finite() {
        return Err(GeometryError::DegenerateGeometry("non-finite homography".into()));
    }
    Ok(h)
}

/// Any three of the sample points (nearly) on one line
fn has_collinear_triple(pts: &[[f64; 2]; 4]) -> bool {
    const TRIPLES: [(usize, usize, usize); 4] = [(0, 1, 2), (0, 1, 3), (0, 2, 3), (1, 2, 3)];
    TRIPLES.iter().any(|&(i, j, k)| {
        let (dx1, dy1) = (pts[j][0] - pts[i][0], pts[j][1] - pts[i][1]);
        let (dx2, dy2) = (pts[k][0] - pts[i][0], pts[k][1] - pts[i][1]);
        let scale = dx1.abs() + dy1.abs() + dx2.abs() + dy2.abs();
        (dx2 * dy1 - dy2 * dx1).abs() <= f32::EPSILON as f64 * scale
    })
}

/// Iterations needed to draw one all-inlier sample with probability `confidence`
fn update_iterations(confidence: f64, outlier_ratio: f64, max_iterations: usize) -> usize {
    let ep = outlier_ratio.clamp(0.0, 1.0);
    let num = (1.0 - confidence).max(f64::MIN_POSITIVE).ln();
    let denom = 1.0 - (1.0 - ep).powi(MIN_CORRESPONDENCES as i32);
    if denom < f64::MIN_POSITIVE {
        return 0;
    }
    let denom = denom.ln();
    if denom >= 0.0 || -num >= max_iterations as f64 * -denom {
        return max_iterations;
    }
    (num / denom).round() as usize
}

fn count_inliers(
    h: &Homography,
    src: &[[f64; 2]],
    dst: &[[f64; 2]],
    threshold: f64,
) -> (usize, Vec<bool>) {
    let mask: Vec<bool> = src
        .iter()
        .zip(dst)
        .map(|(s, d)| {
            let p = h.project(s[0], s[1]);
            let err = ((p[0] - d[0]).powi(2) + (p[1] - d[1]).powi(2)).sqrt();
            err < threshold
        })
        .collect();
    (mask.iter().filter(|&&m| m).count(), mask)
}

/// Fit a homography robustly.
///
/// Samples four distinct correspondences at a time, skips collinear
/// samples, keeps the hypothesis with the largest inlier support and
/// refits on its inliers. The random generator is seeded from `config`.
pub fn fit_homography_ransac(
    correspondences: &Correspondences,
    config: &RansacConfig,
) -> GeometryResult<HomographyFit> {
    let n = correspondences.len();
    if n < MIN_CORRESPONDENCES {
        let needed = MIN_CORRESPONDENCES;
        return Err(GeometryError::InsufficientCorrespondence { needed, got: n });
    }
    let src = to_f64(correspondences.src());
    let dst = to_f64(correspondences.dst());

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut best: Option<(Homography, usize)> = None;
    let mut max_iterations = config.max_iterations;
    let mut iterations = 0usize;

    const MAX_SAMPLE_ATTEMPTS: usize = 1000;

    while iterations < max_iterations {
        let mut sample = None;
        for _ in 0..MAX_SAMPLE_ATTEMPTS {
            let idx = rand::seq::index::sample(&mut rng, n, MIN_CORRESPONDENCES);
            let s4 = [src[idx.index(0)], src[idx.index(1)], src[idx.index(2)], src[idx.index(3)]];
            let d4 = [dst[idx.index(0)], dst[idx.index(1)], dst[idx.index(2)], dst[idx.index(3)]];
            if !has_collinear_triple(&s4) && !has_collinear_triple(&d4) {
                sample = Some((s4, d4));
                break;
            }
        }
        let Some((s4, d4)) = sample else {
            break;
        };
        iterations += 1;

        let h = match dlt(&s4, &d4) {
            Ok(h) => h,
            Err(_) => continue,
        };
        let (count, _) = count_inliers(&h, &src, &dst, config.inlier_threshold);
        if best.as_ref().map_or(true, |(_, c)| count > *c) {
            best = Some((h, count));
            let outlier_ratio = (n - count) as f64 / n as f64;
            max_iterations = update_iterations(config.confidence, outlier_ratio, max_iterations);
        }
    }

    let Some((best_h, best_count)) = best else {
        return Err(GeometryError::DegenerateGeometry("no non-degenerate sample found".into()));
    };

    let (_, mask) = count_inliers(&best_h, &src, &dst, config.inlier_threshold);
    let keep = |pts: &[[f64; 2]]| -> Vec<[f64; 2]> {
        pts.iter().zip(&mask).filter(|&(_, &m)| m).map(|(p, _)| *p).collect()
    };
    let inlier_src = keep(&src);
    let inlier_dst = keep(&dst);

    let refit = dlt(&inlier_src, &inlier_dst).unwrap_or(best_h);
    let (refit_count, refit_mask) = count_inliers(&refit, &src, &dst, config.inlier_threshold);
    let (homography, inlier_mask, inliers) = if refit_count >= best_count {
        (refit, refit_mask, refit_count)
    } else {
        (best_h, mask, best_count)
    };

    log::debug!(
        "ransac: {} correspondences, {} inliers after {} iterations",
        n,
        inliers,
        iterations
    );
    Ok(HomographyFit { homography, inlier_mask, inliers, iterations })
}
