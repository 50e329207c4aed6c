//! RANSAC (Random Sample Consensus) for geometric verification
//!
//! Homographies are fitted with the normalised direct linear transform, from
//! four correspondences per hypothesis and from all inliers for the final
//! refit.

use crate::{FeatureError, Result};
use cv_core::{Ransac, RobustConfig, RobustModel, RobustResult};
use nalgebra::{DMatrix, Matrix3, Point2, Vector3};
use tracing::debug;

pub type RansacConfig = RobustConfig;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatchPair {
    pub src: Point2<f64>,
    pub dst: Point2<f64>,
}

pub struct HomographyEstimator;

impl RobustModel<MatchPair> for HomographyEstimator {
    type Model = Matrix3<f64>;

    fn min_sample_size(&self) -> usize {
        4
    }

    fn estimate(&self, data: &[&MatchPair]) -> Option<Self::Model> {
        if data.len() == 4 && has_collinear_triple(data) {
            return None;
        }
        normalized_dlt(data)
    }

    fn compute_error(&self, model: &Self::Model, data: &MatchPair) -> f64 {
        let p = model * Vector3::new(data.src.x, data.src.y, 1.0);
        if p[2].abs() > 1e-10 {
            let dx = p[0] / p[2] - data.dst.x;
            let dy = p[1] / p[2] - data.dst.y;
            (dx * dx + dy * dy).sqrt()
        } else {
            f64::INFINITY
        }
    }
}

fn has_collinear_triple(data: &[&MatchPair]) -> bool {
    let collinear = |a: Point2<f64>, b: Point2<f64>, c: Point2<f64>| {
        let cross = (b - a).perp(&(c - a));
        cross.abs() <= 1e-9 * ((b - a).norm() * (c - a).norm()).max(1e-12)
    };
    for i in 0..data.len() {
        for j in i + 1..data.len() {
            for k in j + 1..data.len() {
                if collinear(data[i].src, data[j].src, data[k].src)
                    || collinear(data[i].dst, data[j].dst, data[k].dst)
                {
                    return true;
                }
            }
        }
    }
    false
}

/// Similarity moving the centroid to the origin and the mean distance to sqrt(2).
fn normalization(points: impl Iterator<Item = Point2<f64>> + Clone) -> Option<Matrix3<f64>> {
    let n = points.clone().count() as f64;
    let (sx, sy) = points.clone().fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    let (cx, cy) = (sx / n, sy / n);
    let mean_dist = points
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    if !mean_dist.is_finite() || mean_dist < 1e-12 {
        return None;
    }
    let s = std::f64::consts::SQRT_2 / mean_dist;
    Some(Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0))
}

fn normalized_dlt(data: &[&MatchPair]) -> Option<Matrix3<f64>> {
    if data.len() < 4 {
        return None;
    }
    let t_src = normalization(data.iter().map(|m| m.src))?;
    let t_dst = normalization(data.iter().map(|m| m.dst))?;

    let mut a = vec![0.0f64; data.len() * 2 * 9];
    for (i, m) in data.iter().enumerate() {
        let s = t_src * Vector3::new(m.src.x, m.src.y, 1.0);
        let d = t_dst * Vector3::new(m.dst.x, m.dst.y, 1.0);
        let (x1, y1) = (s[0], s[1]);
        let (x2, y2) = (d[0], d[1]);
        let row1 = &mut a[i * 18..i * 18 + 9];
        row1.copy_from_slice(&[-x1, -y1, -1.0, 0.0, 0.0, 0.0, x2 * x1, x2 * y1, x2]);
        let row2 = &mut a[i * 18 + 9..i * 18 + 18];
        row2.copy_from_slice(&[0.0, 0.0, 0.0, -x1, -y1, -1.0, y2 * x1, y2 * y1, y2]);
    }

    let h_norm = solve_dlt_homography(&a, data.len() * 2)?;
    let h = t_dst.try_inverse()? * h_norm * t_src;

    let scale = if h[(2, 2)].abs() > 1e-12 {
        h[(2, 2)]
    } else {
        h.norm()
    };
    let h = h / scale;
    h.iter().all(|v| v.is_finite()).then_some(h)
}

/// Null vector of the DLT system via SVD.
fn solve_dlt_homography(a: &[f64], n_rows: usize) -> Option<Matrix3<f64>> {
    let mut matrix = DMatrix::from_row_slice(n_rows, 9, a);

    // Pad so the SVD yields all 9 right singular vectors.
    if n_rows < 9 {
        let mut padded = DMatrix::zeros(9, 9);
        padded.view_mut((0, 0), (n_rows, 9)).copy_from(&matrix);
        matrix = padded;
    }

    let svd = matrix.svd(false, true);
    let v_t = svd.v_t?;
    let h = v_t.row(v_t.nrows() - 1);

    Some(Matrix3::new(
        h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8],
    ))
}

/// Homography with its RANSAC consensus set.
#[derive(Debug, Clone)]
pub struct HomographyEstimate {
    /// Maps source points onto destination points.
    pub matrix: Matrix3<f64>,
    /// Inlier flag per input correspondence.
    pub inliers: Vec<bool>,
    pub num_inliers: usize,
    /// Mean inlier reprojection error in pixels.
    pub residual: f64,
    pub iterations: usize,
}

impl HomographyEstimate {
    fn from_result(result: RobustResult<Matrix3<f64>>) -> Option<Self> {
        Some(Self {
            matrix: result.model?,
            inliers: result.inliers,
            num_inliers: result.num_inliers,
            residual: result.residual,
            iterations: result.iterations,
        })
    }
}

/// Robustly fit `H` with `dst ~ H * src`.
pub fn find_homography(
    src: &[Point2<f64>],
    dst: &[Point2<f64>],
    config: &RansacConfig,
) -> Result<HomographyEstimate> {
    if src.len() != dst.len() {
        return Err(FeatureError::EstimationError(format!(
            "{} source points but {} destination points",
            src.len(),
            dst.len()
        )));
    }
    if src.len() < 4 {
        return Err(FeatureError::EstimationError(format!(
            "a homography needs at least 4 correspondences, got {}",
            src.len()
        )));
    }

    let data: Vec<MatchPair> = src
        .iter()
        .zip(dst)
        .map(|(&src, &dst)| MatchPair { src, dst })
        .collect();

    let result = Ransac::new(config.clone()).run(&HomographyEstimator, &data);
    debug!(
        correspondences = data.len(),
        inliers = result.num_inliers,
        iterations = result.iterations,
        residual = result.residual,
        "RANSAC homography"
    );

    HomographyEstimate::from_result(result).ok_or_else(|| {
        FeatureError::EstimationError("no homography consistent with the correspondences".into())
    })
}
