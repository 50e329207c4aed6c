//! Robust Estimation Module
//!
//! Generic RANSAC used for any model that can be fitted from a minimal sample
//! and scored per datum.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;

/// Configuration for robust estimation
#[derive(Debug, Clone)]
pub struct RobustConfig {
    /// Maximum residual for a datum to count as an inlier.
    pub threshold: f64,
    /// Hard upper bound on hypotheses tried.
    pub max_iterations: usize,
    /// Desired probability of drawing at least one all-inlier sample.
    pub confidence: f64,
    /// Fixed RNG seed; `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for RobustConfig {
    fn default() -> Self {
        Self {
            threshold: 1.0,
            max_iterations: 1000,
            confidence: 0.99,
            seed: None,
        }
    }
}

impl RobustConfig {
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Result of robust estimation
#[derive(Debug, Clone)]
pub struct RobustResult<M> {
    pub model: Option<M>,
    pub inliers: Vec<bool>,
    pub num_inliers: usize,
    /// Mean inlier residual.
    pub residual: f64,
    pub iterations: usize,
}

impl<M> RobustResult<M> {
    fn empty(n: usize) -> Self {
        Self {
            model: None,
            inliers: vec![false; n],
            num_inliers: 0,
            residual: f64::INFINITY,
            iterations: 0,
        }
    }
}

/// Trait for models that can be estimated robustly
pub trait RobustModel<D> {
    type Model: Clone;

    /// Minimum number of data points required to estimate the model
    fn min_sample_size(&self) -> usize;

    /// Estimate model from a minimal sample
    fn estimate(&self, data: &[&D]) -> Option<Self::Model>;

    /// Compute error for a single data point against the model
    fn compute_error(&self, model: &Self::Model, data: &D) -> f64;

    /// Re-estimate from a full inlier set. Defaults to `estimate`.
    fn refine(&self, data: &[&D]) -> Option<Self::Model> {
        self.estimate(data)
    }
}

/// Generic RANSAC engine
pub struct Ransac {
    config: RobustConfig,
}

impl Ransac {
    pub fn new(config: RobustConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RobustConfig {
        &self.config
    }

    pub fn run<D, M: RobustModel<D>>(&self, estimator: &M, data: &[D]) -> RobustResult<M::Model> {
        let n = data.len();
        let k = estimator.min_sample_size();

        if n < k || k == 0 {
            return RobustResult::empty(n);
        }

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut best = RobustResult::empty(n);
        let mut required = self.config.max_iterations;
        let mut iteration = 0;

        while iteration < required.min(self.config.max_iterations) {
            iteration += 1;

            let sample: Vec<&D> = index::sample(&mut rng, n, k)
                .into_iter()
                .map(|i| &data[i])
                .collect();

            let Some(model) = estimator.estimate(&sample) else {
                continue;
            };

            let (inliers, num_inliers, residual) =
                score(estimator, &model, data, self.config.threshold);

            if num_inliers > best.num_inliers
                || (num_inliers == best.num_inliers && num_inliers > 0 && residual < best.residual)
            {
                best = RobustResult {
                    model: Some(model),
                    inliers,
                    num_inliers,
                    residual,
                    iterations: iteration,
                };
                required = adaptive_iterations(num_inliers, n, k, self.config.confidence)
                    .max(iteration);
            }
        }

        best.iterations = iteration;

        if best.num_inliers >= k {
            let inlier_data: Vec<&D> = data
                .iter()
                .zip(&best.inliers)
                .filter_map(|(d, &inlier)| inlier.then_some(d))
                .collect();

            if let Some(refined) = estimator.refine(&inlier_data) {
                let (inliers, num_inliers, residual) =
                    score(estimator, &refined, data, self.config.threshold);
                if num_inliers >= best.num_inliers {
                    best.model = Some(refined);
                    best.inliers = inliers;
                    best.num_inliers = num_inliers;
                    best.residual = residual;
                }
            }
        }

        best
    }
}

fn score<D, M: RobustModel<D>>(
    estimator: &M,
    model: &M::Model,
    data: &[D],
    threshold: f64,
) -> (Vec<bool>, usize, f64) {
    let mut inliers = vec![false; data.len()];
    let mut num_inliers = 0;
    let mut total_error = 0.0;

    for (j, d) in data.iter().enumerate() {
        let err = estimator.compute_error(model, d);
        if err < threshold {
            inliers[j] = true;
            num_inliers += 1;
            total_error += err;
        }
    }

    let residual = if num_inliers > 0 {
        total_error / num_inliers as f64
    } else {
        f64::INFINITY
    };
    (inliers, num_inliers, residual)
}

/// Iterations needed to hit `confidence` given the current inlier ratio.
fn adaptive_iterations(num_inliers: usize, n: usize, k: usize, confidence: f64) -> usize {
    let w = num_inliers as f64 / n as f64;
    let p_good = w.powi(k as i32);
    if p_good >= 1.0 {
        return 1;
    }
    if p_good <= f64::EPSILON {
        return usize::MAX;
    }
    let num = (1.0 - confidence.clamp(0.0, 1.0 - 1e-12)).ln();
    let den = (1.0 - p_good).ln();
    (num / den).ceil().max(1.0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fits y = a * x + b through two points.
    struct LineModel;

    impl RobustModel<(f64, f64)> for LineModel {
        type Model = (f64, f64);

        fn min_sample_size(&self) -> usize {
            2
        }

        fn estimate(&self, data: &[&(f64, f64)]) -> Option<Self::Model> {
            let (x0, y0) = *data[0];
            let (x1, y1) = *data[1];
            if (x1 - x0).abs() < 1e-12 {
                return None;
            }
            let a = (y1 - y0) / (x1 - x0);
            Some((a, y0 - a * x0))
        }

        fn compute_error(&self, model: &Self::Model, data: &(f64, f64)) -> f64 {
            (model.0 * data.0 + model.1 - data.1).abs()
        }
    }

    fn line_with_outliers() -> Vec<(f64, f64)> {
        let mut data: Vec<(f64, f64)> = (0..40).map(|i| (i as f64, 2.0 * i as f64 + 1.0)).collect();
        data.extend([(3.0, 90.0), (7.0, -40.0), (15.0, 5.0), (22.0, 300.0)]);
        data
    }

    #[test]
    fn ransac_recovers_line_and_rejects_outliers() {
        let data = line_with_outliers();
        let ransac = Ransac::new(RobustConfig::default().with_threshold(0.5).with_seed(7));
        let result = ransac.run(&LineModel, &data);

        let (a, b) = result.model.expect("model");
        assert!((a - 2.0).abs() < 1e-9);
        assert!((b - 1.0).abs() < 1e-9);
        assert_eq!(result.num_inliers, 40);
        assert!(result.inliers[..40].iter().all(|&v| v));
        assert!(result.inliers[40..].iter().all(|&v| !v));
    }

    #[test]
    fn ransac_is_reproducible_with_seed() {
        let data = line_with_outliers();
        let config = RobustConfig::default().with_threshold(0.5).with_seed(42);
        let a = Ransac::new(config.clone()).run(&LineModel, &data);
        let b = Ransac::new(config).run(&LineModel, &data);
        assert_eq!(a.inliers, b.inliers);
        assert_eq!(a.iterations, b.iterations);
    }

    #[test]
    fn ransac_with_too_few_points_returns_no_model() {
        let data = vec![(1.0, 1.0)];
        let result = Ransac::new(RobustConfig::default()).run(&LineModel, &data);
        assert!(result.model.is_none());
        assert_eq!(result.inliers, vec![false]);
    }

    #[test]
    fn adaptive_iterations_shrink_with_inlier_ratio() {
        let low = adaptive_iterations(10, 100, 4, 0.99);
        let high = adaptive_iterations(90, 100, 4, 0.99);
        assert!(high < low);
        assert_eq!(adaptive_iterations(100, 100, 4, 0.99), 1);
    }
}
