use cv_core::RobustConfig;
use cv_features::{BriskParams, LshParams};
use image::Rgb;

/// Parameters of the colorization pipeline.
#[derive(Debug, Clone)]
pub struct ColorizeConfig {
    pub brisk: BriskParams,
    pub lsh: LshParams,
    /// Lowe ratio; a match is kept when best < ratio * second best.
    pub ratio: f32,
    /// Colorize only when strictly more matches than this survive.
    pub min_matches: usize,
    pub ransac: RobustConfig,
    /// Gray level for ACI pixels with no WATSON preimage.
    pub background: u8,
    pub keypoint_color: Rgb<u8>,
}

impl Default for ColorizeConfig {
    fn default() -> Self {
        Self {
            brisk: BriskParams::default(),
            lsh: LshParams::default(),
            ratio: 0.75,
            min_matches: 30,
            ransac: RobustConfig::default()
                .with_threshold(5.0)
                .with_max_iterations(2000)
                .with_confidence(0.995),
            background: 0,
            keypoint_color: Rgb([0, 255, 255]),
        }
    }
}

impl ColorizeConfig {
    pub fn with_brisk(mut self, brisk: BriskParams) -> Self {
        self.brisk = brisk;
        self
    }

    pub fn with_lsh(mut self, lsh: LshParams) -> Self {
        self.lsh = lsh;
        self
    }

    pub fn with_ratio(mut self, ratio: f32) -> Self {
        self.ratio = ratio;
        self
    }

    pub fn with_min_matches(mut self, min_matches: usize) -> Self {
        self.min_matches = min_matches;
        self
    }

    pub fn with_ransac(mut self, ransac: RobustConfig) -> Self {
        self.ransac = ransac;
        self
    }

    pub fn with_background(mut self, background: u8) -> Self {
        self.background = background;
        self
    }

    pub fn with_keypoint_color(mut self, color: Rgb<u8>) -> Self {
        self.keypoint_color = color;
        self
    }

    /// Fix both the LSH bit selection and the RANSAC sampling.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.lsh.seed = seed;
        self.ransac.seed = Some(seed);
        self
    }
}
