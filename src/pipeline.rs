//! Feature-based registration of a WATSON colour frame onto an ACI frame and
//! transfer of its hue and saturation.

use crate::{ColorizeConfig, ColorizeError, Presenter, Result};
use cv_core::Matches;
use cv_features::{
    find_homography, ratio_test_matches, Brisk, FeatureError, FlannMatcher, HomographyEstimate,
    RansacConfig,
};
use cv_imgproc::{
    convert_gray_to_rgb, draw_keypoints, hsv_to_rgb, replace_value, rgb_to_hsv, to_gray,
    warp_perspective_rgb,
};
use image::{DynamicImage, GrayImage, RgbImage};
use nalgebra::{Matrix3, Point2};
use tracing::{debug, info, warn};

/// Smallest |det H| accepted for a normalised homography.
const MIN_DETERMINANT: f64 = 1e-8;

/// Outcome of [`colorize`].
#[derive(Debug, Clone)]
pub enum Colorization {
    /// The ACI gray levels carrying the registered WATSON hue and saturation.
    Colorized {
        image: RgbImage,
        /// Maps WATSON pixel coordinates to ACI pixel coordinates.
        homography: Matrix3<f64>,
        /// Ratio-test matches, with the RANSAC inlier mask set.
        matches: Matches,
        inliers: usize,
    },
    /// Too few matches to register; the grayscale ACI is passed through.
    InsufficientMatches {
        grayscale: GrayImage,
        matches: Matches,
    },
}

impl Colorization {
    pub fn matches(&self) -> &Matches {
        match self {
            Self::Colorized { matches, .. } | Self::InsufficientMatches { matches, .. } => matches,
        }
    }

    /// Number of matches that passed the ratio test.
    pub fn match_count(&self) -> usize {
        self.matches().len()
    }

    pub fn is_colorized(&self) -> bool {
        matches!(self, Self::Colorized { .. })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Colorized { image, .. } => image.dimensions(),
            Self::InsufficientMatches { grayscale, .. } => grayscale.dimensions(),
        }
    }

    /// Result as RGB, replicating the gray plane for pass-through results.
    pub fn to_rgb(&self) -> RgbImage {
        match self {
            Self::Colorized { image, .. } => image.clone(),
            Self::InsufficientMatches { grayscale, .. } => convert_gray_to_rgb(grayscale),
        }
    }
}

/// Reason a fitted transform is unusable for warping, if any.
fn check_homography(estimate: &HomographyEstimate) -> std::result::Result<(), String> {
    let h = &estimate.matrix;
    if h.iter().any(|v| !v.is_finite()) {
        return Err("non-finite entries".into());
    }
    let det = h.determinant();
    if det.abs() < MIN_DETERMINANT {
        return Err(format!("near-singular transform (det = {det:e})"));
    }
    if estimate.num_inliers < 4 {
        return Err(format!("only {} inliers", estimate.num_inliers));
    }
    Ok(())
}

/// RANSAC homography from WATSON points `src` onto ACI points `dst`.
///
/// Failures carry the number of accepted matches they were fitted from.
fn register(
    src: &[Point2<f64>],
    dst: &[Point2<f64>],
    config: &RansacConfig,
) -> Result<HomographyEstimate> {
    let matches = src.len();
    let estimate = find_homography(src, dst, config)
        .map_err(|source| ColorizeError::Registration { matches, source })?;
    check_homography(&estimate)
        .map_err(|reason| ColorizeError::DegenerateHomography { matches, reason })?;
    Ok(estimate)
}

/// Colorize `aci` with the colours of `watson`.
///
/// Both images are reduced to gray, BRISK features are matched through the
/// LSH index and filtered by the ratio test. With more than
/// `config.min_matches` survivors the WATSON frame is warped into the ACI
/// frame through a RANSAC homography, and its HSV value plane is replaced
/// by the ACI gray levels. Keypoint overlays are handed to `presenter` as
/// `"watson"` then `"aci"`.
pub fn colorize<P: Presenter + ?Sized>(
    watson: &DynamicImage,
    aci: &DynamicImage,
    config: &ColorizeConfig,
    presenter: &mut P,
) -> Result<Colorization> {
    let watson_rgb = watson.to_rgb8();
    let watson_gray = to_gray(watson);
    let aci_gray = to_gray(aci);
    debug!(
        watson = ?watson_gray.dimensions(),
        aci = ?aci_gray.dimensions(),
        "converted inputs to gray"
    );

    let brisk = Brisk::new(config.brisk);
    let (watson_kps, watson_desc) = brisk.detect_and_compute(&watson_gray);
    let (aci_kps, aci_desc) = brisk.detect_and_compute(&aci_gray);
    info!(
        watson = watson_kps.len(),
        aci = aci_kps.len(),
        "detected keypoints"
    );

    let color = config.keypoint_color;
    presenter.present("watson", &draw_keypoints(&watson_gray, watson_kps.as_slice(), color))?;
    presenter.present("aci", &draw_keypoints(&aci_gray, aci_kps.as_slice(), color))?;

    let matcher = FlannMatcher::new(config.lsh);
    let mut matches = ratio_test_matches(&matcher, &watson_desc, &aci_desc, config.ratio)?;
    info!(count = matches.len(), ratio = config.ratio, "matches after ratio test");

    if matches.len() <= config.min_matches {
        warn!(
            count = matches.len(),
            required = config.min_matches + 1,
            "not enough matches, passing the grayscale ACI through"
        );
        return Ok(Colorization::InsufficientMatches {
            grayscale: aci_gray,
            matches,
        });
    }

    let (src, dst) = matches
        .point_pairs(watson_kps.as_slice(), aci_kps.as_slice())
        .ok_or_else(|| ColorizeError::Registration {
            matches: matches.len(),
            source: FeatureError::MatchingError("match index out of range".into()),
        })?;
    let estimate = register(&src, &dst, &config.ransac)?;
    info!(
        inliers = estimate.num_inliers,
        residual = estimate.residual,
        "estimated WATSON to ACI homography"
    );

    let (width, height) = aci_gray.dimensions();
    let warped = warp_perspective_rgb(
        &watson_rgb,
        &estimate.matrix,
        width,
        height,
        config.background,
    )?;

    let mut hsv = rgb_to_hsv(&warped);
    replace_value(&mut hsv, &aci_gray)?;
    let image = hsv_to_rgb(&hsv);

    let inliers = estimate.num_inliers;
    matches.mask = Some(estimate.inliers);
    Ok(Colorization::Colorized {
        image,
        homography: estimate.matrix,
        matches,
        inliers,
    })
}
