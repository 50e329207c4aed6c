pub use cv_core::{hamming_distance, Descriptor, Descriptors};

use cv_core::KeyPoints;
use image::GrayImage;

pub trait FeatureDetector {
    fn detect(&self, image: &GrayImage) -> KeyPoints;
}

/// Computes one descriptor per usable keypoint.
///
/// Keypoints the extractor cannot describe (for example too close to the
/// border) are dropped, so the returned set carries its own keypoints.
pub trait DescriptorExtractor {
    fn extract(&self, image: &GrayImage, keypoints: &KeyPoints) -> Descriptors;
}

/// Detect then describe, returning keypoints index-aligned with descriptors.
pub fn detect_and_compute<T>(algorithm: &T, image: &GrayImage) -> (KeyPoints, Descriptors)
where
    T: FeatureDetector + DescriptorExtractor,
{
    let detected = algorithm.detect(image);
    let descriptors = algorithm.extract(image, &detected);
    (KeyPoints::from(descriptors.keypoints()), descriptors)
}
