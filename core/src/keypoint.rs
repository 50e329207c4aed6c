use nalgebra::Point2;

/// A salient image location found by a detector.
///
/// `size` is the diameter of the meaningful neighbourhood in pixels of the
/// full-resolution image, `angle` is in degrees (`-1.0` when not computed).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyPoint {
    pub x: f64,
    pub y: f64,
    pub size: f64,
    pub angle: f64,
    pub response: f64,
    pub octave: i32,
}

impl KeyPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            size: 1.0,
            angle: -1.0,
            response: 0.0,
            octave: 0,
        }
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size = size;
        self
    }

    pub fn with_angle(mut self, angle: f64) -> Self {
        self.angle = angle;
        self
    }

    pub fn with_response(mut self, response: f64) -> Self {
        self.response = response;
        self
    }

    pub fn with_octave(mut self, octave: i32) -> Self {
        self.octave = octave;
        self
    }

    pub fn pt(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }

    pub fn has_angle(&self) -> bool {
        self.angle >= 0.0
    }
}

impl Default for KeyPoint {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct KeyPoints {
    pub keypoints: Vec<KeyPoint>,
}

impl KeyPoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            keypoints: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, kp: KeyPoint) {
        self.keypoints.push(kp);
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyPoint> {
        self.keypoints.iter()
    }

    pub fn as_slice(&self) -> &[KeyPoint] {
        &self.keypoints
    }
}

impl From<Vec<KeyPoint>> for KeyPoints {
    fn from(keypoints: Vec<KeyPoint>) -> Self {
        Self { keypoints }
    }
}

/// Correspondence between descriptor `query_idx` of the query set and
/// descriptor `train_idx` of the train set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureMatch {
    pub query_idx: usize,
    pub train_idx: usize,
    pub distance: f32,
}

impl FeatureMatch {
    pub fn new(query_idx: usize, train_idx: usize, distance: f32) -> Self {
        Self {
            query_idx,
            train_idx,
            distance,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Matches {
    pub matches: Vec<FeatureMatch>,
    /// Inlier flags set by geometric verification, parallel to `matches`.
    pub mask: Option<Vec<bool>>,
}

impl Matches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            matches: Vec::with_capacity(capacity),
            mask: None,
        }
    }

    pub fn push(&mut self, m: FeatureMatch) {
        self.matches.push(m);
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeatureMatch> {
        self.matches.iter()
    }

    pub fn num_inliers(&self) -> Option<usize> {
        self.mask
            .as_ref()
            .map(|mask| mask.iter().filter(|&&inlier| inlier).count())
    }

    /// Resolve the matches into point correspondences `(query pt, train pt)`.
    ///
    /// Returns `None` if any index is out of range for the given keypoint sets.
    pub fn point_pairs(
        &self,
        query: &[KeyPoint],
        train: &[KeyPoint],
    ) -> Option<(Vec<Point2<f64>>, Vec<Point2<f64>>)> {
        let mut src = Vec::with_capacity(self.len());
        let mut dst = Vec::with_capacity(self.len());
        for m in &self.matches {
            src.push(query.get(m.query_idx)?.pt());
            dst.push(train.get(m.train_idx)?.pt());
        }
        Some((src, dst))
    }
}

impl From<Vec<FeatureMatch>> for Matches {
    fn from(matches: Vec<FeatureMatch>) -> Self {
        Self {
            matches,
            mask: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keypoint_builders() {
        let kp = KeyPoint::new(3.0, 4.0)
            .with_size(12.0)
            .with_angle(90.0)
            .with_response(55.0)
            .with_octave(2);
        assert_eq!(kp.size, 12.0);
        assert!(kp.has_angle());
        assert_eq!(kp.octave, 2);
        assert_eq!(kp.pt(), Point2::new(3.0, 4.0));
        assert!(!KeyPoint::default().has_angle());
    }

    #[test]
    fn matches_point_pairs_resolve_indices() {
        let query = vec![KeyPoint::new(0.0, 0.0), KeyPoint::new(1.0, 2.0)];
        let train = vec![KeyPoint::new(10.0, 10.0), KeyPoint::new(11.0, 12.0)];
        let matches = Matches::from(vec![FeatureMatch::new(1, 0, 3.0)]);

        let (src, dst) = matches.point_pairs(&query, &train).unwrap();
        assert_eq!(src, vec![Point2::new(1.0, 2.0)]);
        assert_eq!(dst, vec![Point2::new(10.0, 10.0)]);
    }

    #[test]
    fn matches_point_pairs_rejects_bad_index() {
        let query = vec![KeyPoint::new(0.0, 0.0)];
        let matches = Matches::from(vec![FeatureMatch::new(0, 5, 1.0)]);
        assert!(matches.point_pairs(&query, &query).is_none());
    }

    #[test]
    fn num_inliers_counts_mask() {
        let mut matches = Matches::from(vec![
            FeatureMatch::new(0, 0, 10.0),
            FeatureMatch::new(1, 1, 80.0),
        ]);
        assert_eq!(matches.num_inliers(), None);
        matches.mask = Some(vec![true, false]);
        assert_eq!(matches.num_inliers(), Some(1));
    }
}
