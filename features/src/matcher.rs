use crate::descriptor::Descriptors;
use crate::flann::FlannMatcher;
use crate::Result;
use cv_core::{FeatureMatch, Matches};
use rayon::prelude::*;

/// Exhaustive Hamming knn, the exact reference for [`FlannMatcher`].
pub fn knn_match(query: &Descriptors, train: &Descriptors, k: usize) -> Vec<Vec<FeatureMatch>> {
    query
        .descriptors
        .par_iter()
        .enumerate()
        .map(|(query_idx, q_desc)| {
            let mut distances: Vec<(usize, u32)> = train
                .iter()
                .enumerate()
                .map(|(idx, t_desc)| (idx, q_desc.hamming_distance(t_desc)))
                .collect();

            distances.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)));

            distances
                .into_iter()
                .take(k)
                .map(|(train_idx, distance)| {
                    FeatureMatch::new(query_idx, train_idx, distance as f32)
                })
                .collect()
        })
        .collect()
}

/// Lowe's ratio test: keep the nearest neighbour when it is strictly closer
/// than `ratio` times the second nearest. Lists with fewer than two
/// neighbours carry no evidence either way and are dropped.
pub fn filter_matches_by_ratio_test(matches: &[Vec<FeatureMatch>], ratio: f32) -> Vec<FeatureMatch> {
    let mut good_matches = Vec::new();

    for knn in matches {
        if let [best, second, ..] = knn.as_slice() {
            if best.distance < ratio * second.distance {
                good_matches.push(*best);
            }
        }
    }

    good_matches
}

/// Two-nearest-neighbour LSH matching followed by the ratio test.
pub fn ratio_test_matches(
    matcher: &FlannMatcher,
    query: &Descriptors,
    train: &Descriptors,
    ratio: f32,
) -> Result<Matches> {
    let knn = matcher.knn_match(query, train, 2)?;
    Ok(Matches::from(filter_matches_by_ratio_test(&knn, ratio)))
}
