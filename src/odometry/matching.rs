//! Temporal feature matching between consecutive frames.

use anyhow::Result;
use opencv::core::{DMatch, Mat, Vector};
use opencv::features2d::BFMatcher;
use opencv::prelude::*;

use super::features::FeatureSet;

/// Brute-force Hamming matcher with cross-check enabled, so each query
/// descriptor participates in at most one correspondence.
pub struct TemporalMatcher {
    matcher: BFMatcher,
}

impl TemporalMatcher {
    pub fn new() -> Result<Self> {
        let matcher = BFMatcher::new(opencv::core::NORM_HAMMING, true)?;
        Ok(Self { matcher })
    }

    /// Match `prev` descriptors (query) against `curr` descriptors (train).
    ///
    /// Matches are returned best-first (ascending descriptor distance).
    /// Fails closed: an empty set on either side yields no matches rather
    /// than an error.
    pub fn match_features(
        &self,
        prev: &FeatureSet,
        curr: &FeatureSet,
    ) -> Result<Vector<DMatch>> {
        if prev.is_empty() || curr.is_empty() {
            return Ok(Vector::new());
        }

        let mut matches = Vector::<DMatch>::new();
        self.matcher.train_match(
            &prev.descriptors,
            &curr.descriptors,
            &mut matches,
            &Mat::default(),
        )?;

        let mut sorted: Vec<DMatch> = matches.to_vec();
        sorted.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(Vector::from_iter(sorted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::KeyPoint;

    fn feature_set(descriptors: &[[u8; 32]]) -> FeatureSet {
        let mut keypoints = Vector::<KeyPoint>::new();
        for i in 0..descriptors.len() {
            keypoints.push(
                KeyPoint::new_coords(i as f32, i as f32, 7.0, -1.0, 0.0, 0, -1).unwrap(),
            );
        }
        let descriptors = if descriptors.is_empty() {
            Mat::default()
        } else {
            Mat::from_slice_2d(descriptors).unwrap()
        };
        FeatureSet {
            keypoints,
            descriptors,
        }
    }

    #[test]
    fn test_empty_inputs_fail_closed() {
        let matcher = TemporalMatcher::new().unwrap();
        let empty = feature_set(&[]);
        let full = feature_set(&[[0xAA; 32], [0x55; 32]]);

        assert!(matcher.match_features(&empty, &full).unwrap().is_empty());
        assert!(matcher.match_features(&full, &empty).unwrap().is_empty());
        assert!(matcher.match_features(&empty, &empty).unwrap().is_empty());
    }

    #[test]
    fn test_matches_sorted_ascending_by_distance() {
        let matcher = TemporalMatcher::new().unwrap();

        // Identical banks: each descriptor's best match is itself at
        // distance 0, except the perturbed rows which pick up some bits.
        let mut bank = [[0u8; 32]; 4];
        bank[1] = [0xFF; 32];
        bank[2] = [0x0F; 32];
        bank[3] = [0xF0; 32];

        let mut noisy = bank;
        noisy[2][0] ^= 0b0000_0011; // 2 bits away from its counterpart

        let prev = feature_set(&bank);
        let curr = feature_set(&noisy);
        let matches = matcher.match_features(&prev, &curr).unwrap();

        assert!(!matches.is_empty());
        let distances: Vec<f32> = matches.iter().map(|m| m.distance).collect();
        for pair in distances.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
    }

    #[test]
    fn test_cross_check_is_one_to_one() {
        let matcher = TemporalMatcher::new().unwrap();
        let bank = [[0x00u8; 32], [0xFF; 32], [0x0F; 32]];
        let prev = feature_set(&bank);
        let curr = feature_set(&bank);
        let matches = matcher.match_features(&prev, &curr).unwrap();

        let mut train_seen = std::collections::HashSet::new();
        for m in matches {
            assert!(train_seen.insert(m.train_idx), "duplicate train index");
        }
    }
}
