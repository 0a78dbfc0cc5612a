//! ORB feature extraction from camera frames.

use anyhow::Result;
use opencv::core::{KeyPoint, Mat, Ptr, Vector};
use opencv::features2d;
use opencv::prelude::*;

/// Default number of ORB features requested per frame.
pub const DEFAULT_N_FEATURES: i32 = 1000;

/// A set of ORB features extracted from one grayscale frame.
///
/// Keypoints and descriptor rows are paired index-for-index. A textureless
/// frame yields an empty set; that is a normal outcome, not an error.
#[derive(Clone)]
pub struct FeatureSet {
    pub keypoints: Vector<KeyPoint>,
    pub descriptors: Mat,
}

impl FeatureSet {
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

/// ORB detector wrapper producing a [`FeatureSet`] per frame.
pub struct FeatureExtractor {
    orb: Ptr<features2d::ORB>,
}

impl FeatureExtractor {
    /// Create an extractor. Scale factor 1.2 over 8 pyramid levels with a
    /// 31-pixel edge threshold.
    pub fn new(n_features: i32) -> Result<Self> {
        let orb = features2d::ORB::create(
            n_features,
            1.2,
            8,
            31,
            0,
            2,
            features2d::ORB_ScoreType::HARRIS_SCORE,
            31,
            20,
        )?;
        Ok(Self { orb })
    }

    /// Extract keypoints and descriptors from a grayscale frame.
    pub fn extract(&mut self, frame: &Mat) -> Result<FeatureSet> {
        let mut keypoints = Vector::<KeyPoint>::new();
        let mut descriptors = Mat::default();
        let mask = Mat::default();
        self.orb
            .detect_and_compute(frame, &mask, &mut keypoints, &mut descriptors, false)?;
        Ok(FeatureSet {
            keypoints,
            descriptors,
        })
    }
}
