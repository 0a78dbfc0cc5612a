//! Motion estimation from matched feature correspondences.

use nalgebra::{Point2, Vector3};
use opencv::core::{DMatch, KeyPoint, Vector};
use opencv::prelude::*;

use crate::geometry::recover_translation;

/// Minimum correspondences required for two-view pose recovery.
pub const MIN_CORRESPONDENCES: usize = 8;

/// Relative translation between two frames.
///
/// An invalid estimate always carries the zero vector, never NaN or stale
/// data, so it can be integrated without poisoning the track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionEstimate {
    /// Unit-norm translation direction (zero when invalid).
    pub translation: Vector3<f64>,
    pub valid: bool,
}

impl MotionEstimate {
    /// The zero/invalid estimate.
    pub fn invalid() -> Self {
        Self {
            translation: Vector3::zeros(),
            valid: false,
        }
    }
}

/// Estimate the relative translation from matched keypoints.
///
/// Requires at least [`MIN_CORRESPONDENCES`] matches; below that, or when
/// pose recovery is numerically degenerate, the invalid estimate is
/// returned. This function never fails and never produces non-finite
/// values.
pub fn estimate_motion(
    matches: &Vector<DMatch>,
    kp_prev: &Vector<KeyPoint>,
    kp_curr: &Vector<KeyPoint>,
) -> MotionEstimate {
    if matches.len() < MIN_CORRESPONDENCES {
        return MotionEstimate::invalid();
    }

    let mut pts1 = Vec::with_capacity(matches.len());
    let mut pts2 = Vec::with_capacity(matches.len());
    for m in matches {
        let kp1 = match kp_prev.get(m.query_idx as usize) {
            Ok(kp) => kp,
            Err(_) => return MotionEstimate::invalid(),
        };
        let kp2 = match kp_curr.get(m.train_idx as usize) {
            Ok(kp) => kp,
            Err(_) => return MotionEstimate::invalid(),
        };
        pts1.push(Point2::new(kp1.pt().x as f64, kp1.pt().y as f64));
        pts2.push(Point2::new(kp2.pt().x as f64, kp2.pt().y as f64));
    }

    match recover_translation(&pts1, &pts2) {
        Some(translation) if translation.iter().all(|v| v.is_finite()) => MotionEstimate {
            translation,
            valid: true,
        },
        _ => MotionEstimate::invalid(),
    }
}
