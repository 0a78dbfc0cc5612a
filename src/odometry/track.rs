//! Per-vehicle odometry track state machine.
//!
//! A track turns a stream of camera frames into an integrated position and
//! instantaneous velocity estimate. The estimate is drift-prone by design:
//! there is no loop closure and no absolute correction.

use anyhow::Result;
use nalgebra::Vector3;
use opencv::core::Mat;
use tracing::{debug, warn};

use crate::swarm::state::VehicleId;

use super::features::{FeatureExtractor, FeatureSet};
use super::matching::TemporalMatcher;
use super::motion::{estimate_motion, MotionEstimate};

/// State of an odometry track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    /// No previous frame yet; the first frame only seeds the tracker.
    Uninitialized,
    /// Normal operation: every frame is matched against the previous one.
    Tracking,
}

/// Published per-vehicle odometry estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OdometryState {
    /// Integrated position (world frame, drift-prone).
    pub position: Vector3<f64>,
    /// Instantaneous velocity, translation over the last tick interval.
    pub velocity: Vector3<f64>,
    /// Timestamp of the last successful tick, nanoseconds.
    pub last_update_ns: u64,
}

impl OdometryState {
    pub fn at(position: Vector3<f64>) -> Self {
        Self {
            position,
            velocity: Vector3::zeros(),
            last_update_ns: 0,
        }
    }
}

/// One vehicle's visual odometry pipeline: extractor + matcher + integrator.
pub struct OdometryTrack {
    id: VehicleId,
    state: TrackState,
    extractor: FeatureExtractor,
    matcher: TemporalMatcher,
    prev_features: Option<FeatureSet>,
    position: Vector3<f64>,
    velocity: Vector3<f64>,
    last_update_ns: u64,
}

// SAFETY: a track is moved into the background worker thread and never
// shared. The raw pointers inside the OpenCV handles (ORB, BFMatcher, Mat)
// are an artifact of the bindings; the underlying objects are only ever
// touched from the single thread that owns the track.
unsafe impl Send for OdometryTrack {}

impl OdometryTrack {
    pub fn new(id: VehicleId, initial_position: Vector3<f64>, n_features: i32) -> Result<Self> {
        Ok(Self {
            id,
            state: TrackState::Uninitialized,
            extractor: FeatureExtractor::new(n_features)?,
            matcher: TemporalMatcher::new()?,
            prev_features: None,
            position: initial_position,
            velocity: Vector3::zeros(),
            last_update_ns: 0,
        })
    }

    pub fn id(&self) -> VehicleId {
        self.id
    }

    pub fn track_state(&self) -> TrackState {
        self.state
    }

    /// Current published estimate.
    pub fn state(&self) -> OdometryState {
        OdometryState {
            position: self.position,
            velocity: self.velocity,
            last_update_ns: self.last_update_ns,
        }
    }

    /// Process one frame captured at `now_ns`.
    ///
    /// The first frame only seeds the previous feature set. Afterwards each
    /// frame is matched against the previous one and the estimated
    /// translation is integrated over the elapsed time. Velocity is zero
    /// whenever the clock did not advance (dt <= 0) and the position is
    /// carried forward unchanged whenever any stage degrades to the invalid
    /// estimate. Failures only cost this one tick.
    pub fn step(&mut self, frame: &Mat, now_ns: u64) {
        let features = match self.extractor.extract(frame) {
            Ok(f) => f,
            Err(e) => {
                warn!(vehicle = %self.id, error = %e, "feature extraction failed, tick skipped");
                return;
            }
        };

        if let Some(prev) = self.prev_features.as_ref() {
            let matches = match self.matcher.match_features(prev, &features) {
                Ok(m) => m,
                Err(e) => {
                    warn!(vehicle = %self.id, error = %e, "feature matching failed");
                    opencv::core::Vector::new()
                }
            };

            let estimate = estimate_motion(&matches, &prev.keypoints, &features.keypoints);
            self.integrate(estimate, now_ns);
        }

        self.prev_features = Some(features);
        self.state = TrackState::Tracking;
        self.last_update_ns = now_ns;
    }

    /// Fold one motion estimate into the position/velocity state.
    ///
    /// A valid estimate over a positive interval advances the position by
    /// the estimated translation; anything else zeroes the velocity and
    /// carries the position forward.
    fn integrate(&mut self, estimate: MotionEstimate, now_ns: u64) {
        let dt = if now_ns > self.last_update_ns {
            (now_ns - self.last_update_ns) as f64 / 1e9
        } else {
            0.0
        };

        if estimate.valid && dt > 0.0 {
            self.velocity = estimate.translation / dt;
            self.position += self.velocity * dt;
        } else {
            self.velocity = Vector3::zeros();
            debug!(
                vehicle = %self.id,
                dt,
                "no usable motion estimate, position carried forward"
            );
        }
    }
}
