//! Per-vehicle visual odometry: feature extraction, temporal matching,
//! motion estimation, track integration and the swarm-wide refresh service.

pub mod features;
pub mod matching;
pub mod motion;
pub mod service;
pub mod track;

pub use features::{FeatureExtractor, FeatureSet};
pub use matching::TemporalMatcher;
pub use motion::{estimate_motion, MotionEstimate, MIN_CORRESPONDENCES};
pub use service::{relative_positions, OdometryConfig, SwarmOdometryService};
pub use track::{OdometryState, OdometryTrack, TrackState};
