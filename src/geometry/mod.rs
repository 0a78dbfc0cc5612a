//! Geometry utilities: two-view relative pose recovery.

pub mod two_view;

pub use two_view::{recover_pose, recover_translation, MIN_POINTS};
