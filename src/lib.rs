//! Vision-based multi-drone navigation.
//!
//! Two tightly coupled subsystems: a per-vehicle visual odometry pipeline
//! (ORB features, temporal matching, two-view motion recovery, time
//! integration) and a swarm coordinator that keeps the fleet in a
//! time-varying geometric formation while vetoing moves that would violate
//! the safety margin.

pub mod geometry;
pub mod link;
pub mod odometry;
pub mod sim;
pub mod swarm;
