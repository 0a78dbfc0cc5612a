//! External vehicle boundary.
//!
//! The core never talks to a simulator or autopilot directly; everything it
//! needs from the outside world is expressed as the `VehicleLink` trait.
//! Session setup, retries and protocol details live behind implementations
//! of this trait.

use anyhow::Result;
use nalgebra::Vector3;
use opencv::core::Mat;

use crate::swarm::state::VehicleId;

/// Abstract capabilities the swarm core requires from each vehicle.
///
/// Implementations are shared between the background odometry worker and the
/// foreground coordinator, so they must be `Send + Sync`.
pub trait VehicleLink: Send + Sync {
    /// Capture one grayscale camera frame from the vehicle.
    ///
    /// A failure here means "no odometry update this tick" for that vehicle;
    /// it is never fatal to the swarm.
    fn capture_frame(&self, vehicle: VehicleId) -> Result<Mat>;

    /// Read the vehicle's range sensor. An empty sequence means "no
    /// obstacles known"; a failure is treated the same way.
    fn capture_range_points(&self, vehicle: VehicleId) -> Result<Vec<Vector3<f64>>>;

    /// Command the vehicle to fly to `target` at `speed` (m/s).
    ///
    /// Blocking-until-arrived semantics: the coordinator serializes moves
    /// per tick and relies on this call not returning until the vehicle has
    /// settled (or the command has failed).
    fn issue_move(&self, vehicle: VehicleId, target: Vector3<f64>, speed: f64) -> Result<()>;

    /// The vehicle's current position, used only to seed odometry tracks at
    /// construction. Odometry integration itself never reads this.
    fn current_position(&self, vehicle: VehicleId) -> Result<Vector3<f64>>;
}
