//! Synthetic vehicle boundary for the demo binary and integration tests.
//!
//! Stands in for the excluded simulator session layer: deterministic
//! textured camera frames that drift sideways over time, scripted
//! positions, recorded move commands and injectable per-vehicle failures.

use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{bail, Result};
use nalgebra::Vector3;
use opencv::core::{Mat, Scalar};
use opencv::prelude::*;
use parking_lot::RwLock;

use crate::link::VehicleLink;
use crate::swarm::state::VehicleId;

const FRAME_ROWS: i32 = 120;
const FRAME_COLS: i32 = 160;

/// In-memory vehicle link backed by synthetic sensors.
pub struct SimLink {
    positions: RwLock<Vec<Vector3<f64>>>,
    obstacles: RwLock<Vec<Vec<Vector3<f64>>>>,
    camera_failures: RwLock<Vec<bool>>,
    move_failures: RwLock<Vec<bool>>,
    moves: RwLock<Vec<(VehicleId, Vector3<f64>, f64)>>,
    /// Frame counter per vehicle; drives the horizontal drift of the
    /// synthetic texture so consecutive frames show apparent motion.
    frame_counters: Vec<AtomicU64>,
}

impl SimLink {
    pub fn new(num_vehicles: usize) -> Self {
        Self {
            positions: RwLock::new(vec![Vector3::zeros(); num_vehicles]),
            obstacles: RwLock::new(vec![Vec::new(); num_vehicles]),
            camera_failures: RwLock::new(vec![false; num_vehicles]),
            move_failures: RwLock::new(vec![false; num_vehicles]),
            moves: RwLock::new(Vec::new()),
            frame_counters: (0..num_vehicles).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    pub fn set_position(&self, vehicle: VehicleId, position: Vector3<f64>) {
        self.positions.write()[vehicle.0] = position;
    }

    pub fn set_obstacles(&self, vehicle: VehicleId, points: Vec<Vector3<f64>>) {
        self.obstacles.write()[vehicle.0] = points;
    }

    /// Make `capture_frame` fail for one vehicle.
    pub fn fail_camera(&self, vehicle: VehicleId, fail: bool) {
        self.camera_failures.write()[vehicle.0] = fail;
    }

    /// Make `issue_move` fail for one vehicle.
    pub fn fail_move(&self, vehicle: VehicleId, fail: bool) {
        self.move_failures.write()[vehicle.0] = fail;
    }

    /// Every accepted move command, in issue order.
    pub fn recorded_moves(&self) -> Vec<(VehicleId, Vector3<f64>, f64)> {
        self.moves.read().clone()
    }
}

impl VehicleLink for SimLink {
    fn capture_frame(&self, vehicle: VehicleId) -> Result<Mat> {
        if self.camera_failures.read()[vehicle.0] {
            bail!("simulated camera failure for {vehicle}");
        }
        let shift = self.frame_counters[vehicle.0].fetch_add(1, Ordering::Relaxed) as i32;
        synthetic_frame(shift * 2)
    }

    fn capture_range_points(&self, vehicle: VehicleId) -> Result<Vec<Vector3<f64>>> {
        Ok(self.obstacles.read()[vehicle.0].clone())
    }

    fn issue_move(&self, vehicle: VehicleId, target: Vector3<f64>, speed: f64) -> Result<()> {
        if self.move_failures.read()[vehicle.0] {
            bail!("simulated actuation failure for {vehicle}");
        }
        // Blocking-until-arrived semantics: the vehicle is at the target
        // when the call returns.
        self.positions.write()[vehicle.0] = target;
        self.moves.write().push((vehicle, target, speed));
        Ok(())
    }

    fn current_position(&self, vehicle: VehicleId) -> Result<Vector3<f64>> {
        Ok(self.positions.read()[vehicle.0])
    }
}

/// Deterministic high-contrast texture, shifted horizontally by `shift`
/// pixels.
fn synthetic_frame(shift: i32) -> Result<Mat> {
    let mut frame = Mat::new_rows_cols_with_default(
        FRAME_ROWS,
        FRAME_COLS,
        opencv::core::CV_8UC1,
        Scalar::all(0.0),
    )?;
    for r in 0..FRAME_ROWS {
        for c in 0..FRAME_COLS {
            let v = (((c + shift) * 7 + r * 13) % 251) as u8;
            *frame.at_2d_mut::<u8>(r, c)? = v;
        }
    }
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_drift_between_captures() {
        let link = SimLink::new(1);
        let a = link.capture_frame(VehicleId(0)).unwrap();
        let b = link.capture_frame(VehicleId(0)).unwrap();

        // Same texture, shifted: at least one pixel differs.
        let mut differs = false;
        for c in 0..FRAME_COLS {
            if a.at_2d::<u8>(0, c).unwrap() != b.at_2d::<u8>(0, c).unwrap() {
                differs = true;
                break;
            }
        }
        assert!(differs);
    }

    #[test]
    fn test_moves_update_positions() {
        let link = SimLink::new(2);
        let target = Vector3::new(1.0, 2.0, -3.0);
        link.issue_move(VehicleId(1), target, 1.5).unwrap();

        assert_eq!(link.current_position(VehicleId(1)).unwrap(), target);
        assert_eq!(link.recorded_moves().len(), 1);
    }

    #[test]
    fn test_injected_failures_surface_as_errors() {
        let link = SimLink::new(1);
        link.fail_camera(VehicleId(0), true);
        link.fail_move(VehicleId(0), true);

        assert!(link.capture_frame(VehicleId(0)).is_err());
        assert!(link
            .issue_move(VehicleId(0), Vector3::zeros(), 1.0)
            .is_err());
        assert!(link.recorded_moves().is_empty());
    }
}
