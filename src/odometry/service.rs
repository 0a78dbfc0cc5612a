//! Swarm-wide odometry service with a background refresh worker.
//!
//! One [`OdometryTrack`](super::track::OdometryTrack) per registered
//! vehicle, refreshed at a fixed cadence by a dedicated worker thread. The
//! worker is the only writer of the shared snapshot; readers always observe
//! a whole tick, never a partially updated one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::Result;
use nalgebra::Vector3;
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::link::VehicleLink;
use crate::swarm::state::Roster;

use super::features::DEFAULT_N_FEATURES;
use super::track::{OdometryState, OdometryTrack};

/// Tuning knobs for the odometry service.
#[derive(Debug, Clone)]
pub struct OdometryConfig {
    /// Refresh period of the background worker (10 Hz nominal).
    pub tick_period: Duration,
    /// ORB features requested per frame.
    pub n_features: i32,
}

impl Default for OdometryConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_millis(100),
            n_features: DEFAULT_N_FEATURES,
        }
    }
}

/// State shared between the service handle and its worker thread.
struct ServiceShared {
    /// Per-vehicle estimates, indexed by `VehicleId`. Replaced wholesale
    /// once per tick.
    states: RwLock<Vec<OdometryState>>,
    shutdown: AtomicBool,
    running: AtomicBool,
}

/// Owns one odometry track per registered vehicle and the worker refreshing
/// them. Registration is fixed at construction.
pub struct SwarmOdometryService {
    roster: Arc<Roster>,
    link: Arc<dyn VehicleLink>,
    config: OdometryConfig,
    shared: Arc<ServiceShared>,
    worker: Option<JoinHandle<()>>,
}

impl SwarmOdometryService {
    /// Create the service and seed each track's position from the vehicle
    /// boundary. A failed seed read degrades to the origin.
    pub fn new(roster: Arc<Roster>, link: Arc<dyn VehicleLink>, config: OdometryConfig) -> Self {
        let mut states = Vec::with_capacity(roster.len());
        for id in roster.ids() {
            let position = match link.current_position(id) {
                Ok(p) => p,
                Err(e) => {
                    warn!(vehicle = %id, error = %e, "position seed failed, using origin");
                    Vector3::zeros()
                }
            };
            states.push(OdometryState::at(position));
        }

        Self {
            roster,
            link,
            config,
            shared: Arc::new(ServiceShared {
                states: RwLock::new(states),
                shutdown: AtomicBool::new(false),
                running: AtomicBool::new(false),
            }),
            worker: None,
        }
    }

    /// Start the background refresh worker.
    ///
    /// Idempotent: calling while already running is a logged no-op. After a
    /// `stop()`, a new worker is spawned whose tracks re-seed from the last
    /// published snapshot (previous frames are not retained, so the first
    /// tick is a re-initialization tick).
    pub fn start(&mut self) -> Result<()> {
        if self.shared.running.load(Ordering::SeqCst) {
            warn!("odometry service already running");
            return Ok(());
        }

        let mut tracks = Vec::with_capacity(self.roster.len());
        {
            let states = self.shared.states.read();
            for id in self.roster.ids() {
                tracks.push(OdometryTrack::new(
                    id,
                    states[id.0].position,
                    self.config.n_features,
                )?);
            }
        }

        self.shared.shutdown.store(false, Ordering::SeqCst);
        self.shared.running.store(true, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        let link = Arc::clone(&self.link);
        let period = self.config.tick_period;
        self.worker = Some(thread::spawn(move || {
            refresh_loop(tracks, shared, link, period);
        }));
        info!(vehicles = self.roster.len(), "odometry service started");
        Ok(())
    }

    /// Stop the worker and wait for the in-flight tick to complete.
    ///
    /// After this returns no new tick will start. Safe to call when the
    /// service was never started.
    pub fn stop(&mut self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("odometry worker panicked");
            }
            info!("odometry service stopped");
        }
        self.shared.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Consistent point-in-time copy of every vehicle's estimate, indexed
    /// by `VehicleId`.
    pub fn snapshot(&self) -> Vec<OdometryState> {
        self.shared.states.read().clone()
    }

    /// Pairwise relative positions: `rel[i][j] = position(j) - position(i)`.
    /// Diagonal entries are zero.
    pub fn relative_snapshot(&self) -> Vec<Vec<Vector3<f64>>> {
        relative_positions(&self.snapshot())
    }
}

impl Drop for SwarmOdometryService {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Background worker: refresh every track in registration order, then
/// publish the whole tick at once.
fn refresh_loop(
    mut tracks: Vec<OdometryTrack>,
    shared: Arc<ServiceShared>,
    link: Arc<dyn VehicleLink>,
    period: Duration,
) {
    info!("odometry worker started");
    let epoch = Instant::now();

    while !shared.shutdown.load(Ordering::SeqCst) {
        let tick_start = Instant::now();
        let now_ns = epoch.elapsed().as_nanos() as u64;

        // A failure on one vehicle must not abort the rest of the tick.
        for track in tracks.iter_mut() {
            match link.capture_frame(track.id()) {
                Ok(frame) => track.step(&frame, now_ns),
                Err(e) => {
                    warn!(vehicle = %track.id(), error = %e, "camera read failed, keeping last state");
                }
            }
        }

        let tick: Vec<OdometryState> = tracks.iter().map(|t| t.state()).collect();
        *shared.states.write() = tick;

        if let Some(remaining) = period.checked_sub(tick_start.elapsed()) {
            thread::sleep(remaining);
        }
    }

    shared.running.store(false, Ordering::SeqCst);
    info!("odometry worker exiting");
}

/// Pairwise relative positions for a snapshot, `rel[i][j] = pos_j - pos_i`.
pub fn relative_positions(states: &[OdometryState]) -> Vec<Vec<Vector3<f64>>> {
    states
        .iter()
        .map(|a| states.iter().map(|b| b.position - a.position).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimLink;
    use crate::swarm::state::VehicleId;
    use approx::assert_relative_eq;

    fn test_config() -> OdometryConfig {
        OdometryConfig {
            tick_period: Duration::from_millis(10),
            n_features: 300,
        }
    }

    fn roster(n: usize) -> Arc<Roster> {
        Arc::new(Roster::new(
            (1..=n).map(|i| format!("Drone{i}")).collect(),
        ))
    }

    #[test]
    fn test_relative_snapshot_antisymmetry() {
        let states = vec![
            OdometryState::at(Vector3::new(1.0, 2.0, 3.0)),
            OdometryState::at(Vector3::new(-4.0, 0.5, 2.0)),
            OdometryState::at(Vector3::new(0.0, -7.0, 1.5)),
        ];
        let rel = relative_positions(&states);
        for i in 0..states.len() {
            assert_relative_eq!(rel[i][i].norm(), 0.0);
            for j in 0..states.len() {
                assert_relative_eq!((rel[i][j] + rel[j][i]).norm(), 0.0, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_seeds_positions_from_link() {
        let roster = roster(2);
        let link = Arc::new(SimLink::new(roster.len()));
        link.set_position(VehicleId(1), Vector3::new(3.0, 0.0, -1.0));

        let service = SwarmOdometryService::new(roster, link, test_config());
        let snapshot = service.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[1].position, Vector3::new(3.0, 0.0, -1.0));
    }

    #[test]
    fn test_start_stop_lifecycle() {
        let roster = roster(2);
        let link = Arc::new(SimLink::new(roster.len()));
        let mut service = SwarmOdometryService::new(roster, link, test_config());

        assert!(!service.is_running());
        service.stop(); // never started: must be a no-op

        service.start().unwrap();
        assert!(service.is_running());
        service.start().unwrap(); // second start is a logged no-op

        std::thread::sleep(Duration::from_millis(60));
        service.stop();
        assert!(!service.is_running());

        // Every track was refreshed at least once.
        for state in service.snapshot() {
            assert!(state.last_update_ns > 0);
        }
    }

    #[test]
    fn test_sensing_failure_is_isolated_per_vehicle() {
        let roster = roster(3);
        let link = Arc::new(SimLink::new(roster.len()));
        link.fail_camera(VehicleId(0), true);

        let mut service =
            SwarmOdometryService::new(roster, Arc::clone(&link) as Arc<dyn VehicleLink>, test_config());
        service.start().unwrap();
        std::thread::sleep(Duration::from_millis(60));
        service.stop();

        let snapshot = service.snapshot();
        // The failed vehicle never got a tick; the others did.
        assert_eq!(snapshot[0].last_update_ns, 0);
        assert!(snapshot[1].last_update_ns > 0);
        assert!(snapshot[2].last_update_ns > 0);
    }
}
