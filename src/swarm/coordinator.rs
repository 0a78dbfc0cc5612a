//! Foreground control loop binding odometry, planning and the veto check.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use nalgebra::Vector3;
use tracing::{debug, info, warn};

use crate::link::VehicleLink;
use crate::odometry::{OdometryConfig, OdometryState, SwarmOdometryService};

use super::collision::CollisionGuard;
use super::formation::FormationPlanner;
use super::state::{DroneState, Roster};

/// Swarm-level tuning. Defaults follow the reference flight profile:
/// 5 m formation radius, 0.8 rad/s sweep, 1.5 m/s cruise.
#[derive(Debug, Clone)]
pub struct SwarmConfig {
    /// Formation radius in world units.
    pub radius: f64,
    /// Phase angle advance per second, radians.
    pub angular_speed: f64,
    /// Minimum allowed separation between any two vehicles.
    pub min_separation: f64,
    /// Speed passed to the move boundary, m/s.
    pub cruise_speed: f64,
    /// Upward altitude bias for vehicles reporting obstacles.
    pub clearance_margin: f64,
    /// Coordinator tick period.
    pub tick_period: Duration,
    /// Odometry service tuning.
    pub odometry: OdometryConfig,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            radius: 5.0,
            angular_speed: 0.8,
            min_separation: 2.0,
            cruise_speed: 1.5,
            clearance_margin: 0.5,
            tick_period: Duration::from_millis(100),
            odometry: OdometryConfig::default(),
        }
    }
}

/// Orchestrates one swarm: refresh state, recompute the shared center, plan
/// the formation, veto unsafe moves and emit the accepted waypoints.
///
/// Moves are issued serially and block until arrival, so there is never
/// more than one in-flight command per tick per vehicle.
pub struct SwarmCoordinator {
    roster: Arc<Roster>,
    link: Arc<dyn VehicleLink>,
    odometry: SwarmOdometryService,
    planner: FormationPlanner,
    guard: CollisionGuard,
    config: SwarmConfig,
    fleet: Vec<DroneState>,
    phase: f64,
}

impl SwarmCoordinator {
    pub fn new(roster: Arc<Roster>, link: Arc<dyn VehicleLink>, config: SwarmConfig) -> Self {
        let odometry = SwarmOdometryService::new(
            Arc::clone(&roster),
            Arc::clone(&link),
            config.odometry.clone(),
        );
        let planner = FormationPlanner::new(roster.len(), config.radius, config.clearance_margin);
        let guard = CollisionGuard::new(config.min_separation);
        let fleet = roster.ids().map(DroneState::new).collect();

        Self {
            roster,
            link,
            odometry,
            planner,
            guard,
            config,
            fleet,
            phase: 0.0,
        }
    }

    /// Start the background odometry refresh.
    pub fn start(&mut self) -> Result<()> {
        self.odometry.start()
    }

    /// Stop the background odometry refresh and wait for it.
    pub fn shutdown(&mut self) {
        self.odometry.stop();
    }

    /// Accumulated phase angle, radians.
    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Last refreshed swarm-visible fleet state.
    pub fn fleet(&self) -> &[DroneState] {
        &self.fleet
    }

    /// Run one coordination tick.
    ///
    /// Strictly ordered: refresh live state, recompute the center, advance
    /// the phase by `angular_speed * dt`, plan targets, veto-check each
    /// vehicle, then issue the accepted moves. A vetoed or failed move only
    /// skips that vehicle for this tick.
    pub fn step(&mut self, dt: f64) {
        let states = self.odometry.snapshot();
        if states.is_empty() {
            return;
        }

        self.refresh_fleet(&states);
        let center = swarm_center(&states);
        self.phase += self.config.angular_speed * dt;

        let obstacle_flags: Vec<bool> = self
            .fleet
            .iter()
            .map(|drone| !drone.obstacles.is_empty())
            .collect();
        let plan = self.planner.plan(center, self.phase, &obstacle_flags);

        let positions: Vec<Vector3<f64>> = states.iter().map(|s| s.position).collect();
        for id in self.roster.ids() {
            let target = plan[id.0];
            if !self.guard.is_safe(id, &target, &positions) {
                info!(
                    vehicle = %id,
                    name = self.roster.name(id),
                    "move vetoed: target within safety margin"
                );
                continue;
            }
            if let Err(e) = self
                .link
                .issue_move(id, target, self.config.cruise_speed)
            {
                warn!(vehicle = %id, name = self.roster.name(id), error = %e, "move command failed");
            }
        }
    }

    /// Drive [`step`](Self::step) at the configured tick period for
    /// `duration`.
    pub fn run(&mut self, duration: Duration) {
        let start = Instant::now();
        let mut last_tick = start;
        while start.elapsed() < duration {
            let now = Instant::now();
            let dt = now.duration_since(last_tick).as_secs_f64();
            last_tick = now;
            self.step(dt);

            if let Some(remaining) = self.config.tick_period.checked_sub(now.elapsed()) {
                std::thread::sleep(remaining);
            }
        }
    }

    /// Rebuild the swarm-visible fleet table from the latest odometry
    /// snapshot and the range-sensor boundary.
    fn refresh_fleet(&mut self, states: &[OdometryState]) {
        for (drone, state) in self.fleet.iter_mut().zip(states) {
            drone.position = state.position;
            drone.velocity = state.velocity;
            drone.obstacles = match self.link.capture_range_points(drone.id) {
                Ok(points) => points,
                Err(e) => {
                    debug!(vehicle = %drone.id, error = %e, "range read failed, assuming clear");
                    Vec::new()
                }
            };
        }
    }
}

/// Arithmetic mean of the fleet's live positions.
///
/// An empty fleet has no meaningful center; the origin is returned so
/// callers never see non-finite coordinates.
pub fn swarm_center(states: &[OdometryState]) -> Vector3<f64> {
    if states.is_empty() {
        return Vector3::zeros();
    }
    let sum = states
        .iter()
        .fold(Vector3::zeros(), |acc, s| acc + s.position);
    sum / states.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimLink;
    use crate::swarm::state::VehicleId;
    use approx::assert_relative_eq;

    fn roster(n: usize) -> Arc<Roster> {
        Arc::new(Roster::new(
            (1..=n).map(|i| format!("Drone{i}")).collect(),
        ))
    }

    #[test]
    fn test_swarm_center_is_mean_position() {
        let states = vec![
            OdometryState::at(Vector3::new(2.0, 0.0, -2.0)),
            OdometryState::at(Vector3::new(-2.0, 4.0, -4.0)),
        ];
        let center = swarm_center(&states);
        assert_relative_eq!((center - Vector3::new(0.0, 2.0, -3.0)).norm(), 0.0);
    }

    #[test]
    fn test_swarm_center_of_empty_fleet_is_finite() {
        let center = swarm_center(&[]);
        assert_eq!(center, Vector3::zeros());
        assert!(center.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_step_issues_moves_for_safe_targets() {
        let roster = roster(3);
        let link = Arc::new(SimLink::new(roster.len()));
        // Spread the fleet out so every planned target clears the margin.
        link.set_position(VehicleId(0), Vector3::new(20.0, 0.0, -3.0));
        link.set_position(VehicleId(1), Vector3::new(-20.0, 10.0, -3.0));
        link.set_position(VehicleId(2), Vector3::new(-20.0, -10.0, -3.0));

        let mut coordinator = SwarmCoordinator::new(
            Arc::clone(&roster),
            Arc::clone(&link) as Arc<dyn VehicleLink>,
            SwarmConfig::default(),
        );
        coordinator.step(0.1);

        let moves = link.recorded_moves();
        assert_eq!(moves.len(), 3);
        assert_relative_eq!(coordinator.phase(), 0.08, epsilon = 1e-12);
    }

    #[test]
    fn test_step_drops_vetoed_vehicles() {
        let roster = roster(3);
        let link = Arc::new(SimLink::new(roster.len()));
        // Everyone at the origin with a huge margin: every target is within
        // min_separation of some other vehicle's current position.
        let config = SwarmConfig {
            min_separation: 100.0,
            ..SwarmConfig::default()
        };

        let mut coordinator = SwarmCoordinator::new(
            Arc::clone(&roster),
            Arc::clone(&link) as Arc<dyn VehicleLink>,
            config,
        );
        coordinator.step(0.1);

        assert!(link.recorded_moves().is_empty());
    }

    #[test]
    fn test_obstacles_feed_the_planner() {
        let roster = roster(2);
        let link = Arc::new(SimLink::new(roster.len()));
        link.set_position(VehicleId(0), Vector3::new(30.0, 0.0, -3.0));
        link.set_position(VehicleId(1), Vector3::new(-30.0, 0.0, -3.0));
        link.set_obstacles(VehicleId(0), vec![Vector3::new(1.0, 0.0, 0.0)]);

        let mut coordinator = SwarmCoordinator::new(
            Arc::clone(&roster),
            Arc::clone(&link) as Arc<dyn VehicleLink>,
            SwarmConfig::default(),
        );
        coordinator.step(0.1);

        let fleet = coordinator.fleet();
        assert_eq!(fleet[0].obstacles.len(), 1);
        assert!(fleet[1].obstacles.is_empty());

        // The obstacle-flagged vehicle got the upward-biased target.
        let moves = link.recorded_moves();
        let first = moves.iter().find(|(id, _, _)| *id == VehicleId(0)).unwrap();
        let second = moves.iter().find(|(id, _, _)| *id == VehicleId(1)).unwrap();
        assert_relative_eq!(first.1.z, second.1.z - 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_actuation_failure_does_not_stop_the_tick() {
        let roster = roster(2);
        let link = Arc::new(SimLink::new(roster.len()));
        link.set_position(VehicleId(0), Vector3::new(30.0, 0.0, -3.0));
        link.set_position(VehicleId(1), Vector3::new(-30.0, 0.0, -3.0));
        link.fail_move(VehicleId(0), true);

        let mut coordinator = SwarmCoordinator::new(
            Arc::clone(&roster),
            Arc::clone(&link) as Arc<dyn VehicleLink>,
            SwarmConfig::default(),
        );
        coordinator.step(0.1);

        // Vehicle 0 failed, vehicle 1 still moved.
        let moves = link.recorded_moves();
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].0, VehicleId(1));
    }
}
