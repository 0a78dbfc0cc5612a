use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;

use swarm_nav::sim::SimLink;
use swarm_nav::swarm::{Roster, SwarmConfig, SwarmCoordinator};

fn main() -> Result<()> {
    tracing_subscriber::fmt().init();

    let seconds: u64 = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(20);

    let roster = Arc::new(Roster::new(vec![
        "Drone1".to_string(),
        "Drone2".to_string(),
        "Drone3".to_string(),
    ]));
    let link = Arc::new(SimLink::new(roster.len()));

    let mut coordinator = SwarmCoordinator::new(roster.clone(), link.clone(), SwarmConfig::default());
    coordinator.start()?;

    info!(vehicles = roster.len(), seconds, "running formation flight");
    coordinator.run(Duration::from_secs(seconds));
    coordinator.shutdown();

    for drone in coordinator.fleet() {
        info!(
            vehicle = roster.name(drone.id),
            x = drone.position.x,
            y = drone.position.y,
            z = drone.position.z,
            "final position"
        );
    }
    info!(moves = link.recorded_moves().len(), "mission complete");

    Ok(())
}
