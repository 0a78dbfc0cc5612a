//! Swarm-level coordination: fleet state, formation planning, collision
//! veto and the foreground control loop.

pub mod collision;
pub mod coordinator;
pub mod formation;
pub mod state;

pub use collision::CollisionGuard;
pub use coordinator::{swarm_center, SwarmConfig, SwarmCoordinator};
pub use formation::{FormationGeometry, FormationPlanner, FormationSpec, NUM_GEOMETRIES};
pub use state::{DroneState, Roster, VehicleId};
