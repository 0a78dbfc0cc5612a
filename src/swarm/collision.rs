//! Pairwise proximity veto for planned moves.

use nalgebra::Vector3;

use super::state::VehicleId;

/// Rejects any candidate target that would bring a vehicle within the
/// minimum separation of another vehicle.
///
/// Known approximation, preserved deliberately: targets are checked against
/// the other vehicles' *current* positions, not against targets planned in
/// the same tick. Two vehicles heading toward each other can each pass the
/// check individually; this is tolerable only because a tick is short
/// relative to the safety margin. Do not strengthen this without changing
/// the contract.
#[derive(Debug, Clone, Copy)]
pub struct CollisionGuard {
    min_separation: f64,
}

impl CollisionGuard {
    pub fn new(min_separation: f64) -> Self {
        Self { min_separation }
    }

    pub fn min_separation(&self) -> f64 {
        self.min_separation
    }

    /// Whether `vehicle` may move to `target` given the live positions of
    /// the whole fleet (indexed by `VehicleId`).
    pub fn is_safe(
        &self,
        vehicle: VehicleId,
        target: &Vector3<f64>,
        positions: &[Vector3<f64>],
    ) -> bool {
        positions
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != vehicle.0)
            .all(|(_, other)| (target - other).norm() >= self.min_separation)
    }
}
