//! Fleet identifiers and swarm-visible vehicle state.

use nalgebra::Vector3;

/// Index of a vehicle within the fixed roster.
///
/// Ids are assigned in registration order at construction and serve as
/// stable indices into every per-vehicle table; no Arc/Rc cross-references
/// are needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VehicleId(pub usize);

impl std::fmt::Display for VehicleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "V{}", self.0)
    }
}

/// The fixed set of registered vehicles. No dynamic add/remove mid-run.
#[derive(Debug, Clone)]
pub struct Roster {
    names: Vec<String>,
}

impl Roster {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Vehicle ids in registration order.
    pub fn ids(&self) -> impl Iterator<Item = VehicleId> {
        (0..self.names.len()).map(VehicleId)
    }

    pub fn name(&self, id: VehicleId) -> &str {
        &self.names[id.0]
    }
}

/// Swarm-visible state of one vehicle, rebuilt wholesale each coordinator
/// tick.
#[derive(Debug, Clone)]
pub struct DroneState {
    pub id: VehicleId,
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
    /// Battery level placeholder; the boundary does not report charge yet.
    pub battery: f64,
    /// Nearby obstacle points from the range sensor (boundary input).
    pub obstacles: Vec<Vector3<f64>>,
}

impl DroneState {
    pub fn new(id: VehicleId) -> Self {
        Self {
            id,
            position: Vector3::zeros(),
            velocity: Vector3::zeros(),
            battery: 100.0,
            obstacles: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roster_ids_follow_registration_order() {
        let roster = Roster::new(vec!["Drone1".into(), "Drone2".into(), "Drone3".into()]);
        let ids: Vec<_> = roster.ids().collect();
        assert_eq!(ids, vec![VehicleId(0), VehicleId(1), VehicleId(2)]);
        assert_eq!(roster.name(VehicleId(1)), "Drone2");
    }
}
