//! Time-varying formation geometry and per-vehicle target planning.
//!
//! The active geometry is a pure function of the accumulated phase angle:
//! each full rotation (2π) advances the phase counter by one and the
//! geometry cycles through the closed variant set. No external command and
//! no randomness ever select a geometry.

use std::f64::consts::TAU;

use nalgebra::Vector3;

/// Number of geometries in the rotation cycle.
pub const NUM_GEOMETRIES: u64 = 4;

/// Rate of the spiral radius modulation, per radian of phase.
const SPIRAL_RATE: f64 = 0.3;

/// Amplitude of the vertical wave, in world units.
const WAVE_AMPLITUDE: f64 = 1.0;

/// The closed set of formation geometries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormationGeometry {
    Circle,
    ExpandingSpiral,
    VerticalWave,
    DiamondLissajous,
}

impl FormationGeometry {
    /// Geometry for a given phase counter value.
    pub fn from_cycle(cycle: u64) -> Self {
        match cycle % NUM_GEOMETRIES {
            0 => Self::Circle,
            1 => Self::ExpandingSpiral,
            2 => Self::VerticalWave,
            _ => Self::DiamondLissajous,
        }
    }

    /// Geometry for an accumulated phase angle.
    pub fn from_phase(theta: f64) -> Self {
        Self::from_cycle(cycle_index(theta))
    }

    /// Closed-form offset from the formation center for one vehicle.
    ///
    /// `theta` is the accumulated phase angle, `offset` the vehicle's
    /// angular offset around the formation.
    fn offset(&self, radius: f64, theta: f64, offset: f64) -> Vector3<f64> {
        let a = theta + offset;
        match self {
            Self::Circle => Vector3::new(radius * a.cos(), radius * a.sin(), 0.0),
            Self::ExpandingSpiral => {
                // Radius breathes with the phase; collapses toward the
                // center at the trough, where the collision guard takes
                // over.
                let r = radius * (1.0 + (SPIRAL_RATE * theta).sin());
                Vector3::new(r * a.cos(), r * a.sin(), 0.0)
            }
            Self::VerticalWave => Vector3::new(
                radius * a.cos(),
                radius * a.sin(),
                WAVE_AMPLITUDE * a.sin(),
            ),
            Self::DiamondLissajous => {
                // L1-normalized circle traces a diamond in the plane while
                // the altitude follows a 1:2 Lissajous figure.
                let denom = a.cos().abs() + a.sin().abs();
                Vector3::new(
                    radius * a.cos() / denom,
                    radius * a.sin() / denom,
                    0.5 * WAVE_AMPLITUDE * (2.0 * a).sin(),
                )
            }
        }
    }
}

/// Phase counter: number of completed full rotations.
pub fn cycle_index(theta: f64) -> u64 {
    (theta / TAU).floor().max(0.0) as u64
}

/// The active formation parameters derived from a phase angle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormationSpec {
    pub geometry: FormationGeometry,
    pub radius: f64,
    pub cycle: u64,
}

impl FormationSpec {
    pub fn from_phase(theta: f64, radius: f64) -> Self {
        let cycle = cycle_index(theta);
        Self {
            geometry: FormationGeometry::from_cycle(cycle),
            radius,
            cycle,
        }
    }
}

/// Computes one target position per vehicle for the current tick.
///
/// `plan` is a pure function: identical arguments always produce an
/// identical plan.
#[derive(Debug, Clone)]
pub struct FormationPlanner {
    num_vehicles: usize,
    radius: f64,
    /// Upward altitude bias applied when a vehicle reports obstacles.
    clearance_margin: f64,
}

impl FormationPlanner {
    pub fn new(num_vehicles: usize, radius: f64, clearance_margin: f64) -> Self {
        Self {
            num_vehicles,
            radius,
            clearance_margin,
        }
    }

    /// Plan target positions around `center` at phase `theta`.
    ///
    /// `obstacle_flags[i]` marks vehicles with a non-empty obstacle set;
    /// their targets are biased upward by the clearance margin (NED frame:
    /// up is negative z) before any pairwise collision checking happens.
    pub fn plan(
        &self,
        center: Vector3<f64>,
        theta: f64,
        obstacle_flags: &[bool],
    ) -> Vec<Vector3<f64>> {
        let spec = FormationSpec::from_phase(theta, self.radius);
        let n = self.num_vehicles;

        (0..n)
            .map(|i| {
                let offset = TAU * i as f64 / n as f64;
                let mut target = center + spec.geometry.offset(spec.radius, theta, offset);
                if obstacle_flags.get(i).copied().unwrap_or(false) {
                    target.z -= self.clearance_margin;
                }
                target
            })
            .collect()
    }
}
