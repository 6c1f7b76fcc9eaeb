//! Per-step world snapshot consumed by the reward evaluator.
//!
//! A [`WorldSnapshot`] is a read-only copy of everything the evaluator needs
//! from the simulator for one step: hero kinematics, the lane under the hero,
//! the traffic light affecting it and the positions of other vehicles.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::{Location, Vector2};

/// Conversion factor from m/s to km/h.
pub const MS_TO_KMH: f64 = 3.6;

/// Kind of lane a waypoint belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaneType {
    Driving,
    Parking,
    Shoulder,
    Sidewalk,
    Biking,
    Median,
    Border,
}

impl LaneType {
    /// Lanes the hero is allowed to occupy without penalty.
    pub const ALLOWED: [LaneType; 2] = [LaneType::Driving, LaneType::Parking];

    /// Returns true if this lane type is in [`LaneType::ALLOWED`].
    pub fn is_allowed(&self) -> bool {
        Self::ALLOWED.contains(self)
    }
}

impl fmt::Display for LaneType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LaneType::Driving => "driving",
            LaneType::Parking => "parking",
            LaneType::Shoulder => "shoulder",
            LaneType::Sidewalk => "sidewalk",
            LaneType::Biking => "biking",
            LaneType::Median => "median",
            LaneType::Border => "border",
        };
        write!(f, "{}", name)
    }
}

/// Lane-center sample nearest to the hero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    pub lane_type: LaneType,
    /// Point on the lane center closest to the queried location.
    pub location: Location,
    /// Unit forward vector of the lane at `location`.
    pub heading: Vector2,
    /// Lane width in meters.
    pub lane_width: f64,
    pub is_junction: bool,
}

/// Kinematic state of the controlled vehicle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeroState {
    pub location: Location,
    /// Unit forward vector projected on the ground plane.
    pub heading: Vector2,
    /// Velocity in m/s, `[x, y, z]`.
    pub velocity: [f64; 3],
}

impl HeroState {
    /// Scalar speed in km/h.
    pub fn speed_kmh(&self) -> f64 {
        let [vx, vy, vz] = self.velocity;
        MS_TO_KMH * (vx * vx + vy * vy + vz * vz).sqrt()
    }
}

/// Everything the evaluator reads from the simulator for one step.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldSnapshot {
    pub hero: HeroState,
    /// Nearest waypoint of any lane type, `None` when the hero is off the road network.
    pub waypoint: Option<Waypoint>,
    /// Location of the traffic light currently affecting the hero.
    pub traffic_light: Option<Location>,
    /// Locations of every vehicle except the hero.
    pub vehicles: Vec<Location>,
    /// Whether the collision sensor fired during this step.
    pub collision: bool,
}
