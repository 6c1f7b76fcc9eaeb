//! World model: per-step snapshots, the simulator seam and the built-in
//! kinematic simulator.

pub mod kinematic;
pub mod simulator;
pub mod snapshot;

pub use kinematic::KinematicSimulator;
pub use simulator::{Image, SensorData, SensorFrame, Simulator};
pub use snapshot::{HeroState, LaneType, Waypoint, WorldSnapshot};
