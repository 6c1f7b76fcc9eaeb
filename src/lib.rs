//! drive-ppo - PPO training for a camera-based autonomous driving agent.
//!
//! The crate is split into:
//!
//! * [`world`]: per-step world snapshots, the [`world::Simulator`] seam and a
//!   built-in kinematic simulator.
//! * [`experiment`]: configuration, sensors, the action and observation
//!   adapters, reward shaping, termination and the [`experiment::Environment`].
//! * [`policy`]: policies mapping observations to actions, including the
//!   torch actor-critic behind the `rl-nn` feature.
//! * [`training`]: rollouts, GAE, PPO, checkpoints and the launch loops.

pub mod cli;
pub mod error;
pub mod experiment;
pub mod geometry;
pub mod policy;
pub mod training;
pub mod world;

pub use error::ExperimentError;
