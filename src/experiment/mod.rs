//! The driving experiment: configuration, sensors, action and observation
//! adapters, the reward/termination evaluator and the environment built on
//! top of them.

pub mod action;
pub mod callbacks;
pub mod config;
pub mod environment;
pub mod episode;
pub mod evaluator;
pub mod metrics;
pub mod observation;
pub mod reward;
pub mod sensors;
pub mod termination;

#[cfg(test)]
mod tests;

pub use action::{Action, BoxSpace, VehicleControl};
pub use callbacks::{Episode, EpisodeCallbacks, HeadingDeviationCallbacks, NoCallbacks};
pub use config::{ExperimentConfig, RunConfig};
pub use environment::{DrivingEnv, Environment, StepInfo, StepResult};
pub use episode::EpisodeState;
pub use evaluator::{evaluate, StepOutcome};
pub use metrics::EvaluationMetrics;
pub use observation::{Observation, ObservationBuilder, ObservationSpace};
pub use reward::{RewardBreakdown, RewardComputer};
pub use termination::{TerminationFlags, TerminationPolicy};
