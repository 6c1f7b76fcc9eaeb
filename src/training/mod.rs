//! Training infrastructure: rollout collection, GAE, the PPO trainer,
//! checkpoints and the launch loops.

pub mod buffer;
pub mod checkpoint;
pub mod gae;
#[cfg(feature = "rl-nn")]
pub mod ppo;
pub mod rollout;
pub mod runner;
pub mod stop;
pub mod trainer;

pub use checkpoint::{resolve_checkpoint, CheckpointWriter};
#[cfg(feature = "rl-nn")]
pub use ppo::PpoTrainer;
pub use rollout::RolloutWorker;
pub use runner::{run_inference, run_training, InferenceSummary, TrainingSummary};
pub use stop::{StopCondition, StopReason, SystemMemory};
pub use trainer::{IterationResult, Trainer};
