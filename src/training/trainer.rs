//! Trainer seam and per-iteration results.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::AtomicBool;

use serde::{Deserialize, Serialize};

use crate::error::ExperimentError;
use crate::experiment::action::Action;
use crate::experiment::callbacks::Episode;
use crate::experiment::observation::Observation;

/// Losses reported by the learner for one iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LearnerStats {
    pub policy_loss: f64,
    pub vf_loss: f64,
    pub entropy: f64,
}

/// Summary of one training iteration, written as one line of `result.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IterationResult {
    pub training_iteration: u64,
    pub timesteps_total: u64,
    pub timesteps_this_iter: u64,
    pub episodes_total: u64,
    pub episodes_this_iter: u64,
    /// `None` when no episode finished during the iteration.
    pub episode_reward_mean: Option<f64>,
    pub episode_reward_min: Option<f64>,
    pub episode_reward_max: Option<f64>,
    pub episode_len_mean: Option<f64>,
    /// Mean of every custom metric over the finished episodes, keyed `<name>_mean`.
    pub custom_metrics: BTreeMap<String, f64>,
    pub learner: LearnerStats,
    /// Filled in by the runner after the iteration.
    pub ram_util_percent: f64,
    pub time_this_iter_s: f64,
}

impl IterationResult {
    /// Fills the episode statistics from the episodes finished this iteration.
    pub fn record_episodes(&mut self, episodes: &[Episode]) {
        self.episodes_this_iter = episodes.len() as u64;
        if episodes.is_empty() {
            return;
        }
        let n = episodes.len() as f64;
        let rewards = episodes.iter().map(|e| e.total_reward);
        self.episode_reward_mean = Some(rewards.clone().sum::<f64>() / n);
        self.episode_reward_min = rewards.clone().reduce(f64::min);
        self.episode_reward_max = rewards.reduce(f64::max);
        self.episode_len_mean = Some(episodes.iter().map(|e| e.length as f64).sum::<f64>() / n);

        let mut sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
        for episode in episodes {
            for (name, value) in &episode.custom_metrics {
                let entry = sums.entry(name.as_str()).or_insert((0.0, 0));
                entry.0 += value;
                entry.1 += 1;
            }
        }
        self.custom_metrics = sums
            .into_iter()
            .map(|(name, (sum, count))| (format!("{}_mean", name), sum / count as f64))
            .collect();
    }
}

/// A learner that can be trained iteratively, checkpointed and queried.
pub trait Trainer {
    /// Samples one train batch, updates the policy and reports the iteration.
    fn train_iteration(&mut self, shutdown: &AtomicBool) -> Result<IterationResult, ExperimentError>;

    /// Writes the full trainer state into the (existing) directory `dir`.
    fn save_checkpoint(&mut self, dir: &Path) -> Result<(), ExperimentError>;

    /// Restores state written by [`Trainer::save_checkpoint`].
    fn restore(&mut self, checkpoint: &Path) -> Result<(), ExperimentError>;

    /// Writes the bare policy weights to `path`.
    fn export_weights(&self, path: &Path) -> Result<(), ExperimentError>;

    /// Action for `observation` under the current policy.
    fn compute_action(&mut self, observation: &Observation) -> Action;

    /// Number of completed training iterations.
    fn iteration(&self) -> u64;
}
