//! Sample batches collected by a rollout worker.

use crate::experiment::action::Action;
use crate::experiment::observation::Observation;

/// A single transition stored in the buffer.
#[derive(Debug, Clone)]
pub struct Transition {
    /// Observation the action was selected for.
    pub observation: Observation,
    /// Raw (unclipped) policy action.
    pub action: Action,
    pub reward: f64,
    /// Log-probability of `action` under the behaviour policy.
    pub log_prob: f64,
    /// Critic estimate for `observation`.
    pub value: f64,
    /// Whether this was the last step of the episode.
    pub done: bool,
}

/// Rollout buffer that stores transitions for PPO updates.
///
/// Holds one contiguous sample batch, possibly spanning several episodes and
/// ending in the middle of one. `last_value` is the critic estimate of the
/// observation following the final transition and bootstraps the advantage
/// of an unfinished episode.
#[derive(Debug, Default)]
pub struct RolloutBuffer {
    pub transitions: Vec<Transition>,
    /// Value of the observation after the last transition (`0` if it ended an episode).
    pub last_value: f64,
    /// Computed advantages (populated by GAE).
    pub advantages: Vec<f64>,
    /// Computed returns (populated by GAE).
    pub returns: Vec<f64>,
}

impl RolloutBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, transition: Transition) {
        self.transitions.push(transition);
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Computes GAE advantages and returns for the stored transitions.
    pub fn compute_advantages(&mut self, gamma: f64, lambda: f64) {
        let rewards: Vec<f64> = self.transitions.iter().map(|t| t.reward).collect();
        let values: Vec<f64> = self.transitions.iter().map(|t| t.value).collect();
        let dones: Vec<bool> = self.transitions.iter().map(|t| t.done).collect();
        let (advantages, returns) =
            super::gae::compute_gae(&rewards, &values, &dones, self.last_value, gamma, lambda);
        self.advantages = advantages;
        self.returns = returns;
    }

    /// Rescales the advantages to zero mean and unit variance.
    pub fn normalize_advantages(&mut self) {
        let n = self.advantages.len() as f64;
        if n == 0.0 {
            return;
        }
        let mean = self.advantages.iter().sum::<f64>() / n;
        let var = self.advantages.iter().map(|a| (a - mean) * (a - mean)).sum::<f64>() / n;
        let scale = (var + 1e-8).sqrt().recip();
        self.advantages.iter_mut().for_each(|a| *a = (*a - mean) * scale);
    }
}
