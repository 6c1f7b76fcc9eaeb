//! PPO trainer.
//!
//! Samples `train_batch_size` steps split across the rollout workers, computes
//! GAE advantages per worker batch, then runs `num_sgd_iter` epochs of
//! shuffled minibatch updates with the clipped surrogate objective.
//! Only available with the `rl-nn` feature.

use std::fs;
use std::path::Path;
use std::sync::atomic::AtomicBool;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tch::{nn, nn::OptimizerConfig, Device, Kind, Tensor};
use tracing::debug;

use super::buffer::{RolloutBuffer, Transition};
use super::rollout::RolloutWorker;
use super::trainer::{IterationResult, LearnerStats, Trainer};
use crate::error::ExperimentError;
use crate::experiment::action::{Action, ACTION_DIM};
use crate::experiment::config::TrainingConfig;
use crate::experiment::environment::Environment;
use crate::experiment::observation::Observation;
use crate::policy::network::batch_observations;
use crate::policy::{NeuralPolicy, Policy};

const STATE_FILE: &str = "trainer_state.json";

/// Counters persisted next to the network weights.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
struct TrainerState {
    iteration: u64,
    timesteps_total: u64,
    episodes_total: u64,
}

/// PPO with a Gaussian actor and a separate critic.
pub struct PpoTrainer<E: Environment> {
    policy: NeuralPolicy,
    actor_opt: nn::Optimizer,
    critic_opt: nn::Optimizer,
    workers: Vec<RolloutWorker<E>>,
    config: TrainingConfig,
    state: TrainerState,
}

impl<E: Environment> PpoTrainer<E> {
    /// Creates a trainer sampling from `workers`, which must be non-empty.
    ///
    /// # Arguments
    ///
    /// * `config` - PPO hyperparameters
    /// * `workers` - Rollout workers; the first one is the local worker
    /// * `explore` - Sample actions (training) or act deterministically
    /// * `device` - Compute device
    pub fn new(
        config: TrainingConfig,
        workers: Vec<RolloutWorker<E>>,
        explore: bool,
        device: Device,
    ) -> Result<Self, ExperimentError> {
        let shape = workers
            .first()
            .map(|w| w.env().observation_space().shape)
            .ok_or_else(|| ExperimentError::InvalidConfig("at least one rollout worker is required".into()))?;
        Self::build(config, workers, shape, explore, device)
    }

    /// Creates a trainer without rollout workers, for restoring a checkpoint
    /// and computing deterministic actions only.
    pub fn for_inference(
        config: TrainingConfig,
        observation_shape: [usize; 3],
        device: Device,
    ) -> Result<Self, ExperimentError> {
        Self::build(config, Vec::new(), observation_shape, false, device)
    }

    fn build(
        config: TrainingConfig,
        workers: Vec<RolloutWorker<E>>,
        shape: [usize; 3],
        explore: bool,
        device: Device,
    ) -> Result<Self, ExperimentError> {
        let mut policy = NeuralPolicy::new(shape, device)?;
        policy.set_explore(explore);
        let actor_opt = nn::Adam::default().build(policy.actor_mut().var_store_mut(), config.lr)?;
        let critic_opt = nn::Adam::default().build(policy.critic_mut().var_store_mut(), config.lr)?;

        Ok(Self {
            policy,
            actor_opt,
            critic_opt,
            workers,
            config,
            state: TrainerState::default(),
        })
    }

    /// Runs the PPO epochs over `batches` and returns the mean losses.
    fn update(&mut self, batches: &[RolloutBuffer]) -> LearnerStats {
        let samples: Vec<(&Transition, f64, f64)> = batches
            .iter()
            .flat_map(|b| {
                b.transitions
                    .iter()
                    .zip(b.advantages.iter().copied())
                    .zip(b.returns.iter().copied())
                    .map(|((t, adv), ret)| (t, adv, ret))
            })
            .collect();
        if samples.is_empty() {
            return LearnerStats::default();
        }

        let device = self.policy.device();
        let minibatch = self.config.sgd_minibatch_size.max(1);
        let mut indices: Vec<usize> = (0..samples.len()).collect();
        let mut rng = rand::thread_rng();

        let mut stats = LearnerStats::default();
        let mut n_updates = 0usize;

        for _ in 0..self.config.num_sgd_iter {
            indices.shuffle(&mut rng);
            for chunk in indices.chunks(minibatch) {
                let observations: Vec<&Observation> = chunk.iter().map(|&i| &samples[i].0.observation).collect();
                let obs = batch_observations(&observations, device);
                let actions: Vec<f32> = chunk.iter().flat_map(|&i| samples[i].0.action).collect();
                let actions = Tensor::from_slice(&actions)
                    .reshape([chunk.len() as i64, ACTION_DIM as i64])
                    .to_device(device);
                let old_log_probs = Self::column(chunk, |i| samples[i].0.log_prob, device);
                let advantages = Self::column(chunk, |i| samples[i].1, device);
                let returns = Self::column(chunk, |i| samples[i].2, device);

                let new_log_probs = self.policy.actor().log_prob(&obs, &actions);
                let ratio = (&new_log_probs - &old_log_probs).exp();
                let surr1 = &ratio * &advantages;
                let surr2 = ratio.clamp(1.0 - self.config.clip_param, 1.0 + self.config.clip_param)
                    * &advantages;
                let policy_loss = -surr1.min_other(&surr2).mean(Kind::Float);
                let entropy = self.policy.actor().entropy();
                let actor_total = &policy_loss - self.config.entropy_coeff * &entropy;

                self.actor_opt.zero_grad();
                actor_total.backward();
                if let Some(clip) = self.config.grad_clip {
                    self.actor_opt.clip_grad_norm(clip);
                }
                self.actor_opt.step();

                let values = self.policy.critic().forward(&obs);
                let vf_loss = (&values - &returns).pow_tensor_scalar(2).mean(Kind::Float);
                let critic_total = &vf_loss * self.config.vf_loss_coeff;

                self.critic_opt.zero_grad();
                critic_total.backward();
                if let Some(clip) = self.config.grad_clip {
                    self.critic_opt.clip_grad_norm(clip);
                }
                self.critic_opt.step();

                stats.policy_loss += policy_loss.double_value(&[]);
                stats.vf_loss += vf_loss.double_value(&[]);
                stats.entropy += entropy.double_value(&[]);
                n_updates += 1;
            }
        }

        if n_updates > 0 {
            let n = n_updates as f64;
            stats.policy_loss /= n;
            stats.vf_loss /= n;
            stats.entropy /= n;
        }
        stats
    }

    fn column(chunk: &[usize], value: impl Fn(usize) -> f64, device: Device) -> Tensor {
        let data: Vec<f32> = chunk.iter().map(|&i| value(i) as f32).collect();
        Tensor::from_slice(&data).to_device(device)
    }
}

impl<E: Environment> Trainer for PpoTrainer<E> {
    fn train_iteration(&mut self, shutdown: &AtomicBool) -> Result<IterationResult, ExperimentError> {
        let n_workers = self.workers.len();
        if n_workers == 0 {
            return Err(ExperimentError::InvalidConfig("training requires a rollout worker".into()));
        }
        let per_worker = self.config.train_batch_size.div_ceil(n_workers);

        let mut batches = Vec::with_capacity(n_workers);
        let mut episodes = Vec::new();
        for worker in &mut self.workers {
            let mut batch = worker.sample(&mut self.policy, per_worker, shutdown)?;
            batch.compute_advantages(self.config.gamma, self.config.lambda);
            batch.normalize_advantages();
            episodes.extend(worker.drain_completed());
            batches.push(batch);
        }

        let timesteps: usize = batches.iter().map(|b| b.len()).sum();
        let learner = self.update(&batches);

        self.state.iteration += 1;
        self.state.timesteps_total += timesteps as u64;
        self.state.episodes_total += episodes.len() as u64;
        debug!(
            iteration = self.state.iteration,
            policy_loss = learner.policy_loss,
            vf_loss = learner.vf_loss,
            "ppo update"
        );

        let mut result = IterationResult {
            training_iteration: self.state.iteration,
            timesteps_total: self.state.timesteps_total,
            timesteps_this_iter: timesteps as u64,
            episodes_total: self.state.episodes_total,
            learner,
            ..IterationResult::default()
        };
        result.record_episodes(&episodes);
        Ok(result)
    }

    fn save_checkpoint(&mut self, dir: &Path) -> Result<(), ExperimentError> {
        self.policy.save(dir)?;
        fs::write(dir.join(STATE_FILE), serde_json::to_string_pretty(&self.state)?)?;
        Ok(())
    }

    fn restore(&mut self, checkpoint: &Path) -> Result<(), ExperimentError> {
        self.policy.load(checkpoint)?;
        let state_file = checkpoint.join(STATE_FILE);
        if state_file.is_file() {
            self.state = serde_json::from_str(&fs::read_to_string(state_file)?)?;
        }
        Ok(())
    }

    fn export_weights(&self, path: &Path) -> Result<(), ExperimentError> {
        self.policy.export_actor(path)
    }

    fn compute_action(&mut self, observation: &Observation) -> Action {
        self.policy.act(observation).action
    }

    fn iteration(&self) -> u64 {
        self.state.iteration
    }
}
