//! Rollout collection.
//!
//! A [`RolloutWorker`] owns one environment and keeps its episode running
//! across calls to [`RolloutWorker::sample`], so sample batches may start
//! and end in the middle of an episode.

use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use super::buffer::{RolloutBuffer, Transition};
use crate::error::ExperimentError;
use crate::experiment::callbacks::{Episode, EpisodeCallbacks};
use crate::experiment::environment::Environment;
use crate::experiment::observation::Observation;
use crate::policy::Policy;

/// Steps one environment with a policy and records transitions.
pub struct RolloutWorker<E: Environment> {
    env: E,
    callbacks: Box<dyn EpisodeCallbacks>,
    /// Observation to act on next; `None` when a new episode must be started.
    observation: Option<Observation>,
    episode: Episode,
    next_episode_id: u64,
    completed: Vec<Episode>,
}

impl<E: Environment> RolloutWorker<E> {
    pub fn new(env: E, callbacks: Box<dyn EpisodeCallbacks>) -> Self {
        Self {
            env,
            callbacks,
            observation: None,
            episode: Episode::default(),
            next_episode_id: 0,
            completed: Vec::new(),
        }
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    /// Collects up to `n_steps` transitions with `policy`.
    ///
    /// Stops early, with a possibly short buffer, once `shutdown` is set.
    pub fn sample(
        &mut self,
        policy: &mut dyn Policy,
        n_steps: usize,
        shutdown: &AtomicBool,
    ) -> Result<RolloutBuffer, ExperimentError> {
        let mut buffer = RolloutBuffer::new();

        for _ in 0..n_steps {
            if shutdown.load(Ordering::Relaxed) {
                debug!(steps = buffer.len(), "sampling interrupted");
                break;
            }

            let observation = match self.observation.take() {
                Some(observation) => observation,
                None => self.start_episode()?,
            };

            let output = policy.act(&observation);
            let result = self.env.step(&output.action)?;

            self.episode.record_step(result.reward);
            self.callbacks.on_episode_step(&mut self.episode, &result.info);

            buffer.add(Transition {
                observation,
                action: output.action,
                reward: result.reward,
                log_prob: output.log_prob,
                value: output.value,
                done: result.done,
            });

            if result.done {
                self.finish_episode();
            } else {
                self.observation = Some(result.observation);
            }
        }

        buffer.last_value = match &self.observation {
            Some(observation) => policy.value(observation),
            None => 0.0,
        };
        Ok(buffer)
    }

    /// Takes the episodes completed since the last call.
    pub fn drain_completed(&mut self) -> Vec<Episode> {
        mem::take(&mut self.completed)
    }

    fn start_episode(&mut self) -> Result<Observation, ExperimentError> {
        let observation = self.env.reset()?;
        self.episode = Episode::new(self.next_episode_id);
        self.next_episode_id += 1;
        self.callbacks.on_episode_start(&mut self.episode);
        Ok(observation)
    }

    fn finish_episode(&mut self) {
        self.callbacks.on_episode_end(&mut self.episode);
        self.completed.push(mem::take(&mut self.episode));
    }
}
