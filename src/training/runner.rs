//! Training and inference loops driven by the launchers.
//!
//! Both loops are blocking and poll a shared shutdown flag between steps or
//! iterations; the binaries run them on a blocking thread and set the flag
//! on Ctrl-C.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::info;

use super::checkpoint::CheckpointWriter;
use super::stop::{MemoryProbe, StopCondition, StopReason};
use super::trainer::Trainer;
use crate::error::ExperimentError;
use crate::experiment::config::TrainingConfig;
use crate::experiment::environment::Environment;

/// How a training run ended.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSummary {
    pub iterations: u64,
    pub stop_reason: StopReason,
    pub last_checkpoint: Option<PathBuf>,
}

/// Trains until a stop condition is met or `shutdown` is set.
///
/// Every iteration result is appended to the experiment's `result.json`.
/// A checkpoint is written every `checkpoint_freq` iterations and, when
/// `checkpoint_at_end` is set or the run was interrupted, once more at the
/// end unless the last iteration was already saved.
pub fn run_training(
    trainer: &mut dyn Trainer,
    writer: &CheckpointWriter,
    restore_from: Option<&Path>,
    training: &TrainingConfig,
    memory: &mut dyn MemoryProbe,
    shutdown: &AtomicBool,
) -> Result<TrainingSummary, ExperimentError> {
    if let Some(checkpoint) = restore_from {
        trainer.restore(checkpoint)?;
        info!(iteration = trainer.iteration(), "restored trainer");
    }

    let stop = StopCondition::new(training.stop.clone());
    let mut last_checkpoint = None;
    let mut last_saved_iteration = None;

    let stop_reason = loop {
        if shutdown.load(Ordering::Relaxed) {
            break StopReason::Interrupted;
        }

        let started = Instant::now();
        let mut result = trainer.train_iteration(shutdown)?;
        result.ram_util_percent = memory.ram_util_percent();
        result.time_this_iter_s = started.elapsed().as_secs_f64();
        writer.append_result(&result)?;

        info!(
            iteration = result.training_iteration,
            timesteps = result.timesteps_total,
            episodes = result.episodes_this_iter,
            reward_mean = result.episode_reward_mean.unwrap_or(f64::NAN),
            ram_util_percent = result.ram_util_percent,
            "iteration finished"
        );

        let iteration = result.training_iteration;
        if training.checkpoint_freq > 0 && iteration % training.checkpoint_freq == 0 {
            last_checkpoint = Some(writer.save(trainer, iteration)?);
            last_saved_iteration = Some(iteration);
        }

        if shutdown.load(Ordering::Relaxed) {
            break StopReason::Interrupted;
        }
        if let Some(reason) = stop.check(&result) {
            break reason;
        }
    };

    let iterations = trainer.iteration();
    let wants_final = training.checkpoint_at_end || stop_reason == StopReason::Interrupted;
    if wants_final && iterations > 0 && last_saved_iteration != Some(iterations) {
        last_checkpoint = Some(writer.save(trainer, iterations)?);
    }

    info!(reason = %stop_reason, iterations, "training stopped");
    Ok(TrainingSummary {
        iterations,
        stop_reason,
        last_checkpoint,
    })
}

/// Counters reported by [`run_inference`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InferenceSummary {
    pub steps: u64,
    pub episodes: u64,
}

/// Drives `env` with the trainer's policy until `shutdown` is set, resetting
/// after every finished episode. `max_steps` bounds the loop when given.
pub fn run_inference(
    env: &mut dyn Environment,
    trainer: &mut dyn Trainer,
    shutdown: &AtomicBool,
    max_steps: Option<u64>,
) -> Result<InferenceSummary, ExperimentError> {
    let mut summary = InferenceSummary::default();
    let mut observation = env.reset()?;
    let mut episode_reward = 0.0;

    while !shutdown.load(Ordering::Relaxed) && max_steps.map_or(true, |m| summary.steps < m) {
        let action = trainer.compute_action(&observation);
        let result = env.step(&action)?;
        summary.steps += 1;
        episode_reward += result.reward;

        if result.done {
            summary.episodes += 1;
            info!(
                episode = summary.episodes,
                reward = episode_reward,
                reasons = %result.info.flags,
                "inference episode finished"
            );
            episode_reward = 0.0;
            observation = env.reset()?;
        } else {
            observation = result.observation;
        }
    }
    Ok(summary)
}
