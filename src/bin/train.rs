//! Launches PPO training for the driving experiment.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tch::Device;
use tracing::{info, warn};

use drive_ppo::cli::{auto_worker_count, init_logging, TrainArgs};
use drive_ppo::experiment::{DrivingEnv, HeadingDeviationCallbacks, RunConfig};
use drive_ppo::training::{
    resolve_checkpoint, run_training, CheckpointWriter, PpoTrainer, RolloutWorker, SystemMemory,
};
use drive_ppo::world::KinematicSimulator;

fn build_workers(config: &RunConfig) -> Result<Vec<RolloutWorker<DrivingEnv<KinematicSimulator>>>> {
    (0..=config.num_workers)
        .map(|index| {
            let mut simulator = config.env_config.simulator.clone();
            if let Some(seed) = simulator.seed.as_mut() {
                *seed = seed.wrapping_add(index as u64);
            }
            let env = DrivingEnv::new(
                KinematicSimulator::new(simulator),
                config.env_config.experiment.clone(),
            )
            .with_context(|| format!("failed to create environment for worker {}", index))?;
            Ok(RolloutWorker::new(env, Box::new(HeadingDeviationCallbacks)))
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let args = TrainArgs::parse();

    let mut config = RunConfig::from_yaml_file(&args.configuration_file)
        .with_context(|| format!("failed to load {}", args.configuration_file.display()))?;
    if args.auto {
        config.num_workers = auto_worker_count();
        info!(num_workers = config.num_workers, "sized rollout workers from available cores");
    }

    let directory = args.directory();
    let checkpoint = resolve_checkpoint(&directory, &args.name, args.restore, args.overwrite)?;
    let writer = CheckpointWriter::create(&directory, &args.name)?;
    info!(
        experiment = %writer.experiment_dir().display(),
        framework = %config.framework,
        "starting training"
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current step");
            flag.store(true, Ordering::Relaxed);
        }
    });

    let summary = tokio::task::spawn_blocking(move || -> Result<_> {
        let workers = build_workers(&config)?;
        let device = Device::cuda_if_available();
        let mut trainer = PpoTrainer::new(config.training.clone(), workers, config.explore, device)?;
        let mut memory = SystemMemory::new();
        let summary = run_training(
            &mut trainer,
            &writer,
            checkpoint.as_deref(),
            &config.training,
            &mut memory,
            &shutdown,
        )?;
        Ok(summary)
    })
    .await
    .context("training thread panicked")??;

    info!(
        iterations = summary.iterations,
        reason = %summary.stop_reason,
        checkpoint = ?summary.last_checkpoint,
        "done"
    );
    Ok(())
}
