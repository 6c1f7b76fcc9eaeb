//! Runs a trained driving policy from a checkpoint until interrupted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tch::Device;
use tracing::{info, warn};

use drive_ppo::cli::{init_logging, InferArgs};
use drive_ppo::experiment::{DrivingEnv, Environment, RunConfig};
use drive_ppo::training::{run_inference, PpoTrainer, Trainer};
use drive_ppo::world::KinematicSimulator;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let args = InferArgs::parse();

    let config = RunConfig::from_yaml_file(&args.configuration_file)
        .with_context(|| format!("failed to load {}", args.configuration_file.display()))?
        .into_inference();

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received");
            flag.store(true, Ordering::Relaxed);
        }
    });

    let checkpoint = args.checkpoint;
    let summary = tokio::task::spawn_blocking(move || -> Result<_> {
        let mut env = DrivingEnv::new(
            KinematicSimulator::new(config.env_config.simulator.clone()),
            config.env_config.experiment.clone(),
        )?;
        let shape = env.observation_space().shape;
        let mut trainer: PpoTrainer<DrivingEnv<KinematicSimulator>> =
            PpoTrainer::for_inference(config.training.clone(), shape, Device::cuda_if_available())?;
        trainer
            .restore(&checkpoint)
            .with_context(|| format!("failed to restore {}", checkpoint.display()))?;
        info!(checkpoint = %checkpoint.display(), iteration = trainer.iteration(), "restored policy");

        Ok(run_inference(&mut env, &mut trainer, &shutdown, None)?)
    })
    .await
    .context("inference thread panicked")??;

    info!(steps = summary.steps, episodes = summary.episodes, "inference stopped");
    Ok(())
}
