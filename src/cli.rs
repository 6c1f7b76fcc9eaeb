//! Command-line arguments and logging setup shared by the `train` and
//! `infer` binaries.

use std::env;
use std::path::PathBuf;
use std::thread;

use clap::Parser;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

pub const DEFAULT_EXPERIMENT_NAME: &str = "ppo_implementation";
const DEFAULT_RESULTS_SUBDIR: &str = "ray_results/carla_rllib";
const DEFAULT_LOG_FILTER: &str = "drive_ppo=info,info";

/// Train a PPO driving agent.
#[derive(Debug, Parser)]
#[command(name = "train", version)]
pub struct TrainArgs {
    /// Experiment configuration file (YAML).
    pub configuration_file: PathBuf,

    /// Directory under which experiments are saved.
    /// Defaults to `~/ray_results/carla_rllib`.
    #[arg(short = 'd', long)]
    pub directory: Option<PathBuf>,

    /// Experiment name.
    #[arg(short = 'n', long, default_value = DEFAULT_EXPERIMENT_NAME)]
    pub name: String,

    /// Resume from the latest checkpoint of the experiment.
    #[arg(long, conflicts_with = "overwrite")]
    pub restore: bool,

    /// Delete an existing experiment with the same name.
    #[arg(long)]
    pub overwrite: bool,

    /// Size the number of rollout workers from the available cores.
    #[arg(long)]
    pub auto: bool,
}

impl TrainArgs {
    /// The experiments directory, falling back to `$HOME/ray_results/carla_rllib`.
    pub fn directory(&self) -> PathBuf {
        self.directory.clone().unwrap_or_else(default_results_dir)
    }
}

/// Run a trained driving agent.
#[derive(Debug, Parser)]
#[command(name = "infer", version)]
pub struct InferArgs {
    /// Experiment configuration file (YAML).
    pub configuration_file: PathBuf,

    /// Checkpoint directory to restore.
    pub checkpoint: PathBuf,
}

fn default_results_dir() -> PathBuf {
    env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_RESULTS_SUBDIR)
}

/// Extra rollout workers for `--auto`: one per core, minus the driver.
pub fn auto_worker_count() -> usize {
    thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(0)
}

/// Installs the global tracing subscriber. `RUST_LOG` overrides the default filter.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::warn!("a global tracing subscriber was already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn train_defaults() {
        let args = TrainArgs::try_parse_from(["train", "exp.yaml"]).unwrap();
        assert_eq!(args.configuration_file, PathBuf::from("exp.yaml"));
        assert_eq!(args.name, DEFAULT_EXPERIMENT_NAME);
        assert!(!args.restore && !args.overwrite && !args.auto);
        assert!(args.directory().ends_with("ray_results/carla_rllib"));
    }

    #[test]
    fn train_flags() {
        let args = TrainArgs::try_parse_from([
            "train", "exp.yaml", "-d", "/tmp/runs", "-n", "town01", "--restore", "--auto",
        ])
        .unwrap();
        assert_eq!(args.directory(), PathBuf::from("/tmp/runs"));
        assert_eq!(args.name, "town01");
        assert!(args.restore && args.auto);
    }

    #[test]
    fn restore_and_overwrite_conflict() {
        assert!(TrainArgs::try_parse_from(["train", "exp.yaml", "--restore", "--overwrite"]).is_err());
    }

    #[test]
    fn infer_requires_checkpoint() {
        assert!(InferArgs::try_parse_from(["infer", "exp.yaml"]).is_err());
        let args = InferArgs::try_parse_from(["infer", "exp.yaml", "ckpt"]).unwrap();
        assert_eq!(args.checkpoint, PathBuf::from("ckpt"));
    }
}
