//! Experiment directory layout and checkpoint persistence.
//!
//! ```text
//! <dir>/<name>/
//!   checkpoint_000001/           full trainer state
//!   checkpoint_000002/
//!   checkpoint_state_dict.ot     actor weights of the latest checkpoint
//!   result.json                  one JSON object per iteration
//! ```

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::trainer::{IterationResult, Trainer};
use crate::error::ExperimentError;

const CHECKPOINT_PREFIX: &str = "checkpoint_";

/// Raw actor weights written next to every checkpoint.
pub const STATE_DICT_FILE: &str = "checkpoint_state_dict.ot";

pub const RESULT_FILE: &str = "result.json";

/// Decides which checkpoint, if any, a training run starts from.
///
/// * `restore` and `overwrite` together are rejected.
/// * `overwrite` deletes `<directory>/<name>` and starts fresh.
/// * `restore` returns the highest numbered checkpoint.
/// * otherwise the experiment directory must be missing or empty.
pub fn resolve_checkpoint(
    directory: &Path,
    name: &str,
    restore: bool,
    overwrite: bool,
) -> Result<Option<PathBuf>, ExperimentError> {
    if restore && overwrite {
        return Err(ExperimentError::RestoreAndOverwrite);
    }

    let experiment_dir = directory.join(name);
    if overwrite {
        if experiment_dir.exists() {
            warn!(path = %experiment_dir.display(), "removing previous experiment");
            fs::remove_dir_all(&experiment_dir)?;
        }
        return Ok(None);
    }

    if restore {
        let latest = latest_checkpoint(&experiment_dir)?
            .ok_or_else(|| ExperimentError::CheckpointNotFound(experiment_dir.clone()))?;
        info!(checkpoint = %latest.display(), "restoring");
        return Ok(Some(latest));
    }

    if experiment_dir.is_dir() && fs::read_dir(&experiment_dir)?.next().is_some() {
        return Err(ExperimentError::DirectoryNotEmpty(experiment_dir));
    }
    Ok(None)
}

/// Highest numbered `checkpoint_N` directory under `experiment_dir`.
pub fn latest_checkpoint(experiment_dir: &Path) -> Result<Option<PathBuf>, ExperimentError> {
    if !experiment_dir.is_dir() {
        return Ok(None);
    }
    let mut best: Option<(u64, PathBuf)> = None;
    for entry in fs::read_dir(experiment_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(number) = checkpoint_number(&path) else {
            continue;
        };
        if best.as_ref().map_or(true, |(n, _)| number > *n) {
            best = Some((number, path));
        }
    }
    Ok(best.map(|(_, path)| path))
}

fn checkpoint_number(path: &Path) -> Option<u64> {
    path.file_name()?
        .to_str()?
        .strip_prefix(CHECKPOINT_PREFIX)?
        .parse()
        .ok()
}

/// Writes checkpoints and iteration results for one experiment.
#[derive(Debug, Clone)]
pub struct CheckpointWriter {
    experiment_dir: PathBuf,
}

impl CheckpointWriter {
    /// Creates `<directory>/<name>` if needed.
    pub fn create(directory: &Path, name: &str) -> Result<Self, ExperimentError> {
        let experiment_dir = directory.join(name);
        fs::create_dir_all(&experiment_dir)?;
        Ok(Self { experiment_dir })
    }

    pub fn experiment_dir(&self) -> &Path {
        &self.experiment_dir
    }

    pub fn checkpoint_dir(&self, iteration: u64) -> PathBuf {
        self.experiment_dir
            .join(format!("{}{:06}", CHECKPOINT_PREFIX, iteration))
    }

    /// Saves the trainer state for `iteration` and refreshes the state dict.
    pub fn save(
        &self,
        trainer: &mut dyn Trainer,
        iteration: u64,
    ) -> Result<PathBuf, ExperimentError> {
        let dir = self.checkpoint_dir(iteration);
        fs::create_dir_all(&dir)?;
        trainer.save_checkpoint(&dir)?;
        trainer.export_weights(&self.experiment_dir.join(STATE_DICT_FILE))?;
        info!(checkpoint = %dir.display(), "checkpoint saved");
        Ok(dir)
    }

    /// Appends one result line to `result.json`.
    pub fn append_result(&self, result: &IterationResult) -> Result<(), ExperimentError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.experiment_dir.join(RESULT_FILE))?;
        let line = serde_json::to_string(result)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}
