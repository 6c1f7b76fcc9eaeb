use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building, running or persisting a driving experiment.
#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed configuration file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Malformed JSON document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Sensor of type {0:?} not supported")]
    UnsupportedSensor(String),

    #[error("Simulator error: {0}")]
    Simulator(String),

    #[error("Both 'overwrite' and 'restore' cannot be set at the same time")]
    RestoreAndOverwrite,

    #[error(
        "The directory where you are trying to train ({0}) is not empty. \
         Use an empty or non-existing folder, or pass '--overwrite' to remove its contents"
    )]
    DirectoryNotEmpty(PathBuf),

    #[error("No checkpoint found under {0}")]
    CheckpointNotFound(PathBuf),

    #[cfg(feature = "rl-nn")]
    #[error("Torch error: {0}")]
    Torch(#[from] tch::TchError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_sensor_display() {
        let e = ExperimentError::UnsupportedSensor("sensor.camera.thermal".to_string());
        assert_eq!(
            e.to_string(),
            "Sensor of type \"sensor.camera.thermal\" not supported"
        );
    }

    #[test]
    fn directory_not_empty_names_path() {
        let e = ExperimentError::DirectoryNotEmpty(PathBuf::from("/tmp/runs/ppo"));
        assert!(e.to_string().contains("/tmp/runs/ppo"));
        assert!(e.to_string().contains("--overwrite"));
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let e: ExperimentError = io.into();
        assert!(matches!(e, ExperimentError::Io(_)));
    }
}
