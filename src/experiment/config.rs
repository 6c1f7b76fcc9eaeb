//! Configuration for the driving experiment, the simulator and training.
//!
//! Everything is read from one YAML file. Only the hero sensors are
//! mandatory; every other field falls back to the defaults below.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ExperimentError;

/// Names of the three cameras stacked into the observation.
pub const FRONT_CAMERA: &str = "cam_sem_seg_front";
pub const LEFT_CAMERA: &str = "cam_sem_seg_left";
pub const RIGHT_CAMERA: &str = "cam_sem_seg_right";

/// Largest supported frame-stack depth.
pub const MAX_FRAMESTACK: usize = 4;

/// Root of the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Deep-learning backend name, kept for compatibility with existing files.
    #[serde(default = "default_framework")]
    pub framework: String,
    /// Rollout workers in addition to the driver.
    #[serde(default)]
    pub num_workers: usize,
    /// Sample actions stochastically (training) or take the mean (inference).
    #[serde(default = "default_true")]
    pub explore: bool,
    #[serde(default)]
    pub training: TrainingConfig,
    pub env_config: EnvConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvConfig {
    #[serde(default)]
    pub simulator: SimulatorConfig,
    pub experiment: ExperimentConfig,
}

/// Experiment-specific settings: hero sensors, episode limits and reward shaping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub hero: HeroConfig,
    #[serde(default)]
    pub others: OthersConfig,
    #[serde(default)]
    pub reward: RewardConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeroConfig {
    #[serde(default = "default_blueprint")]
    pub blueprint: String,
    pub sensors: BTreeMap<String, SensorConfig>,
}

/// One entry under `hero.sensors`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorConfig {
    #[serde(rename = "type", default)]
    pub type_name: String,
    #[serde(default)]
    pub image_size_x: Option<usize>,
    #[serde(default)]
    pub image_size_y: Option<usize>,
    #[serde(default)]
    pub fov: Option<f64>,
    /// Mounting yaw in degrees relative to the hero.
    #[serde(default)]
    pub yaw: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OthersConfig {
    /// Number of consecutive frames stacked into one observation.
    #[serde(default = "default_framestack")]
    pub framestack: usize,
    /// Steps below the idle speed before the episode ends.
    #[serde(default = "default_max_time_idle")]
    pub max_time_idle: u32,
    /// Steps before the episode ends successfully.
    #[serde(default = "default_max_time_episode")]
    pub max_time_episode: u32,
}

impl Default for OthersConfig {
    fn default() -> Self {
        Self {
            framestack: default_framestack(),
            max_time_idle: default_max_time_idle(),
            max_time_episode: default_max_time_episode(),
        }
    }
}

/// Reward shaping constants. Penalties are stored with their sign.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// Target cruising speed in km/h.
    pub max_speed: f64,
    /// Radius in meters within which obstacles slow the optimal speed.
    pub max_reactive_distance: f64,
    /// Speed in km/h at or above which the hero counts as moving.
    pub idle_speed_threshold: f64,
    /// Weight of the speed increase term.
    pub acceleration_coef: f64,
    /// Hero is outside any allowed lane.
    pub off_lane_penalty: f64,
    /// Hero faces against the lane direction.
    pub wrong_way_penalty: f64,
    /// Hero steers further away while already misaligned.
    pub steer_away_penalty: f64,
    /// `|sin(deviation)|` above which the steer-away penalty applies.
    pub steer_away_threshold: f64,
    /// Height below which the hero is considered fallen off the map.
    pub falling_height: f64,
    pub falling_penalty: f64,
    pub idle_penalty: f64,
    pub episode_timeout_bonus: f64,
    pub collision_penalty: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            max_speed: 20.0,
            max_reactive_distance: 6.0,
            idle_speed_threshold: 1.0,
            acceleration_coef: 0.05,
            off_lane_penalty: -0.5,
            wrong_way_penalty: -0.5,
            steer_away_penalty: -0.05,
            steer_away_threshold: 0.4,
            falling_height: -0.5,
            falling_penalty: -40.0,
            idle_penalty: -100.0,
            episode_timeout_bonus: 100.0,
            collision_penalty: -100.0,
        }
    }
}

/// Settings for the kinematic road simulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Simulated seconds per tick.
    pub timestep: f64,
    /// Seed for spawn randomisation; `None` draws one from the OS.
    pub seed: Option<u64>,
    pub road: RoadConfig,
    pub traffic: TrafficConfig,
    pub vehicle: VehicleDynamicsConfig,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            timestep: 0.05,
            seed: None,
            road: RoadConfig::default(),
            traffic: TrafficConfig::default(),
            vehicle: VehicleDynamicsConfig::default(),
        }
    }
}

/// Straight road along `+x` starting at `x = 0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoadConfig {
    pub length: f64,
    /// Driving lanes, all heading `+x`.
    pub lanes: usize,
    pub lane_width: f64,
    /// Adds a parking lane on the right edge.
    pub parking_lane: bool,
    /// Sidewalk on both sides of the carriageway.
    pub sidewalk_width: f64,
    /// `[start, end]` x ranges flagged as junctions.
    pub junctions: Vec<[f64; 2]>,
    /// x positions of traffic lights.
    pub traffic_lights: Vec<f64>,
    /// A traffic light affects the hero when it is at most this far ahead.
    pub traffic_light_range: f64,
}

impl Default for RoadConfig {
    fn default() -> Self {
        Self {
            length: 1000.0,
            lanes: 2,
            lane_width: 3.5,
            parking_lane: false,
            sidewalk_width: 2.0,
            junctions: Vec::new(),
            traffic_lights: Vec::new(),
            traffic_light_range: 20.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficConfig {
    /// Background vehicles spawned on random driving lanes ahead of the hero.
    pub n_vehicles: usize,
    /// Background vehicle cruising speed in km/h.
    pub vehicle_speed: f64,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            n_vehicles: 0,
            vehicle_speed: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleDynamicsConfig {
    /// Acceleration at full throttle, m/s².
    pub max_acceleration: f64,
    /// Deceleration at full brake, m/s².
    pub max_deceleration: f64,
    /// Front wheel angle at full steer, degrees.
    pub max_steer_angle: f64,
    pub wheelbase: f64,
    /// Linear drag coefficient, 1/s.
    pub drag: f64,
}

impl Default for VehicleDynamicsConfig {
    fn default() -> Self {
        Self {
            max_acceleration: 4.0,
            max_deceleration: 8.0,
            max_steer_angle: 35.0,
            wheelbase: 2.9,
            drag: 0.05,
        }
    }
}

/// PPO hyperparameters and run control.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub lr: f64,
    pub gamma: f64,
    /// GAE λ.
    pub lambda: f64,
    pub clip_param: f64,
    pub vf_loss_coeff: f64,
    pub entropy_coeff: f64,
    /// SGD epochs over each train batch.
    pub num_sgd_iter: usize,
    /// Environment steps collected per training iteration.
    pub train_batch_size: usize,
    pub sgd_minibatch_size: usize,
    pub grad_clip: Option<f64>,
    /// Checkpoint every N iterations (0 disables periodic checkpoints).
    pub checkpoint_freq: u64,
    pub checkpoint_at_end: bool,
    pub stop: StopConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            lr: 5e-5,
            gamma: 0.99,
            lambda: 0.95,
            clip_param: 0.3,
            vf_loss_coeff: 1.0,
            entropy_coeff: 0.0,
            num_sgd_iter: 10,
            train_batch_size: 4000,
            sgd_minibatch_size: 128,
            grad_clip: None,
            checkpoint_freq: 1,
            checkpoint_at_end: true,
            stop: StopConfig::default(),
        }
    }
}

/// Conditions that end the outer training loop. Any one is sufficient.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StopConfig {
    pub ram_util_percent: Option<f64>,
    pub training_iteration: Option<u64>,
    pub timesteps_total: Option<u64>,
}

impl Default for StopConfig {
    fn default() -> Self {
        Self {
            ram_util_percent: Some(85.0),
            training_iteration: None,
            timesteps_total: None,
        }
    }
}

impl RunConfig {
    /// Reads and validates a YAML configuration file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ExperimentError> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Parses and validates a YAML document.
    pub fn from_yaml_str(text: &str) -> Result<Self, ExperimentError> {
        let config: RunConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Adjusts a training configuration for single-process deterministic inference.
    pub fn into_inference(mut self) -> Self {
        self.num_workers = 0;
        self.explore = false;
        self
    }

    pub fn validate(&self) -> Result<(), ExperimentError> {
        self.env_config.experiment.validate()?;
        self.env_config.simulator.validate()?;
        self.training.validate()
    }
}

impl ExperimentConfig {
    pub fn validate(&self) -> Result<(), ExperimentError> {
        let mut size = None;
        for name in [FRONT_CAMERA, LEFT_CAMERA, RIGHT_CAMERA] {
            let sensor = self.hero.sensors.get(name).ok_or_else(|| {
                ExperimentError::InvalidConfig(format!("missing hero sensor '{}'", name))
            })?;
            let this = (sensor.image_size_x, sensor.image_size_y);
            match size {
                None => size = Some(this),
                Some(first) if first != this => {
                    return Err(ExperimentError::InvalidConfig(format!(
                        "camera '{}' size differs from '{}'",
                        name, FRONT_CAMERA
                    )))
                }
                Some(_) => {}
            }
        }

        if self.others.framestack == 0 || self.others.framestack > MAX_FRAMESTACK {
            return Err(ExperimentError::InvalidConfig(format!(
                "framestack must be within 1..={}, got {}",
                MAX_FRAMESTACK, self.others.framestack
            )));
        }
        self.reward.validate()
    }

    /// `(image_size_x, image_size_y)` of the stacked cameras.
    pub fn camera_size(&self) -> (usize, usize) {
        self.hero
            .sensors
            .get(FRONT_CAMERA)
            .map(|s| (s.image_size_x.unwrap_or(0), s.image_size_y.unwrap_or(0)))
            .unwrap_or((0, 0))
    }
}

impl RewardConfig {
    pub fn validate(&self) -> Result<(), ExperimentError> {
        if !(self.max_speed > 0.0) {
            return Err(ExperimentError::InvalidConfig(format!(
                "reward.max_speed must be positive, got {}",
                self.max_speed
            )));
        }
        if !(self.max_reactive_distance > 1.0) {
            return Err(ExperimentError::InvalidConfig(format!(
                "reward.max_reactive_distance must exceed 1, got {}",
                self.max_reactive_distance
            )));
        }
        Ok(())
    }
}

impl SimulatorConfig {
    pub fn validate(&self) -> Result<(), ExperimentError> {
        if !(self.timestep > 0.0) {
            return Err(ExperimentError::InvalidConfig(
                "simulator.timestep must be positive".into(),
            ));
        }
        if self.road.lanes == 0 || !(self.road.lane_width > 0.0) || !(self.road.length > 0.0) {
            return Err(ExperimentError::InvalidConfig(
                "simulator.road needs at least one lane, a positive lane_width and length".into(),
            ));
        }
        if !(self.vehicle.wheelbase > 0.0) {
            return Err(ExperimentError::InvalidConfig(
                "simulator.vehicle.wheelbase must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<(), ExperimentError> {
        if self.train_batch_size == 0 || self.sgd_minibatch_size == 0 {
            return Err(ExperimentError::InvalidConfig(
                "training batch sizes must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.gamma) || !(0.0..=1.0).contains(&self.lambda) {
            return Err(ExperimentError::InvalidConfig(
                "training.gamma and training.lambda must lie in [0, 1]".into(),
            ));
        }
        Ok(())
    }
}

fn default_framework() -> String {
    "torch".to_string()
}

fn default_true() -> bool {
    true
}

fn default_blueprint() -> String {
    "vehicle.lincoln.mkz_2017".to_string()
}

fn default_framestack() -> usize {
    1
}

fn default_max_time_idle() -> u32 {
    100
}

fn default_max_time_episode() -> u32 {
    6400
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const MINIMAL_YAML: &str = r#"
env_config:
  experiment:
    hero:
      sensors:
        cam_sem_seg_front:
          type: sensor.camera.semantic_segmentation
          image_size_x: 16
          image_size_y: 12
        cam_sem_seg_left:
          type: sensor.camera.semantic_segmentation
          image_size_x: 16
          image_size_y: 12
          yaw: -60.0
        cam_sem_seg_right:
          type: sensor.camera.semantic_segmentation
          image_size_x: 16
          image_size_y: 12
          yaw: 60.0
        collision:
          type: sensor.other.collision
    others:
      framestack: 2
      max_time_idle: 5
      max_time_episode: 50
"#;

    pub(crate) fn minimal_config() -> RunConfig {
        RunConfig::from_yaml_str(MINIMAL_YAML).unwrap()
    }

    #[test]
    fn minimal_file_uses_defaults() {
        let cfg = minimal_config();
        assert_eq!(cfg.framework, "torch");
        assert!(cfg.explore);
        assert_eq!(cfg.env_config.experiment.others.framestack, 2);
        assert_eq!(cfg.env_config.experiment.reward.max_speed, 20.0);
        assert_eq!(cfg.env_config.experiment.reward.max_reactive_distance, 6.0);
        assert_eq!(cfg.training.stop.ram_util_percent, Some(85.0));
        assert_eq!(cfg.env_config.experiment.camera_size(), (16, 12));
    }

    #[test]
    fn inference_disables_workers_and_exploration() {
        let mut cfg = minimal_config();
        cfg.num_workers = 3;
        let cfg = cfg.into_inference();
        assert_eq!(cfg.num_workers, 0);
        assert!(!cfg.explore);
    }

    #[test]
    fn missing_camera_is_rejected() {
        let yaml = MINIMAL_YAML.replace("cam_sem_seg_left", "cam_other");
        let err = RunConfig::from_yaml_str(&yaml).unwrap_err();
        assert!(matches!(err, ExperimentError::InvalidConfig(m) if m.contains("cam_sem_seg_left")));
    }

    #[test]
    fn framestack_out_of_range_is_rejected() {
        let yaml = MINIMAL_YAML.replace("framestack: 2", "framestack: 5");
        assert!(RunConfig::from_yaml_str(&yaml).is_err());
        let yaml = MINIMAL_YAML.replace("framestack: 2", "framestack: 0");
        assert!(RunConfig::from_yaml_str(&yaml).is_err());
    }

    #[test]
    fn zero_max_speed_is_rejected() {
        let mut cfg = minimal_config();
        cfg.env_config.experiment.reward.max_speed = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn reactive_distance_must_exceed_one() {
        let mut cfg = minimal_config();
        cfg.env_config.experiment.reward.max_reactive_distance = 1.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn malformed_yaml_is_a_yaml_error() {
        let err = RunConfig::from_yaml_str("env_config: [").unwrap_err();
        assert!(matches!(err, ExperimentError::Yaml(_)));
    }

    #[test]
    fn partial_reward_section_keeps_other_defaults() {
        let yaml = format!("{}    reward:\n      max_speed: 30.0\n", MINIMAL_YAML);
        let cfg = RunConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(cfg.env_config.experiment.reward.max_speed, 30.0);
        assert_eq!(cfg.env_config.experiment.reward.collision_penalty, -100.0);
    }

    #[test]
    fn bundled_example_config_is_valid() {
        let cfg = RunConfig::from_yaml_str(include_str!("../../configs/ppo_example.yaml")).unwrap();
        assert_eq!(cfg.num_workers, 1);
        assert_eq!(cfg.training.grad_clip, Some(40.0));
        assert_eq!(cfg.env_config.experiment.camera_size(), (84, 84));
        assert_eq!(cfg.env_config.simulator.road.traffic_lights.len(), 2);
    }
}
