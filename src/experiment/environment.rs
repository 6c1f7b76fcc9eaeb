//! Driving environment.
//!
//! Glues a [`Simulator`] to the observation builder, the action mapping and
//! the reward/termination evaluator. One step runs:
//! map action → apply control → tick → observe → terminate → reward.

use tracing::{debug, info};

use super::action::{Action, BoxSpace, VehicleControl};
use super::config::ExperimentConfig;
use super::episode::EpisodeState;
use super::evaluator::{self, StepOutcome};
use super::observation::{Observation, ObservationBuilder, ObservationSpace};
use super::sensors::SensorFactory;
use super::termination::TerminationFlags;
use crate::error::ExperimentError;
use crate::world::simulator::Simulator;

/// Per-step diagnostics returned next to the reward.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepInfo {
    pub flags: TerminationFlags,
    /// Absolute heading deviation from the lane, radians.
    pub heading_deviation: f64,
    /// Hero speed, km/h.
    pub speed: f64,
    /// Steps elapsed in the current episode.
    pub steps: u32,
}

/// Result of a single environment step.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub observation: Observation,
    pub reward: f64,
    /// Whether the episode ended on this step.
    pub done: bool,
    pub info: StepInfo,
}

/// A single-agent episodic environment with image observations and a
/// continuous action box.
pub trait Environment {
    /// Starts a new episode and returns its first observation.
    fn reset(&mut self) -> Result<Observation, ExperimentError>;

    /// Applies `action` for one tick.
    fn step(&mut self, action: &Action) -> Result<StepResult, ExperimentError>;

    fn observation_space(&self) -> ObservationSpace;

    fn action_space(&self) -> BoxSpace;
}

/// The driving task on top of any [`Simulator`].
///
/// # Lifecycle
///
/// 1. [`DrivingEnv::new`] validates the experiment and attaches the hero sensors.
/// 2. [`Environment::reset`] respawns the world and clears the episode state.
/// 3. [`Environment::step`] until `done`, then reset again.
pub struct DrivingEnv<S: Simulator> {
    simulator: S,
    config: ExperimentConfig,
    episode: EpisodeState,
    observations: ObservationBuilder,
    action_space: BoxSpace,
    /// Reward accumulated in the current episode.
    pub cumulative_reward: f64,
}

impl<S: Simulator> DrivingEnv<S> {
    /// Builds the environment and attaches the configured sensors.
    ///
    /// # Errors
    ///
    /// Fails on an invalid experiment configuration, an unsupported sensor
    /// type or when the simulator rejects the sensors.
    pub fn new(mut simulator: S, config: ExperimentConfig) -> Result<Self, ExperimentError> {
        config.validate()?;
        let sensors = SensorFactory::spawn_all(&config.hero.sensors)?;
        simulator.attach_sensors(&sensors)?;
        debug!(sensors = sensors.len(), "attached hero sensors");

        Ok(Self {
            simulator,
            observations: ObservationBuilder::new(&config),
            episode: EpisodeState::new(),
            action_space: BoxSpace::driving(),
            cumulative_reward: 0.0,
            config,
        })
    }

    pub fn episode(&self) -> &EpisodeState {
        &self.episode
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn simulator(&self) -> &S {
        &self.simulator
    }

    fn log_episode_end(&self, outcome: &StepOutcome) {
        info!(
            reasons = %outcome.flags,
            steps = self.episode.time_episode,
            reward = self.cumulative_reward,
            "episode finished"
        );
    }
}

impl<S: Simulator> Environment for DrivingEnv<S> {
    fn reset(&mut self) -> Result<Observation, ExperimentError> {
        self.episode.reset();
        self.observations.reset();
        self.cumulative_reward = 0.0;

        self.simulator.reset()?;
        let frame = self.simulator.tick()?;
        self.observations.build(&frame)
    }

    fn step(&mut self, action: &Action) -> Result<StepResult, ExperimentError> {
        let control = VehicleControl::from_action(action, &self.action_space);
        self.simulator.apply_control(&control);
        self.episode.record_control(control);

        let frame = self.simulator.tick()?;
        let observation = self.observations.build(&frame)?;

        let mut snapshot = self.simulator.snapshot();
        snapshot.collision |= frame.has_collision();

        let outcome = evaluator::evaluate(&snapshot, &mut self.episode, &self.config);
        self.cumulative_reward += outcome.reward;
        if outcome.done() {
            self.log_episode_end(&outcome);
        }

        Ok(StepResult {
            observation,
            reward: outcome.reward,
            done: outcome.done(),
            info: StepInfo {
                flags: outcome.flags,
                heading_deviation: outcome.heading_deviation,
                speed: snapshot.hero.speed_kmh(),
                steps: self.episode.time_episode,
            },
        })
    }

    fn observation_space(&self) -> ObservationSpace {
        self.observations.space()
    }

    fn action_space(&self) -> BoxSpace {
        self.action_space
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::config::tests::minimal_config;
    use crate::experiment::config::SensorConfig;
    use crate::world::kinematic::KinematicSimulator;

    fn env() -> DrivingEnv<KinematicSimulator> {
        let config = minimal_config();
        let sim = KinematicSimulator::new(config.env_config.simulator.clone());
        DrivingEnv::new(sim, config.env_config.experiment).unwrap()
    }

    #[test]
    fn reset_returns_observation_in_space() {
        let mut env = env();
        let obs = env.reset().unwrap();
        assert!(env.observation_space().contains(&obs));
        assert_eq!(env.episode(), &EpisodeState::default());
    }

    #[test]
    fn step_updates_episode_state() {
        let mut env = env();
        env.reset().unwrap();
        let result = env.step(&[1.0, 0.0, 0.0]).unwrap();
        assert!(env.observation_space().contains(&result.observation));
        assert_eq!(result.info.steps, 1);
        assert_eq!(env.episode().last_steer(), 0.0);
        assert!(env.episode().last_location.is_some());
    }

    #[test]
    fn standing_still_ends_in_idle_timeout() {
        let mut env = env();
        env.reset().unwrap();
        // max_time_idle is 5 in the test config
        let mut last = None;
        for _ in 0..6 {
            last = Some(env.step(&[0.0, 0.0, 1.0]).unwrap());
        }
        let last = last.unwrap();
        assert!(last.done);
        assert!(last.info.flags.idle);
        assert!(last.reward <= -100.0 + 1.0);
    }

    #[test]
    fn unsupported_sensor_fails_construction() {
        let config = minimal_config();
        let mut experiment = config.env_config.experiment;
        experiment.hero.sensors.insert(
            "thermal".into(),
            SensorConfig {
                type_name: "sensor.camera.thermal".into(),
                ..SensorConfig::default()
            },
        );
        let sim = KinematicSimulator::new(config.env_config.simulator);
        assert!(matches!(
            DrivingEnv::new(sim, experiment),
            Err(ExperimentError::UnsupportedSensor(_))
        ));
    }
}
