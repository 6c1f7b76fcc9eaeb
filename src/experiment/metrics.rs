//! Evaluation metrics for the driving environment.
//!
//! Runs a policy for a number of episodes and aggregates rewards, episode
//! lengths, heading deviation and termination reasons.

use std::fmt;

use super::environment::Environment;
use crate::error::ExperimentError;
use crate::policy::Policy;

/// Aggregated evaluation metrics over multiple episodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationMetrics {
    /// Mean cumulative reward per episode.
    pub mean_cumulative_reward: f64,
    /// Mean number of steps per episode.
    pub mean_episode_length: f64,
    /// Mean heading deviation over all steps, radians.
    pub mean_heading_deviation: f64,
    /// Episodes ending in each way. A step may raise several flags.
    pub idle_episodes: usize,
    pub falling_episodes: usize,
    pub timeout_episodes: usize,
    pub collision_episodes: usize,
    /// Number of episodes evaluated.
    pub n_episodes: usize,
}

/// Tracks per-episode statistics during evaluation.
#[derive(Debug, Default)]
struct EpisodeStats {
    cumulative_reward: f64,
    steps: u32,
    heading_deviation_sum: f64,
}

impl EvaluationMetrics {
    /// Evaluates a policy over multiple episodes and returns aggregated metrics.
    ///
    /// # Arguments
    ///
    /// * `env` - The environment to evaluate in
    /// * `policy` - The policy to evaluate
    /// * `n_episodes` - Number of episodes to run
    pub fn evaluate(
        env: &mut dyn Environment,
        policy: &mut dyn Policy,
        n_episodes: usize,
    ) -> Result<Self, ExperimentError> {
        let mut metrics = Self {
            n_episodes,
            ..Self::default()
        };
        if n_episodes == 0 {
            return Ok(metrics);
        }

        let mut all_stats = Vec::with_capacity(n_episodes);
        for _ in 0..n_episodes {
            let mut obs = env.reset()?;
            let mut stats = EpisodeStats::default();

            loop {
                let action = policy.act(&obs).action;
                let result = env.step(&action)?;
                stats.cumulative_reward += result.reward;
                stats.steps += 1;
                stats.heading_deviation_sum += result.info.heading_deviation;
                obs = result.observation;

                if result.done {
                    let flags = result.info.flags;
                    metrics.idle_episodes += flags.idle as usize;
                    metrics.falling_episodes += flags.falling as usize;
                    metrics.timeout_episodes += flags.episode_timeout as usize;
                    metrics.collision_episodes += flags.collision as usize;
                    break;
                }
            }
            all_stats.push(stats);
        }

        let n = all_stats.len() as f64;
        let total_steps: u32 = all_stats.iter().map(|s| s.steps).sum();
        metrics.mean_cumulative_reward = all_stats.iter().map(|s| s.cumulative_reward).sum::<f64>() / n;
        metrics.mean_episode_length = total_steps as f64 / n;
        metrics.mean_heading_deviation = if total_steps > 0 {
            all_stats.iter().map(|s| s.heading_deviation_sum).sum::<f64>() / total_steps as f64
        } else {
            0.0
        };
        Ok(metrics)
    }
}

impl fmt::Display for EvaluationMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Evaluation Metrics ({} episodes) ===", self.n_episodes)?;
        writeln!(f, "  Mean cumulative reward:  {:.2}", self.mean_cumulative_reward)?;
        writeln!(f, "  Mean episode length:     {:.1}", self.mean_episode_length)?;
        writeln!(f, "  Mean heading deviation:  {:.3}", self.mean_heading_deviation)?;
        writeln!(
            f,
            "  Endings (idle/falling/timeout/collision): {}/{}/{}/{}",
            self.idle_episodes, self.falling_episodes, self.timeout_episodes, self.collision_episodes
        )
    }
}
