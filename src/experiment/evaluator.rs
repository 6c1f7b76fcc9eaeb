//! Per-step evaluation: termination first, then reward.

use super::config::ExperimentConfig;
use super::episode::EpisodeState;
use super::reward::{RewardBreakdown, RewardComputer};
use super::termination::{TerminationFlags, TerminationPolicy};
use crate::world::snapshot::WorldSnapshot;

/// What one evaluated step produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    pub reward: f64,
    pub breakdown: RewardBreakdown,
    pub flags: TerminationFlags,
    /// Absolute heading deviation from the lane, radians.
    pub heading_deviation: f64,
}

impl StepOutcome {
    pub fn done(&self) -> bool {
        self.flags.any()
    }
}

/// Evaluates one step against `episode`, which is updated in place.
///
/// The terminal terms of the reward read the flags raised on this same step.
pub fn evaluate(
    snapshot: &WorldSnapshot,
    episode: &mut EpisodeState,
    config: &ExperimentConfig,
) -> StepOutcome {
    let flags = TerminationPolicy::update(snapshot, episode, &config.others, &config.reward);
    let breakdown = RewardComputer::compute(snapshot, episode, &config.reward);
    StepOutcome {
        reward: breakdown.total(),
        breakdown,
        flags,
        heading_deviation: episode.last_heading_deviation,
    }
}
