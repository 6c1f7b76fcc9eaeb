//! Mutable per-episode bookkeeping for the reward evaluator.

use super::action::VehicleControl;
use super::termination::TerminationFlags;
use crate::geometry::Location;

/// State carried from one step to the next within a single episode.
///
/// Owned by exactly one environment. Cleared by [`EpisodeState::reset`] at
/// the start of every episode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpisodeState {
    /// Consecutive steps spent below the idle speed threshold.
    pub time_idle: u32,
    /// Steps elapsed in this episode.
    pub time_episode: u32,
    /// Hero location at the previous step (`None` before the first step).
    pub last_location: Option<Location>,
    /// Hero speed at the previous step, km/h.
    pub last_speed: f64,
    /// Last control applied to the hero.
    pub last_control: Option<VehicleControl>,
    /// Absolute heading deviation from the lane at the last step, radians.
    pub last_heading_deviation: f64,
    /// Termination flags computed at the last step.
    pub done: TerminationFlags,
}

impl EpisodeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Remembers the control sent to the simulator for this step.
    pub fn record_control(&mut self, control: VehicleControl) {
        self.last_control = Some(control);
    }

    /// Steering of the last control; `0` before any control was applied.
    pub fn last_steer(&self) -> f64 {
        self.last_control.map(|c| c.steer as f64).unwrap_or(0.0)
    }
}
