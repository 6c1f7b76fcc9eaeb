//! Episode lifecycle hooks and custom metrics.

use std::collections::{BTreeMap, HashMap};

use super::environment::StepInfo;

/// Key under which the heading deviation samples and metric are stored.
pub const HEADING_DEVIATION: &str = "heading_deviation";

/// Bookkeeping for one episode as seen by the callbacks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Episode {
    pub id: u64,
    pub length: u32,
    pub total_reward: f64,
    /// Free-form per-episode samples keyed by name.
    pub user_data: HashMap<String, Vec<f64>>,
    /// Scalars reported once the episode is over.
    pub custom_metrics: BTreeMap<String, f64>,
}

impl Episode {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Accounts one step's reward and length.
    pub fn record_step(&mut self, reward: f64) {
        self.length += 1;
        self.total_reward += reward;
    }
}

/// Hooks called by the rollout worker around every episode.
pub trait EpisodeCallbacks: Send {
    fn on_episode_start(&mut self, _episode: &mut Episode) {}

    fn on_episode_step(&mut self, _episode: &mut Episode, _info: &StepInfo) {}

    fn on_episode_end(&mut self, _episode: &mut Episode) {}
}

/// Callbacks that do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCallbacks;

impl EpisodeCallbacks for NoCallbacks {}

/// Reports the mean positive heading deviation of each episode as
/// `custom_metrics["heading_deviation"]`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadingDeviationCallbacks;

impl EpisodeCallbacks for HeadingDeviationCallbacks {
    fn on_episode_start(&mut self, episode: &mut Episode) {
        episode.user_data.insert(HEADING_DEVIATION.to_string(), Vec::new());
    }

    fn on_episode_step(&mut self, episode: &mut Episode, info: &StepInfo) {
        if info.heading_deviation > 0.0 {
            episode
                .user_data
                .entry(HEADING_DEVIATION.to_string())
                .or_default()
                .push(info.heading_deviation);
        }
    }

    fn on_episode_end(&mut self, episode: &mut Episode) {
        let mean = episode
            .user_data
            .get(HEADING_DEVIATION)
            .filter(|samples| !samples.is_empty())
            .map(|samples| samples.iter().sum::<f64>() / samples.len() as f64)
            .unwrap_or(0.0);
        episode.custom_metrics.insert(HEADING_DEVIATION.to_string(), mean);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(deviation: f64) -> StepInfo {
        StepInfo {
            heading_deviation: deviation,
            ..StepInfo::default()
        }
    }

    #[test]
    fn mean_of_positive_samples() {
        let mut cb = HeadingDeviationCallbacks;
        let mut episode = Episode::new(0);
        cb.on_episode_start(&mut episode);
        for d in [0.2, 0.0, 0.4, 0.0] {
            cb.on_episode_step(&mut episode, &info(d));
        }
        cb.on_episode_end(&mut episode);
        assert_eq!(episode.user_data[HEADING_DEVIATION], vec![0.2, 0.4]);
        let mean = episode.custom_metrics[HEADING_DEVIATION];
        assert!((mean - 0.3).abs() < 1e-12);
    }

    #[test]
    fn no_samples_reports_zero() {
        let mut cb = HeadingDeviationCallbacks;
        let mut episode = Episode::new(3);
        cb.on_episode_start(&mut episode);
        cb.on_episode_step(&mut episode, &info(0.0));
        cb.on_episode_end(&mut episode);
        assert_eq!(episode.custom_metrics[HEADING_DEVIATION], 0.0);
    }

    #[test]
    fn record_step_accumulates() {
        let mut episode = Episode::new(1);
        episode.record_step(1.5);
        episode.record_step(-0.5);
        assert_eq!(episode.length, 2);
        assert_eq!(episode.total_reward, 1.0);
        let mut noop = NoCallbacks;
        noop.on_episode_end(&mut episode);
        assert!(episode.custom_metrics.is_empty());
    }
}
