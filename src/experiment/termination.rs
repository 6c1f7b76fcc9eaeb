//! Episode termination policy.
//!
//! Four independent reasons can end an episode: the hero stood still too
//! long, fell below the map, ran out of time, or collided. The counters are
//! updated before the flags are read, so with `max_time_idle = n` the
//! idle flag is first raised on the `n + 1`-th consecutive idle step.

use std::fmt;

use super::config::{OthersConfig, RewardConfig};
use super::episode::EpisodeState;
use crate::world::snapshot::WorldSnapshot;

/// Why the current episode should end. Several flags may be set at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TerminationFlags {
    pub idle: bool,
    pub falling: bool,
    pub episode_timeout: bool,
    pub collision: bool,
}

impl TerminationFlags {
    /// Whether the episode should end.
    pub fn any(&self) -> bool {
        self.idle || self.falling || self.episode_timeout || self.collision
    }

    /// Short names of the raised flags.
    pub fn reasons(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.idle {
            out.push("idle");
        }
        if self.falling {
            out.push("falling");
        }
        if self.episode_timeout {
            out.push("max_time");
        }
        if self.collision {
            out.push("collision");
        }
        out
    }
}

impl fmt::Display for TerminationFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reasons = self.reasons();
        if reasons.is_empty() {
            write!(f, "running")
        } else {
            write!(f, "{}", reasons.join("+"))
        }
    }
}

/// Evaluates the termination flags for one step.
pub struct TerminationPolicy;

impl TerminationPolicy {
    /// Advances the idle and episode counters and stores the resulting flags
    /// in `episode.done`.
    pub fn update(
        snapshot: &WorldSnapshot,
        episode: &mut EpisodeState,
        others: &OthersConfig,
        reward: &RewardConfig,
    ) -> TerminationFlags {
        let speed = snapshot.hero.speed_kmh();
        if speed >= reward.idle_speed_threshold {
            episode.time_idle = 0;
        } else {
            episode.time_idle += 1;
        }
        episode.time_episode += 1;

        let flags = TerminationFlags {
            idle: episode.time_idle > others.max_time_idle,
            falling: snapshot.hero.location.z < reward.falling_height,
            episode_timeout: episode.time_episode > others.max_time_episode,
            collision: snapshot.collision,
        };
        episode.done = flags;
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Location, Vector2};
    use crate::world::snapshot::HeroState;

    fn snapshot(speed_ms: f64, z: f64) -> WorldSnapshot {
        WorldSnapshot {
            hero: HeroState {
                location: Location::new(0.0, 0.0, z),
                heading: Vector2::new(1.0, 0.0),
                velocity: [speed_ms, 0.0, 0.0],
            },
            waypoint: None,
            traffic_light: None,
            vehicles: Vec::new(),
            collision: false,
        }
    }

    fn limits(idle: u32, episode: u32) -> OthersConfig {
        OthersConfig {
            framestack: 1,
            max_time_idle: idle,
            max_time_episode: episode,
        }
    }

    #[test]
    fn moving_resets_idle_counter() {
        let mut ep = EpisodeState::new();
        ep.time_idle = 7;
        // exactly at the threshold counts as moving
        let cfg = RewardConfig {
            idle_speed_threshold: 3.6,
            ..RewardConfig::default()
        };
        TerminationPolicy::update(&snapshot(1.0, 0.0), &mut ep, &limits(10, 100), &cfg);
        assert_eq!(ep.time_idle, 0);
    }

    #[test]
    fn idle_flag_after_threshold_exceeded() {
        let mut ep = EpisodeState::new();
        let others = limits(3, 100);
        let cfg = RewardConfig::default();
        let s = snapshot(0.0, 0.0);
        for step in 1..=4 {
            let flags = TerminationPolicy::update(&s, &mut ep, &others, &cfg);
            assert_eq!(ep.time_idle, step);
            assert_eq!(flags.idle, step > 3, "step {}", step);
        }
    }

    #[test]
    fn idle_flag_tracks_counter_trajectory() {
        let mut ep = EpisodeState::new();
        let others = limits(2, 1000);
        let cfg = RewardConfig::default();
        let speeds = [0.0, 0.0, 0.0, 5.0, 0.0, 0.0, 0.0, 0.0];
        for (i, v) in speeds.iter().enumerate() {
            let flags = TerminationPolicy::update(&snapshot(*v, 0.0), &mut ep, &others, &cfg);
            assert_eq!(flags.idle, ep.time_idle > 2, "step {}", i);
        }
        assert_eq!(ep.time_idle, 4);
    }

    #[test]
    fn episode_timeout_after_max_steps() {
        let mut ep = EpisodeState::new();
        let others = limits(1000, 2);
        let cfg = RewardConfig::default();
        let s = snapshot(5.0, 0.0);
        assert!(!TerminationPolicy::update(&s, &mut ep, &others, &cfg).episode_timeout);
        assert!(!TerminationPolicy::update(&s, &mut ep, &others, &cfg).episode_timeout);
        let flags = TerminationPolicy::update(&s, &mut ep, &others, &cfg);
        assert!(flags.episode_timeout);
        assert!(flags.any());
    }

    #[test]
    fn falling_below_threshold() {
        let mut ep = EpisodeState::new();
        let cfg = RewardConfig::default();
        let flags = TerminationPolicy::update(&snapshot(5.0, -0.5), &mut ep, &limits(10, 10), &cfg);
        assert!(!flags.falling);
        let flags = TerminationPolicy::update(&snapshot(5.0, -0.51), &mut ep, &limits(10, 10), &cfg);
        assert!(flags.falling);
    }

    #[test]
    fn collision_is_copied_from_snapshot() {
        let mut ep = EpisodeState::new();
        let mut s = snapshot(5.0, 0.0);
        s.collision = true;
        let flags =
            TerminationPolicy::update(&s, &mut ep, &limits(10, 10), &RewardConfig::default());
        assert!(flags.collision);
        assert_eq!(ep.done, flags);
        assert_eq!(flags.to_string(), "collision");
    }

    #[test]
    fn display_joins_reasons() {
        let flags = TerminationFlags {
            falling: true,
            collision: true,
            ..TerminationFlags::default()
        };
        assert_eq!(flags.to_string(), "falling+collision");
        assert_eq!(TerminationFlags::default().to_string(), "running");
    }
}
