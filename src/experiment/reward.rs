//! Shaped reward for the driving task.
//!
//! Combines forward progress, acceleration, lane keeping, reactive speed
//! shaping and terminal bonuses. Termination flags must be computed for the
//! step before the reward, since the terminal terms read them.

use std::f64::consts::PI;

use super::config::RewardConfig;
use super::episode::EpisodeState;
use crate::world::snapshot::WorldSnapshot;

/// Reward split into its components, mainly for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RewardBreakdown {
    /// Planar distance travelled since the last step.
    pub progress: f64,
    /// Weighted speed increase (zero at or above the maximum speed).
    pub acceleration: f64,
    /// Lane type, heading, lateral offset and steering penalties.
    pub lane: f64,
    /// `1 - |speed - optimal| / max_speed`, zero when not in an allowed lane.
    pub speed: f64,
    /// Sum of the terminal bonuses and penalties.
    pub terminal: f64,
}

impl RewardBreakdown {
    pub fn total(&self) -> f64 {
        self.progress + self.acceleration + self.lane + self.speed + self.terminal
    }
}

/// Computes rewards for the driving environment.
pub struct RewardComputer;

impl RewardComputer {
    /// Computes the reward for one step and updates the episode's last
    /// location, speed and heading deviation.
    ///
    /// # Components
    ///
    /// 1. **Progress**: planar distance since the previous step.
    /// 2. **Acceleration**: `coef × Δspeed` while below `max_speed`.
    /// 3. **Lane**: fixed penalty and deviation `π` outside allowed lanes;
    ///    otherwise (outside junctions) `-deviation/π - offset/lane_width`,
    ///    plus a wrong-way or steer-away penalty.
    /// 4. **Speed**: deviation from the obstruction-dependent optimal speed.
    /// 5. **Terminal**: one term per raised flag in `episode.done`.
    pub fn compute(
        snapshot: &WorldSnapshot,
        episode: &mut EpisodeState,
        config: &RewardConfig,
    ) -> RewardBreakdown {
        let hero = &snapshot.hero;
        let speed = hero.speed_kmh();
        let mut out = RewardBreakdown::default();

        let last_location = episode.last_location.unwrap_or(hero.location);
        out.progress = hero.location.planar_distance(&last_location);
        let delta_speed = speed - episode.last_speed;
        episode.last_location = Some(hero.location);
        episode.last_speed = speed;

        if speed < config.max_speed {
            out.acceleration = config.acceleration_coef * delta_speed;
        }

        match snapshot.waypoint.filter(|wp| wp.lane_type.is_allowed()) {
            None => {
                out.lane = config.off_lane_penalty;
                episode.last_heading_deviation = PI;
            }
            Some(wp) => {
                if wp.is_junction {
                    episode.last_heading_deviation = 0.0;
                } else {
                    let angle = hero.heading.deviation_from(&wp.heading);
                    let deviation = angle.abs();
                    episode.last_heading_deviation = deviation;
                    out.lane -= deviation / PI;

                    if wp.lane_width > 0.0 {
                        out.lane -= hero.location.planar_distance(&wp.location) / wp.lane_width;
                    }

                    if hero.heading.dot(&wp.heading) < 0.0 {
                        out.lane += config.wrong_way_penalty;
                    } else {
                        let sin = angle.sin();
                        if sin.abs() > config.steer_away_threshold && episode.last_steer() * sin >= 0.0
                        {
                            out.lane += config.steer_away_penalty;
                        }
                    }
                }

                if config.max_speed > 0.0 {
                    let optimal = Self::optimal_speed(Self::reaction_distance(snapshot, config), config);
                    out.speed = 1.0 - (speed - optimal).abs() / config.max_speed;
                }
            }
        }

        out.terminal = Self::terminal(episode, config);
        out
    }

    /// Distance to the closest obstruction: the traffic light affecting the
    /// hero, or a vehicle within `max_reactive_distance` of both the hero and
    /// the look-ahead point `max_reactive_distance` ahead of it.
    ///
    /// Returns `f64::INFINITY` when nothing obstructs the hero.
    pub fn reaction_distance(snapshot: &WorldSnapshot, config: &RewardConfig) -> f64 {
        let hero = &snapshot.hero;
        let radius = config.max_reactive_distance;
        let mut distance = snapshot
            .traffic_light
            .map(|light| light.planar_distance(&hero.location))
            .unwrap_or(f64::INFINITY);

        let target = hero.location.offset_along(hero.heading, radius);
        for vehicle in &snapshot.vehicles {
            let to_hero = vehicle.planar_distance(&hero.location);
            let to_target = vehicle.planar_distance(&target);
            if to_hero < radius && to_target < radius {
                distance = distance.min(to_hero);
            }
        }
        distance
    }

    /// Speed (km/h) the hero should drive at given the obstruction distance.
    ///
    /// ```text
    /// d ≤ 1       → 0
    /// 1 < d < R   → max_speed · (d - 1) / (R - 1)
    /// d ≥ R       → max_speed
    /// ```
    pub fn optimal_speed(distance: f64, config: &RewardConfig) -> f64 {
        let radius = config.max_reactive_distance;
        if distance >= radius {
            config.max_speed
        } else if distance <= 1.0 || radius <= 1.0 {
            0.0
        } else {
            config.max_speed * (distance - 1.0) / (radius - 1.0)
        }
    }

    /// Sum of terminal bonuses and penalties for the flags in `episode.done`.
    pub fn terminal(episode: &EpisodeState, config: &RewardConfig) -> f64 {
        let flags = &episode.done;
        let mut reward = 0.0;
        if flags.falling {
            reward += config.falling_penalty;
        }
        if flags.idle {
            reward += config.idle_penalty;
        }
        if flags.episode_timeout {
            reward += config.episode_timeout_bonus;
        }
        if flags.collision {
            reward += config.collision_penalty;
        }
        reward
    }
}
