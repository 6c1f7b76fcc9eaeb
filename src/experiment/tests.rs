//! Multi-step scenarios for the reward and termination evaluator.

use super::config::tests::minimal_config;
use super::config::ExperimentConfig;
use super::episode::EpisodeState;
use super::evaluator::evaluate;
use crate::geometry::{Location, Vector2};
use crate::world::snapshot::{HeroState, LaneType, Waypoint, WorldSnapshot};

const LANE_Y: f64 = 1.75;

fn experiment() -> ExperimentConfig {
    minimal_config().env_config.experiment
}

fn on_lane(x: f64, velocity_ms: f64) -> WorldSnapshot {
    WorldSnapshot {
        hero: HeroState {
            location: Location::new(x, LANE_Y, 0.0),
            heading: Vector2::new(1.0, 0.0),
            velocity: [velocity_ms, 0.0, 0.0],
        },
        waypoint: Some(Waypoint {
            lane_type: LaneType::Driving,
            location: Location::new(x, LANE_Y, 0.0),
            heading: Vector2::new(1.0, 0.0),
            lane_width: 3.5,
            is_junction: false,
        }),
        traffic_light: None,
        vehicles: Vec::new(),
        collision: false,
    }
}

#[test]
fn cruising_on_lane_center_has_no_penalties() {
    let mut config = experiment();
    let velocity = 5.0;
    config.reward.max_speed = on_lane(0.0, velocity).hero.speed_kmh();
    let mut episode = EpisodeState::new();

    let rewards: Vec<f64> = (0..5)
        .map(|i| evaluate(&on_lane(i as f64, velocity), &mut episode, &config).reward)
        .collect();

    // first step has no progress, then 1 m per step; the speed term adds +1
    assert!((rewards[0] - 1.0).abs() < 1e-9);
    for r in &rewards[1..] {
        assert!((r - 2.0).abs() < 1e-9, "reward {}", r);
    }
    assert_eq!(episode.last_heading_deviation, 0.0);
    assert!(!episode.done.any());
}

#[test]
fn idling_ends_episode_with_penalty() {
    let config = experiment();
    let max_idle = config.others.max_time_idle;
    let mut episode = EpisodeState::new();

    for step in 1..=max_idle {
        let out = evaluate(&on_lane(0.0, 0.0), &mut episode, &config);
        assert!(!out.done(), "step {}", step);
    }
    let out = evaluate(&on_lane(0.0, 0.0), &mut episode, &config);
    assert!(out.done());
    assert!(out.flags.idle);
    assert_eq!(out.breakdown.terminal, -100.0);
    // standing still: speed term is 1 - 20/20 = 0
    assert!((out.reward + 100.0).abs() < 1e-9);
}

#[test]
fn moving_again_resets_idle_countdown() {
    let config = experiment();
    let max_idle = config.others.max_time_idle;
    let mut episode = EpisodeState::new();
    for _ in 0..max_idle {
        evaluate(&on_lane(0.0, 0.0), &mut episode, &config);
    }
    let out = evaluate(&on_lane(0.5, 2.0), &mut episode, &config);
    assert!(!out.flags.idle);
    assert_eq!(episode.time_idle, 0);
}

#[test]
fn falling_while_colliding_is_doubly_penalised() {
    let config = experiment();
    let mut episode = EpisodeState::new();
    let mut snapshot = on_lane(0.0, 3.0);
    snapshot.hero.location.z = -2.0;
    snapshot.waypoint = None;
    snapshot.collision = true;
    let out = evaluate(&snapshot, &mut episode, &config);
    assert!(out.flags.falling && out.flags.collision);
    assert_eq!(out.breakdown.terminal, -140.0);
    assert_eq!(out.breakdown.lane, -0.5);
}

#[test]
fn episode_timeout_pays_bonus() {
    let config = experiment();
    let limit = config.others.max_time_episode;
    let mut episode = EpisodeState::new();
    let mut last = None;
    for i in 0..=limit {
        last = Some(evaluate(&on_lane(i as f64, 5.0), &mut episode, &config));
    }
    let out = last.unwrap();
    assert!(out.flags.episode_timeout);
    assert_eq!(out.breakdown.terminal, 100.0);
}

#[test]
fn closing_in_on_a_vehicle_lowers_the_optimal_speed() {
    let config = experiment();
    let speed_terms: Vec<f64> = [10.0, 6.0, 3.5, 1.0]
        .iter()
        .map(|gap| {
            let mut episode = EpisodeState::new();
            let mut snapshot = on_lane(0.0, 0.0);
            snapshot.vehicles = vec![Location::new(*gap, LANE_Y, 0.0)];
            evaluate(&snapshot, &mut episode, &config).breakdown.speed
        })
        .collect();
    // standing still scores 1 - optimal / max_speed
    assert!((speed_terms[0] - 0.0).abs() < 1e-9);
    assert!((speed_terms[1] - 0.0).abs() < 1e-9);
    assert!((speed_terms[2] - 0.5).abs() < 1e-9);
    assert!((speed_terms[3] - 1.0).abs() < 1e-9);
}

#[test]
fn red_light_ahead_counts_as_obstruction() {
    let config = experiment();
    let mut episode = EpisodeState::new();
    let mut snapshot = on_lane(0.0, 0.0);
    snapshot.traffic_light = Some(Location::new(0.5, LANE_Y, 0.0));
    let out = evaluate(&snapshot, &mut episode, &config);
    assert!((out.breakdown.speed - 1.0).abs() < 1e-9);
}
