//! Self-contained kinematic road simulator.
//!
//! The world is a straight road along `+x` starting at `x = 0`:
//!
//! ```text
//!   y < 0            sidewalk (left)
//!   0 .. n·w         n driving lanes, all heading +x
//!   n·w .. (n+1)·w   optional parking lane
//!   .. + sidewalk    sidewalk (right)
//! ```
//!
//! The hero follows a kinematic bicycle model. Background vehicles cruise
//! at constant speed in their lane and wrap around at the end of the road.
//! Leaving the paved area makes the hero fall under gravity. Semantic
//! cameras are rendered by casting one ground ray per pixel.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::simulator::{CollisionEvent, Image, SensorData, SensorFrame, Simulator};
use super::snapshot::{HeroState, LaneType, Waypoint, WorldSnapshot, MS_TO_KMH};
use crate::error::ExperimentError;
use crate::experiment::action::VehicleControl;
use crate::experiment::config::{RoadConfig, SimulatorConfig};
use crate::experiment::sensors::{SensorKind, SensorSpec};
use crate::geometry::{Location, Vector2};

const GRAVITY: f64 = 9.81;

/// Planar distance below which two vehicles are in contact, meters.
const COLLISION_DISTANCE: f64 = 2.0;

/// Radius drawn around a vehicle or traffic light in camera images, meters.
const VEHICLE_RADIUS: f64 = 1.0;
const LIGHT_RADIUS: f64 = 0.5;

/// Half width of painted lane boundaries, meters.
const ROAD_LINE_HALF_WIDTH: f64 = 0.1;

/// Ground distance seen by the bottom and the top image rows, meters.
const CAMERA_NEAR: f64 = 2.0;
const CAMERA_FAR: f64 = 40.0;

/// Minimum free distance between the hero spawn and background vehicles.
const SPAWN_CLEARANCE: f64 = 10.0;
const SPAWN_HORIZON: f64 = 200.0;

/// Semantic segmentation palette.
mod palette {
    pub const UNLABELED: [u8; 3] = [0, 0, 0];
    pub const ROAD: [u8; 3] = [128, 64, 128];
    pub const ROAD_LINE: [u8; 3] = [157, 234, 50];
    pub const SIDEWALK: [u8; 3] = [244, 35, 232];
    pub const PARKING: [u8; 3] = [250, 170, 160];
    pub const VEHICLE: [u8; 3] = [0, 0, 142];
    pub const TRAFFIC_LIGHT: [u8; 3] = [250, 170, 30];
}

/// A lateral strip of the road cross-section.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Strip {
    lane_type: LaneType,
    center_y: f64,
    width: f64,
}

/// Cross-section of the road, left to right.
#[derive(Debug, Clone)]
struct RoadLayout {
    strips: Vec<(f64, f64, LaneType)>,
    length: f64,
    lane_width: f64,
    lanes: usize,
    junctions: Vec<[f64; 2]>,
}

impl RoadLayout {
    fn new(road: &RoadConfig) -> Self {
        let w = road.lane_width;
        let mut strips = Vec::new();
        if road.sidewalk_width > 0.0 {
            strips.push((-road.sidewalk_width, 0.0, LaneType::Sidewalk));
        }
        for i in 0..road.lanes {
            strips.push((i as f64 * w, (i + 1) as f64 * w, LaneType::Driving));
        }
        let mut right = road.lanes as f64 * w;
        if road.parking_lane {
            strips.push((right, right + w, LaneType::Parking));
            right += w;
        }
        if road.sidewalk_width > 0.0 {
            strips.push((right, right + road.sidewalk_width, LaneType::Sidewalk));
        }
        Self {
            strips,
            length: road.length,
            lane_width: w,
            lanes: road.lanes,
            junctions: road.junctions.clone(),
        }
    }

    fn strip_at(&self, x: f64, y: f64) -> Option<Strip> {
        if !(0.0..=self.length).contains(&x) {
            return None;
        }
        self.strips
            .iter()
            .find(|(lo, hi, _)| y >= *lo && y < *hi)
            .map(|&(lo, hi, lane_type)| Strip {
                lane_type,
                center_y: (lo + hi) / 2.0,
                width: hi - lo,
            })
    }

    fn driving_lane_center(&self, lane: usize) -> f64 {
        (lane as f64 + 0.5) * self.lane_width
    }

    fn is_junction(&self, x: f64) -> bool {
        self.junctions.iter().any(|[a, b]| x >= *a && x <= *b)
    }

    /// Whether `y` lies on a painted boundary between two driving lanes.
    fn on_lane_boundary(&self, y: f64) -> bool {
        (1..self.lanes).any(|i| (y - i as f64 * self.lane_width).abs() < ROAD_LINE_HALF_WIDTH)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Body {
    location: Location,
    /// Radians, clockwise from `+x` seen from above.
    yaw: f64,
    /// Forward speed, m/s.
    speed: f64,
    /// Vertical speed, m/s.
    vz: f64,
}

impl Body {
    fn at(x: f64, y: f64) -> Self {
        Self {
            location: Location::new(x, y, 0.0),
            yaw: 0.0,
            speed: 0.0,
            vz: 0.0,
        }
    }

    fn heading(&self) -> Vector2 {
        Vector2::from_yaw(self.yaw)
    }
}

/// Kinematic implementation of [`Simulator`].
pub struct KinematicSimulator {
    config: SimulatorConfig,
    layout: RoadLayout,
    rng: StdRng,
    sensors: Vec<SensorSpec>,
    hero: Body,
    npcs: Vec<Body>,
    control: VehicleControl,
    frame: u64,
    last_collision: Option<CollisionEvent>,
}

impl KinematicSimulator {
    pub fn new(config: SimulatorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let layout = RoadLayout::new(&config.road);
        let hero = Body::at(0.0, layout.driving_lane_center(0));
        Self {
            config,
            layout,
            rng,
            sensors: Vec::new(),
            hero,
            npcs: Vec::new(),
            control: VehicleControl::default(),
            frame: 0,
            last_collision: None,
        }
    }

    /// Places the hero, for scripted scenarios.
    pub fn place_hero(&mut self, location: Location, yaw: f64, speed_ms: f64) {
        self.hero = Body {
            location,
            yaw,
            speed: speed_ms,
            vz: 0.0,
        };
    }

    /// Adds a background vehicle driving `+x` at `speed_ms`.
    pub fn add_vehicle(&mut self, location: Location, speed_ms: f64) {
        let mut body = Body::at(location.x, location.y);
        body.speed = speed_ms;
        self.npcs.push(body);
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    fn has_sensor(&self, kind: SensorKind) -> bool {
        self.sensors.iter().any(|s| s.kind == kind)
    }

    fn random_driving_lane(&mut self) -> usize {
        self.rng.gen_range(0..self.layout.lanes)
    }

    fn spawn_traffic(&mut self) {
        self.npcs.clear();
        let speed = self.config.traffic.vehicle_speed / MS_TO_KMH;
        let start = self.hero.location.x + SPAWN_CLEARANCE;
        let end = (self.hero.location.x + SPAWN_HORIZON).min(self.layout.length);
        if start >= end {
            return;
        }
        for _ in 0..self.config.traffic.n_vehicles {
            let lane = self.random_driving_lane();
            let x = self.rng.gen_range(start..end);
            let y = self.layout.driving_lane_center(lane);
            self.add_vehicle(Location::new(x, y, 0.0), speed);
        }
    }

    fn advance_hero(&mut self, dt: f64) {
        let dynamics = &self.config.vehicle;
        let control = &self.control;
        let brake = if control.hand_brake { 1.0 } else { control.brake as f64 };

        let hero = &mut self.hero;
        let accel = control.throttle as f64 * dynamics.max_acceleration
            - brake * dynamics.max_deceleration
            - dynamics.drag * hero.speed;
        hero.speed = (hero.speed + accel * dt).max(0.0);

        let steer_angle = (control.steer as f64).clamp(-1.0, 1.0) * dynamics.max_steer_angle.to_radians();
        hero.yaw += hero.speed / dynamics.wheelbase * steer_angle.tan() * dt;
        hero.yaw = wrap_angle(hero.yaw);
        hero.location.x += hero.speed * hero.yaw.cos() * dt;
        hero.location.y += hero.speed * hero.yaw.sin() * dt;

        let on_ground = self.layout.strip_at(hero.location.x, hero.location.y).is_some();
        if on_ground && hero.location.z >= 0.0 {
            hero.location.z = 0.0;
            hero.vz = 0.0;
        } else {
            hero.vz -= GRAVITY * dt;
            hero.location.z += hero.vz * dt;
        }
    }

    fn advance_traffic(&mut self, dt: f64) {
        let length = self.layout.length;
        for npc in &mut self.npcs {
            npc.location.x += npc.speed * dt;
            if npc.location.x > length {
                npc.location.x -= length;
            }
        }
    }

    fn detect_collision(&self) -> Option<CollisionEvent> {
        self.npcs
            .iter()
            .enumerate()
            .find(|(_, npc)| npc.location.planar_distance(&self.hero.location) < COLLISION_DISTANCE)
            .map(|(i, npc)| CollisionEvent {
                other_vehicle: Some(i),
                impulse: (self.hero.speed - npc.speed).abs(),
            })
    }

    fn waypoint(&self) -> Option<Waypoint> {
        let location = self.hero.location;
        self.layout.strip_at(location.x, location.y).map(|strip| Waypoint {
            lane_type: strip.lane_type,
            location: Location::new(location.x, strip.center_y, 0.0),
            heading: Vector2::new(1.0, 0.0),
            lane_width: strip.width,
            is_junction: self.layout.is_junction(location.x),
        })
    }

    /// Nearest light ahead of the hero within range, placed on the hero's lane.
    fn traffic_light(&self) -> Option<Location> {
        let hero = self.hero.location;
        let strip = self.layout.strip_at(hero.x, hero.y)?;
        if strip.lane_type != LaneType::Driving {
            return None;
        }
        self.config
            .road
            .traffic_lights
            .iter()
            .map(|&x| x - hero.x)
            .filter(|&dx| dx >= 0.0 && dx <= self.config.road.traffic_light_range)
            .fold(None, |best: Option<f64>, dx| Some(best.map_or(dx, |b| b.min(dx))))
            .map(|dx| Location::new(hero.x + dx, strip.center_y, 0.0))
    }

    /// Semantic class of the ground point `(x, y)`.
    fn classify(&self, x: f64, y: f64, light: Option<Location>) -> [u8; 3] {
        let point = Location::new(x, y, 0.0);
        if self
            .npcs
            .iter()
            .any(|npc| npc.location.planar_distance(&point) < VEHICLE_RADIUS)
        {
            return palette::VEHICLE;
        }
        if light.is_some_and(|l| l.planar_distance(&point) < LIGHT_RADIUS) {
            return palette::TRAFFIC_LIGHT;
        }
        match self.layout.strip_at(x, y).map(|s| s.lane_type) {
            Some(LaneType::Driving) if self.layout.on_lane_boundary(y) => palette::ROAD_LINE,
            Some(LaneType::Driving) => palette::ROAD,
            Some(LaneType::Parking) => palette::PARKING,
            Some(LaneType::Sidewalk) => palette::SIDEWALK,
            _ => palette::UNLABELED,
        }
    }

    /// Renders a semantic camera as seen from the hero.
    ///
    /// Columns sweep the field of view left to right, rows map linearly from
    /// [`CAMERA_FAR`] at the top to [`CAMERA_NEAR`] at the bottom.
    fn render(&self, spec: &SensorSpec) -> Image {
        let mut image = Image::zeros(spec.image_size_x, spec.image_size_y, 3);
        let light = self.traffic_light();
        let origin = self.hero.location;
        let base_yaw = self.hero.yaw + spec.yaw.to_radians();
        let fov = spec.fov.to_radians();

        for px in 0..spec.image_size_x {
            let column = if spec.image_size_x > 1 {
                px as f64 / (spec.image_size_x - 1) as f64 - 0.5
            } else {
                0.0
            };
            let ray = Vector2::from_yaw(base_yaw + column * fov);
            for py in 0..spec.image_size_y {
                let row = if spec.image_size_y > 1 {
                    py as f64 / (spec.image_size_y - 1) as f64
                } else {
                    0.0
                };
                let distance = CAMERA_FAR + (CAMERA_NEAR - CAMERA_FAR) * row;
                let point = origin.offset_along(ray, distance);
                image.set_pixel(px, py, &self.classify(point.x, point.y, light));
            }
        }
        image
    }
}

impl Simulator for KinematicSimulator {
    fn attach_sensors(&mut self, sensors: &[SensorSpec]) -> Result<(), ExperimentError> {
        self.sensors = sensors.to_vec();
        Ok(())
    }

    fn reset(&mut self) -> Result<(), ExperimentError> {
        let lane = self.random_driving_lane();
        let max_x = (self.layout.length * 0.1).max(f64::EPSILON);
        let x = self.rng.gen_range(0.0..max_x);
        self.hero = Body::at(x, self.layout.driving_lane_center(lane));
        self.control = VehicleControl::default();
        self.last_collision = None;
        self.spawn_traffic();
        debug!(hero = %self.hero.location, npcs = self.npcs.len(), "world reset");
        Ok(())
    }

    fn apply_control(&mut self, control: &VehicleControl) {
        self.control = *control;
    }

    fn tick(&mut self) -> Result<SensorFrame, ExperimentError> {
        let dt = self.config.timestep;
        self.advance_hero(dt);
        self.advance_traffic(dt);
        self.frame += 1;

        self.last_collision = self
            .detect_collision()
            .filter(|_| self.has_sensor(SensorKind::Collision));

        let mut frame = SensorFrame {
            frame: self.frame,
            ..SensorFrame::default()
        };
        for spec in &self.sensors {
            match spec.kind {
                SensorKind::CameraSemanticSegmentation => {
                    frame
                        .data
                        .insert(spec.name.clone(), SensorData::Image(self.render(spec)));
                }
                SensorKind::Collision => {
                    if let Some(event) = self.last_collision {
                        frame.data.insert(spec.name.clone(), SensorData::Collision(event));
                    }
                }
                _ => {}
            }
        }
        Ok(frame)
    }

    fn snapshot(&self) -> WorldSnapshot {
        let hero = &self.hero;
        let heading = hero.heading();
        WorldSnapshot {
            hero: HeroState {
                location: hero.location,
                heading,
                velocity: [hero.speed * heading.x, hero.speed * heading.y, hero.vz],
            },
            waypoint: self.waypoint(),
            traffic_light: self.traffic_light(),
            vehicles: self.npcs.iter().map(|npc| npc.location).collect(),
            collision: self.last_collision.is_some(),
        }
    }
}

fn wrap_angle(angle: f64) -> f64 {
    use std::f64::consts::{PI, TAU};
    (angle + PI).rem_euclid(TAU) - PI
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::config::tests::minimal_config;
    use crate::experiment::sensors::SensorFactory;

    fn simulator() -> KinematicSimulator {
        let config = minimal_config();
        let mut sim_config = config.env_config.simulator;
        sim_config.seed = Some(7);
        let mut sim = KinematicSimulator::new(sim_config);
        let sensors = SensorFactory::spawn_all(&config.env_config.experiment.hero.sensors).unwrap();
        sim.attach_sensors(&sensors).unwrap();
        sim.reset().unwrap();
        sim
    }

    #[test]
    fn hero_spawns_on_driving_lane_center() {
        let sim = simulator();
        let snapshot = sim.snapshot();
        let wp = snapshot.waypoint.unwrap();
        assert_eq!(wp.lane_type, LaneType::Driving);
        assert_eq!(wp.location.y, snapshot.hero.location.y);
        assert_eq!(snapshot.hero.speed_kmh(), 0.0);
        assert!(snapshot.vehicles.is_empty());
    }

    #[test]
    fn throttle_accelerates_along_lane() {
        let mut sim = simulator();
        let start = sim.snapshot().hero.location;
        sim.apply_control(&VehicleControl {
            throttle: 1.0,
            ..VehicleControl::default()
        });
        for _ in 0..20 {
            sim.tick().unwrap();
        }
        let snapshot = sim.snapshot();
        assert!(snapshot.hero.location.x > start.x);
        assert!((snapshot.hero.location.y - start.y).abs() < 1e-9);
        assert!(snapshot.hero.speed_kmh() > 0.0);
    }

    #[test]
    fn cameras_render_configured_size() {
        let mut sim = simulator();
        let frame = sim.tick().unwrap();
        for name in ["cam_sem_seg_front", "cam_sem_seg_left", "cam_sem_seg_right"] {
            let image = frame.image(name).unwrap();
            assert_eq!((image.width, image.height, image.channels), (16, 12, 3));
        }
        // the bottom row of the front camera looks at the road right ahead
        let front = frame.image("cam_sem_seg_front").unwrap();
        assert_eq!(front.pixel(8, 11), &palette::ROAD);
        assert!(!frame.has_collision());
    }

    #[test]
    fn leaving_the_road_makes_the_hero_fall() {
        let mut sim = simulator();
        sim.place_hero(Location::new(50.0, -30.0, 0.0), 0.0, 0.0);
        for _ in 0..10 {
            sim.tick().unwrap();
        }
        let snapshot = sim.snapshot();
        assert!(snapshot.hero.location.z < -0.5);
        assert!(snapshot.waypoint.is_none());
    }

    #[test]
    fn close_vehicle_triggers_collision() {
        let mut sim = simulator();
        let hero = sim.snapshot().hero.location;
        sim.add_vehicle(Location::new(hero.x + 1.0, hero.y, 0.0), 0.0);
        let frame = sim.tick().unwrap();
        assert!(frame.has_collision());
        assert!(sim.snapshot().collision);
    }

    #[test]
    fn traffic_light_ahead_within_range() {
        let config = minimal_config();
        let mut sim_config = config.env_config.simulator;
        sim_config.road.traffic_lights = vec![30.0, 80.0];
        let mut sim = KinematicSimulator::new(sim_config);
        sim.place_hero(Location::new(15.0, 1.75, 0.0), 0.0, 0.0);
        let light = sim.snapshot().traffic_light.unwrap();
        assert_eq!(light.x, 30.0);
        sim.place_hero(Location::new(40.0, 1.75, 0.0), 0.0, 0.0);
        assert!(sim.snapshot().traffic_light.is_none());
    }

    #[test]
    fn sidewalk_and_junction_waypoints() {
        let config = minimal_config();
        let mut sim_config = config.env_config.simulator;
        sim_config.road.junctions = vec![[100.0, 120.0]];
        let mut sim = KinematicSimulator::new(sim_config);
        sim.place_hero(Location::new(10.0, -1.0, 0.0), 0.0, 0.0);
        assert_eq!(sim.snapshot().waypoint.unwrap().lane_type, LaneType::Sidewalk);
        sim.place_hero(Location::new(110.0, 1.75, 0.0), 0.0, 0.0);
        assert!(sim.snapshot().waypoint.unwrap().is_junction);
    }

    #[test]
    fn wrap_angle_range() {
        use std::f64::consts::PI;
        assert!((wrap_angle(3.0 * PI / 2.0) + PI / 2.0).abs() < 1e-12);
        assert!((wrap_angle(0.3) - 0.3).abs() < 1e-12);
    }
}
