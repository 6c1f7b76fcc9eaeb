//! Sensor construction from configuration.
//!
//! Each entry under `hero.sensors` names a sensor and carries a `type`
//! string. [`SensorFactory::spawn`] turns it into a [`SensorSpec`] that the
//! simulator attaches to the hero; an unknown type aborts construction.

use std::fmt;

use super::config::SensorConfig;
use crate::error::ExperimentError;

/// Sensor kinds understood by the experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    CameraRgb,
    CameraDepth,
    CameraSemanticSegmentation,
    CameraDvs,
    Lidar,
    SemanticLidar,
    Radar,
    Gnss,
    Imu,
    LaneInvasion,
    Collision,
    Obstacle,
    /// Top-down pseudo sensor rendered from map data.
    Birdview,
}

impl SensorKind {
    pub fn from_type_name(type_name: &str) -> Result<Self, ExperimentError> {
        let kind = match type_name {
            "sensor.camera.rgb" => SensorKind::CameraRgb,
            "sensor.camera.depth" => SensorKind::CameraDepth,
            "sensor.camera.semantic_segmentation" => SensorKind::CameraSemanticSegmentation,
            "sensor.camera.dvs" => SensorKind::CameraDvs,
            "sensor.lidar.ray_cast" => SensorKind::Lidar,
            "sensor.lidar.ray_cast_semantic" => SensorKind::SemanticLidar,
            "sensor.other.radar" => SensorKind::Radar,
            "sensor.other.gnss" => SensorKind::Gnss,
            "sensor.other.imu" => SensorKind::Imu,
            "sensor.other.lane_invasion" => SensorKind::LaneInvasion,
            "sensor.other.collision" => SensorKind::Collision,
            "sensor.other.obstacle" => SensorKind::Obstacle,
            "sensor.birdview" => SensorKind::Birdview,
            other => return Err(ExperimentError::UnsupportedSensor(other.to_string())),
        };
        Ok(kind)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            SensorKind::CameraRgb => "sensor.camera.rgb",
            SensorKind::CameraDepth => "sensor.camera.depth",
            SensorKind::CameraSemanticSegmentation => "sensor.camera.semantic_segmentation",
            SensorKind::CameraDvs => "sensor.camera.dvs",
            SensorKind::Lidar => "sensor.lidar.ray_cast",
            SensorKind::SemanticLidar => "sensor.lidar.ray_cast_semantic",
            SensorKind::Radar => "sensor.other.radar",
            SensorKind::Gnss => "sensor.other.gnss",
            SensorKind::Imu => "sensor.other.imu",
            SensorKind::LaneInvasion => "sensor.other.lane_invasion",
            SensorKind::Collision => "sensor.other.collision",
            SensorKind::Obstacle => "sensor.other.obstacle",
            SensorKind::Birdview => "sensor.birdview",
        }
    }

    /// Whether this sensor produces an image.
    pub fn is_camera(&self) -> bool {
        matches!(
            self,
            SensorKind::CameraRgb
                | SensorKind::CameraDepth
                | SensorKind::CameraSemanticSegmentation
                | SensorKind::CameraDvs
                | SensorKind::Birdview
        )
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// A validated sensor ready to be attached to the hero.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSpec {
    pub name: String,
    pub kind: SensorKind,
    /// Image width in pixels (cameras only).
    pub image_size_x: usize,
    /// Image height in pixels (cameras only).
    pub image_size_y: usize,
    /// Horizontal field of view in degrees (cameras only).
    pub fov: f64,
    /// Mounting yaw relative to the hero's heading, in degrees.
    pub yaw: f64,
}

/// Builds [`SensorSpec`]s from their configuration entries.
pub struct SensorFactory;

impl SensorFactory {
    /// Validates one `hero.sensors` entry.
    ///
    /// # Errors
    ///
    /// [`ExperimentError::UnsupportedSensor`] for an unknown or missing type,
    /// [`ExperimentError::InvalidConfig`] for a camera without image size.
    pub fn spawn(name: &str, config: &SensorConfig) -> Result<SensorSpec, ExperimentError> {
        let kind = SensorKind::from_type_name(&config.type_name)?;

        let (image_size_x, image_size_y) = if kind.is_camera() {
            match (config.image_size_x, config.image_size_y) {
                (Some(x), Some(y)) if x > 0 && y > 0 => (x, y),
                _ => {
                    return Err(ExperimentError::InvalidConfig(format!(
                        "camera '{}' needs positive image_size_x and image_size_y",
                        name
                    )))
                }
            }
        } else {
            (0, 0)
        };

        Ok(SensorSpec {
            name: name.to_string(),
            kind,
            image_size_x,
            image_size_y,
            fov: config.fov.unwrap_or(90.0),
            yaw: config.yaw.unwrap_or(0.0),
        })
    }

    /// Spawns every configured sensor, in name order.
    pub fn spawn_all<'a, I>(entries: I) -> Result<Vec<SensorSpec>, ExperimentError>
    where
        I: IntoIterator<Item = (&'a String, &'a SensorConfig)>,
    {
        entries
            .into_iter()
            .map(|(name, config)| Self::spawn(name, config))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera(size: usize) -> SensorConfig {
        SensorConfig {
            type_name: "sensor.camera.semantic_segmentation".into(),
            image_size_x: Some(size),
            image_size_y: Some(size),
            ..SensorConfig::default()
        }
    }

    #[test]
    fn every_type_name_round_trips() {
        let names = [
            "sensor.camera.rgb",
            "sensor.camera.depth",
            "sensor.camera.semantic_segmentation",
            "sensor.camera.dvs",
            "sensor.lidar.ray_cast",
            "sensor.lidar.ray_cast_semantic",
            "sensor.other.radar",
            "sensor.other.gnss",
            "sensor.other.imu",
            "sensor.other.lane_invasion",
            "sensor.other.collision",
            "sensor.other.obstacle",
            "sensor.birdview",
        ];
        for name in names {
            assert_eq!(SensorKind::from_type_name(name).unwrap().type_name(), name);
        }
    }

    #[test]
    fn unknown_type_is_rejected() {
        let cfg = SensorConfig {
            type_name: "sensor.camera.thermal".into(),
            ..SensorConfig::default()
        };
        let err = SensorFactory::spawn("thermal", &cfg).unwrap_err();
        assert!(matches!(err, ExperimentError::UnsupportedSensor(t) if t == "sensor.camera.thermal"));
    }

    #[test]
    fn missing_type_is_rejected() {
        let err = SensorFactory::spawn("nothing", &SensorConfig::default()).unwrap_err();
        assert!(matches!(err, ExperimentError::UnsupportedSensor(_)));
    }

    #[test]
    fn camera_needs_image_size() {
        let cfg = SensorConfig {
            type_name: "sensor.camera.rgb".into(),
            ..SensorConfig::default()
        };
        let err = SensorFactory::spawn("cam", &cfg).unwrap_err();
        assert!(matches!(err, ExperimentError::InvalidConfig(_)));
    }

    #[test]
    fn camera_spec_carries_size() {
        let spec = SensorFactory::spawn("cam_sem_seg_front", &camera(84)).unwrap();
        assert_eq!(spec.kind, SensorKind::CameraSemanticSegmentation);
        assert_eq!((spec.image_size_x, spec.image_size_y), (84, 84));
        assert_eq!(spec.yaw, 0.0);
    }

    #[test]
    fn collision_sensor_needs_no_size() {
        let cfg = SensorConfig {
            type_name: "sensor.other.collision".into(),
            ..SensorConfig::default()
        };
        let spec = SensorFactory::spawn("collision", &cfg).unwrap();
        assert_eq!(spec.kind, SensorKind::Collision);
        assert!(!spec.kind.is_camera());
    }
}
