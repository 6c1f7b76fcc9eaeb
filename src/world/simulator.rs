//! Simulator seam: sensor data types and the [`Simulator`] trait.

use std::collections::BTreeMap;

use super::snapshot::WorldSnapshot;
use crate::error::ExperimentError;
use crate::experiment::action::VehicleControl;
use crate::experiment::sensors::SensorSpec;

/// An 8-bit image laid out as `[width][height][channels]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub data: Vec<u8>,
}

impl Image {
    /// Creates a black image.
    pub fn zeros(width: usize, height: usize, channels: usize) -> Self {
        Self {
            width,
            height,
            channels,
            data: vec![0; width * height * channels],
        }
    }

    /// Byte offset of pixel `(x, y)`.
    pub fn offset(&self, x: usize, y: usize) -> usize {
        (x * self.height + y) * self.channels
    }

    pub fn pixel(&self, x: usize, y: usize) -> &[u8] {
        let o = self.offset(x, y);
        &self.data[o..o + self.channels]
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, value: &[u8]) {
        let o = self.offset(x, y);
        self.data[o..o + self.channels].copy_from_slice(value);
    }
}

/// A collision reported by the hero's collision sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionEvent {
    /// Index of the other vehicle, if the collision was with one.
    pub other_vehicle: Option<usize>,
    /// Closing speed at impact, m/s.
    pub impulse: f64,
}

/// One reading of one sensor.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorData {
    Image(Image),
    Collision(CollisionEvent),
}

/// All sensor readings produced by a single tick, keyed by sensor name.
///
/// Event sensors (collision) only appear in the frame when they fired.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorFrame {
    pub frame: u64,
    pub data: BTreeMap<String, SensorData>,
}

impl SensorFrame {
    pub fn image(&self, name: &str) -> Option<&Image> {
        match self.data.get(name) {
            Some(SensorData::Image(image)) => Some(image),
            _ => None,
        }
    }

    pub fn has_collision(&self) -> bool {
        self.data
            .values()
            .any(|d| matches!(d, SensorData::Collision(_)))
    }
}

/// A driving simulator hosting one hero vehicle.
///
/// Calls follow the lifecycle `attach_sensors` → (`reset` → (`apply_control`
/// → `tick` → `snapshot`)*)*.
pub trait Simulator {
    /// Registers the hero's sensors. Called once before the first reset.
    fn attach_sensors(&mut self, sensors: &[SensorSpec]) -> Result<(), ExperimentError>;

    /// Respawns the hero and background traffic for a new episode.
    fn reset(&mut self) -> Result<(), ExperimentError>;

    /// Sets the control applied during the next tick.
    fn apply_control(&mut self, control: &VehicleControl);

    /// Advances the world by one timestep and returns the sensor readings.
    fn tick(&mut self) -> Result<SensorFrame, ExperimentError>;

    /// World state after the last tick.
    fn snapshot(&self) -> WorldSnapshot;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_pixel_layout() {
        let mut img = Image::zeros(4, 3, 3);
        img.set_pixel(2, 1, &[1, 2, 3]);
        assert_eq!(img.pixel(2, 1), &[1, 2, 3]);
        assert_eq!(img.offset(2, 1), (2 * 3 + 1) * 3);
        assert_eq!(img.data.iter().filter(|&&b| b != 0).count(), 3);
    }

    #[test]
    fn frame_collision_detection() {
        let mut frame = SensorFrame::default();
        assert!(!frame.has_collision());
        frame
            .data
            .insert("cam".into(), SensorData::Image(Image::zeros(1, 1, 3)));
        assert!(!frame.has_collision());
        assert!(frame.image("cam").is_some());
        frame.data.insert(
            "collision".into(),
            SensorData::Collision(CollisionEvent {
                other_vehicle: Some(0),
                impulse: 3.0,
            }),
        );
        assert!(frame.has_collision());
        assert!(frame.image("collision").is_none());
    }
}
