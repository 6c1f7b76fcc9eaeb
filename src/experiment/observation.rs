//! Observation encoding for the driving environment.
//!
//! Builds fixed-size `u8` tensors from the three semantic cameras. Each frame
//! concatenates the cameras along the channel axis (right, left, front) and
//! the frame stack prepends previous frames, oldest first:
//!
//! ```text
//! [x][y][ frame_{t-k} (9) ++ ... ++ frame_{t-1} (9) ++ frame_t (9) ]
//! ```

use std::collections::VecDeque;

use super::config::{ExperimentConfig, FRONT_CAMERA, LEFT_CAMERA, RIGHT_CAMERA};
use crate::error::ExperimentError;
use crate::world::simulator::{Image, SensorFrame};

/// Channels per camera image.
pub const CAMERA_CHANNELS: usize = 3;

/// Cameras concatenated into one frame, in channel order.
pub const STACKED_CAMERAS: [&str; 3] = [RIGHT_CAMERA, LEFT_CAMERA, FRONT_CAMERA];

/// Channels contributed by one stacked frame.
pub const FRAME_CHANNELS: usize = CAMERA_CHANNELS * STACKED_CAMERAS.len();

/// Bounds and shape of the observation tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservationSpace {
    /// `[image_size_x, image_size_y, channels]`.
    pub shape: [usize; 3],
    pub low: u8,
    pub high: u8,
}

impl ObservationSpace {
    pub fn for_experiment(config: &ExperimentConfig) -> Self {
        let (x, y) = config.camera_size();
        Self {
            shape: [x, y, FRAME_CHANNELS * config.others.framestack],
            low: 0,
            high: 255,
        }
    }

    /// Number of elements in one observation.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, observation: &Observation) -> bool {
        observation.shape == self.shape && observation.data.len() == self.len()
    }
}

/// A stacked camera observation laid out as `[x][y][channel]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub shape: [usize; 3],
    pub data: Vec<u8>,
}

impl Observation {
    pub fn zeros(shape: [usize; 3]) -> Self {
        Self {
            shape,
            data: vec![0; shape.iter().product()],
        }
    }

    pub fn get(&self, x: usize, y: usize, channel: usize) -> u8 {
        let [_, height, channels] = self.shape;
        self.data[(x * height + y) * channels + channel]
    }

    /// Values scaled to `[0, 1]`, in storage order.
    pub fn to_f32(&self) -> Vec<f32> {
        self.data.iter().map(|&v| v as f32 / 255.0).collect()
    }
}

/// Concatenates camera images and maintains the frame stack.
///
/// One builder belongs to one environment; call [`ObservationBuilder::reset`]
/// at the start of every episode so the first frame refills the history.
#[derive(Debug, Clone)]
pub struct ObservationBuilder {
    space: ObservationSpace,
    framestack: usize,
    /// Previous frames, oldest first. At most `framestack - 1` entries.
    history: VecDeque<Vec<u8>>,
}

impl ObservationBuilder {
    pub fn new(config: &ExperimentConfig) -> Self {
        Self {
            space: ObservationSpace::for_experiment(config),
            framestack: config.others.framestack,
            history: VecDeque::with_capacity(config.others.framestack),
        }
    }

    pub fn space(&self) -> ObservationSpace {
        self.space
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }

    /// Builds the observation for `frame` and pushes it onto the stack.
    ///
    /// # Errors
    ///
    /// [`ExperimentError::Simulator`] when a camera is missing from the frame
    /// or its image does not match the configured size.
    pub fn build(&mut self, frame: &SensorFrame) -> Result<Observation, ExperimentError> {
        let current = self.concat_cameras(frame)?;

        let depth = self.framestack.saturating_sub(1);
        if self.history.is_empty() {
            for _ in 0..depth {
                self.history.push_back(current.clone());
            }
        }

        let [width, height, channels] = self.space.shape;
        let mut data = Vec::with_capacity(self.space.len());
        for pixel in 0..width * height {
            let range = pixel * FRAME_CHANNELS..(pixel + 1) * FRAME_CHANNELS;
            for previous in &self.history {
                data.extend_from_slice(&previous[range.clone()]);
            }
            data.extend_from_slice(&current[range]);
        }
        debug_assert_eq!(data.len(), width * height * channels);

        if depth > 0 {
            if self.history.len() == depth {
                self.history.pop_front();
            }
            self.history.push_back(current);
        }

        Ok(Observation {
            shape: self.space.shape,
            data,
        })
    }

    /// Interleaves the three camera images into one `FRAME_CHANNELS` frame.
    fn concat_cameras(&self, frame: &SensorFrame) -> Result<Vec<u8>, ExperimentError> {
        let [width, height, _] = self.space.shape;
        let mut images: Vec<&Image> = Vec::with_capacity(STACKED_CAMERAS.len());
        for name in STACKED_CAMERAS {
            let image = frame.image(name).ok_or_else(|| {
                ExperimentError::Simulator(format!("no image from '{}' in frame {}", name, frame.frame))
            })?;
            if image.width != width || image.height != height || image.channels != CAMERA_CHANNELS {
                return Err(ExperimentError::Simulator(format!(
                    "'{}' produced a {}x{}x{} image, expected {}x{}x{}",
                    name, image.width, image.height, image.channels, width, height, CAMERA_CHANNELS
                )));
            }
            images.push(image);
        }

        let mut out = Vec::with_capacity(width * height * FRAME_CHANNELS);
        for pixel in 0..width * height {
            let range = pixel * CAMERA_CHANNELS..(pixel + 1) * CAMERA_CHANNELS;
            for image in &images {
                out.extend_from_slice(&image.data[range.clone()]);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::config::tests::minimal_config;
    use crate::world::simulator::SensorData;

    fn frame_with(width: usize, height: usize, values: [u8; 3]) -> SensorFrame {
        let mut frame = SensorFrame::default();
        for (name, value) in STACKED_CAMERAS.iter().zip(values) {
            let mut image = Image::zeros(width, height, CAMERA_CHANNELS);
            image.data.iter_mut().for_each(|b| *b = value);
            frame.data.insert(name.to_string(), SensorData::Image(image));
        }
        frame
    }

    fn config_with_framestack(framestack: usize) -> ExperimentConfig {
        let mut config = minimal_config().env_config.experiment;
        config.others.framestack = framestack;
        config
    }

    #[test]
    fn shape_matches_space_for_every_framestack() {
        for framestack in 1..=4 {
            let config = config_with_framestack(framestack);
            let mut builder = ObservationBuilder::new(&config);
            let space = builder.space();
            assert_eq!(space.shape, [16, 12, 9 * framestack]);
            for step in 0..6 {
                let obs = builder.build(&frame_with(16, 12, [1, 2, step])).unwrap();
                assert!(space.contains(&obs), "framestack {} step {}", framestack, step);
            }
        }
    }

    #[test]
    fn channels_are_right_left_front() {
        let config = config_with_framestack(1);
        let mut builder = ObservationBuilder::new(&config);
        let obs = builder.build(&frame_with(16, 12, [10, 20, 30])).unwrap();
        let pixel: Vec<u8> = (0..9).map(|c| obs.get(3, 4, c)).collect();
        assert_eq!(pixel, vec![10, 10, 10, 20, 20, 20, 30, 30, 30]);
    }

    #[test]
    fn first_frame_fills_history() {
        let config = config_with_framestack(3);
        let mut builder = ObservationBuilder::new(&config);
        let obs = builder.build(&frame_with(16, 12, [7, 7, 7])).unwrap();
        assert!(obs.data.iter().all(|&b| b == 7));
    }

    #[test]
    fn frames_are_ordered_oldest_first() {
        let config = config_with_framestack(3);
        let mut builder = ObservationBuilder::new(&config);
        builder.build(&frame_with(16, 12, [1, 1, 1])).unwrap();
        builder.build(&frame_with(16, 12, [2, 2, 2])).unwrap();
        let obs = builder.build(&frame_with(16, 12, [3, 3, 3])).unwrap();
        let firsts: Vec<u8> = (0..3).map(|f| obs.get(0, 0, f * 9)).collect();
        assert_eq!(firsts, vec![1, 2, 3]);

        let obs = builder.build(&frame_with(16, 12, [4, 4, 4])).unwrap();
        let firsts: Vec<u8> = (0..3).map(|f| obs.get(15, 11, f * 9)).collect();
        assert_eq!(firsts, vec![2, 3, 4]);
    }

    #[test]
    fn reset_clears_history() {
        let config = config_with_framestack(2);
        let mut builder = ObservationBuilder::new(&config);
        builder.build(&frame_with(16, 12, [1, 1, 1])).unwrap();
        builder.reset();
        let obs = builder.build(&frame_with(16, 12, [9, 9, 9])).unwrap();
        assert!(obs.data.iter().all(|&b| b == 9));
    }

    #[test]
    fn missing_camera_is_an_error() {
        let config = config_with_framestack(1);
        let mut builder = ObservationBuilder::new(&config);
        let mut frame = frame_with(16, 12, [1, 1, 1]);
        frame.data.remove(LEFT_CAMERA);
        assert!(matches!(
            builder.build(&frame),
            Err(ExperimentError::Simulator(_))
        ));
    }

    #[test]
    fn wrong_image_size_is_an_error() {
        let config = config_with_framestack(1);
        let mut builder = ObservationBuilder::new(&config);
        assert!(builder.build(&frame_with(8, 12, [1, 1, 1])).is_err());
    }
}
