//! Continuous action space and its mapping onto vehicle controls.

use serde::{Deserialize, Serialize};

/// Number of action components: throttle, steer, brake.
pub const ACTION_DIM: usize = 3;

/// Raw policy output `[throttle, steer, brake]`.
pub type Action = [f32; ACTION_DIM];

/// Axis-aligned box of valid actions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxSpace {
    pub low: Action,
    pub high: Action,
}

impl BoxSpace {
    /// Throttle in `[0, 1]`, steer in `[-1, 1]`, brake in `[0, 1]`.
    pub fn driving() -> Self {
        Self {
            low: [0.0, -1.0, 0.0],
            high: [1.0, 1.0, 1.0],
        }
    }

    /// Clamps every component into the box. NaN components map to the lower bound.
    pub fn clip(&self, action: &Action) -> Action {
        let mut out = [0.0; ACTION_DIM];
        for i in 0..ACTION_DIM {
            let v = if action[i].is_nan() {
                self.low[i]
            } else {
                action[i]
            };
            out[i] = v.clamp(self.low[i], self.high[i]);
        }
        out
    }

    pub fn contains(&self, action: &Action) -> bool {
        (0..ACTION_DIM).all(|i| action[i] >= self.low[i] && action[i] <= self.high[i])
    }
}

/// Control command applied to the hero for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VehicleControl {
    pub throttle: f32,
    pub steer: f32,
    pub brake: f32,
    pub hand_brake: bool,
    pub reverse: bool,
}

impl VehicleControl {
    /// Maps a policy action onto a control.
    ///
    /// The action is clipped into `space` first. Throttle and brake are
    /// mutually exclusive: whichever is larger wins, ties go to the brake.
    pub fn from_action(action: &Action, space: &BoxSpace) -> Self {
        let [throttle, steer, brake] = space.clip(action);
        let throttling = throttle > brake;
        Self {
            throttle: if throttling { throttle } else { 0.0 },
            steer,
            brake: if throttling { 0.0 } else { brake },
            hand_brake: false,
            reverse: false,
        }
    }
}
