//! Spatial primitives shared by the world snapshot and the reward evaluator.
//!
//! World frame: `x` forward, `y` to the right, `z` up. Yaw grows from `+x`
//! toward `+y`, and a positive steering command turns toward `+y`. All reward
//! geometry is planar: heights only matter for the off-map check.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A point in world space, in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Location {
    /// Creates a new location.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to `other` ignoring the vertical axis.
    pub fn planar_distance(&self, other: &Location) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Returns the point `distance` meters ahead along a planar `direction`,
    /// keeping the current height.
    pub fn offset_along(&self, direction: Vector2, distance: f64) -> Location {
        Location {
            x: self.x + direction.x * distance,
            y: self.y + direction.y * distance,
            z: self.z,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

/// A planar vector, used for headings.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector2 {
    pub x: f64,
    pub y: f64,
}

impl Vector2 {
    /// Creates a new vector.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Unit vector pointing along `yaw` (radians, from `+x` toward `+y`).
    pub fn from_yaw(yaw: f64) -> Self {
        Self {
            x: yaw.cos(),
            y: yaw.sin(),
        }
    }

    pub fn dot(&self, other: &Vector2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Scalar (z component of the) cross product `self × other`.
    pub fn cross(&self, other: &Vector2) -> f64 {
        self.x * other.y - self.y * other.x
    }

    pub fn norm(&self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Returns the unit vector with the same direction.
    ///
    /// Returns the zero vector if `self` is (numerically) zero.
    pub fn normalized(&self) -> Self {
        let n = self.norm();
        if n < 1e-12 {
            Self::default()
        } else {
            Self {
                x: self.x / n,
                y: self.y / n,
            }
        }
    }

    /// Signed angle in `[-π, π)` that rotates `reference` onto `self`.
    ///
    /// Positive when `self` is yawed toward `+y` relative to `reference`,
    /// the same direction a positive steering command turns.
    pub fn deviation_from(&self, reference: &Vector2) -> f64 {
        -self.cross(reference).atan2(self.dot(reference))
    }
}
