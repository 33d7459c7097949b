//! Head poses captured during enrollment.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ProfileError;

/// A head orientation captured during enrollment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pose {
    Straight,
    Left,
    Right,
    Up,
    Down,
}

impl Pose {
    /// The default enrollment order.
    pub const ALL: [Pose; 5] = [Pose::Straight, Pose::Left, Pose::Right, Pose::Up, Pose::Down];

    pub fn as_str(&self) -> &'static str {
        match self {
            Pose::Straight => "straight",
            Pose::Left => "left",
            Pose::Right => "right",
            Pose::Up => "up",
            Pose::Down => "down",
        }
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pose {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "straight" => Ok(Pose::Straight),
            "left" => Ok(Pose::Left),
            "right" => Ok(Pose::Right),
            "up" => Ok(Pose::Up),
            "down" => Ok(Pose::Down),
            other => Err(ProfileError::UnknownPose(other.to_string())),
        }
    }
}

/// Estimated head rotation. Negative yaw turns left, negative pitch tilts up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HeadRotation {
    pub yaw: f32,
    pub pitch: f32,
}

impl HeadRotation {
    pub fn new(yaw: f32, pitch: f32) -> Self {
        Self { yaw, pitch }
    }
}
