//! Head-rotation tests for each pose.
//!
//! | pose     | yaw            | pitch          |
//! |----------|----------------|----------------|
//! | straight | [-0.2, 0.2]    | [-0.2, 0.2]    |
//! | left     | < -0.2         | any            |
//! | right    | > 0.2          | any            |
//! | up       | any            | < -0.1         |
//! | down     | any            | > 0.1          |

use rollcall_types::{HeadRotation, Pose};

const STRAIGHT_LIMIT: f32 = 0.2;
const TURN_THRESHOLD: f32 = 0.2;
const TILT_THRESHOLD: f32 = 0.1;

pub fn is_aligned(pose: Pose, rotation: HeadRotation) -> bool {
    let HeadRotation { yaw, pitch } = rotation;
    match pose {
        Pose::Straight => {
            (-STRAIGHT_LIMIT..=STRAIGHT_LIMIT).contains(&yaw)
                && (-STRAIGHT_LIMIT..=STRAIGHT_LIMIT).contains(&pitch)
        }
        Pose::Left => yaw < -TURN_THRESHOLD,
        Pose::Right => yaw > TURN_THRESHOLD,
        Pose::Up => pitch < -TILT_THRESHOLD,
        Pose::Down => pitch > TILT_THRESHOLD,
    }
}
