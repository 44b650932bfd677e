//! Yaw and angle helpers (degrees).
//!
//! Convention: +Y is up, yaw 0 faces -Z and positive yaw turns counter-clockwise
//! when seen from above, so `direction(yaw) = (-sin, 0, -cos)`.

use nalgebra::Vector2;

use crate::constants::{COUNTER_CLOCKWISE_ROTATION_ANGLE_THRESHOLD, YAW_EPS};
use crate::types::{Quat, Vec3};

/// Wrap an angle to `(-180, 180]`.
#[inline]
pub fn normalize(angle: f32) -> f32 {
    if !angle.is_finite() {
        return 0.0;
    }

    let mut wrapped = angle % 360.0;
    if wrapped > 180.0 {
        wrapped -= 360.0;
    } else if wrapped <= -180.0 {
        wrapped += 360.0;
    }
    wrapped
}

/// Remap an angle in `(-180, 180]` so values close to a half turn go counter-clockwise.
#[inline]
pub fn remap_for_counter_clockwise_rotation(angle: f32) -> f32 {
    if angle > 180.0 - COUNTER_CLOCKWISE_ROTATION_ANGLE_THRESHOLD {
        angle - 360.0
    } else {
        angle
    }
}

/// Shortest signed difference `to - from`, wrapped.
#[inline]
pub fn delta(from: f32, to: f32) -> f32 {
    normalize(to - from)
}

/// Lerp along the shortest arc (after the counter-clockwise remap). Result is wrapped.
#[inline]
pub fn lerp(from: f32, to: f32, alpha: f32) -> f32 {
    let d = remap_for_counter_clockwise_rotation(delta(from, to));
    normalize(from + d * alpha)
}

/// Yaw of a planar direction stored as (x, z).
///
/// Returns `None` when the direction is too short to have a meaningful yaw.
pub fn yaw_from_xz(xz: Vector2<f32>) -> Option<f32> {
    if xz.norm_squared() > YAW_EPS {
        return Some((-xz[0]).atan2(-xz[1]).to_degrees());
    }

    None
}

/// Yaw of a world-space vector, ignoring its vertical component.
#[inline]
pub fn yaw_of(v: &Vec3) -> Option<f32> {
    yaw_from_xz(Vector2::new(v.x, v.z))
}

/// Unit planar direction for a yaw.
#[inline]
pub fn direction(yaw: f32) -> Vec3 {
    let (s, c) = yaw.to_radians().sin_cos();
    Vec3::new(-s, 0.0, -c)
}

/// Rotation about +Y for a yaw.
#[inline]
pub fn yaw_rotation(yaw: f32) -> Quat {
    Quat::from_axis_angle(&Vec3::y_axis(), yaw.to_radians())
}

/// Yaw of a rotation's forward (-Z) axis. Falls back to 0 when looking straight up or down.
#[inline]
pub fn yaw_of_rotation(rotation: &Quat) -> f32 {
    let forward = rotation * Vec3::new(0.0, 0.0, -1.0);
    yaw_of(&forward).unwrap_or(0.0)
}

/// Replace the yaw of a rotation while keeping its pitch and roll.
pub fn with_yaw(rotation: &Quat, yaw: f32) -> Quat {
    let current = yaw_of_rotation(rotation);
    yaw_rotation(yaw - current) * rotation
}
