//! Matrix helpers.
//!
//! Navigation matrices are rigid (rotation + translation); scale is kept
//! separately and only multiplied in when a world matrix is needed.

use glam::{DMat4, DQuat, DVec3, EulerRot};

pub fn translation_of(m: &DMat4) -> DVec3 {
    m.w_axis.truncate()
}

/// Rotation part of `m`, with any scale removed.
pub fn rotation_of(m: &DMat4) -> DQuat {
    let (_, rotation, _) = m.to_scale_rotation_translation();
    rotation.normalize()
}

/// `m` without its scale.
pub fn rigid_part(m: &DMat4) -> DMat4 {
    let (_, rotation, translation) = m.to_scale_rotation_translation();
    DMat4::from_rotation_translation(rotation.normalize(), translation)
}

/// Heading of `rotation` around world Y, in radians.
pub fn yaw_of(rotation: DQuat) -> f64 {
    let (yaw, _pitch, _roll) = rotation.to_euler(EulerRot::YXZ);
    yaw
}

/// `rotation` with pitch and roll stripped.
pub fn yaw_only(rotation: DQuat) -> DQuat {
    DQuat::from_rotation_y(yaw_of(rotation))
}

/// Yaw, pitch and roll increments in degrees, applied Y then X then Z.
pub fn rotation_ypr_degrees(yaw: f64, pitch: f64, roll: f64) -> DMat4 {
    DMat4::from_rotation_y(yaw.to_radians())
        * DMat4::from_rotation_x(pitch.to_radians())
        * DMat4::from_rotation_z(roll.to_radians())
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Cubic transfer function: `v` rescaled to length `min(|v|, 1)^3`.
pub fn ease_cubic(v: DVec3) -> DVec3 {
    let length = v.length();
    if length == 0.0 {
        return DVec3::ZERO;
    }
    v / length * length.min(1.0).powi(3)
}
