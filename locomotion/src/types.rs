/*!
Core math aliases and the rigid `Transform` value shared by every controller.

This module intentionally contains no control logic. It defines the data types
exchanged between:
- the world query layer (ray casts, shape sweeps, overlaps)
- the skeleton/clip interfaces (bone poses)
- the controllers (rotation, feet, mantling, ragdoll)

Notes
- World space is +Y up, lengths in meters.
- Rotations are unit quaternions; yaw is the rotation about +Y (see `angle`).
*/

use nalgebra as na;
use serde::{Deserialize, Serialize};

/// Common math aliases for clarity and consistency.
pub type Vec3 = na::Vector3<f32>;
pub type Quat = na::UnitQuaternion<f32>;
pub type Iso = na::Isometry3<f32>;

/// A rigid transform (translation + rotation) in some reference space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    #[inline]
    pub fn identity() -> Self {
        Self::new(Vec3::zeros(), Quat::identity())
    }

    #[inline]
    pub fn new(translation: Vec3, rotation: Quat) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    #[inline]
    pub fn from_translation(translation: Vec3) -> Self {
        Self::new(translation, Quat::identity())
    }

    /// Convert to nalgebra `Isometry3` for use with rapier/parry queries.
    #[inline]
    pub fn iso(&self) -> Iso {
        Iso::from_parts(na::Translation3::from(self.translation), self.rotation)
    }

    #[inline]
    pub fn from_iso(iso: &Iso) -> Self {
        Self::new(iso.translation.vector, iso.rotation)
    }

    #[inline]
    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        Self::new(rotation * -self.translation, rotation)
    }

    /// `self` applied after `local`: maps `local`'s space into `self`'s parent space.
    #[inline]
    pub fn compose(&self, local: &Transform) -> Self {
        Self::new(
            self.translation + self.rotation * local.translation,
            self.rotation * local.rotation,
        )
    }

    /// Express `world` relative to `self` (the inverse of `compose`).
    #[inline]
    pub fn relative(&self, world: &Transform) -> Self {
        self.inverse().compose(world)
    }

    #[inline]
    pub fn transform_point(&self, point: &Vec3) -> Vec3 {
        self.translation + self.rotation * *point
    }

    /// Linear blend on translation, spherical on rotation. `alpha` is clamped to [0, 1].
    pub fn blend(&self, other: &Transform, alpha: f32) -> Self {
        let alpha = alpha.clamp(0.0, 1.0);
        Self::new(
            self.translation.lerp(&other.translation, alpha),
            slerp(&self.rotation, &other.rotation, alpha),
        )
    }

    pub fn is_finite(&self) -> bool {
        self.translation.iter().all(|v| v.is_finite())
            && self.rotation.coords.iter().all(|v| v.is_finite())
    }
}

/// Shortest-path spherical interpolation that tolerates (anti)parallel inputs.
#[inline]
pub fn slerp(from: &Quat, to: &Quat, alpha: f32) -> Quat {
    from.try_slerp(to, alpha, 1.0e-6)
        .unwrap_or_else(|| from.nlerp(to, alpha))
}

/// Capsule dimensions of the character body.
///
/// `half_height` is measured from the capsule center to the bottom of the lower cap,
/// so the total capsule height is `2 * half_height`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CapsuleSpec {
    pub radius: f32,
    pub half_height: f32,
}

impl Default for CapsuleSpec {
    fn default() -> Self {
        Self {
            radius: 0.3,
            half_height: 0.9,
        }
    }
}

impl CapsuleSpec {
    /// Half length of the cylinder section between the two caps.
    #[inline]
    pub fn segment_half_height(&self) -> f32 {
        (self.half_height - self.radius).max(0.0)
    }
}
