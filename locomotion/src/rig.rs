/*!
Skeleton, clip playback and name registry interfaces.

The host owns the skeleton and the animation graph. Controllers only talk to
it through [`SkeletonPose`] and [`ClipPlayer`], using integer handles resolved
once at load time ([`RigHandles::resolve`]) instead of looking names up every tick.
*/

use serde::{Deserialize, Serialize};

use crate::error::RigError;
use crate::types::{Transform, Vec3};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BoneId(pub u16);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CurveId(pub u16);

/// Reference to an authored clip (montage) by asset name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClipId(pub String);

impl ClipId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn is_none(&self) -> bool {
        self.0.is_empty()
    }
}

/// Opaque handle of a pose captured by [`ClipPlayer::snapshot_current_pose`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PoseSnapshot(pub u64);

/// Playback parameters for [`ClipPlayer::play_clip_on_slot`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClipPlayback {
    pub blend_in_time: f32,
    pub blend_out_time: f32,
    pub play_rate: f32,
    pub start_time: f32,
}

impl Default for ClipPlayback {
    fn default() -> Self {
        Self {
            blend_in_time: 0.25,
            blend_out_time: 0.25,
            play_rate: 1.0,
            start_time: 0.0,
        }
    }
}

/// Read/write access to the host skeleton.
pub trait SkeletonPose {
    fn resolve_bone(&self, name: &str) -> Option<BoneId>;
    fn resolve_curve(&self, name: &str) -> Option<CurveId>;

    /// World transform of the skeletal mesh component.
    fn component_transform(&self) -> Transform;
    /// Uniform scale of the skeletal mesh component.
    fn component_scale(&self) -> f32 {
        1.0
    }

    fn bone_world_transform(&self, bone: BoneId) -> Option<Transform>;
    fn curve_value(&self, curve: CurveId) -> f32;

    /// Number of completed animation graph evaluations so far.
    fn animation_update_count(&self) -> u64;

    fn set_bones_simulating_physics(&mut self, from_bone: BoneId, enabled: bool);
    fn apply_force_at_bone(&mut self, bone: BoneId, force: Vec3);
    fn bone_physics_velocity(&self, bone: BoneId) -> Vec3;
    fn set_joint_motor_strength(&mut self, from_bone: BoneId, strength: f32);
    fn set_gravity_enabled(&mut self, enabled: bool);
}

/// Clip (montage) slots on the host animation graph.
pub trait ClipPlayer {
    /// Returns false when the clip could not be played.
    fn play_clip_on_slot(&mut self, clip: &ClipId, slot: &str, playback: ClipPlayback) -> bool;
    fn stop_slot(&mut self, slot: &str, blend_out_time: f32);
    fn is_clip_playing_on_slot(&self, clip: &ClipId, slot: &str) -> bool;
    fn snapshot_current_pose(&mut self) -> PoseSnapshot;
}

/// Configured bone, curve and slot names.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RigNames {
    pub root_bone: String,
    pub pelvis_bone: String,
    pub spine_bone: String,
    pub foot_left_bone: String,
    pub foot_right_bone: String,
    pub foot_left_ik_curve: String,
    pub foot_right_ik_curve: String,
    pub foot_left_lock_curve: String,
    pub foot_right_lock_curve: String,
    pub rotation_yaw_speed_curve: String,
    pub rotation_yaw_offset_curve: String,
    pub action_slot: String,
}

impl Default for RigNames {
    fn default() -> Self {
        Self {
            root_bone: "root".into(),
            pelvis_bone: "pelvis".into(),
            spine_bone: "spine_03".into(),
            foot_left_bone: "foot_l".into(),
            foot_right_bone: "foot_r".into(),
            foot_left_ik_curve: "FootLeftIk".into(),
            foot_right_ik_curve: "FootRightIk".into(),
            foot_left_lock_curve: "FootLeftLock".into(),
            foot_right_lock_curve: "FootRightLock".into(),
            rotation_yaw_speed_curve: "RotationYawSpeed".into(),
            rotation_yaw_offset_curve: "RotationYawOffset".into(),
            action_slot: "DefaultSlot".into(),
        }
    }
}

/// Per-foot handles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FootHandles {
    pub bone: BoneId,
    pub ik_curve: CurveId,
    pub lock_curve: CurveId,
}

/// Names resolved against a concrete skeleton.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RigHandles {
    pub root: BoneId,
    pub pelvis: BoneId,
    pub spine: BoneId,
    pub left_foot: FootHandles,
    pub right_foot: FootHandles,
    pub rotation_yaw_speed: CurveId,
    pub rotation_yaw_offset: CurveId,
    pub action_slot: String,
}

impl RigHandles {
    pub fn resolve(names: &RigNames, skeleton: &impl SkeletonPose) -> Result<Self, RigError> {
        let bone = |name: &String| {
            skeleton
                .resolve_bone(name)
                .ok_or_else(|| RigError::MissingBone(name.clone()))
        };
        let curve = |name: &String| {
            skeleton
                .resolve_curve(name)
                .ok_or_else(|| RigError::MissingCurve(name.clone()))
        };

        Ok(Self {
            root: bone(&names.root_bone)?,
            pelvis: bone(&names.pelvis_bone)?,
            spine: bone(&names.spine_bone)?,
            left_foot: FootHandles {
                bone: bone(&names.foot_left_bone)?,
                ik_curve: curve(&names.foot_left_ik_curve)?,
                lock_curve: curve(&names.foot_left_lock_curve)?,
            },
            right_foot: FootHandles {
                bone: bone(&names.foot_right_bone)?,
                ik_curve: curve(&names.foot_right_ik_curve)?,
                lock_curve: curve(&names.foot_right_lock_curve)?,
            },
            rotation_yaw_speed: curve(&names.rotation_yaw_speed_curve)?,
            rotation_yaw_offset: curve(&names.rotation_yaw_offset_curve)?,
            action_slot: names.action_slot.clone(),
        })
    }
}
