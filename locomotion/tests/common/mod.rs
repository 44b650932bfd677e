//! Scripted host fakes shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;

use locomotion::rig::{BoneId, ClipId, ClipPlayback, ClipPlayer, CurveId, PoseSnapshot, RigNames, SkeletonPose};
use locomotion::{
    Character, ColliderShapeDef, LocomotionSettings, MovementInput, NetRole, Quat, RapierQueryWorld,
    Transform, Vec3, WorldPrimitiveDef,
};

pub const DT: f32 = 1.0 / 30.0;

/// Skeleton with named bones and curves whose poses the test scripts directly.
pub struct FakeSkeleton {
    bones: Vec<(String, Transform)>,
    curves: Vec<(String, f32)>,
    pub component: Transform,
    pub animation_update_count: u64,
    pub root_velocity: Vec3,
    pub simulating: bool,
    pub gravity_enabled: bool,
    pub motor_strength: f32,
    pub forces: Vec<(BoneId, Vec3)>,
}

impl FakeSkeleton {
    /// Upright skeleton whose capsule center is `center`.
    pub fn standing(center: Vec3) -> Self {
        let names = RigNames::default();
        let feet = center - Vec3::y() * 0.9;
        let bones = vec![
            (names.root_bone, Transform::new(feet, Quat::identity())),
            (names.pelvis_bone, Transform::new(center, Quat::identity())),
            (
                names.spine_bone,
                Transform::new(center + Vec3::y() * 0.3, Quat::identity()),
            ),
            (
                names.foot_left_bone,
                Transform::new(feet + Vec3::new(-0.1, 0.135, 0.0), Quat::identity()),
            ),
            (
                names.foot_right_bone,
                Transform::new(feet + Vec3::new(0.1, 0.135, 0.0), Quat::identity()),
            ),
        ];
        let curves = vec![
            (names.foot_left_ik_curve, 1.0),
            (names.foot_right_ik_curve, 1.0),
            (names.foot_left_lock_curve, 0.0),
            (names.foot_right_lock_curve, 0.0),
            (names.rotation_yaw_speed_curve, 0.0),
            (names.rotation_yaw_offset_curve, 0.0),
        ];

        Self {
            bones,
            curves,
            component: Transform::new(feet, Quat::identity()),
            animation_update_count: 0,
            root_velocity: Vec3::zeros(),
            simulating: false,
            gravity_enabled: true,
            motor_strength: 0.0,
            forces: Vec::new(),
        }
    }

    /// Skeleton without the named bone, for load-time resolution failures.
    pub fn without_bone(mut self, name: &str) -> Self {
        self.bones.retain(|(bone, _)| bone != name);
        self
    }

    pub fn set_bone(&mut self, name: &str, transform: Transform) {
        if let Some((_, pose)) = self.bones.iter_mut().find(|(bone, _)| bone == name) {
            *pose = transform;
        }
    }

    pub fn set_curve(&mut self, name: &str, value: f32) {
        if let Some((_, current)) = self.curves.iter_mut().find(|(curve, _)| curve == name) {
            *current = value;
        }
    }

    /// Lay the pelvis on its back at `location`, head toward +Z.
    pub fn lie_on_back(&mut self, location: Vec3) {
        let rotation = Quat::from_axis_angle(&Vec3::x_axis(), std::f32::consts::FRAC_PI_2);
        let names = RigNames::default();
        self.set_bone(&names.pelvis_bone, Transform::new(location, rotation));
        self.set_bone(
            &names.spine_bone,
            Transform::new(location + Vec3::z() * 0.3, rotation),
        );
    }
}

impl SkeletonPose for FakeSkeleton {
    fn resolve_bone(&self, name: &str) -> Option<BoneId> {
        self.bones
            .iter()
            .position(|(bone, _)| bone == name)
            .map(|index| BoneId(index as u16))
    }

    fn resolve_curve(&self, name: &str) -> Option<CurveId> {
        self.curves
            .iter()
            .position(|(curve, _)| curve == name)
            .map(|index| CurveId(index as u16))
    }

    fn component_transform(&self) -> Transform {
        self.component
    }

    fn bone_world_transform(&self, bone: BoneId) -> Option<Transform> {
        self.bones.get(usize::from(bone.0)).map(|(_, pose)| *pose)
    }

    fn curve_value(&self, curve: CurveId) -> f32 {
        self.curves
            .get(usize::from(curve.0))
            .map_or(0.0, |(_, value)| *value)
    }

    fn animation_update_count(&self) -> u64 {
        self.animation_update_count
    }

    fn set_bones_simulating_physics(&mut self, _from_bone: BoneId, enabled: bool) {
        self.simulating = enabled;
    }

    fn apply_force_at_bone(&mut self, bone: BoneId, force: Vec3) {
        self.forces.push((bone, force));
    }

    fn bone_physics_velocity(&self, _bone: BoneId) -> Vec3 {
        self.root_velocity
    }

    fn set_joint_motor_strength(&mut self, _from_bone: BoneId, strength: f32) {
        self.motor_strength = strength;
    }

    fn set_gravity_enabled(&mut self, enabled: bool) {
        self.gravity_enabled = enabled;
    }
}

/// Clip player that keeps one clip per slot until told to finish it.
#[derive(Default)]
pub struct FakeClips {
    playing: HashMap<String, ClipId>,
    pub played: Vec<(ClipId, ClipPlayback)>,
    snapshots: u64,
}

impl FakeClips {
    pub fn playing_on(&self, slot: &str) -> Option<&ClipId> {
        self.playing.get(slot)
    }

    /// The clip on `slot` reached its end.
    pub fn finish(&mut self, slot: &str) {
        self.playing.remove(slot);
    }
}

impl ClipPlayer for FakeClips {
    fn play_clip_on_slot(&mut self, clip: &ClipId, slot: &str, playback: ClipPlayback) -> bool {
        self.playing.insert(slot.to_string(), clip.clone());
        self.played.push((clip.clone(), playback));
        true
    }

    fn stop_slot(&mut self, slot: &str, _blend_out_time: f32) {
        self.playing.remove(slot);
    }

    fn is_clip_playing_on_slot(&self, clip: &ClipId, slot: &str) -> bool {
        self.playing.get(slot) == Some(clip)
    }

    fn snapshot_current_pose(&mut self) -> PoseSnapshot {
        self.snapshots += 1;
        PoseSnapshot(self.snapshots)
    }
}

/// Flat floor whose top is at y = 0.
pub fn floor() -> WorldPrimitiveDef {
    WorldPrimitiveDef::fixed(
        1,
        Vec3::new(0.0, -0.5, 0.0),
        ColliderShapeDef::Cuboid {
            half_extents: Vec3::new(20.0, 0.5, 20.0),
        },
    )
}

/// Block in front of a character standing at the origin facing -Z.
/// Its wall face is at z = -0.5 and its top at `height`.
pub fn ledge(height: f32) -> WorldPrimitiveDef {
    WorldPrimitiveDef::fixed(
        2,
        Vec3::new(0.0, height * 0.5, -1.5),
        ColliderShapeDef::Cuboid {
            half_extents: Vec3::new(2.0, height * 0.5, 1.0),
        },
    )
}

pub fn world(defs: Vec<WorldPrimitiveDef>) -> RapierQueryWorld {
    RapierQueryWorld::build(defs)
}

/// Character standing on the floor at the origin, facing -Z.
pub fn character(role: NetRole, skeleton: &FakeSkeleton) -> Character {
    Character::from_skeleton(
        LocomotionSettings::default(),
        role,
        skeleton,
        Vec3::new(0.0, 0.9, 0.0),
        0.0,
    )
    .expect("default rig names resolve")
}

/// Host movement result that keeps whatever the character asked for.
pub fn idle_input(character: &Character) -> MovementInput {
    MovementInput {
        location: character.location(),
        velocity: character.velocity(),
        movement_mode: character.movement_mode(),
        view_yaw: character.state_machine().view().yaw,
        ..MovementInput::default()
    }
}
