/*!
Ragdoll transitions.

Behavior
- start: stop clips, hand the skeleton from the pelvis down to physics, drop
  capsule collision and lock the host movement mode.
- refresh (every tick while active): motor stiffness from root speed, gravity
  cut above terminal fall speed, ground probe under the target location, pull
  force toward the authoritative pelvis location on remote peers, actor yaw from
  the pelvis.
- stop: snapshot the final pose, pick a recovery clip when resting on the ground.
- finalize (the tick after stop): physics off, gravity back on, collision back,
  movement unlocked.

Pelvis bone axes: local +Y runs up the spine, local -Z points out of the belly.
*/

use crate::angle;
use crate::damping::{clamp01, exponential_decay_vec3, interp_to};
use crate::rig::{ClipId, ClipPlayback, ClipPlayer, PoseSnapshot, RigHandles, SkeletonPose};
use crate::settings::RagdollingSettings;
use crate::types::{Quat, Vec3};
use crate::world::{ObjectTypes, WorldQuery};

/// Blend-out of any clip interrupted by the ragdoll (seconds).
const CLIP_BLEND_OUT_TIME: f32 = 0.2;

/// Extra lift above the ground probe hit so the capsule does not start penetrating (meters).
const GROUND_CLEARANCE: f32 = 0.01;

/// Collision and simulation switches the ragdoll toggles on the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhysicsFlags {
    pub capsule_collision: bool,
    /// Mesh takes part in physics collision (query only otherwise).
    pub mesh_physics_collision: bool,
    pub mesh_simulating: bool,
    pub movement_mode_locked: bool,
    pub replicate_movement: bool,
}

impl Default for PhysicsFlags {
    fn default() -> Self {
        Self {
            capsule_collision: true,
            mesh_physics_collision: false,
            mesh_simulating: false,
            movement_mode_locked: false,
            replicate_movement: true,
        }
    }
}

/// Chooses the get-up clip once the ragdoll comes to rest.
pub trait SelectRecoveryClip {
    fn select_recovery_clip<'a>(
        &self,
        faced_upward: bool,
        settings: &'a RagdollingSettings,
    ) -> Option<&'a ClipId>;
}

/// Back clip when lying face up, front clip otherwise.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConfiguredRecoveryClip;

impl SelectRecoveryClip for ConfiguredRecoveryClip {
    fn select_recovery_clip<'a>(
        &self,
        faced_upward: bool,
        settings: &'a RagdollingSettings,
    ) -> Option<&'a ClipId> {
        let clip = if faced_upward {
            &settings.get_up_back_clip
        } else {
            &settings.get_up_front_clip
        };
        (!clip.is_none()).then_some(clip)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RagdollState {
    pub grounded: bool,
    pub faced_upward: bool,
    pub root_velocity: Vec3,
    pub pull_force: f32,
    pub pending_finalization: bool,
}

/// Per-tick inputs of [`RagdollController::refresh`].
#[derive(Clone, Copy, Debug)]
pub struct RagdollInput {
    pub dt: f32,
    /// This copy drives the ragdoll; remote copies are pulled toward `target_location`.
    pub locally_controlled: bool,
    /// Last replicated pelvis location.
    pub target_location: Vec3,
    pub capsule_half_height: f32,
    pub ground_object_types: ObjectTypes,
    pub actor_yaw: f32,
}

/// Actor pose derived from the ragdoll this tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RagdollUpdate {
    /// Capsule center.
    pub location: Vec3,
    pub yaw: f32,
    /// Target location to replicate; set only when locally controlled.
    pub new_target_location: Option<Vec3>,
}

/// Outcome of [`RagdollController::stop`].
#[derive(Clone, Debug, PartialEq)]
pub struct RagdollStop {
    pub pose: PoseSnapshot,
    /// Recovery clip that started playing; the character is getting up.
    pub recovery_clip: Option<ClipId>,
}

/// Outcome of [`RagdollController::finalize`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RagdollFinalize {
    pub grounded: bool,
    /// Velocity the host resumes falling with when not grounded.
    pub velocity: Vec3,
}

/// Face-up test and resulting actor yaw from the pelvis rotation.
pub fn pelvis_facing(pelvis_rotation: &Quat, fallback_yaw: f32) -> (bool, f32) {
    let belly = pelvis_rotation * -Vec3::z();
    let spine = pelvis_rotation * Vec3::y();
    let faced_upward = belly.y >= 0.0;

    let yaw = match angle::yaw_of(&spine) {
        Some(yaw) if faced_upward => angle::normalize(yaw - 180.0),
        Some(yaw) => yaw,
        // Upright pelvis: the spine has no planar direction, the belly does.
        None => angle::yaw_of(&belly).unwrap_or(fallback_yaw),
    };
    (faced_upward, yaw)
}

#[derive(Clone, Debug, Default)]
pub struct RagdollController {
    active: bool,
    state: RagdollState,
}

impl RagdollController {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[inline]
    pub fn state(&self) -> &RagdollState {
        &self.state
    }

    #[inline]
    pub fn is_allowed_to_start(&self) -> bool {
        !self.active
    }

    #[inline]
    pub fn is_allowed_to_stop(&self) -> bool {
        self.active
    }

    #[inline]
    pub fn is_pending_finalization(&self) -> bool {
        self.state.pending_finalization
    }

    /// Switch the skeleton to physics. Returns the pelvis location to replicate
    /// as the initial target when `locally_controlled`, or `None` when not allowed.
    pub fn start(
        &mut self,
        handles: &RigHandles,
        flags: &mut PhysicsFlags,
        skeleton: &mut impl SkeletonPose,
        clips: &mut impl ClipPlayer,
        locally_controlled: bool,
    ) -> Option<Option<Vec3>> {
        if !self.is_allowed_to_start() {
            return None;
        }

        clips.stop_slot(&handles.action_slot, CLIP_BLEND_OUT_TIME);

        flags.replicate_movement = false;
        flags.movement_mode_locked = true;
        flags.capsule_collision = false;
        flags.mesh_physics_collision = true;
        flags.mesh_simulating = true;
        skeleton.set_bones_simulating_physics(handles.pelvis, true);

        self.active = true;
        self.state.pull_force = 0.0;
        self.state.pending_finalization = false;

        log::info!("ragdoll start");

        let target = if locally_controlled {
            skeleton
                .bone_world_transform(handles.pelvis)
                .map(|pelvis| pelvis.translation)
        } else {
            None
        };
        Some(target)
    }

    /// Drive the ragdoll for one tick and derive the actor pose from it.
    ///
    /// Returns `None` when not active or the pelvis bone cannot be read.
    pub fn refresh(
        &mut self,
        input: &RagdollInput,
        settings: &RagdollingSettings,
        handles: &RigHandles,
        skeleton: &mut impl SkeletonPose,
        world: &impl WorldQuery,
    ) -> Option<RagdollUpdate> {
        if !self.active {
            return None;
        }

        // 1) Root velocity, smoothed on remote copies.
        let physics_velocity = skeleton.bone_physics_velocity(handles.root);
        self.state.root_velocity = if input.locally_controlled {
            physics_velocity
        } else {
            exponential_decay_vec3(
                self.state.root_velocity,
                physics_velocity,
                input.dt,
                settings.remote_velocity_interpolation_speed,
            )
        };

        // 2) Faster ragdolls get stiffer motors; no gravity past terminal speed.
        let stiffness = clamp01(self.state.root_velocity.norm() / settings.max_stiffness_speed)
            * settings.max_motor_stiffness;
        skeleton.set_joint_motor_strength(handles.pelvis, stiffness);
        skeleton.set_gravity_enabled(self.state.root_velocity.y > -settings.terminal_fall_speed);

        let Some(pelvis) = skeleton.bone_world_transform(handles.pelvis) else {
            log::error!("ragdoll refresh skipped: pelvis bone {:?} missing", handles.pelvis);
            debug_assert!(false, "pelvis bone missing");
            return None;
        };

        // 3) Target location: own pelvis, or the replicated one.
        let (target, new_target_location) = if input.locally_controlled {
            (pelvis.translation, Some(pelvis.translation))
        } else {
            (input.target_location, None)
        };

        // 4) Keep the lower half of the capsule out of the floor.
        let probe_end = target - Vec3::y() * input.capsule_half_height;
        let hit = world
            .raycast(target, probe_end, input.ground_object_types)
            .filter(|hit| hit.is_valid_blocking());
        self.state.grounded = hit.is_some();

        let mut location = target;
        if let Some(hit) = hit {
            location.y += input.capsule_half_height - (hit.point.y - target.y).abs() + GROUND_CLEARANCE;
        }

        // 5) Remote copies pull their body toward the authoritative pelvis.
        if !input.locally_controlled {
            self.state.pull_force = interp_to(
                self.state.pull_force,
                settings.max_pull_force,
                input.dt,
                settings.pull_force_interpolation_speed,
            );

            let velocity = self.state.root_velocity;
            let planar_speed_sq = velocity.x * velocity.x + velocity.z * velocity.z;
            let pulled_bone = if planar_speed_sq
                > settings.spine_pull_speed_threshold * settings.spine_pull_speed_threshold
            {
                handles.spine
            } else {
                handles.pelvis
            };

            if let Some(bone) = skeleton.bone_world_transform(pulled_bone) {
                let force = (target - bone.translation) * self.state.pull_force;
                skeleton.apply_force_at_bone(pulled_bone, force);
            }
        }

        // 6) Yaw from the way the pelvis lies.
        let (faced_upward, yaw) = pelvis_facing(&pelvis.rotation, input.actor_yaw);
        self.state.faced_upward = faced_upward;

        Some(RagdollUpdate {
            location,
            yaw,
            new_target_location,
        })
    }

    /// Leave the ragdoll. Finalization follows on the next tick.
    ///
    /// Returns `None` when not ragdolling.
    pub fn stop(
        &mut self,
        settings: &RagdollingSettings,
        selector: &dyn SelectRecoveryClip,
        clips: &mut impl ClipPlayer,
        slot: &str,
    ) -> Option<RagdollStop> {
        if !self.is_allowed_to_stop() {
            return None;
        }

        let pose = clips.snapshot_current_pose();
        self.active = false;
        self.state.pending_finalization = true;

        let recovery_clip = if self.state.grounded {
            selector
                .select_recovery_clip(self.state.faced_upward, settings)
                .filter(|clip| {
                    let playback = ClipPlayback {
                        blend_in_time: 0.0,
                        ..ClipPlayback::default()
                    };
                    clips.play_clip_on_slot(clip, slot, playback)
                })
                .cloned()
        } else {
            None
        };

        log::info!(
            "ragdoll stop: grounded {}, faced upward {}, recovery {:?}",
            self.state.grounded,
            self.state.faced_upward,
            recovery_clip
        );

        Some(RagdollStop {
            pose,
            recovery_clip,
        })
    }

    /// Hand the body back to the capsule. Returns `None` unless a stop is pending.
    pub fn finalize(
        &mut self,
        handles: &RigHandles,
        flags: &mut PhysicsFlags,
        skeleton: &mut impl SkeletonPose,
    ) -> Option<RagdollFinalize> {
        if !self.state.pending_finalization {
            return None;
        }
        self.state.pending_finalization = false;

        skeleton.set_bones_simulating_physics(handles.pelvis, false);
        // `refresh` may have cut gravity during a terminal-speed fall.
        skeleton.set_gravity_enabled(true);
        flags.mesh_simulating = false;
        flags.mesh_physics_collision = false;
        flags.capsule_collision = true;
        flags.movement_mode_locked = false;
        flags.replicate_movement = true;

        log::debug!("ragdoll finalized, grounded {}", self.state.grounded);

        Some(RagdollFinalize {
            grounded: self.state.grounded,
            velocity: self.state.root_velocity,
        })
    }
}
