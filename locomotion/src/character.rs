/*!
Character orchestrator.

Owns every controller of one character copy and runs them in a fixed order
once per host tick:

1) adopt the host movement result (teleport detection)
2) finalize a ragdoll stopped on the previous tick
3) inbound network messages
4) state machine: input, movement base, view, locomotion, mode, gait, rotation mode
5) scheduled tasks
6) rotation
7) mantling (in-air attempt, then the per-tick blend)
8) ragdoll
9) actions (roll, get-up)

Foot IK runs separately in [`Character::tick_animation`], after the host
movement update of the same frame.

Network roles
- Authority applies actions and desired values and broadcasts them.
- Autonomous proxies apply locally (prediction) and send a request.
- Simulated proxies only apply what the authority broadcasts.
*/

use std::collections::VecDeque;

use crate::angle;
use crate::constants::{MAX_PREDICTED_EVENTS, MAX_TICK_DT_S, TELEPORT_DISTANCE_WINDOW_S};
use crate::error::RigError;
use crate::feet::{FeetIk, FeetInput, FeetOutput};
use crate::mantling::{
    self, ConfiguredMantleSettings, LedgeQuery, MantlingController, MantlingParams,
    SelectMantleSettings,
};
use crate::net::{ActionEvent, DesiredValue, NetMessage, NetRole};
use crate::ragdoll::{
    ConfiguredRecoveryClip, PhysicsFlags, RagdollController, RagdollInput, SelectRecoveryClip,
};
use crate::rig::{ClipId, ClipPlayer, PoseSnapshot, RigHandles, SkeletonPose};
use crate::rolling::{self, RollStart, RollingController};
use crate::rotation::{self, RotationController, RotationCurves, RotationInput};
use crate::schedule::Scheduler;
use crate::settings::LocomotionSettings;
use crate::state::{
    Gait, LocomotionAction, LocomotionMode, LocomotionStateMachine, MovementBaseState,
    MovementInput, MovementMode, OverlayMode, RotationMode, Stance, ViewMode, gait_amount,
};
use crate::types::{Transform, Vec3};
use crate::world::WorldQuery;

/// Delayed work owned by a character.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CharacterTask {
    ResetBrakingFriction,
}

/// Host services borrowed for one tick.
pub struct HostContext<'a, S, C, W> {
    pub skeleton: &'a mut S,
    pub clips: &'a mut C,
    pub world: &'a W,
}

impl<'a, S, C, W> HostContext<'a, S, C, W> {
    pub fn new(skeleton: &'a mut S, clips: &'a mut C, world: &'a W) -> Self {
        Self {
            skeleton,
            clips,
            world,
        }
    }
}

pub struct Character {
    settings: LocomotionSettings,
    handles: RigHandles,
    role: NetRole,
    locally_controlled: bool,

    machine: LocomotionStateMachine,
    movement_base: MovementBaseState,
    rotation: RotationController,
    feet: FeetIk,
    mantling: MantlingController,
    ragdoll: RagdollController,
    rolling: RollingController,
    scheduler: Scheduler<CharacterTask>,
    mantle_settings: Box<dyn SelectMantleSettings + Send + Sync>,
    recovery_clips: Box<dyn SelectRecoveryClip + Send + Sync>,

    location: Vec3,
    yaw: f32,
    velocity: Vec3,
    previous_velocity: Vec3,
    movement_mode: MovementMode,
    flags: PhysicsFlags,
    braking_friction_factor: f32,
    recovery_clip: Option<ClipId>,
    last_pose_snapshot: Option<PoseSnapshot>,

    ticked: bool,
    pending_update: bool,
    resuming: bool,
    time: f64,
    last_teleport_time: Option<f64>,

    predicted_events: VecDeque<ActionEvent>,
    inbox: VecDeque<NetMessage>,
    outbox: Vec<NetMessage>,
}

impl std::fmt::Debug for Character {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Character")
            .field("role", &self.role)
            .field("location", &self.location)
            .field("yaw", &self.yaw)
            .field("movement_mode", &self.movement_mode)
            .field("locomotion_mode", &self.machine.locomotion_mode())
            .field("action", &self.machine.action())
            .finish_non_exhaustive()
    }
}

impl Character {
    /// `location` is the capsule center.
    pub fn new(
        settings: LocomotionSettings,
        handles: RigHandles,
        role: NetRole,
        location: Vec3,
        yaw: f32,
    ) -> Self {
        let yaw = angle::normalize(yaw);
        Self {
            settings,
            handles,
            role,
            locally_controlled: role.can_initiate(),
            machine: LocomotionStateMachine::new(yaw, yaw),
            movement_base: MovementBaseState::default(),
            rotation: RotationController::new(),
            feet: FeetIk::new(),
            mantling: MantlingController::new(),
            ragdoll: RagdollController::new(),
            rolling: RollingController::new(),
            scheduler: Scheduler::new(),
            mantle_settings: Box::new(ConfiguredMantleSettings),
            recovery_clips: Box::new(ConfiguredRecoveryClip),
            location,
            yaw,
            velocity: Vec3::zeros(),
            previous_velocity: Vec3::zeros(),
            movement_mode: MovementMode::Walking,
            flags: PhysicsFlags::default(),
            braking_friction_factor: 0.0,
            recovery_clip: None,
            last_pose_snapshot: None,
            ticked: false,
            pending_update: true,
            resuming: false,
            time: 0.0,
            last_teleport_time: None,
            predicted_events: VecDeque::new(),
            inbox: VecDeque::new(),
            outbox: Vec::new(),
        }
    }

    /// Resolve the configured rig names against `skeleton`, then build the character.
    pub fn from_skeleton(
        settings: LocomotionSettings,
        role: NetRole,
        skeleton: &impl SkeletonPose,
        location: Vec3,
        yaw: f32,
    ) -> Result<Self, RigError> {
        let handles = RigHandles::resolve(&settings.rig, skeleton)?;
        Ok(Self::new(settings, handles, role, location, yaw))
    }

    pub fn with_mantle_settings(
        mut self,
        selector: impl SelectMantleSettings + Send + Sync + 'static,
    ) -> Self {
        self.mantle_settings = Box::new(selector);
        self
    }

    pub fn with_recovery_clips(
        mut self,
        selector: impl SelectRecoveryClip + Send + Sync + 'static,
    ) -> Self {
        self.recovery_clips = Box::new(selector);
        self
    }

    // --- accessors -------------------------------------------------------

    pub fn settings(&self) -> &LocomotionSettings {
        &self.settings
    }
    pub fn handles(&self) -> &RigHandles {
        &self.handles
    }
    pub fn role(&self) -> NetRole {
        self.role
    }
    pub fn is_locally_controlled(&self) -> bool {
        self.locally_controlled
    }
    /// The authority copy of a client-owned character is not locally controlled.
    pub fn set_locally_controlled(&mut self, locally_controlled: bool) {
        self.locally_controlled = locally_controlled;
    }
    pub fn state_machine(&self) -> &LocomotionStateMachine {
        &self.machine
    }
    pub fn locomotion_mode(&self) -> Option<LocomotionMode> {
        self.machine.locomotion_mode()
    }
    pub fn action(&self) -> Option<LocomotionAction> {
        self.machine.action()
    }
    pub fn stance(&self) -> Stance {
        self.machine.stance()
    }
    pub fn gait(&self) -> Gait {
        self.machine.gait()
    }
    pub fn rotation_mode(&self) -> RotationMode {
        self.machine.rotation_mode()
    }
    /// Capsule center.
    pub fn location(&self) -> Vec3 {
        self.location
    }
    pub fn yaw(&self) -> f32 {
        self.yaw
    }
    pub fn transform(&self) -> Transform {
        Transform::new(self.location, angle::yaw_rotation(self.yaw))
    }
    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }
    /// Movement mode the host should run next tick.
    pub fn movement_mode(&self) -> MovementMode {
        self.movement_mode
    }
    pub fn physics_flags(&self) -> PhysicsFlags {
        self.flags
    }
    pub fn braking_friction_factor(&self) -> f32 {
        self.braking_friction_factor
    }
    pub fn mantling(&self) -> &MantlingController {
        &self.mantling
    }
    pub fn ragdoll(&self) -> &RagdollController {
        &self.ragdoll
    }
    pub fn feet(&self) -> &FeetIk {
        &self.feet
    }
    pub fn rotation(&self) -> &RotationController {
        &self.rotation
    }
    pub fn last_pose_snapshot(&self) -> Option<PoseSnapshot> {
        self.last_pose_snapshot
    }
    pub fn is_pending_update(&self) -> bool {
        self.pending_update
    }

    /// Action events started here that the authority has not answered yet.
    pub fn unanswered_predictions(&self) -> usize {
        self.predicted_events.len()
    }

    // --- networking ------------------------------------------------------

    /// Queue a message for the next tick.
    pub fn receive(&mut self, message: NetMessage) {
        self.inbox.push_back(message);
    }

    /// Take every message produced since the last call.
    pub fn drain_outbox(&mut self) -> Vec<NetMessage> {
        std::mem::take(&mut self.outbox)
    }

    /// Write a desired value: applied and broadcast on the authority, predicted
    /// and requested on the owning client. Returns false when nothing changed.
    pub fn set_desired(&mut self, value: DesiredValue) -> bool {
        match self.role {
            NetRole::SimulatedProxy => {
                log::debug!("simulated proxy cannot set {}", value.field());
                false
            }
            NetRole::Authority => {
                if !self.machine.replicated.set_local(&value, true) {
                    return false;
                }
                let sequence = self.machine.replicated.sequence_of(&value);
                self.outbox.push(NetMessage::Confirmed { value, sequence });
                true
            }
            NetRole::AutonomousProxy => {
                if !self.machine.replicated.set_local(&value, false) {
                    return false;
                }
                self.outbox.push(NetMessage::RequestDesired(value));
                true
            }
        }
    }

    pub fn set_desired_stance(&mut self, stance: Stance) -> bool {
        self.set_desired(DesiredValue::Stance(stance))
    }
    pub fn set_desired_gait(&mut self, gait: Gait) -> bool {
        self.set_desired(DesiredValue::Gait(gait))
    }
    pub fn set_desired_rotation_mode(&mut self, mode: RotationMode) -> bool {
        self.set_desired(DesiredValue::RotationMode(mode))
    }
    pub fn set_desired_view_mode(&mut self, mode: ViewMode) -> bool {
        self.set_desired(DesiredValue::ViewMode(mode))
    }
    pub fn set_desired_aiming(&mut self, aiming: bool) -> bool {
        self.set_desired(DesiredValue::Aiming(aiming))
    }
    pub fn set_overlay_mode(&mut self, overlay: OverlayMode) -> bool {
        self.set_desired(DesiredValue::OverlayMode(overlay))
    }

    // --- host events -----------------------------------------------------

    /// The character was moved instantly; feet re-anchor their locks.
    pub fn teleport(&mut self, location: Vec3) {
        log::debug!("teleport to {location:?}");
        self.location = location;
        self.last_teleport_time = Some(self.time);
    }

    /// The character stopped ticking. The next `tick` re-anchors the view and the
    /// rotation targets; the next `tick_animation` snaps the feet.
    pub fn mark_dormant(&mut self) {
        self.pending_update = true;
        self.resuming = true;
    }

    pub fn lock_rotation(&mut self, yaw: f32) {
        let view_yaw = self.machine.view().yaw;
        self.rotation
            .lock_rotation(yaw, self.machine.locomotion_mut(), view_yaw, &mut self.yaw);
    }

    pub fn unlock_rotation(&mut self) {
        self.rotation.unlock_rotation();
    }

    // --- actions ---------------------------------------------------------

    /// Grounded mantle attempt (the host's jump intent). Returns true when a mantle started.
    pub fn try_start_mantling_grounded<S, C, W>(&mut self, host: &mut HostContext<'_, S, C, W>) -> bool
    where
        S: SkeletonPose,
        C: ClipPlayer,
        W: WorldQuery,
    {
        self.machine.is_mode(LocomotionMode::Grounded) && self.try_start_mantling(host)
    }

    pub fn try_start_rolling<S, C, W>(
        &mut self,
        play_rate: f32,
        host: &mut HostContext<'_, S, C, W>,
    ) -> bool
    where
        S: SkeletonPose,
        C: ClipPlayer,
        W: WorldQuery,
    {
        if !self.machine.is_mode(LocomotionMode::Grounded) {
            return false;
        }
        let target_yaw =
            rolling::requested_target_yaw(&self.settings.rolling, self.machine.locomotion(), self.yaw);
        self.initiate(
            ActionEvent::StartRolling {
                play_rate,
                start_yaw: self.yaw,
                target_yaw,
            },
            host,
        )
    }

    pub fn try_start_ragdolling<S, C, W>(&mut self, host: &mut HostContext<'_, S, C, W>) -> bool
    where
        S: SkeletonPose,
        C: ClipPlayer,
        W: WorldQuery,
    {
        self.initiate(ActionEvent::StartRagdolling, host)
    }

    pub fn try_stop_ragdolling<S, C, W>(&mut self, host: &mut HostContext<'_, S, C, W>) -> bool
    where
        S: SkeletonPose,
        C: ClipPlayer,
        W: WorldQuery,
    {
        self.initiate(ActionEvent::StopRagdolling, host)
    }

    // --- tick ------------------------------------------------------------

    /// Game-thread update, after the host movement update.
    pub fn tick<S, C, W>(
        &mut self,
        dt: f32,
        input: &MovementInput,
        host: &mut HostContext<'_, S, C, W>,
    ) where
        S: SkeletonPose,
        C: ClipPlayer,
        W: WorldQuery,
    {
        let dt = dt.clamp(0.0, MAX_TICK_DT_S);
        self.time += f64::from(dt);

        // 1) Host movement result. Ignored while the ragdoll still locks movement.
        self.adopt_movement(dt, input);

        // 2) A ragdoll stopped last tick hands the body back now.
        self.finalize_ragdolling(host);

        // 3) Requests and broadcasts.
        self.process_inbox(host);

        // 4) State machine.
        self.machine.refresh_input(input.input_direction);
        self.movement_base.refresh(input.movement_base, host.world);
        self.rotation
            .begin_tick(&self.movement_base, self.machine.locomotion_mut(), &mut self.yaw);
        if std::mem::take(&mut self.resuming) {
            log::debug!("resuming after dormancy at yaw {:.1}", self.yaw);
            self.machine.reset_view(input.view_yaw);
            let view_yaw = self.machine.view().yaw;
            rotation::set_target_yaw(self.machine.locomotion_mut(), view_yaw, self.yaw);
        } else {
            self.machine.refresh_view(input.view_yaw, dt);
        }
        self.machine
            .refresh_locomotion(self.velocity, &self.settings.general);
        self.refresh_locomotion_mode(host);
        self.machine.refresh_gait(&self.settings.general);
        self.machine.refresh_rotation_mode(&self.settings.general);
        self.machine
            .apply_desired_stance(self.settings.rolling.crouch_on_start);

        // 5) Scheduled tasks.
        for task in self.scheduler.advance(dt) {
            match task {
                CharacterTask::ResetBrakingFriction => self.braking_friction_factor = 0.0,
            }
        }

        // 6) Rotation.
        self.refresh_rotation(dt, input, &*host.skeleton);

        // 7) Mantling.
        if self.machine.is_mode(LocomotionMode::InAir)
            && self.locally_controlled
            && self.machine.locomotion().has_input
        {
            self.try_start_mantling(host);
        }
        self.refresh_mantling(dt, host);

        // 8) Ragdoll.
        self.refresh_ragdolling(dt, host);

        // 9) Actions.
        self.refresh_actions(dt, host);

        let view_yaw = self.machine.view().yaw;
        self.rotation.end_tick(
            self.machine.locomotion_mode(),
            self.machine.action(),
            self.machine.locomotion_mut(),
            view_yaw,
            self.yaw,
        );
        self.ticked = true;
    }

    /// Animation-thread update: foot locking, foot offsets and pelvis offset.
    ///
    /// Consumes the pending-update flag. Returns `None` when the tick was skipped.
    pub fn tick_animation(
        &mut self,
        dt: f32,
        skeleton: &impl SkeletonPose,
        world: &impl WorldQuery,
    ) -> Option<FeetOutput> {
        let dt = dt.clamp(0.0, MAX_TICK_DT_S);
        let recently_teleported = self
            .last_teleport_time
            .is_some_and(|at| self.time - at <= f64::from(TELEPORT_DISTANCE_WINDOW_S));

        let input = FeetInput {
            dt,
            pending_update: self.pending_update,
            recently_teleported,
            moving: self.machine.locomotion().moving,
            locomotion_mode: self.machine.locomotion_mode(),
            movement_base: &self.movement_base,
            walkable_floor_y: self.settings.general.walkable_floor_y,
        };
        let output = self.feet.refresh(
            &input,
            &self.settings.feet,
            &self.handles.left_foot,
            &self.handles.right_foot,
            skeleton,
            world,
        );
        self.pending_update = false;
        output
    }

    fn adopt_movement(&mut self, dt: f32, input: &MovementInput) {
        let driven_here = self.mantling.is_active() || self.flags.movement_mode_locked;
        if self.ticked && !driven_here {
            let expected = self.location + self.velocity * dt;
            if (input.location - expected).norm() > self.settings.general.teleport_distance_threshold {
                log::debug!("location jumped to {:?}; treating as teleport", input.location);
                self.last_teleport_time = Some(self.time);
            }
        }

        self.previous_velocity = self.velocity;
        if !self.flags.movement_mode_locked {
            self.location = input.location;
            self.velocity = input.velocity;
            self.movement_mode = input.movement_mode;
        }
    }

    fn refresh_locomotion_mode<S, C, W>(&mut self, host: &mut HostContext<'_, S, C, W>)
    where
        S: SkeletonPose,
        C: ClipPlayer,
        W: WorldQuery,
    {
        let Some(change) = self
            .machine
            .apply_movement_mode(self.movement_mode, self.ragdoll.is_active())
        else {
            return;
        };

        if change.is_landing() {
            self.on_landed(host);
        } else if change.is_takeoff()
            && self.machine.action() == Some(LocomotionAction::Rolling)
            && self.settings.rolling.interrupt_rolling_when_in_air
        {
            log::debug!("roll interrupted in the air");
            self.initiate(ActionEvent::StartRagdolling, host);
        }
    }

    fn on_landed<S, C, W>(&mut self, host: &mut HostContext<'_, S, C, W>)
    where
        S: SkeletonPose,
        C: ClipPlayer,
        W: WorldQuery,
    {
        // The host may already have zeroed the vertical speed on the landing tick.
        let vertical_speed = self.previous_velocity.y.min(self.velocity.y);
        let ragdoll_settings = &self.settings.ragdolling;
        let roll_settings = &self.settings.rolling;

        if ragdoll_settings.start_ragdolling_on_land
            && vertical_speed <= -ragdoll_settings.ragdolling_on_land_speed_threshold
        {
            log::info!("hard landing at {vertical_speed:.1} m/s");
            self.initiate(ActionEvent::StartRagdolling, host);
        } else if roll_settings.start_rolling_on_land
            && vertical_speed <= -roll_settings.rolling_on_land_speed_threshold
        {
            let event = ActionEvent::StartRolling {
                play_rate: roll_settings.landing_play_rate,
                start_yaw: self.yaw,
                target_yaw: rolling::landing_target_yaw(self.machine.locomotion(), self.yaw),
            };
            self.initiate(event, host);
        } else {
            let general = &self.settings.general;
            self.braking_friction_factor = if self.machine.locomotion().has_input {
                general.has_input_braking_friction_factor
            } else {
                general.no_input_braking_friction_factor
            };
            self.scheduler.reschedule(
                general.braking_friction_reset_delay,
                CharacterTask::ResetBrakingFriction,
            );
            self.machine
                .locomotion_mut()
                .rotation_towards_last_input_direction_blocked = true;
        }
    }

    fn refresh_rotation<S: SkeletonPose>(&mut self, dt: f32, input: &MovementInput, skeleton: &S) {
        let view = *self.machine.view();
        let curves = RotationCurves {
            yaw_speed: skeleton.curve_value(self.handles.rotation_yaw_speed),
            yaw_offset: skeleton.curve_value(self.handles.rotation_yaw_offset),
            animation_update_count: skeleton.animation_update_count(),
        };
        let rotation_input = RotationInput {
            dt,
            locomotion_mode: self.machine.locomotion_mode(),
            action: self.machine.action(),
            rotation_mode: self.machine.rotation_mode(),
            view_mode: self.machine.view_mode(),
            gait: self.machine.gait(),
            gait_amount: gait_amount(self.machine.locomotion().speed, &self.settings.general.gait),
            view: &view,
            curves,
            has_root_motion: input.has_root_motion,
        };
        self.rotation.refresh(
            &rotation_input,
            &self.settings.rotation,
            self.machine.locomotion_mut(),
            &mut self.yaw,
        );
    }

    fn try_start_mantling<S, C, W>(&mut self, host: &mut HostContext<'_, S, C, W>) -> bool
    where
        S: SkeletonPose,
        C: ClipPlayer,
        W: WorldQuery,
    {
        let settings = &self.settings.mantling;
        if !settings.allow_mantling
            || !self.role.can_initiate()
            || !self.mantling.is_allowed_to_start(self.machine.action())
        {
            return false;
        }

        let grounded = self.machine.is_mode(LocomotionMode::Grounded);
        let trace = if grounded {
            &settings.grounded_trace
        } else {
            &settings.in_air_trace
        };
        let query = LedgeQuery {
            location: self.location,
            actor_yaw: self.yaw,
            capsule: self.settings.general.capsule,
            locomotion: self.machine.locomotion(),
            grounded,
            walkable_floor_y: self.settings.general.walkable_floor_y,
        };

        match mantling::find_ledge(&query, trace, settings, host.world) {
            Some(params) => self.initiate(ActionEvent::StartMantling(params), host),
            None => false,
        }
    }

    fn refresh_mantling<S, C, W>(&mut self, dt: f32, host: &mut HostContext<'_, S, C, W>)
    where
        S: SkeletonPose,
        C: ClipPlayer,
        W: WorldQuery,
    {
        if !self.mantling.is_active() {
            return;
        }
        if self.movement_mode != MovementMode::Mantling || self.machine.action().is_some() {
            self.stop_mantling(host);
            return;
        }

        let Some(feet) = self.mantling.refresh(dt, host.world) else {
            log::debug!("mantle target is gone");
            self.stop_mantling(host);
            return;
        };
        self.location = feet.translation + Vec3::y() * self.settings.general.capsule.half_height;
        self.yaw = angle::yaw_of_rotation(&feet.rotation);
        self.velocity = Vec3::zeros();

        if self.mantling.is_finished() {
            self.stop_mantling(host);
        }
    }

    fn stop_mantling<S, C, W>(&mut self, host: &mut HostContext<'_, S, C, W>)
    where
        S: SkeletonPose,
        C: ClipPlayer,
        W: WorldQuery,
    {
        if !self.mantling.stop() {
            return;
        }
        if self.movement_mode == MovementMode::Mantling {
            self.movement_mode = MovementMode::Walking;
        }
        self.refresh_locomotion_mode(host);
    }

    fn refresh_ragdolling<S, C, W>(&mut self, dt: f32, host: &mut HostContext<'_, S, C, W>)
    where
        S: SkeletonPose,
        C: ClipPlayer,
        W: WorldQuery,
    {
        if !self.ragdoll.is_active() {
            return;
        }

        let input = RagdollInput {
            dt,
            locally_controlled: self.locally_controlled,
            target_location: *self.machine.replicated.ragdoll_target_location.get(),
            capsule_half_height: self.settings.general.capsule.half_height,
            ground_object_types: self.settings.general.ground_object_types,
            actor_yaw: self.yaw,
        };
        let Some(update) = self.ragdoll.refresh(
            &input,
            &self.settings.ragdolling,
            &self.handles,
            host.skeleton,
            host.world,
        ) else {
            return;
        };

        self.location = update.location;
        self.yaw = update.yaw;
        if let Some(target) = update.new_target_location {
            self.set_desired(DesiredValue::RagdollTargetLocation(target));
        }
    }

    fn finalize_ragdolling<S, C, W>(&mut self, host: &mut HostContext<'_, S, C, W>)
    where
        S: SkeletonPose,
        C: ClipPlayer,
        W: WorldQuery,
    {
        let Some(done) = self
            .ragdoll
            .finalize(&self.handles, &mut self.flags, host.skeleton)
        else {
            return;
        };

        if done.grounded {
            self.movement_mode = MovementMode::Walking;
        } else {
            self.movement_mode = MovementMode::Falling;
            self.velocity = done.velocity;
        }
        self.refresh_locomotion_mode(host);
    }

    fn refresh_actions<S, C, W>(&mut self, dt: f32, host: &mut HostContext<'_, S, C, W>)
    where
        S: SkeletonPose,
        C: ClipPlayer,
        W: WorldQuery,
    {
        let slot = &self.handles.action_slot;
        match self.machine.action() {
            Some(LocomotionAction::Rolling) => {
                if RollingController::is_finished(
                    self.machine.action(),
                    &self.settings.rolling,
                    &*host.clips,
                    slot,
                ) {
                    self.machine.set_action(None);
                } else {
                    self.yaw = self.rolling.refresh(dt, &self.settings.rolling, self.yaw);
                }
            }
            Some(LocomotionAction::GettingUp) => {
                let playing = self
                    .recovery_clip
                    .as_ref()
                    .is_some_and(|clip| host.clips.is_clip_playing_on_slot(clip, slot));
                if !playing {
                    self.recovery_clip = None;
                    self.machine.set_action(None);
                }
            }
            None => {}
        }
    }

    // --- action plumbing -------------------------------------------------

    /// Start an action from this copy and tell the other peers.
    fn initiate<S, C, W>(&mut self, event: ActionEvent, host: &mut HostContext<'_, S, C, W>) -> bool
    where
        S: SkeletonPose,
        C: ClipPlayer,
        W: WorldQuery,
    {
        if !self.role.can_initiate() || !self.apply_event(&event, host) {
            return false;
        }

        if self.role.is_authority() {
            self.outbox.push(NetMessage::Event(event));
        } else {
            while self.predicted_events.len() >= MAX_PREDICTED_EVENTS {
                if let Some(dropped) = self.predicted_events.pop_front() {
                    log::warn!("no answer for predicted {}; forgetting it", dropped.name());
                }
            }
            self.predicted_events.push_back(event.clone());
            self.outbox.push(NetMessage::RequestEvent(event));
        }
        true
    }

    fn apply_event<S, C, W>(&mut self, event: &ActionEvent, host: &mut HostContext<'_, S, C, W>) -> bool
    where
        S: SkeletonPose,
        C: ClipPlayer,
        W: WorldQuery,
    {
        match event {
            ActionEvent::StartMantling(params) => self.apply_start_mantling(params, host),
            ActionEvent::StartRolling {
                play_rate,
                start_yaw,
                target_yaw,
            } => self.apply_start_rolling(
                &RollStart {
                    play_rate: *play_rate,
                    start_yaw: *start_yaw,
                    target_yaw: *target_yaw,
                },
                host,
            ),
            ActionEvent::StartRagdolling => self.apply_start_ragdolling(host),
            ActionEvent::StopRagdolling => self.apply_stop_ragdolling(host),
        }
    }

    fn apply_start_mantling<S, C, W>(
        &mut self,
        params: &MantlingParams,
        host: &mut HostContext<'_, S, C, W>,
    ) -> bool
    where
        S: SkeletonPose,
        C: ClipPlayer,
        W: WorldQuery,
    {
        if self.ragdoll.is_active() {
            return false;
        }

        let feet = Transform::new(
            self.location - Vec3::y() * self.settings.general.capsule.half_height,
            angle::yaw_rotation(self.yaw),
        );
        let started = self.mantling.start(
            params,
            self.machine.action(),
            &self.settings.mantling,
            &*self.mantle_settings,
            host.world,
            &feet,
            host.clips,
            &self.handles.action_slot,
        );
        if !started {
            return false;
        }

        self.movement_mode = MovementMode::Mantling;
        self.velocity = Vec3::zeros();
        self.refresh_locomotion_mode(host);
        true
    }

    fn apply_start_rolling<S, C, W>(
        &mut self,
        start: &RollStart,
        host: &mut HostContext<'_, S, C, W>,
    ) -> bool
    where
        S: SkeletonPose,
        C: ClipPlayer,
        W: WorldQuery,
    {
        if self.ragdoll.is_active() {
            return false;
        }

        let started = self.rolling.start(
            start,
            self.machine.action(),
            &self.settings.rolling,
            host.clips,
            &self.handles.action_slot,
        );
        if !started {
            return false;
        }

        self.yaw = angle::normalize(start.start_yaw);
        let view_yaw = self.machine.view().yaw;
        rotation::set_target_yaw(self.machine.locomotion_mut(), view_yaw, self.yaw);
        self.machine.set_action(Some(LocomotionAction::Rolling));
        self.machine
            .apply_desired_stance(self.settings.rolling.crouch_on_start);
        true
    }

    fn apply_start_ragdolling<S, C, W>(&mut self, host: &mut HostContext<'_, S, C, W>) -> bool
    where
        S: SkeletonPose,
        C: ClipPlayer,
        W: WorldQuery,
    {
        if !self.ragdoll.is_allowed_to_start() {
            return false;
        }
        if self.mantling.stop() {
            log::debug!("mantle cancelled by ragdoll");
        }

        let Some(target) = self.ragdoll.start(
            &self.handles,
            &mut self.flags,
            host.skeleton,
            host.clips,
            self.locally_controlled,
        ) else {
            return false;
        };

        self.movement_mode = MovementMode::None;
        self.machine.set_action(None);
        self.recovery_clip = None;
        if let Some(target) = target {
            self.set_desired(DesiredValue::RagdollTargetLocation(target));
        }
        self.refresh_locomotion_mode(host);
        true
    }

    fn apply_stop_ragdolling<S, C, W>(&mut self, host: &mut HostContext<'_, S, C, W>) -> bool
    where
        S: SkeletonPose,
        C: ClipPlayer,
        W: WorldQuery,
    {
        let Some(stop) = self.ragdoll.stop(
            &self.settings.ragdolling,
            &*self.recovery_clips,
            host.clips,
            &self.handles.action_slot,
        ) else {
            return false;
        };

        self.last_pose_snapshot = Some(stop.pose);
        let action = stop
            .recovery_clip
            .is_some()
            .then_some(LocomotionAction::GettingUp);
        self.recovery_clip = stop.recovery_clip;
        self.machine.set_action(action);
        self.refresh_locomotion_mode(host);
        true
    }

    fn process_inbox<S, C, W>(&mut self, host: &mut HostContext<'_, S, C, W>)
    where
        S: SkeletonPose,
        C: ClipPlayer,
        W: WorldQuery,
    {
        while let Some(message) = self.inbox.pop_front() {
            match message {
                NetMessage::RequestDesired(value) => {
                    if !self.role.is_authority() {
                        log::warn!("dropping {} request on a {:?}", value.field(), self.role);
                        continue;
                    }
                    if self.machine.replicated.set_local(&value, true) {
                        let sequence = self.machine.replicated.sequence_of(&value);
                        self.outbox.push(NetMessage::Confirmed { value, sequence });
                    }
                }
                NetMessage::Confirmed { value, sequence } => {
                    if self.role.is_authority() {
                        log::warn!("authority ignores confirmed {}", value.field());
                        continue;
                    }
                    if !self.machine.replicated.apply_confirmed(&value, sequence) {
                        log::trace!("stale or unchanged {} at {sequence}", value.field());
                    }
                }
                NetMessage::RequestEvent(event) => {
                    if !self.role.is_authority() {
                        log::warn!("dropping {} request on a {:?}", event.name(), self.role);
                        continue;
                    }
                    if self.apply_event(&event, host) {
                        self.outbox.push(NetMessage::Event(event));
                    } else {
                        log::info!("rejected {} request", event.name());
                        self.outbox.push(NetMessage::Rejected(event));
                    }
                }
                NetMessage::Event(event) => {
                    if self.role.is_authority() {
                        log::warn!("authority ignores {} broadcast", event.name());
                        continue;
                    }
                    if let Some(index) = self.predicted_events.iter().position(|p| *p == event) {
                        // Older predictions were never broadcast, so they were refused.
                        self.predicted_events.drain(..=index);
                        log::trace!("{} already predicted", event.name());
                        continue;
                    }
                    if !self.apply_event(&event, host) {
                        log::debug!("{} broadcast not applicable here", event.name());
                    }
                }
                NetMessage::Rejected(event) => {
                    if self.role.is_authority() {
                        log::warn!("authority ignores rejected {}", event.name());
                        continue;
                    }
                    match self.predicted_events.iter().position(|p| *p == event) {
                        Some(index) => {
                            self.predicted_events.remove(index);
                            log::debug!("predicted {} was rejected", event.name());
                        }
                        None => log::trace!("rejected {} was not predicted here", event.name()),
                    }
                }
            }
        }
    }
}
