/*!
Locomotion state machine.

Holds stance, gait, rotation mode, view mode, locomotion mode and the current
action, plus the per-tick [`LocomotionState`] value object every controller reads.
Nothing here touches the world or the skeleton; the character feeds it one
[`MovementInput`] per tick and reacts to the returned [`ModeChange`].
*/

use serde::{Deserialize, Serialize};

use crate::angle;
use crate::constants::{HAS_INPUT_THRESHOLD_SQ, HAS_SPEED_THRESHOLD, SMALL_NUMBER};
use crate::net::{DesiredValue, Replicated};
use crate::settings::{GaitSettings, GeneralSettings};
use crate::types::{Quat, Transform, Vec3};
use crate::world::{MovementBase, WorldQuery};

/// Input more than this far from the view yaw cannot sprint in looking-direction mode (degrees).
const SPRINT_VIEW_RELATIVE_ANGLE_THRESHOLD: f32 = 50.0;

/// Gaits switch this far above the configured speed (m/s).
const GAIT_SPEED_MARGIN: f32 = 0.1;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stance {
    #[default]
    Standing,
    Crouching,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gait {
    Walking,
    #[default]
    Running,
    Sprinting,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RotationMode {
    #[default]
    LookingDirection,
    VelocityDirection,
    Aiming,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewMode {
    #[default]
    ThirdPerson,
    FirstPerson,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocomotionMode {
    Grounded,
    InAir,
    Mantling,
    Ragdolling,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocomotionAction {
    Rolling,
    GettingUp,
}

/// What the body does with its yaw while airborne.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InAirRotationMode {
    #[default]
    RotateToVelocityOnJump,
    KeepRelativeRotation,
    KeepWorldRotation,
}

/// Free-form overlay (held item, pose layer) name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverlayMode(pub String);

impl Default for OverlayMode {
    fn default() -> Self {
        Self("Default".into())
    }
}

/// Mode of the host movement component.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementMode {
    #[default]
    Walking,
    Falling,
    /// Position driven by the mantle blend.
    Mantling,
    /// No movement (ragdoll, scripted).
    None,
}

/// What the host reports once per tick after its movement update.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MovementInput {
    /// Capsule center after the host movement update.
    pub location: Vec3,
    pub velocity: Vec3,
    /// Current acceleration divided by max acceleration; length 0..1.
    pub input_direction: Vec3,
    /// World yaw of the view (control) rotation, degrees.
    pub view_yaw: f32,
    pub movement_mode: MovementMode,
    pub movement_base: Option<MovementBase>,
    /// The host applies root motion this tick; body rotation follows it instead.
    pub has_root_motion: bool,
}

impl Default for MovementInput {
    fn default() -> Self {
        Self {
            location: Vec3::zeros(),
            velocity: Vec3::zeros(),
            input_direction: Vec3::zeros(),
            view_yaw: 0.0,
            movement_mode: MovementMode::Walking,
            movement_base: None,
            has_root_motion: false,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ViewState {
    pub yaw: f32,
    pub previous_yaw: f32,
    /// Absolute view yaw change rate (degrees per second).
    pub yaw_speed: f32,
}

/// Per-tick movement facts shared by every controller.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LocomotionState {
    pub has_input: bool,
    pub input_yaw: f32,
    pub has_speed: bool,
    /// Planar speed (m/s).
    pub speed: f32,
    pub velocity: Vec3,
    /// Yaw of the last velocity with speed.
    pub velocity_yaw: f32,
    pub moving: bool,
    pub target_yaw: f32,
    pub smooth_target_yaw: f32,
    pub view_relative_target_yaw: f32,
    pub rotation_towards_last_input_direction_blocked: bool,
}

/// The movement base as seen this tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MovementBaseState {
    pub base: Option<MovementBase>,
    pub transform: Transform,
    /// The base can move; things on it are tracked in its local space.
    pub has_relative_location: bool,
    pub has_relative_rotation: bool,
    pub changed: bool,
    /// Base rotation change since the previous tick.
    pub delta_rotation: Quat,
}

impl Default for MovementBaseState {
    fn default() -> Self {
        Self {
            base: None,
            transform: Transform::identity(),
            has_relative_location: false,
            has_relative_rotation: false,
            changed: false,
            delta_rotation: Quat::identity(),
        }
    }
}

impl MovementBaseState {
    pub fn refresh(&mut self, base: Option<MovementBase>, world: &impl WorldQuery) {
        self.changed = base != self.base;
        self.base = base;

        let previous_rotation = self.transform.rotation;
        let info = base.and_then(|b| world.primitive(b.primitive).map(|info| (b, info)));

        match info {
            Some((b, info)) => {
                self.transform = world
                    .movement_base_transform(b)
                    .unwrap_or(info.transform);
                self.has_relative_location = info.movable;
                self.has_relative_rotation = info.movable;
            }
            None => {
                self.transform = Transform::identity();
                self.has_relative_location = false;
                self.has_relative_rotation = false;
            }
        }

        self.delta_rotation = if self.has_relative_location && !self.changed {
            self.transform.rotation * previous_rotation.inverse()
        } else {
            Quat::identity()
        };
    }

    /// Yaw part of [`Self::delta_rotation`] (degrees).
    pub fn delta_yaw(&self) -> f32 {
        angle::yaw_of_rotation(&self.delta_rotation)
    }
}

/// Authority-owned replicated fields.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReplicatedState {
    pub stance: Replicated<Stance>,
    pub gait: Replicated<Gait>,
    pub rotation_mode: Replicated<RotationMode>,
    pub view_mode: Replicated<ViewMode>,
    pub aiming: Replicated<bool>,
    pub overlay_mode: Replicated<OverlayMode>,
    pub ragdoll_target_location: Replicated<Vec3>,
}

impl ReplicatedState {
    /// Local write of one field. Returns false when nothing changed.
    pub fn set_local(&mut self, value: &DesiredValue, authority: bool) -> bool {
        match value {
            DesiredValue::Stance(v) => self.stance.set_local(*v, authority),
            DesiredValue::Gait(v) => self.gait.set_local(*v, authority),
            DesiredValue::RotationMode(v) => self.rotation_mode.set_local(*v, authority),
            DesiredValue::ViewMode(v) => self.view_mode.set_local(*v, authority),
            DesiredValue::Aiming(v) => self.aiming.set_local(*v, authority),
            DesiredValue::OverlayMode(v) => self.overlay_mode.set_local(v.clone(), authority),
            DesiredValue::RagdollTargetLocation(v) => {
                self.ragdoll_target_location.set_local(*v, authority)
            }
        }
    }

    pub fn apply_confirmed(&mut self, value: &DesiredValue, sequence: u32) -> bool {
        match value {
            DesiredValue::Stance(v) => self.stance.apply_confirmed(*v, sequence),
            DesiredValue::Gait(v) => self.gait.apply_confirmed(*v, sequence),
            DesiredValue::RotationMode(v) => self.rotation_mode.apply_confirmed(*v, sequence),
            DesiredValue::ViewMode(v) => self.view_mode.apply_confirmed(*v, sequence),
            DesiredValue::Aiming(v) => self.aiming.apply_confirmed(*v, sequence),
            DesiredValue::OverlayMode(v) => self.overlay_mode.apply_confirmed(v.clone(), sequence),
            DesiredValue::RagdollTargetLocation(v) => {
                self.ragdoll_target_location.apply_confirmed(*v, sequence)
            }
        }
    }

    pub fn sequence_of(&self, value: &DesiredValue) -> u32 {
        match value {
            DesiredValue::Stance(_) => self.stance.sequence(),
            DesiredValue::Gait(_) => self.gait.sequence(),
            DesiredValue::RotationMode(_) => self.rotation_mode.sequence(),
            DesiredValue::ViewMode(_) => self.view_mode.sequence(),
            DesiredValue::Aiming(_) => self.aiming.sequence(),
            DesiredValue::OverlayMode(_) => self.overlay_mode.sequence(),
            DesiredValue::RagdollTargetLocation(_) => self.ragdoll_target_location.sequence(),
        }
    }

    fn aiming_requested(&self) -> bool {
        *self.aiming.get() || *self.rotation_mode.get() == RotationMode::Aiming
    }
}

/// A locomotion mode transition. `None` means "no mode" (host movement disabled).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModeChange {
    pub previous: Option<LocomotionMode>,
    pub current: Option<LocomotionMode>,
}

impl ModeChange {
    pub fn is_landing(&self) -> bool {
        self.previous == Some(LocomotionMode::InAir)
            && self.current == Some(LocomotionMode::Grounded)
    }

    pub fn is_takeoff(&self) -> bool {
        self.current == Some(LocomotionMode::InAir)
    }
}

/// Gait amount: 0..1 up to walk speed, 1..2 up to run speed, 2..3 up to sprint speed.
pub fn gait_amount(speed: f32, gait: &GaitSettings) -> f32 {
    let segment = |from: f32, to: f32| {
        let span = to - from;
        if span <= SMALL_NUMBER {
            1.0
        } else {
            ((speed - from) / span).clamp(0.0, 1.0)
        }
    };

    if speed <= gait.max_walk_speed {
        segment(0.0, gait.max_walk_speed)
    } else if speed <= gait.max_run_speed {
        1.0 + segment(gait.max_walk_speed, gait.max_run_speed)
    } else {
        2.0 + segment(gait.max_run_speed, gait.max_sprint_speed)
    }
}

#[derive(Clone, Debug, Default)]
pub struct LocomotionStateMachine {
    pub replicated: ReplicatedState,
    stance: Stance,
    gait: Gait,
    max_allowed_gait: Gait,
    rotation_mode: RotationMode,
    locomotion_mode: Option<LocomotionMode>,
    action: Option<LocomotionAction>,
    locomotion: LocomotionState,
    view: ViewState,
}

impl LocomotionStateMachine {
    pub fn new(initial_yaw: f32, view_yaw: f32) -> Self {
        let mut machine = Self {
            locomotion_mode: Some(LocomotionMode::Grounded),
            ..Self::default()
        };
        machine.view = ViewState {
            yaw: angle::normalize(view_yaw),
            previous_yaw: angle::normalize(view_yaw),
            yaw_speed: 0.0,
        };
        let yaw = angle::normalize(initial_yaw);
        machine.locomotion.velocity_yaw = yaw;
        machine.locomotion.target_yaw = yaw;
        machine.locomotion.smooth_target_yaw = yaw;
        machine.locomotion.view_relative_target_yaw = angle::delta(yaw, machine.view.yaw);
        machine
    }

    #[inline]
    pub fn stance(&self) -> Stance {
        self.stance
    }
    #[inline]
    pub fn gait(&self) -> Gait {
        self.gait
    }
    #[inline]
    pub fn max_allowed_gait(&self) -> Gait {
        self.max_allowed_gait
    }
    #[inline]
    pub fn rotation_mode(&self) -> RotationMode {
        self.rotation_mode
    }
    #[inline]
    pub fn view_mode(&self) -> ViewMode {
        *self.replicated.view_mode.get()
    }
    #[inline]
    pub fn overlay_mode(&self) -> &OverlayMode {
        self.replicated.overlay_mode.get()
    }
    #[inline]
    pub fn locomotion_mode(&self) -> Option<LocomotionMode> {
        self.locomotion_mode
    }
    #[inline]
    pub fn action(&self) -> Option<LocomotionAction> {
        self.action
    }
    #[inline]
    pub fn locomotion(&self) -> &LocomotionState {
        &self.locomotion
    }
    #[inline]
    pub fn locomotion_mut(&mut self) -> &mut LocomotionState {
        &mut self.locomotion
    }
    #[inline]
    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn is_mode(&self, mode: LocomotionMode) -> bool {
        self.locomotion_mode == Some(mode)
    }

    pub fn refresh_input(&mut self, input_direction: Vec3) {
        self.locomotion.has_input = input_direction.norm_squared() > HAS_INPUT_THRESHOLD_SQ;
        if self.locomotion.has_input {
            if let Some(yaw) = angle::yaw_of(&input_direction) {
                self.locomotion.input_yaw = yaw;
            }
        }
    }

    pub fn refresh_view(&mut self, view_yaw: f32, dt: f32) {
        self.view.previous_yaw = self.view.yaw;
        self.view.yaw = angle::normalize(view_yaw);
        if dt > SMALL_NUMBER {
            self.view.yaw_speed = angle::delta(self.view.previous_yaw, self.view.yaw).abs() / dt;
        }
    }

    /// Re-anchor yaw bookkeeping after the view jumped (spawn, possession).
    pub fn reset_view(&mut self, view_yaw: f32) {
        self.view.yaw = angle::normalize(view_yaw);
        self.view.previous_yaw = self.view.yaw;
        self.view.yaw_speed = 0.0;
    }

    pub fn refresh_locomotion(&mut self, velocity: Vec3, settings: &GeneralSettings) {
        let state = &mut self.locomotion;
        state.velocity = velocity;
        state.speed = (velocity.x * velocity.x + velocity.z * velocity.z).sqrt();
        state.has_speed = state.speed >= HAS_SPEED_THRESHOLD;
        if state.has_speed {
            if let Some(yaw) = angle::yaw_of(&velocity) {
                state.velocity_yaw = yaw;
            }
        }
        state.moving =
            (state.has_input && state.has_speed) || state.speed > settings.moving_speed_threshold;
    }

    /// Aiming requested through either the aiming flag or the desired rotation mode.
    pub fn aiming_requested(&self) -> bool {
        self.replicated.aiming_requested()
    }

    pub fn can_sprint(&self, settings: &GeneralSettings) -> bool {
        if !self.locomotion.has_input
            || self.stance != Stance::Standing
            || (self.aiming_requested() && !settings.sprint_has_priority_over_aiming)
        {
            return false;
        }

        let desired_rotation_mode = *self.replicated.rotation_mode.get();
        if self.view_mode() != ViewMode::FirstPerson
            && (desired_rotation_mode == RotationMode::VelocityDirection
                || settings.rotate_to_velocity_when_sprinting)
        {
            return true;
        }

        angle::delta(self.view.yaw, self.locomotion.input_yaw).abs()
            < SPRINT_VIEW_RELATIVE_ANGLE_THRESHOLD
    }

    fn calculate_max_allowed_gait(&self, settings: &GeneralSettings) -> Gait {
        match *self.replicated.gait.get() {
            Gait::Sprinting if self.can_sprint(settings) => Gait::Sprinting,
            Gait::Sprinting => Gait::Running,
            other => other,
        }
    }

    fn calculate_actual_gait(&self, max_allowed: Gait, gait: &GaitSettings) -> Gait {
        let speed = self.locomotion.speed;
        if speed < gait.max_walk_speed + GAIT_SPEED_MARGIN {
            Gait::Walking
        } else if speed < gait.max_run_speed + GAIT_SPEED_MARGIN || max_allowed != Gait::Sprinting {
            Gait::Running
        } else {
            Gait::Sprinting
        }
    }

    /// Only runs while grounded; the gait freezes in other modes.
    pub fn refresh_gait(&mut self, settings: &GeneralSettings) {
        if !self.is_mode(LocomotionMode::Grounded) {
            return;
        }
        self.max_allowed_gait = self.calculate_max_allowed_gait(settings);
        self.gait = self.calculate_actual_gait(self.max_allowed_gait, &settings.gait);
    }

    /// Speed the host should allow for the current max allowed gait (m/s).
    pub fn max_speed_for_allowed_gait(&self, settings: &GaitSettings) -> f32 {
        match self.max_allowed_gait {
            Gait::Walking => settings.max_walk_speed,
            Gait::Running => settings.max_run_speed,
            Gait::Sprinting => settings.max_sprint_speed,
        }
    }

    fn select_rotation_mode(&self, settings: &GeneralSettings) -> RotationMode {
        let aiming = self.aiming_requested();
        let sprinting = self.max_allowed_gait == Gait::Sprinting;
        let desired = *self.replicated.rotation_mode.get();
        let in_air = self.is_mode(LocomotionMode::InAir);

        if self.view_mode() == ViewMode::FirstPerson {
            let aims = if in_air {
                aiming && settings.allow_aiming_in_air
            } else {
                aiming && (!sprinting || !settings.sprint_has_priority_over_aiming)
            };
            return if aims {
                RotationMode::Aiming
            } else {
                RotationMode::LookingDirection
            };
        }

        if in_air {
            return if aiming && settings.allow_aiming_in_air {
                RotationMode::Aiming
            } else if aiming {
                RotationMode::LookingDirection
            } else {
                desired
            };
        }

        if sprinting {
            if aiming && !settings.sprint_has_priority_over_aiming {
                RotationMode::Aiming
            } else if settings.rotate_to_velocity_when_sprinting {
                RotationMode::VelocityDirection
            } else {
                desired
            }
        } else if aiming {
            RotationMode::Aiming
        } else {
            desired
        }
    }

    /// Returns true when the effective rotation mode changed.
    pub fn refresh_rotation_mode(&mut self, settings: &GeneralSettings) -> bool {
        let mode = self.select_rotation_mode(settings);
        if mode == self.rotation_mode {
            return false;
        }
        log::debug!("rotation mode {:?} -> {:?}", self.rotation_mode, mode);
        self.rotation_mode = mode;
        self.locomotion.rotation_towards_last_input_direction_blocked = true;
        true
    }

    /// Derive the locomotion mode from the host movement mode.
    pub fn apply_movement_mode(
        &mut self,
        movement_mode: MovementMode,
        ragdolling: bool,
    ) -> Option<ModeChange> {
        let mode = if ragdolling {
            Some(LocomotionMode::Ragdolling)
        } else {
            match movement_mode {
                MovementMode::Walking => Some(LocomotionMode::Grounded),
                MovementMode::Falling => Some(LocomotionMode::InAir),
                MovementMode::Mantling => Some(LocomotionMode::Mantling),
                MovementMode::None => None,
            }
        };

        if mode == self.locomotion_mode {
            return None;
        }

        let change = ModeChange {
            previous: self.locomotion_mode,
            current: mode,
        };
        log::debug!("locomotion mode {:?} -> {:?}", change.previous, change.current);
        self.locomotion_mode = mode;
        Some(change)
    }

    /// Returns true when the action changed.
    pub fn set_action(&mut self, action: Option<LocomotionAction>) -> bool {
        if self.action == action {
            return false;
        }
        log::debug!("locomotion action {:?} -> {:?}", self.action, action);
        self.action = action;
        true
    }

    /// Resolve the actual stance from the desired one.
    ///
    /// Grounded characters take the desired stance, airborne ones stand, and a
    /// roll crouches when `crouch_on_roll` is set.
    pub fn apply_desired_stance(&mut self, crouch_on_roll: bool) {
        match self.action {
            None => match self.locomotion_mode {
                Some(LocomotionMode::Grounded) => self.stance = *self.replicated.stance.get(),
                Some(LocomotionMode::InAir) => self.stance = Stance::Standing,
                _ => {}
            },
            Some(LocomotionAction::Rolling) if crouch_on_roll => self.stance = Stance::Crouching,
            Some(_) => {}
        }
    }
}
