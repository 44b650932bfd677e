/*!
Body yaw controller.

Picks a target yaw per locomotion mode and rotation mode and moves the actor yaw
toward it without popping. Most modes use a two-stage scheme: the *smooth target*
steps toward the raw target at a bounded angular rate, then the actor yaw decays
exponentially toward the smooth target.

Target yaw bookkeeping (`target_yaw`, `smooth_target_yaw`, `view_relative_target_yaw`)
lives in [`LocomotionState`] so other systems can read it; the controller keeps only
its own memory (aiming limit, lock, once-per-tick curve guard).
*/

use crate::angle;
use crate::constants::SMALL_NUMBER;
use crate::damping::{exponential_decay, exponential_decay_angle, interpolate_angle_constant, lerp_clamped};
use crate::settings::RotationSettings;
use crate::state::{
    Gait, InAirRotationMode, LocomotionAction, LocomotionMode, LocomotionState, MovementBaseState,
    RotationMode, ViewMode, ViewState,
};

/// Target yaw rate in velocity-direction mode (degrees per second).
const VELOCITY_DIRECTION_TARGET_YAW_SPEED: f32 = 800.0;
/// Target yaw rate in looking-direction mode.
const LOOKING_DIRECTION_TARGET_YAW_SPEED: f32 = 500.0;
/// Target yaw rate while aiming and moving.
const AIMING_TARGET_YAW_SPEED: f32 = 1000.0;
const AIMING_INTERPOLATION_SPEED: f32 = 20.0;
/// Used when the gait curve has no keys.
const DEFAULT_INTERPOLATION_SPEED: f32 = 5.0;
/// Extra smoothing toward the last velocity yaw while standing still.
const STATIONARY_VELOCITY_INTERPOLATION_SPEED: f32 = 12.0;
/// Narrowest allowed difference between view and body yaw while aiming (degrees).
const MIN_AIMING_YAW_LIMIT: f32 = 70.0;
const AIMING_LIMIT_INTERPOLATION_SPEED: f32 = 20.0;
const IN_AIR_INTERPOLATION_SPEED: f32 = 5.0;
const IN_AIR_AIMING_INTERPOLATION_SPEED: f32 = 15.0;

/// Animation curve readings used by rotation.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RotationCurves {
    /// Angular velocity authored by turn animations (degrees per second).
    pub yaw_speed: f32,
    /// Offset added to the view yaw in looking-direction mode (degrees).
    pub yaw_offset: f32,
    /// Animation evaluations so far; the yaw-speed curve applies once per evaluation.
    pub animation_update_count: u64,
}

/// Everything the controller reads for one tick.
#[derive(Clone, Copy, Debug)]
pub struct RotationInput<'a> {
    pub dt: f32,
    pub locomotion_mode: Option<LocomotionMode>,
    pub action: Option<LocomotionAction>,
    pub rotation_mode: RotationMode,
    pub view_mode: ViewMode,
    pub gait: Gait,
    pub gait_amount: f32,
    pub view: &'a ViewState,
    pub curves: RotationCurves,
    pub has_root_motion: bool,
}

/// Set the target and smooth target at once.
pub fn set_target_yaw(state: &mut LocomotionState, view_yaw: f32, target_yaw: f32) {
    state.target_yaw = angle::normalize(target_yaw);
    state.smooth_target_yaw = state.target_yaw;
    refresh_view_relative_target_yaw(state, view_yaw);
}

/// Set the target, stepping the smooth target toward it at `rotation_speed`.
pub fn set_target_yaw_smooth(
    state: &mut LocomotionState,
    view_yaw: f32,
    target_yaw: f32,
    dt: f32,
    rotation_speed: f32,
) {
    state.target_yaw = angle::normalize(target_yaw);
    state.smooth_target_yaw =
        interpolate_angle_constant(state.smooth_target_yaw, state.target_yaw, dt, rotation_speed);
    refresh_view_relative_target_yaw(state, view_yaw);
}

fn refresh_view_relative_target_yaw(state: &mut LocomotionState, view_yaw: f32) {
    state.view_relative_target_yaw = angle::delta(state.target_yaw, view_yaw);
}

#[derive(Clone, Debug)]
pub struct RotationController {
    aiming_yaw_limit: f32,
    aiming_limit_applied_this_frame: bool,
    reset_aiming_limit: bool,
    last_yaw_speed_update: Option<u64>,
    locked_yaw: Option<f32>,
}

impl Default for RotationController {
    fn default() -> Self {
        Self {
            aiming_yaw_limit: 180.0,
            aiming_limit_applied_this_frame: false,
            reset_aiming_limit: true,
            last_yaw_speed_update: None,
            locked_yaw: None,
        }
    }
}

impl RotationController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_locked(&self) -> bool {
        self.locked_yaw.is_some()
    }

    pub fn locked_yaw(&self) -> Option<f32> {
        self.locked_yaw
    }

    /// Snap to `yaw` and hold it until [`Self::unlock_rotation`].
    pub fn lock_rotation(
        &mut self,
        yaw: f32,
        state: &mut LocomotionState,
        view_yaw: f32,
        actor_yaw: &mut f32,
    ) {
        let yaw = angle::normalize(yaw);
        self.locked_yaw = Some(yaw);
        *actor_yaw = yaw;
        set_target_yaw(state, view_yaw, yaw);
    }

    pub fn unlock_rotation(&mut self) {
        self.locked_yaw = None;
    }

    /// Start of tick: follow a rotating movement base and clear per-frame flags.
    pub fn begin_tick(
        &mut self,
        base: &MovementBaseState,
        state: &mut LocomotionState,
        actor_yaw: &mut f32,
    ) {
        if base.has_relative_rotation {
            let delta = base.delta_yaw();
            if delta.abs() > SMALL_NUMBER {
                state.target_yaw = angle::normalize(state.target_yaw + delta);
                state.view_relative_target_yaw =
                    angle::normalize(state.view_relative_target_yaw + delta);
                state.smooth_target_yaw = angle::normalize(state.smooth_target_yaw + delta);
                *actor_yaw = angle::normalize(*actor_yaw + delta);
            }
        }

        self.aiming_limit_applied_this_frame = false;
    }

    /// Main per-tick rotation update.
    pub fn refresh(
        &mut self,
        input: &RotationInput<'_>,
        settings: &RotationSettings,
        state: &mut LocomotionState,
        actor_yaw: &mut f32,
    ) {
        if let Some(yaw) = self.locked_yaw {
            *actor_yaw = yaw;
            set_target_yaw(state, input.view.yaw, yaw);
            return;
        }

        if input.action.is_some() {
            return;
        }

        match input.locomotion_mode {
            Some(LocomotionMode::Grounded) => {
                self.refresh_grounded(input, settings, state, actor_yaw)
            }
            Some(LocomotionMode::InAir) => self.refresh_in_air(input, settings, state, actor_yaw),
            _ => {}
        }
    }

    /// End of tick: re-sync the target when no rotation logic owned the yaw.
    pub fn end_tick(
        &mut self,
        locomotion_mode: Option<LocomotionMode>,
        action: Option<LocomotionAction>,
        state: &mut LocomotionState,
        view_yaw: f32,
        actor_yaw: f32,
    ) {
        let rotation_driven = matches!(
            locomotion_mode,
            Some(LocomotionMode::Grounded) | Some(LocomotionMode::InAir)
        );
        if !rotation_driven || action.is_some() {
            set_target_yaw(state, view_yaw, actor_yaw);
        }

        self.reset_aiming_limit = !self.aiming_limit_applied_this_frame;
    }

    /// Rotation interpolation speed for the current gait and view yaw speed.
    pub fn interpolation_speed(
        settings: &RotationSettings,
        gait_amount: f32,
        view_yaw_speed: f32,
    ) -> f32 {
        let curve = &settings.rotation_interpolation_speed_curve;
        let speed = if curve.is_empty() {
            DEFAULT_INTERPOLATION_SPEED
        } else {
            curve.sample(gait_amount.max(1.0))
        };

        speed
            * lerp_clamped(
                1.0,
                settings.max_interpolation_speed_multiplier,
                view_yaw_speed / settings.reference_view_yaw_speed.max(SMALL_NUMBER),
            )
    }

    fn refresh_grounded(
        &mut self,
        input: &RotationInput<'_>,
        settings: &RotationSettings,
        state: &mut LocomotionState,
        actor_yaw: &mut f32,
    ) {
        let view_yaw = input.view.yaw;
        let dt = input.dt;

        if input.has_root_motion {
            set_target_yaw(state, view_yaw, *actor_yaw);
            return;
        }

        if !state.moving {
            self.apply_rotation_yaw_speed_curve(input, state, actor_yaw);

            match input.rotation_mode {
                RotationMode::VelocityDirection => {
                    let target = if state.rotation_towards_last_input_direction_blocked {
                        state.target_yaw
                    } else {
                        state.velocity_yaw
                    };
                    set_rotation_extra_smooth(
                        state,
                        view_yaw,
                        target,
                        dt,
                        STATIONARY_VELOCITY_INTERPOLATION_SPEED,
                        VELOCITY_DIRECTION_TARGET_YAW_SPEED,
                        actor_yaw,
                    );
                }
                RotationMode::LookingDirection if input.view_mode != ViewMode::FirstPerson => {
                    if !state.has_input && state.rotation_towards_last_input_direction_blocked {
                        set_target_yaw(state, view_yaw, *actor_yaw);
                        return;
                    }

                    let target = if state.has_input {
                        view_yaw
                    } else {
                        state.target_yaw
                    };
                    let speed =
                        Self::interpolation_speed(settings, input.gait_amount, input.view.yaw_speed);
                    set_rotation_extra_smooth(
                        state,
                        view_yaw,
                        target,
                        dt,
                        speed,
                        LOOKING_DIRECTION_TARGET_YAW_SPEED,
                        actor_yaw,
                    );
                }
                RotationMode::Aiming | RotationMode::LookingDirection => {
                    self.refresh_grounded_aiming(input, state, actor_yaw);
                }
            }
            return;
        }

        // Moving.
        let may_turn_to_input =
            state.has_input || !state.rotation_towards_last_input_direction_blocked;

        match input.rotation_mode {
            RotationMode::VelocityDirection if may_turn_to_input => {
                state.rotation_towards_last_input_direction_blocked = false;
                let speed =
                    Self::interpolation_speed(settings, input.gait_amount, input.view.yaw_speed);
                let target = state.velocity_yaw;
                set_rotation_extra_smooth(
                    state,
                    view_yaw,
                    target,
                    dt,
                    speed,
                    VELOCITY_DIRECTION_TARGET_YAW_SPEED,
                    actor_yaw,
                );
            }
            RotationMode::LookingDirection if may_turn_to_input => {
                state.rotation_towards_last_input_direction_blocked = false;
                let target = if input.gait == Gait::Sprinting {
                    state.velocity_yaw
                } else {
                    view_yaw + input.curves.yaw_offset
                };
                let speed =
                    Self::interpolation_speed(settings, input.gait_amount, input.view.yaw_speed);
                set_rotation_extra_smooth(
                    state,
                    view_yaw,
                    target,
                    dt,
                    speed,
                    LOOKING_DIRECTION_TARGET_YAW_SPEED,
                    actor_yaw,
                );
            }
            RotationMode::Aiming => self.refresh_grounded_aiming(input, state, actor_yaw),
            _ => set_target_yaw(state, view_yaw, *actor_yaw),
        }
    }

    /// Apply the authored turn speed, at most once per animation evaluation.
    fn apply_rotation_yaw_speed_curve(
        &mut self,
        input: &RotationInput<'_>,
        state: &mut LocomotionState,
        actor_yaw: &mut f32,
    ) {
        let count = input.curves.animation_update_count;
        if self.last_yaw_speed_update == Some(count) {
            return;
        }
        self.last_yaw_speed_update = Some(count);

        let delta = input.curves.yaw_speed * input.dt;
        if delta.abs() > SMALL_NUMBER {
            *actor_yaw = angle::normalize(*actor_yaw + delta);
            set_target_yaw(state, input.view.yaw, *actor_yaw);
        }
    }

    fn refresh_grounded_aiming(
        &mut self,
        input: &RotationInput<'_>,
        state: &mut LocomotionState,
        actor_yaw: &mut f32,
    ) {
        let view_yaw = input.view.yaw;
        let dt = input.dt;

        if !state.has_input && !state.moving {
            set_target_yaw(state, view_yaw, view_yaw);
            let mut yaw = *actor_yaw;
            if self.constrain_aiming_rotation(&mut yaw, view_yaw, dt, true) {
                *actor_yaw = yaw;
            }
            return;
        }

        set_target_yaw_smooth(state, view_yaw, view_yaw, dt, AIMING_TARGET_YAW_SPEED);
        let mut yaw = exponential_decay_angle(
            *actor_yaw,
            state.smooth_target_yaw,
            dt,
            AIMING_INTERPOLATION_SPEED,
        );

        if self.constrain_aiming_rotation(&mut yaw, view_yaw, dt, false) {
            // Drop the extra smoothing, the constraint already moved the body.
            state.smooth_target_yaw = state.target_yaw;
        }
        *actor_yaw = yaw;
    }

    /// Keep the body within the aiming limit of the view yaw.
    ///
    /// The limit shrinks toward [`MIN_AIMING_YAW_LIMIT`] as the body catches up, so a
    /// fast camera flick drags the body along instead of snapping it. Returns true when
    /// the yaw was changed.
    fn constrain_aiming_rotation(
        &mut self,
        actor_yaw: &mut f32,
        view_yaw: f32,
        dt: f32,
        apply_secondary_constraint: bool,
    ) -> bool {
        self.aiming_limit_applied_this_frame = true;

        if self.reset_aiming_limit {
            self.aiming_yaw_limit = 180.0;
        }

        let mut view_relative = angle::delta(*actor_yaw, view_yaw);
        if view_relative.abs() <= MIN_AIMING_YAW_LIMIT + SMALL_NUMBER {
            self.aiming_yaw_limit = MIN_AIMING_YAW_LIMIT;
            return false;
        }

        view_relative = angle::remap_for_counter_clockwise_rotation(view_relative);

        if apply_secondary_constraint {
            let target = view_relative.clamp(-MIN_AIMING_YAW_LIMIT, MIN_AIMING_YAW_LIMIT);
            view_relative =
                exponential_decay(view_relative, target, dt, AIMING_LIMIT_INTERPOLATION_SPEED);
        }

        if view_relative.abs() > self.aiming_yaw_limit + SMALL_NUMBER {
            view_relative = view_relative.clamp(-self.aiming_yaw_limit, self.aiming_yaw_limit);
        } else {
            self.aiming_yaw_limit = view_relative.abs().max(MIN_AIMING_YAW_LIMIT);
        }

        let previous = *actor_yaw;
        *actor_yaw = angle::normalize(view_yaw - view_relative);
        angle::delta(previous, *actor_yaw).abs() > SMALL_NUMBER
    }

    fn refresh_in_air(
        &mut self,
        input: &RotationInput<'_>,
        settings: &RotationSettings,
        state: &mut LocomotionState,
        actor_yaw: &mut f32,
    ) {
        let view_yaw = input.view.yaw;
        let dt = input.dt;

        match input.rotation_mode {
            RotationMode::Aiming => {
                set_target_yaw(state, view_yaw, view_yaw);
                let mut yaw = exponential_decay_angle(
                    *actor_yaw,
                    state.smooth_target_yaw,
                    dt,
                    IN_AIR_AIMING_INTERPOLATION_SPEED,
                );
                self.constrain_aiming_rotation(&mut yaw, view_yaw, dt, false);
                *actor_yaw = yaw;
            }
            RotationMode::VelocityDirection | RotationMode::LookingDirection => {
                match settings.in_air_rotation_mode {
                    InAirRotationMode::RotateToVelocityOnJump if state.moving => {
                        let target = state.velocity_yaw;
                        set_rotation_smooth(
                            state,
                            view_yaw,
                            target,
                            dt,
                            IN_AIR_INTERPOLATION_SPEED,
                            actor_yaw,
                        );
                    }
                    InAirRotationMode::KeepRelativeRotation => {
                        let target = view_yaw - state.view_relative_target_yaw;
                        set_rotation_smooth(
                            state,
                            view_yaw,
                            target,
                            dt,
                            IN_AIR_INTERPOLATION_SPEED,
                            actor_yaw,
                        );
                    }
                    _ => set_target_yaw(state, view_yaw, *actor_yaw),
                }
            }
        }
    }
}

fn set_rotation_smooth(
    state: &mut LocomotionState,
    view_yaw: f32,
    target_yaw: f32,
    dt: f32,
    interpolation_speed: f32,
    actor_yaw: &mut f32,
) {
    set_target_yaw(state, view_yaw, target_yaw);
    *actor_yaw =
        exponential_decay_angle(*actor_yaw, state.smooth_target_yaw, dt, interpolation_speed);
}

fn set_rotation_extra_smooth(
    state: &mut LocomotionState,
    view_yaw: f32,
    target_yaw: f32,
    dt: f32,
    interpolation_speed: f32,
    target_yaw_speed: f32,
    actor_yaw: &mut f32,
) {
    set_target_yaw_smooth(state, view_yaw, target_yaw, dt, target_yaw_speed);
    *actor_yaw =
        exponential_decay_angle(*actor_yaw, state.smooth_target_yaw, dt, interpolation_speed);
}
