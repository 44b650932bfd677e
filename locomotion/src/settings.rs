/*!
Authored locomotion configuration.

Every record carries `Default` with the authored values (converted to meters),
so an empty TOML document is a valid configuration. Loading validates ranges
and curves once; controllers assume validated settings afterwards.

Example:
```toml
[mantling]
mantling_high_height_threshold = 1.3

[mantling.grounded_trace]
ledge_height = [0.5, 2.0]
```
*/

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::WALKABLE_FLOOR_Y;
use crate::curve::{FloatCurve, VectorCurve};
use crate::damping::SpringParams;
use crate::error::ConfigError;
use crate::rig::{ClipId, RigNames};
use crate::state::InAirRotationMode;
use crate::types::{CapsuleSpec, Vec3};
use crate::world::ObjectTypes;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocomotionSettings {
    pub general: GeneralSettings,
    pub rotation: RotationSettings,
    pub feet: FeetSettings,
    pub mantling: MantlingSettings,
    pub ragdolling: RagdollingSettings,
    pub rolling: RollingSettings,
    pub rig: RigNames,
}

impl LocomotionSettings {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.general.validate()?;
        self.rotation.validate()?;
        self.feet.validate()?;
        self.mantling.validate()?;
        self.ragdolling.validate()?;
        self.rolling.validate()
    }
}

fn non_negative(name: &str, value: f32) -> Result<(), ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::NonFinite(name.to_string()));
    }
    if value < 0.0 {
        return Err(ConfigError::Negative(name.to_string()));
    }
    Ok(())
}

fn positive(name: &str, value: f32) -> Result<(), ConfigError> {
    non_negative(name, value)?;
    if value <= 0.0 {
        return Err(ConfigError::NotPositive(name.to_string()));
    }
    Ok(())
}

fn ordered_range(name: &str, (min, max): (f32, f32)) -> Result<(), ConfigError> {
    non_negative(name, min)?;
    non_negative(name, max)?;
    if min > max {
        return Err(ConfigError::InvertedRange {
            name: name.to_string(),
            min,
            max,
        });
    }
    Ok(())
}

fn finite_pair(name: &str, (a, b): (f32, f32)) -> Result<(), ConfigError> {
    if a.is_finite() && b.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonFinite(name.to_string()))
    }
}

fn spring(name: &str, params: &SpringParams) -> Result<(), ConfigError> {
    positive(name, params.frequency)?;
    non_negative(name, params.damping_ratio)?;
    non_negative(name, params.target_velocity_blend)
}

/// Speeds of each gait (m/s).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GaitSettings {
    pub max_walk_speed: f32,
    pub max_run_speed: f32,
    pub max_sprint_speed: f32,
}

impl Default for GaitSettings {
    fn default() -> Self {
        Self {
            max_walk_speed: 1.75,
            max_run_speed: 3.75,
            max_sprint_speed: 6.5,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneralSettings {
    pub capsule: CapsuleSpec,
    pub gait: GaitSettings,
    /// Above this speed the character counts as moving even without input (m/s).
    pub moving_speed_threshold: f32,
    /// A displacement larger than this in one tick is treated as a teleport (meters).
    pub teleport_distance_threshold: f32,
    pub allow_aiming_in_air: bool,
    pub sprint_has_priority_over_aiming: bool,
    pub rotate_to_velocity_when_sprinting: bool,
    pub ground_object_types: ObjectTypes,
    pub walkable_floor_y: f32,
    pub has_input_braking_friction_factor: f32,
    pub no_input_braking_friction_factor: f32,
    pub braking_friction_reset_delay: f32,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            capsule: CapsuleSpec::default(),
            gait: GaitSettings::default(),
            moving_speed_threshold: 0.5,
            teleport_distance_threshold: 0.5,
            allow_aiming_in_air: true,
            sprint_has_priority_over_aiming: false,
            rotate_to_velocity_when_sprinting: false,
            ground_object_types: ObjectTypes::world(),
            walkable_floor_y: WALKABLE_FLOOR_Y,
            has_input_braking_friction_factor: 0.5,
            no_input_braking_friction_factor: 3.0,
            braking_friction_reset_delay: 0.5,
        }
    }
}

impl GeneralSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        positive("general.capsule.radius", self.capsule.radius)?;
        positive("general.capsule.half_height", self.capsule.half_height)?;
        ordered_range(
            "general.gait.walk_run",
            (self.gait.max_walk_speed, self.gait.max_run_speed),
        )?;
        ordered_range(
            "general.gait.run_sprint",
            (self.gait.max_run_speed, self.gait.max_sprint_speed),
        )?;
        non_negative("general.moving_speed_threshold", self.moving_speed_threshold)?;
        non_negative(
            "general.teleport_distance_threshold",
            self.teleport_distance_threshold,
        )?;
        non_negative("general.walkable_floor_y", self.walkable_floor_y)?;
        non_negative(
            "general.braking_friction_reset_delay",
            self.braking_friction_reset_delay,
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RotationSettings {
    pub in_air_rotation_mode: InAirRotationMode,
    /// Gait amount (1 walk, 2 run, 3 sprint) to rotation interpolation speed.
    pub rotation_interpolation_speed_curve: FloatCurve,
    /// Multiplier reached at `reference_view_yaw_speed`.
    pub max_interpolation_speed_multiplier: f32,
    /// View yaw speed (degrees per second) of the full multiplier.
    pub reference_view_yaw_speed: f32,
}

impl Default for RotationSettings {
    fn default() -> Self {
        Self {
            in_air_rotation_mode: InAirRotationMode::RotateToVelocityOnJump,
            rotation_interpolation_speed_curve: FloatCurve::new(vec![
                (1.0, 5.0),
                (2.0, 5.0),
                (3.0, 10.0),
            ]),
            max_interpolation_speed_multiplier: 3.0,
            reference_view_yaw_speed: 300.0,
        }
    }
}

impl RotationSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        self.rotation_interpolation_speed_curve
            .validate("rotation.rotation_interpolation_speed_curve", false)?;
        non_negative(
            "rotation.max_interpolation_speed_multiplier",
            self.max_interpolation_speed_multiplier,
        )?;
        positive(
            "rotation.reference_view_yaw_speed",
            self.reference_view_yaw_speed,
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeetSettings {
    pub disable_foot_lock: bool,
    /// Distance from the sole to the foot bone (meters).
    pub foot_height: f32,
    pub ik_trace_distance_upward: f32,
    pub ik_trace_distance_downward: f32,
    pub trace_object_types: ObjectTypes,
    pub offset_spring: SpringParams,
    pub offset_rotation_interpolation_speed: f32,
    /// Decay speed of the offset toward zero while airborne.
    pub in_air_offset_interpolation_speed: f32,
    /// Forced lock decrease per second while moving.
    pub lock_decrease_rate_moving: f32,
    /// Forced lock decrease per second while airborne.
    pub lock_decrease_rate_in_air: f32,
    pub pelvis_spring: SpringParams,
}

impl Default for FeetSettings {
    fn default() -> Self {
        Self {
            disable_foot_lock: false,
            foot_height: 0.135,
            ik_trace_distance_upward: 0.5,
            ik_trace_distance_downward: 0.45,
            trace_object_types: ObjectTypes::world(),
            offset_spring: SpringParams::default(),
            offset_rotation_interpolation_speed: 30.0,
            in_air_offset_interpolation_speed: 15.0,
            lock_decrease_rate_moving: 5.0,
            lock_decrease_rate_in_air: 0.6,
            pelvis_spring: SpringParams::default(),
        }
    }
}

impl FeetSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        non_negative("feet.foot_height", self.foot_height)?;
        non_negative("feet.ik_trace_distance_upward", self.ik_trace_distance_upward)?;
        non_negative(
            "feet.ik_trace_distance_downward",
            self.ik_trace_distance_downward,
        )?;
        spring("feet.offset_spring", &self.offset_spring)?;
        spring("feet.pelvis_spring", &self.pelvis_spring)?;
        non_negative(
            "feet.offset_rotation_interpolation_speed",
            self.offset_rotation_interpolation_speed,
        )?;
        non_negative(
            "feet.in_air_offset_interpolation_speed",
            self.in_air_offset_interpolation_speed,
        )?;
        non_negative("feet.lock_decrease_rate_moving", self.lock_decrease_rate_moving)?;
        non_negative("feet.lock_decrease_rate_in_air", self.lock_decrease_rate_in_air)
    }
}

/// Geometry of one mantle trace (grounded or in-air).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MantlingTraceSettings {
    /// Min/max ledge height above the feet (meters).
    pub ledge_height: (f32, f32),
    pub reach_distance: f32,
    /// How far past the wall face the downward trace starts (meters).
    pub target_location_offset: f32,
}

impl Default for MantlingTraceSettings {
    fn default() -> Self {
        Self {
            ledge_height: (0.5, 2.25),
            reach_distance: 0.75,
            target_location_offset: 0.15,
        }
    }
}

impl MantlingTraceSettings {
    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        ordered_range(name, self.ledge_height)?;
        non_negative(name, self.reach_distance)?;
        non_negative(name, self.target_location_offset)
    }
}

/// Parameters of one mantle type (clip, curves, height mapping).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MantleTypeSettings {
    pub clip: ClipId,
    pub blend_in_curve: FloatCurve,
    /// x: interpolation amount, y: horizontal correction, z: vertical correction.
    pub interpolation_and_correction_curve: VectorCurve,
    /// Where the clip starts relative to the target, along the target forward (meters).
    pub start_offset_forward: f32,
    /// Where the clip starts relative to the target, along +Y (meters).
    pub start_offset_up: f32,
    pub reference_height: (f32, f32),
    pub start_time: (f32, f32),
    pub play_rate: (f32, f32),
}

impl Default for MantleTypeSettings {
    fn default() -> Self {
        Self {
            clip: ClipId::default(),
            blend_in_curve: FloatCurve::new(vec![(0.0, 0.0), (0.15, 1.0)]),
            interpolation_and_correction_curve: VectorCurve::new(vec![
                (0.0, Vec3::new(1.0, 0.0, 0.0)),
                (0.2, Vec3::new(1.0, 0.0, 1.0)),
                (0.5, Vec3::new(1.0, 1.0, 1.0)),
                (1.0, Vec3::new(0.0, 1.0, 1.0)),
            ]),
            start_offset_forward: -0.65,
            start_offset_up: -1.0,
            reference_height: (0.5, 1.0),
            start_time: (0.5, 0.0),
            play_rate: (1.0, 1.0),
        }
    }
}

impl MantleTypeSettings {
    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        self.blend_in_curve.validate(name, true)?;
        self.interpolation_and_correction_curve.validate(name, true)?;
        finite_pair(name, (self.start_offset_forward, self.start_offset_up))?;
        ordered_range(name, self.reference_height)?;
        finite_pair(name, self.start_time)?;
        non_negative(name, self.play_rate.0)?;
        non_negative(name, self.play_rate.1)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MantlingSettings {
    pub allow_mantling: bool,
    /// Reject ledges further than this from the facing direction (degrees).
    pub trace_angle_threshold: f32,
    /// Maximum bias of the trace direction toward input (degrees).
    pub max_reach_angle: f32,
    /// Do not mantle onto primitives moving faster than this (m/s).
    pub target_primitive_speed_threshold: f32,
    pub mantling_high_height_threshold: f32,
    pub grounded_trace: MantlingTraceSettings,
    pub in_air_trace: MantlingTraceSettings,
    pub trace_object_types: ObjectTypes,
    pub high: MantleTypeSettings,
    pub low: MantleTypeSettings,
    pub in_air: MantleTypeSettings,
}

impl Default for MantlingSettings {
    fn default() -> Self {
        Self {
            allow_mantling: true,
            trace_angle_threshold: 110.0,
            max_reach_angle: 50.0,
            target_primitive_speed_threshold: 10.0,
            mantling_high_height_threshold: 1.25,
            grounded_trace: MantlingTraceSettings::default(),
            in_air_trace: MantlingTraceSettings {
                ledge_height: (0.5, 1.5),
                reach_distance: 0.7,
                ..MantlingTraceSettings::default()
            },
            trace_object_types: ObjectTypes::world(),
            high: MantleTypeSettings {
                clip: ClipId::new("MantleHigh"),
                ..MantleTypeSettings::default()
            },
            low: MantleTypeSettings {
                clip: ClipId::new("MantleLow"),
                reference_height: (0.5, 1.25),
                ..MantleTypeSettings::default()
            },
            in_air: MantleTypeSettings {
                clip: ClipId::new("MantleInAir"),
                start_time: (0.3, 0.0),
                ..MantleTypeSettings::default()
            },
        }
    }
}

impl MantlingSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        non_negative("mantling.trace_angle_threshold", self.trace_angle_threshold)?;
        non_negative("mantling.max_reach_angle", self.max_reach_angle)?;
        non_negative(
            "mantling.target_primitive_speed_threshold",
            self.target_primitive_speed_threshold,
        )?;
        non_negative(
            "mantling.mantling_high_height_threshold",
            self.mantling_high_height_threshold,
        )?;
        self.grounded_trace.validate("mantling.grounded_trace")?;
        self.in_air_trace.validate("mantling.in_air_trace")?;
        self.high.validate("mantling.high")?;
        self.low.validate("mantling.low")?;
        self.in_air.validate("mantling.in_air")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RagdollingSettings {
    pub start_ragdolling_on_land: bool,
    /// Downward landing speed that starts ragdolling (m/s).
    pub ragdolling_on_land_speed_threshold: f32,
    pub get_up_front_clip: ClipId,
    pub get_up_back_clip: ClipId,
    /// Root speed at which joint motors reach full stiffness (m/s).
    pub max_stiffness_speed: f32,
    pub max_motor_stiffness: f32,
    /// Gravity is disabled while falling faster than this (m/s).
    pub terminal_fall_speed: f32,
    /// Pull force the remote correction ramps up to.
    pub max_pull_force: f32,
    pub pull_force_interpolation_speed: f32,
    /// Above this planar speed the spine is pulled instead of the pelvis (m/s).
    pub spine_pull_speed_threshold: f32,
    /// Smoothing of the replicated root velocity on remote peers.
    pub remote_velocity_interpolation_speed: f32,
}

impl Default for RagdollingSettings {
    fn default() -> Self {
        Self {
            start_ragdolling_on_land: true,
            ragdolling_on_land_speed_threshold: 10.0,
            get_up_front_clip: ClipId::new("GetUpFront"),
            get_up_back_clip: ClipId::new("GetUpBack"),
            max_stiffness_speed: 10.0,
            max_motor_stiffness: 25_000.0,
            terminal_fall_speed: 40.0,
            max_pull_force: 750.0,
            pull_force_interpolation_speed: 0.6,
            spine_pull_speed_threshold: 3.0,
            remote_velocity_interpolation_speed: 10.0,
        }
    }
}

impl RagdollingSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        non_negative(
            "ragdolling.ragdolling_on_land_speed_threshold",
            self.ragdolling_on_land_speed_threshold,
        )?;
        positive("ragdolling.max_stiffness_speed", self.max_stiffness_speed)?;
        non_negative("ragdolling.max_motor_stiffness", self.max_motor_stiffness)?;
        non_negative("ragdolling.terminal_fall_speed", self.terminal_fall_speed)?;
        non_negative("ragdolling.max_pull_force", self.max_pull_force)?;
        non_negative(
            "ragdolling.pull_force_interpolation_speed",
            self.pull_force_interpolation_speed,
        )?;
        non_negative(
            "ragdolling.spine_pull_speed_threshold",
            self.spine_pull_speed_threshold,
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RollingSettings {
    pub clip: ClipId,
    pub crouch_on_start: bool,
    pub rotate_to_input_on_start: bool,
    pub rotation_interpolation_speed: f32,
    pub start_rolling_on_land: bool,
    /// Downward landing speed that starts a roll (m/s).
    pub rolling_on_land_speed_threshold: f32,
    pub landing_play_rate: f32,
    pub interrupt_rolling_when_in_air: bool,
}

impl Default for RollingSettings {
    fn default() -> Self {
        Self {
            clip: ClipId::new("Roll"),
            crouch_on_start: true,
            rotate_to_input_on_start: true,
            rotation_interpolation_speed: 10.0,
            start_rolling_on_land: true,
            rolling_on_land_speed_threshold: 7.0,
            landing_play_rate: 1.3,
            interrupt_rolling_when_in_air: true,
        }
    }
}

impl RollingSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        non_negative(
            "rolling.rotation_interpolation_speed",
            self.rotation_interpolation_speed,
        )?;
        non_negative(
            "rolling.rolling_on_land_speed_threshold",
            self.rolling_on_land_speed_threshold,
        )?;
        positive("rolling.landing_play_rate", self.landing_play_rate)
    }
}
