/*!
Tolerances and fixed tuning values shared by the locomotion controllers.

Authored tuning lives in `settings`; the values here are either numeric guards
or constants the animation data was authored against and that are not meant to
be tweaked per character.

Notes
- Distances are in meters, time in seconds, angles in degrees.
- Favor practical world-space tolerances over machine epsilon.
*/

/// Guard for "effectively zero" scalar comparisons (weights, deltas, speeds).
pub const SMALL_NUMBER: f32 = 1.0e-4;

/// Blend weights at or below this value are treated as not contributing.
pub const RELEVANT_WEIGHT: f32 = 1.0e-3;

/// Squared planar length below which a direction has no meaningful yaw.
pub const YAW_EPS: f32 = 1.0e-6;

/// Counter-clockwise remap margin for angle interpolation (degrees).
///
/// Deltas above `180 - COUNTER_CLOCKWISE_ROTATION_ANGLE_THRESHOLD` are remapped to
/// negative so a near half turn always resolves in one direction.
pub const COUNTER_CLOCKWISE_ROTATION_ANGLE_THRESHOLD: f32 = 5.0;

/// Speed above which the character is considered to have velocity (m/s).
pub const HAS_SPEED_THRESHOLD: f32 = 0.01;

/// Squared input length above which the character is considered to have input.
pub const HAS_INPUT_THRESHOLD_SQ: f32 = 1.0e-4;

/// Minimum separation kept between a resting capsule and the floor (meters).
pub const MIN_FLOOR_DIST: f32 = 0.019;

/// Maximum separation a grounded capsule may keep from the floor (meters).
pub const MAX_FLOOR_DIST: f32 = 0.024;

/// How long after a teleport the foot lock is re-anchored to the current pose (seconds).
pub const TELEPORT_DISTANCE_WINDOW_S: f32 = 0.2;

/// Largest delta time accepted by a host tick (seconds).
pub const MAX_TICK_DT_S: f32 = 0.125;

/// Default walkable floor cosine (45 degrees).
pub const WALKABLE_FLOOR_Y: f32 = std::f32::consts::FRAC_1_SQRT_2;

/// Predicted action events an owning client keeps while waiting for the authority.
pub const MAX_PREDICTED_EVENTS: usize = 8;
