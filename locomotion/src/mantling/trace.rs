//! Ledge search: forward capsule sweep, downward sphere sweep, free-space overlap.

use crate::angle;
use crate::constants::{MAX_FLOOR_DIST, MIN_FLOOR_DIST};
use crate::settings::{MantlingSettings, MantlingTraceSettings};
use crate::state::LocomotionState;
use crate::types::{CapsuleSpec, Transform, Vec3};
use crate::world::{Hit, QueryShape, WorldQuery};

use super::{MantlingParams, MantlingType};

/// Traces are slightly thinner than the capsule so they do not catch the walls we slide along.
const TRACE_RADIUS_SHRINK: f32 = 0.01;

/// Character facts the ledge search reads.
#[derive(Clone, Copy, Debug)]
pub struct LedgeQuery<'a> {
    /// Capsule center.
    pub location: Vec3,
    pub actor_yaw: f32,
    pub capsule: CapsuleSpec,
    pub locomotion: &'a LocomotionState,
    pub grounded: bool,
    pub walkable_floor_y: f32,
}

/// Low/High by height when grounded, InAir otherwise.
pub fn classify(height: f32, grounded: bool, high_height_threshold: f32) -> MantlingType {
    if !grounded {
        MantlingType::InAir
    } else if height > high_height_threshold {
        MantlingType::High
    } else {
        MantlingType::Low
    }
}

/// Yaw the forward trace is aimed at, before the reach clamp.
fn trace_yaw(query: &LedgeQuery<'_>, max_reach_angle: f32) -> f32 {
    let locomotion = query.locomotion;
    if locomotion.has_speed {
        if locomotion.has_input {
            locomotion.velocity_yaw
                + angle::delta(locomotion.velocity_yaw, locomotion.input_yaw)
                    .clamp(-max_reach_angle, max_reach_angle)
        } else {
            locomotion.velocity_yaw
        }
    } else if locomotion.has_input {
        locomotion.input_yaw
    } else {
        query.actor_yaw
    }
}

fn is_walkable(hit: &Hit, walkable_floor_y: f32) -> bool {
    hit.is_valid_blocking() && hit.normal.y >= walkable_floor_y
}

/// Search for a ledge in front of the character.
///
/// Every failure is a plain `None`: no ledge, not a ledge (a ramp), a moving or
/// non-steppable primitive, no walkable top, or no room to stand.
pub fn find_ledge(
    query: &LedgeQuery<'_>,
    trace: &MantlingTraceSettings,
    settings: &MantlingSettings,
    world: &impl WorldQuery,
) -> Option<MantlingParams> {
    // 1) Direction, biased toward input but never behind the character.
    let delta = angle::delta(query.actor_yaw, trace_yaw(query, settings.max_reach_angle));
    if delta.abs() > settings.trace_angle_threshold {
        return None;
    }
    let direction = angle::direction(
        query.actor_yaw + delta.clamp(-settings.max_reach_angle, settings.max_reach_angle),
    );

    let capsule = query.capsule;
    let bottom = query.location - Vec3::y() * capsule.half_height;
    let trace_radius = (capsule.radius - TRACE_RADIUS_SHRINK).max(0.0);
    let (ledge_min, ledge_max) = trace.ledge_height;
    let ledge_delta = ledge_max - ledge_min;

    // 2) Forward sweep over the ledge height window.
    let forward_start = bottom - direction * capsule.radius
        + Vec3::y() * ((ledge_min + ledge_max) * 0.5 - MAX_FLOOR_DIST);
    let forward_end = forward_start
        + direction * (capsule.radius + trace.reach_distance + TRACE_RADIUS_SHRINK);

    let forward_hit = world.sweep(
        QueryShape::Capsule {
            radius: trace_radius,
            half_height: ledge_delta * 0.5,
        },
        forward_start,
        forward_end,
        settings.trace_object_types,
    )?;
    if !forward_hit.is_valid_blocking() {
        return None;
    }

    let primitive_id = forward_hit.primitive?;
    let primitive = world.primitive(primitive_id)?;
    if primitive.linear_velocity.norm_squared()
        > settings.target_primitive_speed_threshold * settings.target_primitive_speed_threshold
        || !primitive.can_step_up
        || is_walkable(&forward_hit, query.walkable_floor_y)
    {
        log::trace!("mantle rejected: forward hit on {primitive_id:?} is not a ledge");
        return None;
    }

    // 3) Downward sweep onto the top of the ledge.
    let wall_normal = Vec3::new(forward_hit.normal.x, 0.0, forward_hit.normal.z)
        .try_normalize(f32::EPSILON)
        .unwrap_or_else(|| -direction);
    let down_xz = forward_hit.point - wall_normal * trace.target_location_offset;

    let down_start = Vec3::new(
        down_xz.x,
        bottom.y + ledge_delta + 2.5 * trace_radius + MIN_FLOOR_DIST,
        down_xz.z,
    );
    let down_end = Vec3::new(
        down_xz.x,
        bottom.y + ledge_min + trace_radius - MAX_FLOOR_DIST,
        down_xz.z,
    );

    let down_hit = world
        .sweep(
            QueryShape::Sphere {
                radius: trace_radius,
            },
            down_start,
            down_end,
            settings.trace_object_types,
        )
        .filter(|hit| is_walkable(hit, query.walkable_floor_y))?;

    // 4) Room to stand.
    let target_location = down_hit.point + Vec3::y() * MIN_FLOOR_DIST;
    let target_capsule_center = target_location + Vec3::y() * capsule.half_height;
    if world.overlap(
        QueryShape::Capsule {
            radius: capsule.radius,
            half_height: capsule.half_height,
        },
        target_capsule_center,
        settings.trace_object_types,
    ) {
        log::trace!("mantle rejected: no room to stand at {target_location:?}");
        return None;
    }

    // 5) Target pose facing into the wall.
    let target_yaw = angle::yaw_of(&-wall_normal).unwrap_or(query.actor_yaw);
    let target = Transform::new(target_location, angle::yaw_rotation(target_yaw));
    let height = target_location.y - bottom.y;
    let mantling_type = classify(height, query.grounded, settings.mantling_high_height_threshold);

    let (target_primitive, target_relative) = if primitive.movable {
        (Some(primitive_id), primitive.transform.relative(&target))
    } else {
        (None, target)
    };

    Some(MantlingParams {
        target_primitive,
        target_relative,
        mantling_height: height,
        mantling_type,
    })
}
