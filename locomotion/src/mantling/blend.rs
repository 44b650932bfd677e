//! Procedural mantle blend.
//!
//! The actor starts at `actor offset` from the target and must end exactly on it.
//! The authored clip starts at `animation offset`. Each tick the offset is pulled
//! toward the animation offset (horizontal and vertical separately), scaled down
//! by the interpolation amount, and faded in over the first moments of the clip.

use crate::constants::SMALL_NUMBER;
use crate::damping::clamp01;
use crate::settings::MantleTypeSettings;
use crate::types::{Quat, Transform, Vec3, slerp};

/// Where the authored clip starts relative to `target`.
pub fn animation_offset(settings: &MantleTypeSettings, target: &Transform) -> Vec3 {
    let forward = target.rotation * -Vec3::z();
    let mut offset = forward * settings.start_offset_forward;
    offset.y = settings.start_offset_up;
    offset
}

/// Feet pose for one tick of the mantle.
///
/// `elapsed` is real time since the start and drives the fade-in; `mantling_time`
/// is the same span in clip time (scaled by the play rate) and drives the
/// interpolation and correction amounts.
#[allow(clippy::too_many_arguments)]
pub fn mantle_pose(
    settings: &MantleTypeSettings,
    target: &Transform,
    start_time: f32,
    elapsed: f32,
    mantling_time: f32,
    actor_location_offset: Vec3,
    actor_rotation_offset: Quat,
) -> Transform {
    let blend_in = settings.blend_in_curve.sample(elapsed);

    let (location_offset, rotation_offset) = if blend_in <= SMALL_NUMBER {
        (actor_location_offset, actor_rotation_offset)
    } else {
        let amounts = settings
            .interpolation_and_correction_curve
            .sample(mantling_time + start_time);
        let interpolation = amounts.x;
        let horizontal = amounts.y;
        let vertical = amounts.z;

        let (mut location, mut rotation) = if interpolation <= SMALL_NUMBER {
            (Vec3::zeros(), Quat::identity())
        } else {
            let animation = animation_offset(settings, target);
            let location = Vec3::new(
                lerp(actor_location_offset.x, animation.x, horizontal) * interpolation,
                lerp(actor_location_offset.y, animation.y, vertical) * interpolation,
                lerp(actor_location_offset.z, animation.z, horizontal) * interpolation,
            );
            let rotation = slerp(
                &Quat::identity(),
                &actor_rotation_offset,
                clamp01((1.0 - horizontal) * interpolation),
            );
            (location, rotation)
        };

        // Fade in so a ledge lower than the authored one does not pop at the start.
        if blend_in < 1.0 - SMALL_NUMBER {
            location = actor_location_offset.lerp(&location, blend_in);
            rotation = slerp(&actor_rotation_offset, &rotation, blend_in);
        }

        (location, rotation)
    };

    Transform::new(
        target.translation + location_offset,
        target.rotation * rotation_offset,
    )
}

#[inline]
fn lerp(from: f32, to: f32, alpha: f32) -> f32 {
    from + (to - from) * alpha
}
