/*!
Ledge mantling.

- trace: ledge search (forward sweep, downward sweep, free-space check)
- blend: procedural offset blend from the actor pose onto the ledge

[`MantlingController`] owns the running mantle. Detection produces
[`MantlingParams`], which is what travels over the network: every peer starts
the same blend from the same parameters instead of repeating the search.
*/

pub mod blend;
pub mod trace;

pub use trace::{LedgeQuery, classify, find_ledge};

use serde::{Deserialize, Serialize};

use crate::damping::map_range_clamped;
use crate::rig::{ClipPlayback, ClipPlayer};
use crate::settings::{MantleTypeSettings, MantlingSettings};
use crate::state::LocomotionAction;
use crate::types::{Quat, Transform, Vec3};
use crate::world::{PrimitiveId, WorldQuery};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MantlingType {
    High,
    Low,
    InAir,
}

/// Result of a successful ledge search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MantlingParams {
    /// Movable primitive the target is attached to; `None` for static geometry.
    pub target_primitive: Option<PrimitiveId>,
    /// Target feet pose, relative to `target_primitive` when set, world otherwise.
    pub target_relative: Transform,
    /// Ledge height above the feet at detection time (meters).
    pub mantling_height: f32,
    pub mantling_type: MantlingType,
}

/// Chooses the parameter set of a mantle.
pub trait SelectMantleSettings {
    fn select_mantle_settings<'a>(
        &self,
        mantling_type: MantlingType,
        settings: &'a MantlingSettings,
    ) -> Option<&'a MantleTypeSettings>;
}

/// Returns the configured set for the mantle type.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConfiguredMantleSettings;

impl SelectMantleSettings for ConfiguredMantleSettings {
    fn select_mantle_settings<'a>(
        &self,
        mantling_type: MantlingType,
        settings: &'a MantlingSettings,
    ) -> Option<&'a MantleTypeSettings> {
        Some(match mantling_type {
            MantlingType::High => &settings.high,
            MantlingType::Low => &settings.low,
            MantlingType::InAir => &settings.in_air,
        })
    }
}

/// A running mantle.
#[derive(Clone, Debug, PartialEq)]
pub struct MantlingState {
    pub params: MantlingParams,
    pub settings: MantleTypeSettings,
    pub start_time: f32,
    pub play_rate: f32,
    /// Real time the mantle lasts (seconds).
    pub duration: f32,
    pub elapsed: f32,
    /// Actor feet minus target location at the start.
    pub actor_location_offset: Vec3,
    /// Target rotation inverse times actor rotation at the start.
    pub actor_rotation_offset: Quat,
}

impl MantlingState {
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.elapsed >= self.duration
    }
}

/// Resolve the world target pose of `params`.
///
/// Returns `None` when the target primitive no longer exists.
pub fn target_transform(params: &MantlingParams, world: &impl WorldQuery) -> Option<Transform> {
    match params.target_primitive {
        Some(id) => world
            .primitive(id)
            .map(|info| info.transform.compose(&params.target_relative)),
        None => Some(params.target_relative),
    }
}

#[derive(Clone, Debug, Default)]
pub struct MantlingController {
    state: Option<MantlingState>,
}

impl MantlingController {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.state.is_some()
    }

    pub fn state(&self) -> Option<&MantlingState> {
        self.state.as_ref()
    }

    /// No action running and no mantle in progress.
    pub fn is_allowed_to_start(&self, action: Option<LocomotionAction>) -> bool {
        action.is_none() && !self.is_active()
    }

    /// Start the blend and play the clip. Returns false when not allowed or unconfigured.
    #[allow(clippy::too_many_arguments)]
    pub fn start(
        &mut self,
        params: &MantlingParams,
        action: Option<LocomotionAction>,
        settings: &MantlingSettings,
        selector: &dyn SelectMantleSettings,
        world: &impl WorldQuery,
        actor_feet: &Transform,
        clips: &mut impl ClipPlayer,
        slot: &str,
    ) -> bool {
        if !self.is_allowed_to_start(action) {
            return false;
        }

        let Some(type_settings) = selector.select_mantle_settings(params.mantling_type, settings)
        else {
            log::warn!("no mantle settings for {:?}", params.mantling_type);
            return false;
        };
        if type_settings.blend_in_curve.is_empty()
            || type_settings.interpolation_and_correction_curve.is_empty()
        {
            log::warn!("mantle settings for {:?} have empty curves", params.mantling_type);
            return false;
        }

        let Some(target) = target_transform(params, world) else {
            log::debug!("mantle target primitive {:?} is gone", params.target_primitive);
            return false;
        };

        let start_time = map_range_clamped(
            type_settings.reference_height,
            type_settings.start_time,
            params.mantling_height,
        );
        let play_rate = map_range_clamped(
            type_settings.reference_height,
            type_settings.play_rate,
            params.mantling_height,
        )
        .max(f32::EPSILON);
        let (_, max_time) = type_settings.interpolation_and_correction_curve.time_range();
        let duration = (max_time - start_time).max(0.0) / play_rate;

        if !type_settings.clip.is_none() {
            let playback = ClipPlayback {
                play_rate,
                start_time,
                ..ClipPlayback::default()
            };
            if !clips.play_clip_on_slot(&type_settings.clip, slot, playback) {
                log::debug!("mantle clip {:?} did not play", type_settings.clip);
            }
        }

        log::info!(
            "mantle start: {:?} height {:.2} m, duration {:.2} s",
            params.mantling_type,
            params.mantling_height,
            duration
        );

        self.state = Some(MantlingState {
            params: params.clone(),
            settings: type_settings.clone(),
            start_time,
            play_rate,
            duration,
            elapsed: 0.0,
            actor_location_offset: actor_feet.translation - target.translation,
            actor_rotation_offset: target.rotation.inverse() * actor_feet.rotation,
        });
        true
    }

    /// Advance the blend and return the feet pose for this tick.
    ///
    /// Returns `None` when no mantle is running or its target vanished.
    pub fn refresh(&mut self, dt: f32, world: &impl WorldQuery) -> Option<Transform> {
        let state = self.state.as_mut()?;
        state.elapsed += dt.max(0.0);

        let target = target_transform(&state.params, world)?;
        let elapsed = state.elapsed.min(state.duration);
        let mantling_time = elapsed * state.play_rate;

        Some(blend::mantle_pose(
            &state.settings,
            &target,
            state.start_time,
            elapsed,
            mantling_time,
            state.actor_location_offset,
            state.actor_rotation_offset,
        ))
    }

    pub fn is_finished(&self) -> bool {
        self.state.as_ref().is_some_and(MantlingState::is_finished)
    }

    /// Drop the running mantle. Returns false when none was running.
    pub fn stop(&mut self) -> bool {
        let Some(state) = self.state.take() else {
            return false;
        };
        log::info!(
            "mantle stop after {:.2} of {:.2} s",
            state.elapsed,
            state.duration
        );
        true
    }
}
