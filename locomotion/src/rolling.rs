//! Roll action: a clip on the action slot plus a yaw blend toward the roll direction.

use serde::{Deserialize, Serialize};

use crate::angle;
use crate::damping::exponential_decay_angle;
use crate::rig::{ClipPlayback, ClipPlayer};
use crate::settings::RollingSettings;
use crate::state::{LocomotionAction, LocomotionState};

/// Parameters every peer starts the same roll from.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RollStart {
    pub play_rate: f32,
    /// Actor yaw snapped to at the start.
    pub start_yaw: f32,
    pub target_yaw: f32,
}

/// Target yaw of a roll requested by the player: input direction or current facing.
pub fn requested_target_yaw(
    settings: &RollingSettings,
    locomotion: &LocomotionState,
    actor_yaw: f32,
) -> f32 {
    if settings.rotate_to_input_on_start && locomotion.has_input {
        locomotion.input_yaw
    } else {
        actor_yaw
    }
}

/// Target yaw of a roll started by a landing: velocity direction while moving.
pub fn landing_target_yaw(locomotion: &LocomotionState, actor_yaw: f32) -> f32 {
    if locomotion.has_speed {
        locomotion.velocity_yaw
    } else {
        actor_yaw
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RollingController {
    target_yaw: f32,
}

impl RollingController {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn target_yaw(&self) -> f32 {
        self.target_yaw
    }

    /// No action, or a previous roll whose clip already stopped.
    pub fn is_allowed_to_start(
        action: Option<LocomotionAction>,
        settings: &RollingSettings,
        clips: &impl ClipPlayer,
        slot: &str,
    ) -> bool {
        match action {
            None => true,
            Some(LocomotionAction::Rolling) => !clips.is_clip_playing_on_slot(&settings.clip, slot),
            Some(_) => false,
        }
    }

    /// Play the roll clip. The caller snaps the actor to `start.start_yaw` and sets
    /// the Rolling action when this returns true.
    pub fn start(
        &mut self,
        start: &RollStart,
        action: Option<LocomotionAction>,
        settings: &RollingSettings,
        clips: &mut impl ClipPlayer,
        slot: &str,
    ) -> bool {
        if settings.clip.is_none() || !Self::is_allowed_to_start(action, settings, clips, slot) {
            return false;
        }

        let playback = ClipPlayback {
            play_rate: start.play_rate,
            ..ClipPlayback::default()
        };
        if !clips.play_clip_on_slot(&settings.clip, slot, playback) {
            log::debug!("roll clip {:?} did not play", settings.clip);
            return false;
        }

        self.target_yaw = angle::normalize(start.target_yaw);
        log::info!(
            "roll start: yaw {:.1} -> {:.1}, rate {:.2}",
            start.start_yaw,
            self.target_yaw,
            start.play_rate
        );
        true
    }

    /// Turn the body toward the roll direction. Instant when the speed is not positive.
    pub fn refresh(&self, dt: f32, settings: &RollingSettings, actor_yaw: f32) -> f32 {
        if settings.rotation_interpolation_speed <= 0.0 {
            self.target_yaw
        } else {
            exponential_decay_angle(
                actor_yaw,
                self.target_yaw,
                dt,
                settings.rotation_interpolation_speed,
            )
        }
    }

    /// The Rolling action is over once its clip stopped playing.
    pub fn is_finished(
        action: Option<LocomotionAction>,
        settings: &RollingSettings,
        clips: &impl ClipPlayer,
        slot: &str,
    ) -> bool {
        action == Some(LocomotionAction::Rolling)
            && !clips.is_clip_playing_on_slot(&settings.clip, slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rig::{ClipId, PoseSnapshot};

    #[derive(Default)]
    struct Clips {
        playing: Option<(ClipId, f32)>,
    }

    impl ClipPlayer for Clips {
        fn play_clip_on_slot(&mut self, clip: &ClipId, _: &str, playback: ClipPlayback) -> bool {
            self.playing = Some((clip.clone(), playback.play_rate));
            true
        }
        fn stop_slot(&mut self, _: &str, _: f32) {
            self.playing = None;
        }
        fn is_clip_playing_on_slot(&self, clip: &ClipId, _: &str) -> bool {
            self.playing.as_ref().is_some_and(|(playing, _)| playing == clip)
        }
        fn snapshot_current_pose(&mut self) -> PoseSnapshot {
            PoseSnapshot(0)
        }
    }

    const SLOT: &str = "DefaultSlot";

    #[test]
    fn start_plays_clip_with_rate() {
        let settings = RollingSettings::default();
        let mut clips = Clips::default();
        let mut rolling = RollingController::new();
        let start = RollStart {
            play_rate: 1.3,
            start_yaw: 10.0,
            target_yaw: 370.0,
        };

        assert!(rolling.start(&start, None, &settings, &mut clips, SLOT));
        assert_eq!(clips.playing, Some((settings.clip.clone(), 1.3)));
        assert!((rolling.target_yaw() - 10.0).abs() < 1.0e-4);
    }

    #[test]
    fn a_playing_roll_blocks_another() {
        let settings = RollingSettings::default();
        let mut clips = Clips::default();
        let mut rolling = RollingController::new();
        let start = RollStart {
            play_rate: 1.0,
            start_yaw: 0.0,
            target_yaw: 0.0,
        };
        let rolling_action = Some(LocomotionAction::Rolling);

        assert!(rolling.start(&start, None, &settings, &mut clips, SLOT));
        assert!(!rolling.start(&start, rolling_action, &settings, &mut clips, SLOT));
        assert!(!rolling.start(&start, Some(LocomotionAction::GettingUp), &settings, &mut clips, SLOT));
        assert!(!RollingController::is_finished(rolling_action, &settings, &clips, SLOT));

        clips.stop_slot(SLOT, 0.2);
        assert!(RollingController::is_finished(rolling_action, &settings, &clips, SLOT));
        assert!(rolling.start(&start, rolling_action, &settings, &mut clips, SLOT));
    }

    #[test]
    fn yaw_decays_toward_target() {
        let settings = RollingSettings::default();
        let mut rolling = RollingController::new();
        rolling.target_yaw = 90.0;

        let yaw = rolling.refresh(0.1, &settings, 0.0);
        assert!(yaw > 0.0 && yaw < 90.0);

        let instant = RollingSettings {
            rotation_interpolation_speed: 0.0,
            ..RollingSettings::default()
        };
        assert_eq!(rolling.refresh(0.1, &instant, 0.0), 90.0);
    }

    #[test]
    fn target_yaw_selection() {
        let settings = RollingSettings::default();
        let locomotion = LocomotionState {
            has_input: true,
            input_yaw: 45.0,
            has_speed: true,
            velocity_yaw: -60.0,
            ..LocomotionState::default()
        };
        let expected = if settings.rotate_to_input_on_start { 45.0 } else { 5.0 };
        assert_eq!(requested_target_yaw(&settings, &locomotion, 5.0), expected);
        assert_eq!(landing_target_yaw(&locomotion, 5.0), -60.0);
        assert_eq!(landing_target_yaw(&LocomotionState::default(), 5.0), 5.0);
    }
}
