//! Hub routing: ownership checks, fan-out and tick clamping.

use std::collections::HashMap;

use authority::{Envelope, Hub, NetError};
use locomotion::{
    ActionEvent, BoneId, ClipId, ClipPlayback, ClipPlayer, ColliderShapeDef, CurveId, DesiredValue,
    Gait, LocomotionAction, LocomotionSettings, NetMessage, PoseSnapshot, Quat, RapierQueryWorld,
    RigError, RigNames, SkeletonPose, Transform, Vec3, WorldPrimitiveDef,
};

const OWNER: u64 = 1;
const OBSERVER: u64 = 2;
const HERO: u64 = 10;

/// Upright rig at the origin; every named bone sits at the capsule center.
struct Rig {
    bones: Vec<String>,
    curves: Vec<String>,
}

impl Rig {
    fn new() -> Self {
        let names = RigNames::default();
        Self {
            bones: vec![
                names.root_bone,
                names.pelvis_bone,
                names.spine_bone,
                names.foot_left_bone,
                names.foot_right_bone,
            ],
            curves: vec![
                names.foot_left_ik_curve,
                names.foot_right_ik_curve,
                names.foot_left_lock_curve,
                names.foot_right_lock_curve,
                names.rotation_yaw_speed_curve,
                names.rotation_yaw_offset_curve,
            ],
        }
    }

    fn without_bone(mut self, name: &str) -> Self {
        self.bones.retain(|bone| bone != name);
        self
    }
}

impl SkeletonPose for Rig {
    fn resolve_bone(&self, name: &str) -> Option<BoneId> {
        self.bones
            .iter()
            .position(|bone| bone == name)
            .map(|index| BoneId(index as u16))
    }

    fn resolve_curve(&self, name: &str) -> Option<CurveId> {
        self.curves
            .iter()
            .position(|curve| curve == name)
            .map(|index| CurveId(index as u16))
    }

    fn component_transform(&self) -> Transform {
        Transform::new(Vec3::zeros(), Quat::identity())
    }

    fn bone_world_transform(&self, bone: BoneId) -> Option<Transform> {
        (usize::from(bone.0) < self.bones.len())
            .then(|| Transform::new(Vec3::new(0.0, 0.9, 0.0), Quat::identity()))
    }

    fn curve_value(&self, _curve: CurveId) -> f32 {
        0.0
    }

    fn animation_update_count(&self) -> u64 {
        0
    }

    fn set_bones_simulating_physics(&mut self, _from_bone: BoneId, _enabled: bool) {}

    fn apply_force_at_bone(&mut self, _bone: BoneId, _force: Vec3) {}

    fn bone_physics_velocity(&self, _bone: BoneId) -> Vec3 {
        Vec3::zeros()
    }

    fn set_joint_motor_strength(&mut self, _from_bone: BoneId, _strength: f32) {}

    fn set_gravity_enabled(&mut self, _enabled: bool) {}
}

#[derive(Default)]
struct Clips {
    playing: HashMap<String, ClipId>,
}

impl ClipPlayer for Clips {
    fn play_clip_on_slot(&mut self, clip: &ClipId, slot: &str, _playback: ClipPlayback) -> bool {
        self.playing.insert(slot.to_string(), clip.clone());
        true
    }

    fn stop_slot(&mut self, slot: &str, _blend_out_time: f32) {
        self.playing.remove(slot);
    }

    fn is_clip_playing_on_slot(&self, clip: &ClipId, slot: &str) -> bool {
        self.playing.get(slot) == Some(clip)
    }

    fn snapshot_current_pose(&mut self) -> PoseSnapshot {
        PoseSnapshot(0)
    }
}

fn floor() -> WorldPrimitiveDef {
    WorldPrimitiveDef::fixed(
        1,
        Vec3::new(0.0, -0.5, 0.0),
        ColliderShapeDef::Cuboid {
            half_extents: Vec3::new(20.0, 0.5, 20.0),
        },
    )
}

/// Hub with two connected peers and one character owned by `owner`.
fn hub(owner: Option<u64>) -> Hub<Rig, Clips> {
    let mut hub = Hub::new(RapierQueryWorld::build(vec![floor()]));
    assert!(hub.connect(OWNER));
    assert!(hub.connect(OBSERVER));
    hub.spawn(
        HERO,
        LocomotionSettings::default(),
        owner,
        Vec3::new(0.0, 0.9, 0.0),
        0.0,
        Rig::new(),
        Clips::default(),
    )
    .expect("rig resolves");
    hub
}

fn events(envelopes: &[Envelope], to: u64) -> Vec<ActionEvent> {
    envelopes
        .iter()
        .filter(|envelope| envelope.to == to)
        .filter_map(|envelope| match &envelope.message {
            NetMessage::Event(event) => Some(event.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn owner_request_is_confirmed_to_every_peer() {
    let mut hub = hub(Some(OWNER));
    assert!(!hub.character(HERO).expect("spawned").is_locally_controlled());

    hub.receive(
        OWNER,
        HERO,
        NetMessage::RequestDesired(DesiredValue::Gait(Gait::Walking)),
    )
    .expect("owner may request");
    let envelopes = hub.tick(1.0 / 30.0);

    let confirmed = NetMessage::Confirmed {
        value: DesiredValue::Gait(Gait::Walking),
        sequence: 1,
    };
    assert_eq!(
        envelopes,
        vec![
            Envelope {
                to: OWNER,
                character: HERO,
                message: confirmed.clone(),
            },
            Envelope {
                to: OBSERVER,
                character: HERO,
                message: confirmed,
            },
        ]
    );
}

#[test]
fn foreign_and_malformed_messages_are_refused() {
    let mut hub = hub(Some(OWNER));
    let request = NetMessage::RequestDesired(DesiredValue::Aiming(true));

    assert_eq!(
        hub.receive(OBSERVER, HERO, request.clone()),
        Err(NetError::NotOwner {
            peer: OBSERVER,
            character: HERO,
        })
    );
    assert_eq!(
        hub.receive(OWNER, 99, request),
        Err(NetError::UnknownCharacter(99))
    );
    assert_eq!(
        hub.receive(OWNER, HERO, NetMessage::Event(ActionEvent::StartRagdolling)),
        Err(NetError::NotARequest {
            peer: OWNER,
            message: "event",
        })
    );

    // Nothing reached the character.
    assert!(hub.tick(1.0 / 30.0).is_empty());
    assert!(!hub.character(HERO).expect("spawned").ragdoll().is_active());
}

#[test]
fn requested_roll_is_broadcast_once_per_peer() {
    let mut hub = hub(Some(OWNER));
    hub.receive(
        OWNER,
        HERO,
        NetMessage::RequestEvent(ActionEvent::StartRolling {
            play_rate: 1.0,
            start_yaw: 0.0,
            target_yaw: 0.0,
        }),
    )
    .expect("owner may request");

    let envelopes = hub.tick(1.0 / 30.0);
    assert_eq!(
        hub.character(HERO).expect("spawned").action(),
        Some(LocomotionAction::Rolling)
    );
    for peer in [OWNER, OBSERVER] {
        let events = events(&envelopes, peer);
        assert!(
            matches!(events.as_slice(), [ActionEvent::StartRolling { .. }]),
            "{events:?}"
        );
    }
}

#[test]
fn refused_request_is_answered_to_its_owner_only() {
    let mut hub = hub(Some(OWNER));
    let started = hub
        .with_character(HERO, |character, host| character.try_start_ragdolling(host))
        .expect("spawned");
    assert!(started);
    hub.tick(1.0 / 30.0);

    let roll = ActionEvent::StartRolling {
        play_rate: 1.0,
        start_yaw: 0.0,
        target_yaw: 0.0,
    };
    hub.receive(OWNER, HERO, NetMessage::RequestEvent(roll.clone()))
        .expect("owner may request");
    let envelopes = hub.tick(1.0 / 30.0);

    let refusals: Vec<_> = envelopes
        .iter()
        .filter(|envelope| matches!(envelope.message, NetMessage::Rejected(_)))
        .collect();
    assert_eq!(
        refusals,
        vec![&Envelope {
            to: OWNER,
            character: HERO,
            message: NetMessage::Rejected(roll),
        }]
    );
    assert!(events(&envelopes, OBSERVER).is_empty());
}

#[test]
fn server_driven_actions_go_out_with_the_next_tick() {
    let mut hub = hub(None);
    assert!(hub.character(HERO).expect("spawned").is_locally_controlled());

    let started = hub
        .with_character(HERO, |character, host| character.try_start_ragdolling(host))
        .expect("spawned");
    assert!(started);

    let envelopes = hub.tick(1.0 / 30.0);
    assert_eq!(events(&envelopes, OBSERVER), vec![ActionEvent::StartRagdolling]);
    assert!(matches!(
        hub.with_character(99, |_, _| ()),
        Err(NetError::UnknownCharacter(99))
    ));
}

#[test]
fn disconnect_hands_owned_characters_to_the_server() {
    let mut hub = hub(Some(OWNER));
    assert!(hub.disconnect(OWNER));
    assert!(!hub.disconnect(OWNER));

    assert_eq!(hub.owner_of(HERO), None);
    assert!(hub.character(HERO).expect("spawned").is_locally_controlled());
    assert_eq!(hub.peers().collect::<Vec<_>>(), vec![OBSERVER]);

    let started = hub
        .with_character(HERO, |character, host| character.try_start_rolling(1.0, host))
        .expect("spawned");
    assert!(started);
    let envelopes = hub.tick(1.0 / 30.0);
    assert!(envelopes.iter().all(|envelope| envelope.to == OBSERVER));
    assert!(!events(&envelopes, OBSERVER).is_empty());
}

#[test]
fn long_frames_are_clamped() {
    let mut hub = hub(None);
    hub.tick(1.0);
    assert_eq!(hub.time(), 0.125);

    hub.tick(f32::NAN);
    assert_eq!(hub.time(), 0.125);
}

#[test]
fn spawning_checks_ids_and_rigs() {
    let mut hub = hub(None);
    let spawn = |hub: &mut Hub<Rig, Clips>, id: u64, rig: Rig| {
        hub.spawn(
            id,
            LocomotionSettings::default(),
            None,
            Vec3::new(0.0, 0.9, 3.0),
            0.0,
            rig,
            Clips::default(),
        )
    };

    assert_eq!(
        spawn(&mut hub, HERO, Rig::new()),
        Err(NetError::DuplicateCharacter(HERO))
    );
    assert_eq!(
        spawn(&mut hub, 11, Rig::new().without_bone("pelvis")),
        Err(NetError::Rig(RigError::MissingBone("pelvis".to_string())))
    );
    assert!(hub.character(11).is_none());

    assert!(hub.despawn(HERO).is_ok());
    assert_eq!(hub.despawn(HERO).err(), Some(NetError::UnknownCharacter(HERO)));
}
