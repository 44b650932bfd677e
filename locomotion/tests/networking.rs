//! Request/confirm exchange between the copies of one character.

mod common;

use common::{DT, FakeClips, FakeSkeleton, character, floor, idle_input, world};
use locomotion::{
    ActionEvent, Character, ClipId, DesiredValue, Gait, HostContext, LocomotionAction, NetMessage,
    NetRole, RapierQueryWorld, Vec3,
};

const SLOT: &str = "DefaultSlot";

struct Peer {
    character: Character,
    skeleton: FakeSkeleton,
    clips: FakeClips,
}

impl Peer {
    fn new(role: NetRole) -> Self {
        let skeleton = FakeSkeleton::standing(Vec3::new(0.0, 0.9, 0.0));
        let character = character(role, &skeleton);
        Self {
            character,
            skeleton,
            clips: FakeClips::default(),
        }
    }

    fn tick(&mut self, world: &RapierQueryWorld) {
        let input = idle_input(&self.character);
        let mut host = HostContext::new(&mut self.skeleton, &mut self.clips, world);
        self.character.tick(DT, &input, &mut host);
    }

    fn deliver(&mut self, messages: &[NetMessage]) {
        for message in messages {
            self.character.receive(message.clone());
        }
    }

    fn roll(&mut self, play_rate: f32, world: &RapierQueryWorld) -> bool {
        let mut host = HostContext::new(&mut self.skeleton, &mut self.clips, world);
        self.character.try_start_rolling(play_rate, &mut host)
    }

    /// Let the action clip run out and tick once so the action ends.
    fn finish_action(&mut self, world: &RapierQueryWorld) {
        self.clips.finish(SLOT);
        self.tick(world);
        assert_eq!(self.character.action(), None);
    }

    fn played(&self, clip: &str) -> usize {
        let clip = ClipId::new(clip);
        self.clips.played.iter().filter(|(played, _)| *played == clip).count()
    }
}

/// Authority copy of a client-owned character, plus the owner and one observer.
fn session() -> (Peer, Peer, Peer) {
    let mut authority = Peer::new(NetRole::Authority);
    authority.character.set_locally_controlled(false);
    (
        authority,
        Peer::new(NetRole::AutonomousProxy),
        Peer::new(NetRole::SimulatedProxy),
    )
}

#[test]
fn desired_gait_request_is_confirmed_to_every_copy() {
    let world = world(vec![floor()]);
    let (mut authority, mut owner, mut observer) = session();

    assert!(owner.character.set_desired_gait(Gait::Walking));
    let requests = owner.character.drain_outbox();
    assert_eq!(requests, vec![NetMessage::RequestDesired(DesiredValue::Gait(Gait::Walking))]);

    authority.deliver(&requests);
    authority.tick(&world);
    let confirmed = authority.character.drain_outbox();
    assert_eq!(
        confirmed,
        vec![NetMessage::Confirmed {
            value: DesiredValue::Gait(Gait::Walking),
            sequence: 1,
        }]
    );

    owner.deliver(&confirmed);
    observer.deliver(&confirmed);
    owner.tick(&world);
    observer.tick(&world);

    for peer in [&authority, &owner, &observer] {
        let gait = &peer.character.state_machine().replicated.gait;
        assert_eq!(*gait.get(), Gait::Walking);
        assert_eq!(gait.sequence(), 1);
    }
}

#[test]
fn stale_confirmation_does_not_roll_back() {
    let world = world(vec![floor()]);
    let mut owner = Peer::new(NetRole::AutonomousProxy);

    owner.deliver(&[
        NetMessage::Confirmed {
            value: DesiredValue::Gait(Gait::Sprinting),
            sequence: 3,
        },
        NetMessage::Confirmed {
            value: DesiredValue::Gait(Gait::Walking),
            sequence: 2,
        },
    ]);
    owner.tick(&world);

    assert_eq!(*owner.character.state_machine().replicated.gait.get(), Gait::Sprinting);
}

#[test]
fn predicted_roll_is_not_started_twice() {
    let world = world(vec![floor()]);
    let (mut authority, mut owner, mut observer) = session();

    {
        let mut host = HostContext::new(&mut owner.skeleton, &mut owner.clips, &world);
        assert!(owner.character.try_start_rolling(1.0, &mut host));
    }
    let requests = owner.character.drain_outbox();
    assert!(matches!(
        requests.as_slice(),
        [NetMessage::RequestEvent(ActionEvent::StartRolling { .. })]
    ));

    authority.deliver(&requests);
    authority.tick(&world);
    assert_eq!(authority.character.action(), Some(LocomotionAction::Rolling));
    let broadcast = authority.character.drain_outbox();
    assert!(matches!(
        broadcast.as_slice(),
        [NetMessage::Event(ActionEvent::StartRolling { .. })]
    ));

    owner.deliver(&broadcast);
    observer.deliver(&broadcast);
    owner.tick(&world);
    observer.tick(&world);

    assert_eq!(owner.played("Roll"), 1);
    assert_eq!(observer.played("Roll"), 1);
    assert_eq!(observer.character.action(), Some(LocomotionAction::Rolling));
}

#[test]
fn simulated_proxy_never_initiates() {
    let world = world(vec![floor()]);
    let mut observer = Peer::new(NetRole::SimulatedProxy);
    let mut host = HostContext::new(&mut observer.skeleton, &mut observer.clips, &world);

    assert!(!observer.character.try_start_rolling(1.0, &mut host));
    assert!(!observer.character.try_start_ragdolling(&mut host));
    assert!(!observer.character.try_start_mantling_grounded(&mut host));
    assert!(!observer.character.set_desired_gait(Gait::Walking));
    assert!(observer.character.drain_outbox().is_empty());
}

#[test]
fn authority_rejects_a_roll_while_ragdolling() {
    let world = world(vec![floor()]);
    let (mut authority, _, _) = session();

    {
        let mut host = HostContext::new(&mut authority.skeleton, &mut authority.clips, &world);
        assert!(authority.character.try_start_ragdolling(&mut host));
    }
    authority.character.drain_outbox();

    authority.deliver(&[NetMessage::RequestEvent(ActionEvent::StartRolling {
        play_rate: 1.0,
        start_yaw: 0.0,
        target_yaw: 0.0,
    })]);
    authority.tick(&world);

    assert_eq!(authority.character.action(), None);
    assert_eq!(
        authority.character.drain_outbox(),
        vec![NetMessage::Rejected(ActionEvent::StartRolling {
            play_rate: 1.0,
            start_yaw: 0.0,
            target_yaw: 0.0,
        })]
    );
}

#[test]
fn refused_roll_does_not_swallow_the_next_one() {
    let world = world(vec![floor()]);
    let (mut authority, mut owner, _) = session();

    // The authority copy is still rolling, so the owner's first roll is refused.
    assert!(authority.roll(1.0, &world));
    authority.character.drain_outbox();

    assert!(owner.roll(1.0, &world));
    authority.deliver(&owner.character.drain_outbox());
    authority.tick(&world);
    let refusal = authority.character.drain_outbox();
    assert!(matches!(
        refusal.as_slice(),
        [NetMessage::Rejected(ActionEvent::StartRolling { .. })]
    ));

    owner.deliver(&refusal);
    owner.finish_action(&world);
    assert_eq!(owner.character.unanswered_predictions(), 0);

    // Same parameters again; this time the authority is free.
    authority.finish_action(&world);
    assert!(owner.roll(1.0, &world));
    authority.deliver(&owner.character.drain_outbox());
    authority.tick(&world);
    let broadcast = authority.character.drain_outbox();
    assert!(matches!(
        broadcast.as_slice(),
        [NetMessage::Event(ActionEvent::StartRolling { .. })]
    ));

    // The owner's clip ends before the broadcast arrives.
    owner.finish_action(&world);
    owner.deliver(&broadcast);
    owner.tick(&world);

    assert_eq!(owner.played("Roll"), 2);
    assert_eq!(owner.character.action(), None);
    assert_eq!(owner.character.unanswered_predictions(), 0);
}

#[test]
fn broadcast_settles_older_unanswered_predictions() {
    let world = world(vec![floor()]);
    let mut owner = Peer::new(NetRole::AutonomousProxy);

    // The answer to the first roll never arrives.
    assert!(owner.roll(1.0, &world));
    owner.finish_action(&world);
    assert!(owner.roll(1.5, &world));
    let requests = owner.character.drain_outbox();
    assert_eq!(owner.character.unanswered_predictions(), 2);

    let second = requests.last().cloned();
    let Some(NetMessage::RequestEvent(second)) = second else {
        panic!("expected a roll request, got {requests:?}");
    };
    owner.finish_action(&world);
    owner.deliver(&[NetMessage::Event(second)]);
    owner.tick(&world);
    assert_eq!(owner.played("Roll"), 2);
    assert_eq!(owner.character.unanswered_predictions(), 0);

    // A server-driven roll with the first roll's parameters is a new roll.
    owner.deliver(&[NetMessage::Event(ActionEvent::StartRolling {
        play_rate: 1.0,
        start_yaw: 0.0,
        target_yaw: 0.0,
    })]);
    owner.tick(&world);
    assert_eq!(owner.played("Roll"), 3);
    assert_eq!(owner.character.action(), Some(LocomotionAction::Rolling));
}

#[test]
fn unanswered_predictions_are_bounded() {
    let world = world(vec![floor()]);
    let mut owner = Peer::new(NetRole::AutonomousProxy);

    for _ in 0..12 {
        assert!(owner.roll(1.0, &world));
        owner.finish_action(&world);
    }
    assert_eq!(owner.character.unanswered_predictions(), 8);
}

#[test]
fn observers_pull_their_ragdoll_toward_the_replicated_pelvis() {
    let world = world(vec![floor()]);
    let mut authority = Peer::new(NetRole::Authority);
    let mut observer = Peer::new(NetRole::SimulatedProxy);
    authority.skeleton.lie_on_back(Vec3::new(0.0, 0.3, 0.0));

    {
        let mut host = HostContext::new(&mut authority.skeleton, &mut authority.clips, &world);
        assert!(authority.character.try_start_ragdolling(&mut host));
    }
    let broadcast = authority.character.drain_outbox();
    assert_eq!(
        broadcast,
        vec![
            NetMessage::Confirmed {
                value: DesiredValue::RagdollTargetLocation(Vec3::new(0.0, 0.3, 0.0)),
                sequence: 1,
            },
            NetMessage::Event(ActionEvent::StartRagdolling),
        ]
    );

    observer.deliver(&broadcast);
    observer.tick(&world);

    assert!(observer.character.ragdoll().is_active());
    assert!(observer.character.ragdoll().state().pull_force > 0.0);
    // The observer's pelvis still stands at 0.9 m, so the pull points down.
    let (_, force) = observer.skeleton.forces.last().copied().expect("pull applied");
    assert!(force.y < 0.0, "{force:?}");
    assert!((observer.character.location().y - 0.91).abs() < 1.0e-3);
}
