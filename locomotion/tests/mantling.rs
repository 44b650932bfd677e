//! Ledge search and the grounded mantle against a real Rapier query world.

mod common;

use common::{DT, FakeClips, FakeSkeleton, character, floor, idle_input, ledge, world};
use locomotion::mantling::{LedgeQuery, find_ledge};
use locomotion::settings::MantlingSettings;
use locomotion::state::LocomotionState;
use locomotion::world::{Hit, PrimitiveInfo, PrimitiveMotion, QueryShape};
use locomotion::{
    ActionEvent, CapsuleSpec, ClipId, ColliderShapeDef, HostContext, LocomotionMode,
    MIN_FLOOR_DIST, MantlingType, MovementMode, NetMessage, NetRole, ObjectTypes, PrimitiveId,
    Quat, RapierQueryWorld, Vec3, WALKABLE_FLOOR_Y, WorldPrimitiveDef, WorldQuery,
};

fn query(locomotion: &LocomotionState, grounded: bool) -> LedgeQuery<'_> {
    LedgeQuery {
        location: Vec3::new(0.0, 0.9, 0.0),
        actor_yaw: 0.0,
        capsule: CapsuleSpec::default(),
        locomotion,
        grounded,
        walkable_floor_y: WALKABLE_FLOOR_Y,
    }
}

/// Walkable 35 degree slope rising toward -Z, starting just in front of the origin.
fn ramp() -> WorldPrimitiveDef {
    WorldPrimitiveDef::fixed(
        3,
        Vec3::new(0.0, 0.0, -0.1),
        ColliderShapeDef::Plane {
            offset_along_normal: 0.0,
        },
    )
    .with_rotation(Quat::from_axis_angle(&Vec3::x_axis(), 35.0_f32.to_radians()))
}

fn search(world: &RapierQueryWorld, grounded: bool) -> Option<locomotion::MantlingParams> {
    let settings = MantlingSettings::default();
    let locomotion = LocomotionState::default();
    let trace = if grounded {
        &settings.grounded_trace
    } else {
        &settings.in_air_trace
    };
    find_ledge(&query(&locomotion, grounded), trace, &settings, world)
}

#[test]
fn ledge_height_selects_high_or_low() {
    let high = search(&world(vec![floor(), ledge(1.3)]), true).expect("high ledge");
    assert_eq!(high.mantling_type, MantlingType::High);
    assert!((high.mantling_height - (1.3 + MIN_FLOOR_DIST)).abs() < 0.02, "{}", high.mantling_height);
    assert_eq!(high.target_primitive, None);

    let target = high.target_relative.translation;
    assert!((target.y - (1.3 + MIN_FLOOR_DIST)).abs() < 0.02, "{target:?}");
    // The target sits just past the wall face at z = -0.5.
    assert!(target.z < -0.5 && target.z > -0.8, "{target:?}");

    let low = search(&world(vec![floor(), ledge(1.2)]), true).expect("low ledge");
    assert_eq!(low.mantling_type, MantlingType::Low);
}

#[test]
fn airborne_search_is_always_in_air() {
    let params = search(&world(vec![floor(), ledge(1.3)]), false).expect("ledge in reach");
    assert_eq!(params.mantling_type, MantlingType::InAir);
}

#[test]
fn ledge_without_room_to_stand_is_rejected() {
    // Above every trace, but inside the capsule standing on the ledge.
    let ceiling = WorldPrimitiveDef::fixed(
        4,
        Vec3::new(0.0, 3.0, -1.5),
        ColliderShapeDef::Cuboid {
            half_extents: Vec3::new(2.0, 0.15, 1.0),
        },
    );
    assert!(search(&world(vec![floor(), ledge(1.3), ceiling]), true).is_none());
}

#[test]
fn walkable_ramp_is_never_mantled() {
    let world = world(vec![floor(), ramp()]);
    assert!(search(&world, true).is_none());

    let mut skeleton = FakeSkeleton::standing(Vec3::new(0.0, 0.9, 0.0));
    let mut clips = FakeClips::default();
    let mut character = character(NetRole::Authority, &skeleton);
    let mut host = HostContext::new(&mut skeleton, &mut clips, &world);

    for _ in 0..5 {
        assert!(!character.try_start_mantling_grounded(&mut host));
        assert_eq!(character.movement_mode(), MovementMode::Walking);
        assert_eq!(character.locomotion_mode(), Some(LocomotionMode::Grounded));
        assert!(!character.mantling().is_active());
    }
    assert!(character.drain_outbox().is_empty());
}

#[test]
fn grounded_mantle_ends_standing_on_the_ledge() {
    let world = world(vec![floor(), ledge(1.3)]);
    let mut skeleton = FakeSkeleton::standing(Vec3::new(0.0, 0.9, 0.0));
    let mut clips = FakeClips::default();
    let mut character = character(NetRole::Authority, &skeleton);

    {
        let mut host = HostContext::new(&mut skeleton, &mut clips, &world);
        assert!(character.try_start_mantling_grounded(&mut host));
        assert_eq!(character.movement_mode(), MovementMode::Mantling);
        assert_eq!(character.locomotion_mode(), Some(LocomotionMode::Mantling));

        let state = character.mantling().state().expect("mantle running");
        assert_eq!(state.params.mantling_type, MantlingType::High);

        // A second mantle while one runs is rejected.
        assert!(!character.try_start_mantling_grounded(&mut host));
    }

    let outbox = character.drain_outbox();
    assert!(
        matches!(outbox.as_slice(), [NetMessage::Event(ActionEvent::StartMantling(_))]),
        "{outbox:?}"
    );
    assert_eq!(clips.played[0].0, ClipId::new("MantleHigh"));

    let mut host = HostContext::new(&mut skeleton, &mut clips, &world);
    for _ in 0..90 {
        let input = idle_input(&character);
        character.tick(DT, &input, &mut host);
        if !character.mantling().is_active() {
            break;
        }
    }

    assert!(!character.mantling().is_active());
    assert_eq!(character.movement_mode(), MovementMode::Walking);
    assert_eq!(character.locomotion_mode(), Some(LocomotionMode::Grounded));

    let location = character.location();
    assert!((location.y - (1.3 + MIN_FLOOR_DIST + 0.9)).abs() < 0.02, "{location:?}");
    assert!(location.z < -0.5, "{location:?}");
    assert!(character.yaw().abs() < 1.0);
}

/// Query world whose ledge can be removed between ticks.
struct Demolition {
    world: RapierQueryWorld,
    removed: Option<PrimitiveId>,
}

impl WorldQuery for Demolition {
    fn raycast(&self, start: Vec3, end: Vec3, channel: ObjectTypes) -> Option<Hit> {
        self.world.raycast(start, end, channel)
    }

    fn sweep(
        &self,
        shape: QueryShape,
        start: Vec3,
        end: Vec3,
        object_types: ObjectTypes,
    ) -> Option<Hit> {
        self.world.sweep(shape, start, end, object_types)
    }

    fn overlap(&self, shape: QueryShape, location: Vec3, object_types: ObjectTypes) -> bool {
        self.world.overlap(shape, location, object_types)
    }

    fn primitive(&self, id: PrimitiveId) -> Option<PrimitiveInfo> {
        if self.removed == Some(id) {
            return None;
        }
        self.world.primitive(id)
    }
}

fn sliding_ledge(velocity: Vec3) -> WorldPrimitiveDef {
    ledge(1.3).with_motion(PrimitiveMotion::Kinematic {
        linear_velocity: velocity,
        yaw_rate: 0.0,
    })
}

#[test]
fn mantle_follows_a_moving_ledge() {
    let mut world = world(vec![floor(), sliding_ledge(Vec3::new(1.0, 0.0, 0.0))]);
    let mut skeleton = FakeSkeleton::standing(Vec3::new(0.0, 0.9, 0.0));
    let mut clips = FakeClips::default();
    let mut character = character(NetRole::Authority, &skeleton);

    {
        let mut host = HostContext::new(&mut skeleton, &mut clips, &world);
        assert!(character.try_start_mantling_grounded(&mut host));
    }
    let state = character.mantling().state().expect("mantle running");
    assert_eq!(state.params.target_primitive, Some(PrimitiveId(2)));

    for _ in 0..90 {
        world.advance(DT);
        let input = idle_input(&character);
        let mut host = HostContext::new(&mut skeleton, &mut clips, &world);
        character.tick(DT, &input, &mut host);
        if !character.mantling().is_active() {
            break;
        }
    }

    assert!(!character.mantling().is_active());
    assert_eq!(character.movement_mode(), MovementMode::Walking);
    let ledge_x = world
        .primitive(PrimitiveId(2))
        .expect("ledge exists")
        .transform
        .translation
        .x;
    assert!(ledge_x > 0.1, "{ledge_x}");
    assert!((character.location().x - ledge_x).abs() < 0.02, "{:?}", character.location());
}

#[test]
fn mantle_stops_when_its_ledge_disappears() {
    let mut world = Demolition {
        world: world(vec![floor(), sliding_ledge(Vec3::zeros())]),
        removed: None,
    };
    let mut skeleton = FakeSkeleton::standing(Vec3::new(0.0, 0.9, 0.0));
    let mut clips = FakeClips::default();
    let mut character = character(NetRole::Authority, &skeleton);

    {
        let mut host = HostContext::new(&mut skeleton, &mut clips, &world);
        assert!(character.try_start_mantling_grounded(&mut host));
        let input = idle_input(&character);
        character.tick(DT, &input, &mut host);
    }
    assert!(character.mantling().is_active());

    world.removed = Some(PrimitiveId(2));
    let before = character.location();
    let input = idle_input(&character);
    let mut host = HostContext::new(&mut skeleton, &mut clips, &world);
    character.tick(DT, &input, &mut host);

    assert!(!character.mantling().is_active());
    assert_eq!(character.movement_mode(), MovementMode::Walking);
    assert_ne!(character.locomotion_mode(), Some(LocomotionMode::Mantling));
    assert_eq!(character.location(), before);
}
