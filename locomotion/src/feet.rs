/*!
Foot locking and ground-conforming IK offsets.

Per foot and per animation tick:
1) re-anchor the lock after a teleport
2) re-anchor the lock after a movement base change (or a pending update)
3) update the lock amount from the lock curve
4) trace the ground and spring the foot offset toward it
5) compose the final foot pose

The lock amount never rises gradually: it only drops, or jumps straight to 1.
That is what keeps a foot from sliding into a new lock position.

Outputs are in skeletal mesh component space; the pelvis offset is vertical only.
*/

use crate::constants::RELEVANT_WEIGHT;
use crate::damping::{clamp01, interp_to_quat, interp_to_vec3, spring_damp, SpringState};
use crate::rig::{FootHandles, SkeletonPose};
use crate::settings::FeetSettings;
use crate::state::{LocomotionMode, MovementBaseState};
use crate::types::{Quat, Transform, Vec3};
use crate::world::WorldQuery;

#[inline]
fn is_relevant(weight: f32) -> bool {
    weight > RELEVANT_WEIGHT
}

/// What the feet update reads for one animation tick.
#[derive(Clone, Copy, Debug)]
pub struct FeetInput<'a> {
    pub dt: f32,
    /// First tick after the character was dormant: snap everything.
    pub pending_update: bool,
    /// A teleport happened within the re-anchor window.
    pub recently_teleported: bool,
    pub moving: bool,
    pub locomotion_mode: Option<LocomotionMode>,
    pub movement_base: &'a MovementBaseState,
    /// Minimum `normal.y` of a walkable surface.
    pub walkable_floor_y: f32,
}

/// Lock, offset and spring memory of one foot.
#[derive(Clone, Debug, PartialEq)]
pub struct FootState {
    pub ik_amount: f32,
    pub lock_amount: f32,
    /// Animated foot pose this tick (world).
    pub target: Transform,
    /// Pose the foot is held at (world).
    pub lock: Transform,
    pub lock_component_relative: Transform,
    pub lock_base_relative: Transform,
    pub offset_target_location: Vec3,
    pub offset_target_rotation: Quat,
    pub offset_location: Vec3,
    pub offset_rotation: Quat,
    pub offset_spring: SpringState<Vec3>,
}

impl Default for FootState {
    fn default() -> Self {
        Self {
            ik_amount: 0.0,
            lock_amount: 0.0,
            target: Transform::identity(),
            lock: Transform::identity(),
            lock_component_relative: Transform::identity(),
            lock_base_relative: Transform::identity(),
            offset_target_location: Vec3::zeros(),
            offset_target_rotation: Quat::identity(),
            offset_location: Vec3::zeros(),
            offset_rotation: Quat::identity(),
            offset_spring: SpringState::default(),
        }
    }
}

impl FootState {
    fn clear_lock(&mut self) {
        self.lock_amount = 0.0;
        self.lock = Transform::identity();
        self.lock_component_relative = Transform::identity();
        self.lock_base_relative = Transform::identity();
    }

    fn clear_offset_target(&mut self) {
        self.offset_target_location = Vec3::zeros();
        self.offset_target_rotation = Quat::identity();
        self.offset_spring.reset();
    }
}

/// Final pose of one foot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FootOutput {
    pub ik_amount: f32,
    pub lock_amount: f32,
    /// Component space.
    pub transform: Transform,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FeetOutput {
    pub left: FootOutput,
    pub right: FootOutput,
    /// Average foot IK weight.
    pub pelvis_weight: f32,
    /// Vertical pelvis offset (meters, never positive).
    pub pelvis_offset: f32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeetIk {
    pub left: FootState,
    pub right: FootState,
    pelvis_offset: f32,
    pelvis_weight: f32,
    pelvis_spring: SpringState<f32>,
}

impl FeetIk {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn pelvis_offset(&self) -> f32 {
        self.pelvis_offset
    }

    /// Update both feet and the pelvis.
    ///
    /// Returns `None` when a foot bone cannot be read; the tick is skipped.
    pub fn refresh(
        &mut self,
        input: &FeetInput<'_>,
        settings: &FeetSettings,
        left: &FootHandles,
        right: &FootHandles,
        skeleton: &impl SkeletonPose,
        world: &impl WorldQuery,
    ) -> Option<FeetOutput> {
        let component = skeleton.component_transform();
        let scale = skeleton.component_scale();

        let Some(left_out) =
            refresh_foot(&mut self.left, input, settings, left, skeleton, world, &component, scale)
        else {
            log::error!("left foot bone is missing from the skeleton; skipping feet update");
            debug_assert!(false, "left foot bone is missing");
            return None;
        };
        let Some(right_out) = refresh_foot(
            &mut self.right,
            input,
            settings,
            right,
            skeleton,
            world,
            &component,
            scale,
        ) else {
            log::error!("right foot bone is missing from the skeleton; skipping feet update");
            debug_assert!(false, "right foot bone is missing");
            return None;
        };

        self.refresh_pelvis(input, settings);

        Some(FeetOutput {
            left: left_out,
            right: right_out,
            pelvis_weight: self.pelvis_weight,
            pelvis_offset: self.pelvis_offset,
        })
    }

    fn refresh_pelvis(&mut self, input: &FeetInput<'_>, settings: &FeetSettings) {
        self.pelvis_weight = (self.left.ik_amount + self.right.ik_amount) * 0.5;

        if !is_relevant(self.pelvis_weight) {
            self.pelvis_offset = 0.0;
            self.pelvis_spring.reset();
            return;
        }

        // Only the lower foot pulls the pelvis down; it never rises.
        let target = self
            .left
            .offset_target_location
            .y
            .min(self.right.offset_target_location.y)
            .min(0.0);

        self.pelvis_offset = if input.pending_update {
            self.pelvis_spring.reset();
            target
        } else {
            spring_damp(
                self.pelvis_offset,
                target,
                &mut self.pelvis_spring,
                input.dt,
                settings.pelvis_spring,
            )
        };
    }
}

#[allow(clippy::too_many_arguments)]
fn refresh_foot(
    foot: &mut FootState,
    input: &FeetInput<'_>,
    settings: &FeetSettings,
    handles: &FootHandles,
    skeleton: &impl SkeletonPose,
    world: &impl WorldQuery,
    component: &Transform,
    scale: f32,
) -> Option<FootOutput> {
    foot.ik_amount = clamp01(skeleton.curve_value(handles.ik_curve));
    foot.target = skeleton.bone_world_transform(handles.bone)?;

    process_teleport(foot, input, component);
    process_base_change(foot, input, component);

    let mut final_pose = foot.target;
    refresh_lock(foot, input, settings, skeleton, handles, component, &mut final_pose);
    refresh_offset(foot, input, settings, world, component, scale, &mut final_pose);

    Some(FootOutput {
        ik_amount: foot.ik_amount,
        lock_amount: foot.lock_amount,
        transform: component.relative(&final_pose),
    })
}

/// Keep the lock where it was relative to the body after a teleport.
fn process_teleport(foot: &mut FootState, input: &FeetInput<'_>, component: &Transform) {
    if input.pending_update
        || !input.recently_teleported
        || !is_relevant(foot.ik_amount * foot.lock_amount)
    {
        return;
    }

    foot.lock = component.compose(&foot.lock_component_relative);

    let base = input.movement_base;
    if base.has_relative_location {
        foot.lock_base_relative = base.transform.relative(&foot.lock);
    }
}

fn process_base_change(foot: &mut FootState, input: &FeetInput<'_>, component: &Transform) {
    let base = input.movement_base;
    if (!input.pending_update && !base.changed) || !is_relevant(foot.ik_amount * foot.lock_amount)
    {
        return;
    }

    if input.pending_update {
        foot.lock = foot.target;
    }

    foot.lock_component_relative = component.relative(&foot.lock);
    foot.lock_base_relative = if base.has_relative_location {
        base.transform.relative(&foot.lock)
    } else {
        Transform::identity()
    };
}

fn refresh_lock(
    foot: &mut FootState,
    input: &FeetInput<'_>,
    settings: &FeetSettings,
    skeleton: &impl SkeletonPose,
    handles: &FootHandles,
    component: &Transform,
    final_pose: &mut Transform,
) {
    let mut new_amount = clamp01(skeleton.curve_value(handles.lock_curve));

    // Curves do not always reach zero quickly enough; force the decrease.
    let grounded = input.locomotion_mode == Some(LocomotionMode::Grounded);
    if input.moving || !grounded {
        let rate = if input.moving {
            settings.lock_decrease_rate_moving
        } else {
            settings.lock_decrease_rate_in_air
        };
        new_amount = if input.pending_update {
            0.0
        } else {
            new_amount.min(foot.lock_amount - input.dt * rate).max(0.0)
        };
    }

    if settings.disable_foot_lock || !is_relevant(foot.ik_amount * new_amount) {
        if foot.lock_amount > 0.0 {
            foot.clear_lock();
        }
        return;
    }

    let base = input.movement_base;
    let full = new_amount >= 1.0 - RELEVANT_WEIGHT;

    if full {
        if new_amount > foot.lock_amount {
            // A lock that was nearly full keeps its pose; capturing again would pop the foot.
            if foot.lock_amount <= 0.9 {
                foot.lock = *final_pose;
            }
            if base.has_relative_location {
                foot.lock_base_relative = base.transform.relative(&foot.lock);
            }
        }
        foot.lock_amount = 1.0;
    } else if new_amount <= foot.lock_amount {
        foot.lock_amount = new_amount;
    }

    if base.has_relative_location {
        foot.lock = base.transform.compose(&foot.lock_base_relative);
    }
    foot.lock_component_relative = component.relative(&foot.lock);

    *final_pose = final_pose.blend(&foot.lock, foot.lock_amount);
}

fn refresh_offset(
    foot: &mut FootState,
    input: &FeetInput<'_>,
    settings: &FeetSettings,
    world: &impl WorldQuery,
    component: &Transform,
    scale: f32,
    final_pose: &mut Transform,
) {
    if !is_relevant(foot.ik_amount) {
        foot.clear_offset_target();
        foot.offset_location = Vec3::zeros();
        foot.offset_rotation = Quat::identity();
        return;
    }

    let airborne = matches!(
        input.locomotion_mode,
        Some(LocomotionMode::InAir) | Some(LocomotionMode::Ragdolling)
    );
    if airborne {
        foot.clear_offset_target();
        if input.pending_update {
            foot.offset_location = Vec3::zeros();
            foot.offset_rotation = Quat::identity();
        } else {
            let speed = settings.in_air_offset_interpolation_speed;
            foot.offset_location =
                interp_to_vec3(foot.offset_location, Vec3::zeros(), input.dt, speed);
            foot.offset_rotation =
                interp_to_quat(&foot.offset_rotation, &Quat::identity(), input.dt, speed);
        }
    } else {
        let trace_location = Vec3::new(
            final_pose.translation.x,
            component.translation.y,
            final_pose.translation.z,
        );
        let start = trace_location + Vec3::y() * (settings.ik_trace_distance_upward * scale);
        let end = trace_location - Vec3::y() * (settings.ik_trace_distance_downward * scale);

        let ground = world
            .raycast(start, end, settings.trace_object_types)
            .filter(|hit| hit.is_valid_blocking() && hit.normal.y >= input.walkable_floor_y);

        match ground {
            Some(hit) => {
                let foot_height = settings.foot_height * scale;
                foot.offset_target_location = hit.point - trace_location
                    + hit.normal * foot_height
                    - Vec3::y() * foot_height;
                foot.offset_target_rotation = Quat::rotation_between(&Vec3::y(), &hit.normal)
                    .unwrap_or_else(Quat::identity);
            }
            None => {
                foot.offset_target_location = Vec3::zeros();
                foot.offset_target_rotation = Quat::identity();
            }
        }

        if input.pending_update {
            foot.offset_spring.reset();
            foot.offset_location = foot.offset_target_location;
            foot.offset_rotation = foot.offset_target_rotation;
        } else {
            foot.offset_location = spring_damp(
                foot.offset_location,
                foot.offset_target_location,
                &mut foot.offset_spring,
                input.dt,
                settings.offset_spring,
            );
            foot.offset_rotation = interp_to_quat(
                &foot.offset_rotation,
                &foot.offset_target_rotation,
                input.dt,
                settings.offset_rotation_interpolation_speed,
            );
        }
    }

    final_pose.translation += foot.offset_location;
    final_pose.rotation = foot.offset_rotation * final_pose.rotation;
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::rig::{BoneId, CurveId};
    use crate::world::{Hit, MovementBase, ObjectTypes, PrimitiveId, PrimitiveInfo, QueryShape};

    const DT: f32 = 1.0 / 60.0;
    const LEFT: FootHandles = FootHandles {
        bone: BoneId(1),
        ik_curve: CurveId(1),
        lock_curve: CurveId(2),
    };
    const RIGHT: FootHandles = FootHandles {
        bone: BoneId(2),
        ik_curve: CurveId(3),
        lock_curve: CurveId(4),
    };

    #[derive(Default)]
    struct Skeleton {
        component: Transform,
        bones: HashMap<BoneId, Transform>,
        curves: HashMap<CurveId, f32>,
    }

    impl Skeleton {
        fn standing() -> Self {
            let mut skeleton = Self::default();
            skeleton.set_feet(Vec3::new(-0.15, 0.1, 0.0), Vec3::new(0.15, 0.1, 0.0));
            for curve in [LEFT.ik_curve, RIGHT.ik_curve] {
                skeleton.curves.insert(curve, 1.0);
            }
            skeleton
        }

        fn set_feet(&mut self, left: Vec3, right: Vec3) {
            self.bones.insert(LEFT.bone, Transform::from_translation(left));
            self.bones.insert(RIGHT.bone, Transform::from_translation(right));
        }

        fn set_lock(&mut self, amount: f32) {
            self.curves.insert(LEFT.lock_curve, amount);
            self.curves.insert(RIGHT.lock_curve, amount);
        }
    }

    impl SkeletonPose for Skeleton {
        fn resolve_bone(&self, _name: &str) -> Option<BoneId> {
            None
        }
        fn resolve_curve(&self, _name: &str) -> Option<CurveId> {
            None
        }
        fn component_transform(&self) -> Transform {
            self.component
        }
        fn bone_world_transform(&self, bone: BoneId) -> Option<Transform> {
            self.bones
                .get(&bone)
                .map(|local| self.component.compose(local))
        }
        fn curve_value(&self, curve: CurveId) -> f32 {
            self.curves.get(&curve).copied().unwrap_or(0.0)
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

    /// Ground whose height depends on the side (x < 0 is the left foot).
    struct Ground {
        left_height: f32,
        right_height: f32,
        normal: Vec3,
    }

    impl Ground {
        fn flat(height: f32) -> Self {
            Self {
                left_height: height,
                right_height: height,
                normal: Vec3::y(),
            }
        }
    }

    impl WorldQuery for Ground {
        fn raycast(&self, start: Vec3, end: Vec3, _channel: ObjectTypes) -> Option<Hit> {
            let height = if start.x < 0.0 {
                self.left_height
            } else {
                self.right_height
            };
            if height > start.y || height < end.y {
                return None;
            }
            let time = (start.y - height) / (start.y - end.y);
            let point = Vec3::new(start.x, height, start.z);
            Some(Hit {
                point,
                normal: self.normal,
                location: point,
                time,
                blocking: true,
                start_penetrating: false,
                primitive: Some(PrimitiveId(1)),
            })
        }
        fn sweep(&self, _: QueryShape, _: Vec3, _: Vec3, _: ObjectTypes) -> Option<Hit> {
            None
        }
        fn overlap(&self, _: QueryShape, _: Vec3, _: ObjectTypes) -> bool {
            false
        }
        fn primitive(&self, _id: PrimitiveId) -> Option<PrimitiveInfo> {
            None
        }
    }

    fn input(base: &MovementBaseState) -> FeetInput<'_> {
        FeetInput {
            dt: DT,
            pending_update: false,
            recently_teleported: false,
            moving: false,
            locomotion_mode: Some(LocomotionMode::Grounded),
            movement_base: base,
            walkable_floor_y: crate::constants::WALKABLE_FLOOR_Y,
        }
    }

    #[test]
    fn lock_amount_only_drops_or_jumps_to_one() {
        let settings = FeetSettings::default();
        let base = MovementBaseState::default();
        let ground = Ground::flat(0.0);
        let mut skeleton = Skeleton::standing();
        let mut feet = FeetIk::new();

        let mut previous = 0.0;
        for curve in [0.0, 0.5, 1.0, 0.7, 0.9, 0.95, 1.0, 0.3, 0.6, 0.2] {
            skeleton.set_lock(curve);
            let out = feet
                .refresh(&input(&base), &settings, &LEFT, &RIGHT, &skeleton, &ground)
                .expect("bones exist");
            let amount = out.left.lock_amount;
            assert!(
                amount <= previous || amount == 1.0,
                "lock rose from {previous} to {amount}"
            );
            previous = amount;
        }
    }

    #[test]
    fn locked_foot_stays_put_while_the_animation_moves_it() {
        let settings = FeetSettings::default();
        let base = MovementBaseState::default();
        let ground = Ground::flat(0.0);
        let mut skeleton = Skeleton::standing();
        let mut feet = FeetIk::new();

        skeleton.set_lock(1.0);
        feet.refresh(&input(&base), &settings, &LEFT, &RIGHT, &skeleton, &ground)
            .expect("bones exist");

        skeleton.set_feet(Vec3::new(-0.15, 0.1, -0.4), Vec3::new(0.15, 0.1, -0.4));
        let out = feet
            .refresh(&input(&base), &settings, &LEFT, &RIGHT, &skeleton, &ground)
            .expect("bones exist");

        assert!((out.left.transform.translation.z).abs() < 1.0e-4);
        assert!((out.right.transform.translation.z).abs() < 1.0e-4);
    }

    #[test]
    fn moving_forces_the_lock_down_even_when_the_curve_holds() {
        let settings = FeetSettings::default();
        let base = MovementBaseState::default();
        let ground = Ground::flat(0.0);
        let mut skeleton = Skeleton::standing();
        let mut feet = FeetIk::new();

        skeleton.set_lock(1.0);
        feet.refresh(&input(&base), &settings, &LEFT, &RIGHT, &skeleton, &ground)
            .expect("bones exist");

        let mut moving = input(&base);
        moving.moving = true;
        let out = feet
            .refresh(&moving, &settings, &LEFT, &RIGHT, &skeleton, &ground)
            .expect("bones exist");

        let expected = 1.0 - DT * settings.lock_decrease_rate_moving;
        assert!((out.left.lock_amount - expected).abs() < 1.0e-5);
    }

    #[test]
    fn lower_foot_pulls_the_pelvis_down() {
        let settings = FeetSettings::default();
        let base = MovementBaseState::default();
        let ground = Ground {
            left_height: 0.1,
            right_height: -0.2,
            normal: Vec3::y(),
        };
        let skeleton = Skeleton::standing();
        let mut feet = FeetIk::new();

        let mut first = input(&base);
        first.pending_update = true;
        let out = feet
            .refresh(&first, &settings, &LEFT, &RIGHT, &skeleton, &ground)
            .expect("bones exist");

        assert!((feet.left.offset_location.y - 0.1).abs() < 1.0e-5);
        assert!((feet.right.offset_location.y + 0.2).abs() < 1.0e-5);
        assert!((out.pelvis_offset + 0.2).abs() < 1.0e-5);
        assert!((out.pelvis_weight - 1.0).abs() < 1.0e-6);
    }

    #[test]
    fn pelvis_never_rises_above_flat_ground() {
        let settings = FeetSettings::default();
        let base = MovementBaseState::default();
        let ground = Ground::flat(0.2);
        let skeleton = Skeleton::standing();
        let mut feet = FeetIk::new();

        let out = feet
            .refresh(&input(&base), &settings, &LEFT, &RIGHT, &skeleton, &ground)
            .expect("bones exist");
        assert_eq!(out.pelvis_offset, 0.0);
    }

    #[test]
    fn steep_ground_is_not_conformed_to() {
        let settings = FeetSettings::default();
        let base = MovementBaseState::default();
        let ground = Ground {
            left_height: 0.1,
            right_height: 0.1,
            normal: Vec3::new(0.8, 0.6, 0.0),
        };
        let skeleton = Skeleton::standing();
        let mut feet = FeetIk::new();

        feet.refresh(&input(&base), &settings, &LEFT, &RIGHT, &skeleton, &ground)
            .expect("bones exist");
        assert_eq!(feet.left.offset_target_location, Vec3::zeros());
        assert_eq!(feet.left.offset_target_rotation, Quat::identity());
    }

    #[test]
    fn airborne_offsets_decay_toward_zero() {
        let settings = FeetSettings::default();
        let base = MovementBaseState::default();
        let ground = Ground::flat(0.1);
        let skeleton = Skeleton::standing();
        let mut feet = FeetIk::new();

        feet.refresh(&input(&base), &settings, &LEFT, &RIGHT, &skeleton, &ground)
            .expect("bones exist");
        let grounded_offset = feet.left.offset_location.y;
        assert!(grounded_offset > 0.05);

        let mut in_air = input(&base);
        in_air.locomotion_mode = Some(LocomotionMode::InAir);
        feet.refresh(&in_air, &settings, &LEFT, &RIGHT, &skeleton, &ground)
            .expect("bones exist");

        assert!(feet.left.offset_location.y < grounded_offset);
        assert!(feet.left.offset_location.y > 0.0);
        assert_eq!(feet.left.offset_target_location, Vec3::zeros());
    }

    #[test]
    fn teleport_carries_the_lock_with_the_body() {
        let settings = FeetSettings::default();
        let base = MovementBaseState::default();
        let ground = Ground::flat(0.0);
        let mut skeleton = Skeleton::standing();
        let mut feet = FeetIk::new();

        skeleton.set_lock(1.0);
        feet.refresh(&input(&base), &settings, &LEFT, &RIGHT, &skeleton, &ground)
            .expect("bones exist");

        skeleton.component = Transform::from_translation(Vec3::new(-20.0, 0.0, 5.0));
        let mut teleported = input(&base);
        teleported.recently_teleported = true;
        let out = feet
            .refresh(&teleported, &settings, &LEFT, &RIGHT, &skeleton, &ground)
            .expect("bones exist");

        assert!((out.left.transform.translation - Vec3::new(-0.15, 0.1, 0.0)).norm() < 1.0e-4);
        assert!((feet.left.lock.translation.x + 20.15).abs() < 1.0e-4);
    }

    #[test]
    fn lock_follows_a_moving_base() {
        let settings = FeetSettings::default();
        let ground = Ground::flat(0.0);
        let mut skeleton = Skeleton::standing();
        let mut feet = FeetIk::new();
        let mut base = MovementBaseState {
            base: Some(MovementBase {
                primitive: PrimitiveId(3),
                bone: None,
            }),
            has_relative_location: true,
            has_relative_rotation: true,
            ..MovementBaseState::default()
        };

        skeleton.set_lock(1.0);
        feet.refresh(&input(&base), &settings, &LEFT, &RIGHT, &skeleton, &ground)
            .expect("bones exist");

        // Platform and body both move 1 m along +X.
        base.transform = Transform::from_translation(Vec3::new(1.0, 0.0, 0.0));
        skeleton.component = Transform::from_translation(Vec3::new(1.0, 0.0, 0.0));
        let out = feet
            .refresh(&input(&base), &settings, &LEFT, &RIGHT, &skeleton, &ground)
            .expect("bones exist");

        assert!((feet.left.lock.translation.x - 0.85).abs() < 1.0e-4);
        assert!((out.left.transform.translation.x + 0.15).abs() < 1.0e-4);
    }

    #[test]
    fn missing_ik_weight_disables_lock_and_offset() {
        let settings = FeetSettings::default();
        let base = MovementBaseState::default();
        let ground = Ground::flat(0.1);
        let mut skeleton = Skeleton::standing();
        skeleton.curves.insert(LEFT.ik_curve, 0.0);
        skeleton.set_lock(1.0);
        let mut feet = FeetIk::new();

        let out = feet
            .refresh(&input(&base), &settings, &LEFT, &RIGHT, &skeleton, &ground)
            .expect("bones exist");
        assert_eq!(out.left.lock_amount, 0.0);
        assert_eq!(feet.left.offset_location, Vec3::zeros());
        assert!((out.pelvis_weight - 0.5).abs() < 1.0e-6);
    }
}
