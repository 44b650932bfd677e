//! Rapier-based query world built from primitive definitions.
//!
//! Design goals
//! - Deterministic: given the same inputs (sorted by `id`), build identical in-memory sets.
//! - Query-focused: ray casts, shape sweeps and overlaps through a borrowed `QueryPipeline`.
//! - Kinematic primitives (moving platforms) are advanced explicitly with [`RapierQueryWorld::advance`];
//!   nothing is simulated.

use log::warn;
use rapier3d::parry::query::{self, Ray, ShapeCastOptions, ShapeCastStatus};
use rapier3d::parry::shape::{Ball, Capsule, Shape};
// Rapier exposes a much faster HashMap than std for small integer keys.
use rapier3d::parry::utils::hashmap::HashMap;
use rapier3d::prelude::*;

use super::channels::{FlagBitmask, ObjectTypes};
use super::defs::{PrimitiveMotion, WorldPrimitiveDef, collider_from_def};
use super::{Hit, PrimitiveId, PrimitiveInfo, QueryShape, WorldQuery};
use crate::angle;
use crate::types::{Transform, Vec3};

/// Contact search distance used to recover the impact point of a sweep (meters).
const CONTACT_PREDICTION: f32 = 1.0e-2;

#[derive(Clone, Copy, Debug)]
struct PrimitiveEntry {
    handle: ColliderHandle,
    pose: Isometry<f32>,
    motion: PrimitiveMotion,
    can_step_up: bool,
}

/// In-memory Rapier structures needed for scene queries against the world.
///
/// Colliders are parentless: `bodies` stays empty and only exists because the
/// query pipeline borrows it.
pub struct RapierQueryWorld {
    pub bodies: RigidBodySet,
    pub colliders: ColliderSet,
    pub broad_phase: BroadPhaseBvh,
    pub narrow_phase: NarrowPhase,
    primitives: HashMap<PrimitiveId, PrimitiveEntry>,
}

impl RapierQueryWorld {
    /// Build a query world from a list of primitive definitions.
    ///
    /// Determinism
    /// - The input is sorted by `id` before insertion.
    /// - Definitions with non-finite poses are skipped with a warning.
    pub fn build(mut defs: Vec<WorldPrimitiveDef>) -> Self {
        defs.sort_by_key(|d| d.id);

        let bodies = RigidBodySet::new();
        let mut colliders = ColliderSet::new();
        let mut primitives = HashMap::default();
        let mut modified_colliders = Vec::with_capacity(defs.len());

        for def in defs {
            let pose = def.pose();
            if !Transform::from_iso(&pose).is_finite() {
                warn!("Skipping world primitive {} with a non-finite pose", def.id);
                continue;
            }

            let mut collider = collider_from_def(&def);
            // Low 32 bits: primitive id. Next 32 bits: object-type mask.
            collider.user_data = (def.id as u128) | ((def.object_type.mask() as u128) << 32);
            let handle = colliders.insert(collider);
            modified_colliders.push(handle);

            primitives.insert(
                PrimitiveId(def.id),
                PrimitiveEntry {
                    handle,
                    pose,
                    motion: def.motion,
                    can_step_up: def.can_step_up,
                },
            );
        }

        let mut world = Self {
            bodies,
            colliders,
            broad_phase: BroadPhaseBvh::new(),
            narrow_phase: NarrowPhase::default(),
            primitives,
        };
        world.refresh_broad_phase(&modified_colliders);
        world
    }

    /// Move kinematic primitives forward by `dt` seconds.
    pub fn advance(&mut self, dt: f32) {
        let dt = dt.max(0.0);
        let mut modified = Vec::new();

        for entry in self.primitives.values_mut() {
            let PrimitiveMotion::Kinematic {
                linear_velocity,
                yaw_rate,
            } = entry.motion
            else {
                continue;
            };

            entry.pose.translation.vector += linear_velocity * dt;
            entry.pose.rotation = angle::yaw_rotation(yaw_rate * dt) * entry.pose.rotation;

            if let Some(collider) = self.colliders.get_mut(entry.handle) {
                collider.set_position(entry.pose);
                modified.push(entry.handle);
            }
        }

        if !modified.is_empty() {
            self.refresh_broad_phase(&modified);
        }
    }

    fn refresh_broad_phase(&mut self, modified_colliders: &[ColliderHandle]) {
        let mut events = Vec::new();
        self.broad_phase.update(
            &IntegrationParameters::default(),
            &self.colliders,
            &self.bodies,
            modified_colliders,
            &[],
            &mut events,
        );
    }

    /// Create a borrowed `QueryPipeline` view suitable for scene queries.
    pub fn query_pipeline<'a>(&'a self, filter: QueryFilter<'a>) -> QueryPipeline<'a> {
        self.broad_phase.as_query_pipeline(
            self.narrow_phase.query_dispatcher(),
            &self.bodies,
            &self.colliders,
            filter,
        )
    }

    fn primitive_of(&self, handle: ColliderHandle) -> Option<PrimitiveId> {
        self.colliders
            .get(handle)
            .map(|collider| PrimitiveId((collider.user_data & 0xFFFF_FFFF) as u32))
    }

    /// Impact point and surface normal of `shape` resting against `handle` at `pose`.
    fn contact_at(
        &self,
        pose: &Isometry<f32>,
        shape: &dyn Shape,
        handle: ColliderHandle,
    ) -> Option<(Vec3, Vec3)> {
        let collider = self.colliders.get(handle)?;
        let contact = query::contact(
            pose,
            shape,
            collider.position(),
            collider.shape(),
            CONTACT_PREDICTION,
        )
        .ok()??;

        // `normal2` is the outward normal of the hit collider.
        Some((contact.point2.coords, contact.normal2.into_inner()))
    }
}

/// Only colliders whose object type is part of `mask`.
fn accepts(mask: ObjectTypes) -> impl Fn(ColliderHandle, &Collider) -> bool {
    move |_, collider| mask.has_bits((collider.user_data >> 32) as u32)
}

fn query_shape(shape: QueryShape) -> Box<dyn Shape> {
    match shape {
        QueryShape::Sphere { radius } => Box::new(Ball::new(radius.max(0.0))),
        QueryShape::Capsule {
            radius,
            half_height,
        } => {
            let radius = radius.max(0.0);
            Box::new(Capsule::new_y((half_height - radius).max(0.0), radius))
        }
    }
}

impl WorldQuery for RapierQueryWorld {
    fn raycast(&self, start: Vec3, end: Vec3, channel: ObjectTypes) -> Option<Hit> {
        let direction = end - start;
        if direction.norm_squared() <= f32::EPSILON {
            return None;
        }

        let predicate = accepts(channel);
        let pipeline = self.query_pipeline(QueryFilter::default().predicate(&predicate));
        let ray = Ray::new(start.into(), direction);
        let (handle, intersection) = pipeline.cast_ray_and_get_normal(&ray, 1.0, true)?;

        let point = start + direction * intersection.time_of_impact;
        let start_penetrating = intersection.time_of_impact <= 0.0;
        Some(Hit {
            point,
            normal: intersection.normal,
            location: point,
            time: intersection.time_of_impact,
            blocking: true,
            start_penetrating,
            primitive: self.primitive_of(handle),
        })
    }

    fn sweep(
        &self,
        shape: QueryShape,
        start: Vec3,
        end: Vec3,
        object_types: ObjectTypes,
    ) -> Option<Hit> {
        let shape = query_shape(shape);
        let translation = end - start;
        let start_pose = Isometry::translation(start.x, start.y, start.z);

        let predicate = accepts(object_types);
        let pipeline = self.query_pipeline(QueryFilter::default().predicate(&predicate));

        let mut options = ShapeCastOptions::with_max_time_of_impact(1.0);
        options.stop_at_penetration = true;
        let (handle, hit) = pipeline.cast_shape(&start_pose, &translation, shape.as_ref(), options)?;

        let start_penetrating = hit.status == ShapeCastStatus::PenetratingOrWithinTargetDist
            && hit.time_of_impact <= 0.0;
        let location = start + translation * hit.time_of_impact;
        let impact_pose = Isometry::translation(location.x, location.y, location.z);

        let (point, normal) = self
            .contact_at(&impact_pose, shape.as_ref(), handle)
            .unwrap_or_else(|| (location, -translation.try_normalize(f32::EPSILON).unwrap_or_else(Vec3::y)));

        Some(Hit {
            point,
            normal,
            location,
            time: hit.time_of_impact,
            blocking: true,
            start_penetrating,
            primitive: self.primitive_of(handle),
        })
    }

    fn overlap(&self, shape: QueryShape, location: Vec3, object_types: ObjectTypes) -> bool {
        let shape = query_shape(shape);
        let pose = Isometry::translation(location.x, location.y, location.z);

        let predicate = accepts(object_types);
        let pipeline = self.query_pipeline(QueryFilter::default().predicate(&predicate));
        let overlapping = pipeline.intersect_shape(pose, shape.as_ref()).next().is_some();
        overlapping
    }

    fn primitive(&self, id: PrimitiveId) -> Option<PrimitiveInfo> {
        let entry = self.primitives.get(&id)?;
        let (linear_velocity, movable) = match entry.motion {
            PrimitiveMotion::Static => (Vec3::zeros(), false),
            PrimitiveMotion::Kinematic {
                linear_velocity, ..
            } => (linear_velocity, true),
        };

        Some(PrimitiveInfo {
            transform: Transform::from_iso(&entry.pose),
            linear_velocity,
            movable,
            can_step_up: entry.can_step_up,
        })
    }
}
