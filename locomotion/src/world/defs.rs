use rapier3d::prelude::*;
use serde::{Deserialize, Serialize};

use super::channels::ObjectType;
use crate::types::{Quat, Vec3};

/// Canonical, engine-agnostic definition of a world primitive.
///
/// Hosts map their level data to this type, then call [`super::RapierQueryWorld::build`].
///
/// Conventions
/// - Units are meters.
/// - For planes, the normal is derived from the pose: `normal = rotation * +Y`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldPrimitiveDef {
    /// Stable unique identifier used to ensure deterministic insertion order.
    pub id: u32,
    pub translation: Vec3,
    pub rotation: Quat,
    pub shape: ColliderShapeDef,
    #[serde(default = "default_object_type")]
    pub object_type: ObjectType,
    #[serde(default)]
    pub motion: PrimitiveMotion,
    #[serde(default = "default_can_step_up")]
    pub can_step_up: bool,
}

fn default_object_type() -> ObjectType {
    ObjectType::WorldStatic
}

fn default_can_step_up() -> bool {
    true
}

impl WorldPrimitiveDef {
    pub fn fixed(id: u32, translation: Vec3, shape: ColliderShapeDef) -> Self {
        Self {
            id,
            translation,
            rotation: Quat::identity(),
            shape,
            object_type: ObjectType::WorldStatic,
            motion: PrimitiveMotion::Static,
            can_step_up: true,
        }
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_motion(mut self, motion: PrimitiveMotion) -> Self {
        self.object_type = ObjectType::WorldDynamic;
        self.motion = motion;
        self
    }

    pub fn with_can_step_up(mut self, can_step_up: bool) -> Self {
        self.can_step_up = can_step_up;
        self
    }
}

/// How a primitive moves over time. Kinematic primitives are advanced by
/// [`super::RapierQueryWorld::advance`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum PrimitiveMotion {
    #[default]
    Static,
    Kinematic {
        linear_velocity: Vec3,
        /// Degrees per second around +Y.
        yaw_rate: f32,
    },
}

/// Supported collider shapes. Keep this small and deterministic.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ColliderShapeDef {
    /// Infinite plane (half-space); the normal is `rotation * +Y`.
    Plane { offset_along_normal: f32 },
    Cuboid { half_extents: Vec3 },
    Sphere { radius: f32 },
    /// Y-aligned capsule; `half_height` is the half length of the cylinder section.
    CapsuleY { radius: f32, half_height: f32 },
    CylinderY { radius: f32, half_height: f32 },
}

impl WorldPrimitiveDef {
    /// World pose of the collider. Plane offsets are folded into the translation.
    pub fn pose(&self) -> Isometry<f32> {
        let translation = match self.shape {
            ColliderShapeDef::Plane {
                offset_along_normal,
            } => self.translation + self.rotation * Vec3::new(0.0, offset_along_normal, 0.0),
            _ => self.translation,
        };
        Isometry::from_parts(translation.into(), self.rotation)
    }
}

/// Build a parentless Rapier collider placed at the definition's pose.
pub(crate) fn collider_from_def(def: &WorldPrimitiveDef) -> Collider {
    let builder = match def.shape {
        ColliderShapeDef::Plane { .. } => ColliderBuilder::halfspace(Vector::y_axis()),
        ColliderShapeDef::Cuboid { half_extents } => {
            ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
        }
        ColliderShapeDef::Sphere { radius } => ColliderBuilder::ball(radius),
        ColliderShapeDef::CapsuleY {
            radius,
            half_height,
        } => ColliderBuilder::capsule_y(half_height, radius),
        ColliderShapeDef::CylinderY {
            radius,
            half_height,
        } => ColliderBuilder::cylinder(half_height, radius),
    };
    builder.position(def.pose()).build()
}
