/*!
World query interface.

Controllers never talk to a physics engine directly. Ground detection, ledge
detection, free-space checks and ragdoll ground probes go through the
[`WorldQuery`] trait; [`rapier::RapierQueryWorld`] is the in-crate implementation.

- channels: object-type masks selecting what a query collides with
- defs:     serializable primitive definitions (level data)
- rapier:   Rapier-backed query world built from those definitions
*/

pub mod channels;
pub mod defs;
pub mod rapier;

pub use channels::{ObjectType, ObjectTypes};
pub use defs::{ColliderShapeDef, PrimitiveMotion, WorldPrimitiveDef};
pub use rapier::RapierQueryWorld;

use serde::{Deserialize, Serialize};

use crate::rig::BoneId;
use crate::types::{Transform, Vec3};

/// Stable identifier of a world primitive (static mesh, platform, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrimitiveId(pub u32);

/// Result of a ray cast or shape sweep.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hit {
    /// World-space contact point on the hit surface.
    pub point: Vec3,
    /// Surface normal at the contact point, pointing away from the hit primitive.
    pub normal: Vec3,
    /// Position of the cast origin (ray start or shape center) at the time of impact.
    pub location: Vec3,
    /// Fraction (0..1) of the cast where the hit occurred.
    pub time: f32,
    pub blocking: bool,
    /// The cast started inside the primitive; point and normal are not meaningful.
    pub start_penetrating: bool,
    pub primitive: Option<PrimitiveId>,
}

impl Hit {
    #[inline]
    pub fn is_valid_blocking(&self) -> bool {
        self.blocking && !self.start_penetrating
    }
}

/// Shapes usable by sweeps and overlap tests. Capsules are Y-aligned.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum QueryShape {
    Sphere { radius: f32 },
    /// `half_height` is measured from the center to the bottom of the lower cap.
    Capsule { radius: f32, half_height: f32 },
}

/// Dynamic properties of a primitive, needed to judge and follow what we stand on.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PrimitiveInfo {
    pub transform: Transform,
    pub linear_velocity: Vec3,
    /// The primitive may move; targets on it must be tracked in its local space.
    pub movable: bool,
    /// Characters may step onto this primitive.
    pub can_step_up: bool,
}

/// What the character is standing on or attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MovementBase {
    pub primitive: PrimitiveId,
    /// Bone of a skeletal base, if any.
    pub bone: Option<BoneId>,
}

pub trait WorldQuery {
    fn raycast(&self, start: Vec3, end: Vec3, channel: ObjectTypes) -> Option<Hit>;

    fn sweep(
        &self,
        shape: QueryShape,
        start: Vec3,
        end: Vec3,
        object_types: ObjectTypes,
    ) -> Option<Hit>;

    /// True when `shape` placed at `location` overlaps any blocking primitive.
    fn overlap(&self, shape: QueryShape, location: Vec3, object_types: ObjectTypes) -> bool;

    fn primitive(&self, id: PrimitiveId) -> Option<PrimitiveInfo>;

    /// World transform of a movement base. Skeletal bases resolve `bone`; others ignore it.
    fn movement_base_transform(&self, base: MovementBase) -> Option<Transform> {
        self.primitive(base.primitive).map(|info| info.transform)
    }
}
