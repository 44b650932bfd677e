pub mod angle;
pub mod character;
pub mod constants;
pub mod curve;
pub mod damping;
pub mod error;
pub mod feet;
pub mod mantling;
pub mod net;
pub mod ragdoll;
pub mod rig;
pub mod rolling;
pub mod rotation;
pub mod schedule;
pub mod settings;
pub mod state;
pub mod types;
pub mod world;

pub use character::{Character, CharacterTask, HostContext};
pub use constants::{MAX_FLOOR_DIST, MAX_TICK_DT_S, MIN_FLOOR_DIST, SMALL_NUMBER, WALKABLE_FLOOR_Y};
pub use error::{ConfigError, RigError};
pub use feet::{FeetIk, FeetInput, FeetOutput, FootOutput, FootState};
pub use mantling::{
    ConfiguredMantleSettings, MantlingController, MantlingParams, MantlingType,
    SelectMantleSettings,
};
pub use net::{ActionEvent, DesiredValue, NetMessage, NetRole, Replicated};
pub use ragdoll::{ConfiguredRecoveryClip, PhysicsFlags, RagdollController, SelectRecoveryClip};
pub use rig::{
    BoneId, ClipId, ClipPlayback, ClipPlayer, CurveId, PoseSnapshot, RigHandles, RigNames,
    SkeletonPose,
};
pub use rolling::{RollStart, RollingController};
pub use rotation::RotationController;
pub use schedule::{Scheduler, TaskHandle};
pub use settings::LocomotionSettings;
pub use state::{
    Gait, LocomotionAction, LocomotionMode, LocomotionState, LocomotionStateMachine,
    MovementInput, MovementMode, RotationMode, Stance, ViewMode,
};
pub use types::{CapsuleSpec, Quat, Transform, Vec3};
pub use world::{
    ColliderShapeDef, MovementBase, ObjectTypes, PrimitiveId, RapierQueryWorld, WorldPrimitiveDef,
    WorldQuery,
};
