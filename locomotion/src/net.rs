/*!
Request/confirm replication.

The authority owns every replicated field. Owning clients predict locally and
send a request; the authority applies it and broadcasts the confirmed value with
a sequence number. Every peer accepts a confirmed value whose sequence is not
older than the one it holds, so the last write from the authority wins.

Action events (mantle, roll, ragdoll) follow the same path: a predicting client
starts the action and sends `RequestEvent`; the authority re-validates and
either broadcasts `Event` to everyone or answers the owner with `Rejected`.
Broadcasts arrive in the order the authority processed the requests, so a
broadcast matching a queued prediction also settles every older prediction.
*/

use serde::{Deserialize, Serialize};

use crate::mantling::MantlingParams;
use crate::state::{Gait, OverlayMode, RotationMode, Stance, ViewMode};
use crate::types::Vec3;

/// Network role of the local copy of a character.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetRole {
    /// Server copy (or standalone).
    #[default]
    Authority,
    /// Owning client; predicts and sends requests.
    AutonomousProxy,
    /// Non-owning client; only applies what the authority broadcasts.
    SimulatedProxy,
}

impl NetRole {
    #[inline]
    pub fn is_authority(self) -> bool {
        matches!(self, NetRole::Authority)
    }

    /// Authority or owning client.
    #[inline]
    pub fn can_initiate(self) -> bool {
        !matches!(self, NetRole::SimulatedProxy)
    }
}

/// A value owned by the authority plus the sequence of its last confirmed write.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Replicated<T> {
    value: T,
    sequence: u32,
}

impl<T: Clone + PartialEq> Replicated<T> {
    pub fn new(value: T) -> Self {
        Self { value, sequence: 0 }
    }

    #[inline]
    pub fn get(&self) -> &T {
        &self.value
    }

    #[inline]
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Local write. Returns false when the value did not change.
    ///
    /// Authority writes advance the sequence; predicted client writes keep it, so the
    /// next confirmed broadcast always overwrites them.
    pub fn set_local(&mut self, value: T, authority: bool) -> bool {
        if self.value == value {
            return false;
        }
        self.value = value;
        if authority {
            self.sequence = self.sequence.wrapping_add(1);
        }
        true
    }

    /// Apply a confirmed write. Older sequences are ignored.
    pub fn apply_confirmed(&mut self, value: T, sequence: u32) -> bool {
        if sequence < self.sequence {
            return false;
        }
        self.sequence = sequence;
        if self.value == value {
            return false;
        }
        self.value = value;
        true
    }
}

/// One replicated desired field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum DesiredValue {
    Stance(Stance),
    Gait(Gait),
    RotationMode(RotationMode),
    ViewMode(ViewMode),
    Aiming(bool),
    OverlayMode(OverlayMode),
    RagdollTargetLocation(Vec3),
}

impl DesiredValue {
    /// Discriminant name, for logs.
    pub fn field(&self) -> &'static str {
        match self {
            DesiredValue::Stance(_) => "stance",
            DesiredValue::Gait(_) => "gait",
            DesiredValue::RotationMode(_) => "rotation_mode",
            DesiredValue::ViewMode(_) => "view_mode",
            DesiredValue::Aiming(_) => "aiming",
            DesiredValue::OverlayMode(_) => "overlay_mode",
            DesiredValue::RagdollTargetLocation(_) => "ragdoll_target_location",
        }
    }
}

/// Locomotion actions started on every peer from the same parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ActionEvent {
    StartMantling(MantlingParams),
    StartRolling {
        play_rate: f32,
        start_yaw: f32,
        target_yaw: f32,
    },
    StartRagdolling,
    StopRagdolling,
}

impl ActionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ActionEvent::StartMantling(_) => "start_mantling",
            ActionEvent::StartRolling { .. } => "start_rolling",
            ActionEvent::StartRagdolling => "start_ragdolling",
            ActionEvent::StopRagdolling => "stop_ragdolling",
        }
    }
}

/// Messages exchanged between copies of one character.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum NetMessage {
    /// Owning client to authority.
    RequestDesired(DesiredValue),
    /// Authority to every peer.
    Confirmed { value: DesiredValue, sequence: u32 },
    /// Owning client to authority.
    RequestEvent(ActionEvent),
    /// Authority to every peer.
    Event(ActionEvent),
    /// Authority to the owning client: the requested event did not apply.
    Rejected(ActionEvent),
}

impl NetMessage {
    /// Variant name, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            NetMessage::RequestDesired(_) => "request_desired",
            NetMessage::Confirmed { .. } => "confirmed",
            NetMessage::RequestEvent(_) => "request_event",
            NetMessage::Event(_) => "event",
            NetMessage::Rejected(_) => "rejected",
        }
    }

    /// True for messages only an owning client may send.
    pub fn is_request(&self) -> bool {
        matches!(
            self,
            NetMessage::RequestDesired(_) | NetMessage::RequestEvent(_)
        )
    }
}
