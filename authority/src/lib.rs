//! Authority side of character replication.
//!
//! Responsibilities
//! - Hold the authority copy of every character together with its owning peer.
//! - Gate client traffic: only requests, and only from the owner.
//! - Tick the shared query world and all characters, and address every confirmed
//!   value and action event to the connected peers.
//!
//! Transport is left to the caller: envelopes go out as plain values and inbound
//! messages arrive through [`Hub::receive`].

mod error;
mod hub;

pub use error::NetError;
pub use hub::{CharacterId, Envelope, Hub, PeerId};
