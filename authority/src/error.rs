use locomotion::RigError;
use thiserror::Error;

use crate::hub::{CharacterId, PeerId};

/// Why the hub refused a call.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NetError {
    #[error("character {0} is not registered")]
    UnknownCharacter(CharacterId),

    #[error("character {0} is already registered")]
    DuplicateCharacter(CharacterId),

    #[error("peer {peer} does not own character {character}")]
    NotOwner { peer: PeerId, character: CharacterId },

    #[error("peer {peer} sent `{message}`, which only the authority may send")]
    NotARequest { peer: PeerId, message: &'static str },

    #[error(transparent)]
    Rig(#[from] RigError),
}
