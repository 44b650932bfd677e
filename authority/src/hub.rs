//! Authority hub: the server-side owner of every character copy.
//!
//! Responsibilities
//! - Own the authority copy of each character, keyed by id, together with the
//!   peer that owns it (if any) and the host services it ticks against.
//! - Accept client messages only when they are requests from the owning peer.
//!   The character re-validates every request on its next tick.
//! - Tick all characters with a clamped delta time and fan their outboxes out to
//!   every connected peer. Rejections go only to the owner that asked.
//!
//! Determinism
//! - Characters tick in ascending id order; envelopes come out in that order,
//!   and per character in the order the character produced them.

use std::collections::{BTreeMap, BTreeSet};

use locomotion::{
    Character, ClipPlayer, HostContext, LocomotionSettings, MAX_TICK_DT_S, MovementInput,
    NetMessage, NetRole, RapierQueryWorld, SkeletonPose, Vec3,
};

use crate::error::NetError;

pub type CharacterId = u64;
pub type PeerId = u64;

/// One message addressed to one peer.
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    pub to: PeerId,
    pub character: CharacterId,
    pub message: NetMessage,
}

struct Slot<S, C> {
    character: Character,
    owner: Option<PeerId>,
    skeleton: S,
    clips: C,
    /// Host movement result for the next tick; `None` holds the character in place.
    movement: Option<MovementInput>,
}

/// Movement result that keeps the character where it is.
fn hold(character: &Character) -> MovementInput {
    MovementInput {
        location: character.location(),
        velocity: character.velocity(),
        movement_mode: character.movement_mode(),
        view_yaw: character.state_machine().view().yaw,
        ..MovementInput::default()
    }
}

pub struct Hub<S, C> {
    world: RapierQueryWorld,
    peers: BTreeSet<PeerId>,
    slots: BTreeMap<CharacterId, Slot<S, C>>,
    time: f64,
}

impl<S: SkeletonPose, C: ClipPlayer> Hub<S, C> {
    pub fn new(world: RapierQueryWorld) -> Self {
        Self {
            world,
            peers: BTreeSet::new(),
            slots: BTreeMap::new(),
            time: 0.0,
        }
    }

    pub fn world(&self) -> &RapierQueryWorld {
        &self.world
    }

    /// Simulated seconds so far (sum of clamped tick deltas).
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn peers(&self) -> impl Iterator<Item = PeerId> + '_ {
        self.peers.iter().copied()
    }

    pub fn connect(&mut self, peer: PeerId) -> bool {
        let added = self.peers.insert(peer);
        if added {
            log::info!("peer {peer} connected");
        }
        added
    }

    /// Forget the peer. Characters it owned stay, driven by the server from now on.
    pub fn disconnect(&mut self, peer: PeerId) -> bool {
        if !self.peers.remove(&peer) {
            return false;
        }
        for (id, slot) in &mut self.slots {
            if slot.owner == Some(peer) {
                slot.owner = None;
                slot.character.set_locally_controlled(true);
                log::info!("character {id} lost its owner {peer}");
            }
        }
        log::info!("peer {peer} disconnected");
        true
    }

    /// Register the authority copy of a character.
    ///
    /// Client-owned characters are not locally controlled here: they act on the
    /// owner's requests instead of starting actions on their own.
    #[allow(clippy::too_many_arguments)]
    pub fn spawn(
        &mut self,
        id: CharacterId,
        settings: LocomotionSettings,
        owner: Option<PeerId>,
        location: Vec3,
        yaw: f32,
        skeleton: S,
        clips: C,
    ) -> Result<(), NetError> {
        if self.slots.contains_key(&id) {
            return Err(NetError::DuplicateCharacter(id));
        }

        let mut character =
            Character::from_skeleton(settings, NetRole::Authority, &skeleton, location, yaw)?;
        character.set_locally_controlled(owner.is_none());

        self.slots.insert(
            id,
            Slot {
                character,
                owner,
                skeleton,
                clips,
                movement: None,
            },
        );
        log::info!("spawned character {id} owned by {owner:?}");
        Ok(())
    }

    pub fn despawn(&mut self, id: CharacterId) -> Result<Character, NetError> {
        let slot = self.slots.remove(&id).ok_or_else(|| {
            log::warn!("despawn of missing character {id}");
            NetError::UnknownCharacter(id)
        })?;
        log::info!("despawned character {id}");
        Ok(slot.character)
    }

    pub fn character(&self, id: CharacterId) -> Option<&Character> {
        self.slots.get(&id).map(|slot| &slot.character)
    }

    pub fn owner_of(&self, id: CharacterId) -> Option<PeerId> {
        self.slots.get(&id).and_then(|slot| slot.owner)
    }

    fn slot_mut(&mut self, id: CharacterId) -> Result<&mut Slot<S, C>, NetError> {
        self.slots.get_mut(&id).ok_or_else(|| {
            log::warn!("no character {id}");
            NetError::UnknownCharacter(id)
        })
    }

    /// Host movement result to feed the character on the next tick.
    pub fn set_movement(&mut self, id: CharacterId, input: MovementInput) -> Result<(), NetError> {
        self.slot_mut(id)?.movement = Some(input);
        Ok(())
    }

    /// Queue a client message for the character's next tick.
    pub fn receive(
        &mut self,
        from: PeerId,
        id: CharacterId,
        message: NetMessage,
    ) -> Result<(), NetError> {
        if !message.is_request() {
            log::warn!("peer {from} sent {} for character {id}", message.kind());
            return Err(NetError::NotARequest {
                peer: from,
                message: message.kind(),
            });
        }

        let slot = self.slot_mut(id)?;
        if slot.owner != Some(from) {
            log::warn!(
                "peer {from} sent {} for character {id} owned by {:?}",
                message.kind(),
                slot.owner
            );
            return Err(NetError::NotOwner {
                peer: from,
                character: id,
            });
        }

        slot.character.receive(message);
        Ok(())
    }

    /// Run server-side logic against one character with its host services.
    ///
    /// Anything the character sends goes out with the next tick.
    pub fn with_character<R>(
        &mut self,
        id: CharacterId,
        f: impl FnOnce(&mut Character, &mut HostContext<'_, S, C, RapierQueryWorld>) -> R,
    ) -> Result<R, NetError> {
        let world = &self.world;
        let slot = self.slots.get_mut(&id).ok_or_else(|| {
            log::warn!("no character {id}");
            NetError::UnknownCharacter(id)
        })?;
        let mut host = HostContext::new(&mut slot.skeleton, &mut slot.clips, world);
        Ok(f(&mut slot.character, &mut host))
    }

    /// Advance the world and every character, then address their messages.
    pub fn tick(&mut self, dt: f32) -> Vec<Envelope> {
        let dt = if dt.is_finite() {
            dt.clamp(0.0, MAX_TICK_DT_S)
        } else {
            log::warn!("non-finite tick dt {dt}; skipping time");
            0.0
        };
        self.time += f64::from(dt);
        self.world.advance(dt);

        let world = &self.world;
        let mut envelopes = Vec::new();
        for (&id, slot) in &mut self.slots {
            let input = slot
                .movement
                .take()
                .unwrap_or_else(|| hold(&slot.character));
            let mut host = HostContext::new(&mut slot.skeleton, &mut slot.clips, world);
            slot.character.tick(dt, &input, &mut host);

            for message in slot.character.drain_outbox() {
                if let NetMessage::Rejected(_) = message {
                    if let Some(owner) = slot.owner.filter(|owner| self.peers.contains(owner)) {
                        envelopes.push(Envelope {
                            to: owner,
                            character: id,
                            message,
                        });
                    }
                    continue;
                }
                for &peer in &self.peers {
                    envelopes.push(Envelope {
                        to: peer,
                        character: id,
                        message: message.clone(),
                    });
                }
            }
        }
        envelopes
    }
}
