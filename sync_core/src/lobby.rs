//! Multiplayer seat assignment.
//!
//! Mutating calls on [`PlayerSlot`] return a [`SlotChange`] listing the
//! property that changed together with every derived property whose value
//! depends on it, so a presenter can refresh exactly those.

use bitflags::bitflags;
use thiserror::Error;
use tracing::info;

use crate::binary::byte_enum;
use crate::civilization::CivDatabase;
use crate::config::LobbyConfig;
use crate::ids::ObjectId;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Player {
    pub player_id: i32,
    pub name: String,
    pub empire_id: ObjectId,
}

impl Player {
    pub const GAME_HOST_ID: i32 = 0;
    pub const UNASSIGNED_ID: i32 = -1;
    pub const COMPUTER_ID: i32 = -2;

    pub fn new(player_id: i32, name: impl Into<String>) -> Self {
        Self {
            player_id,
            name: name.into(),
            empire_id: ObjectId::INVALID,
        }
    }

    pub fn unassigned() -> Self {
        Self::new(Self::UNASSIGNED_ID, "Unassigned")
    }

    pub fn computer() -> Self {
        Self::new(Self::COMPUTER_ID, "Computer")
    }

    pub fn with_empire(mut self, empire_id: ObjectId) -> Self {
        self.empire_id = empire_id;
        self
    }

    pub fn is_human(&self) -> bool {
        self.player_id >= Self::GAME_HOST_ID
    }
}

byte_enum! {
    pub enum SlotClaim default Unassigned {
        Unassigned = 0,
        Assigned = 1,
    }
}

byte_enum! {
    pub enum SlotStatus default Open {
        Open = 0,
        Computer = 1,
        Closed = 2,
        Taken = 3,
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SlotChange: u16 {
        const SLOT_ID = 1 << 0;
        const EMPIRE_ID = 1 << 1;
        const EMPIRE_NAME = 1 << 2;
        const CLAIM = 1 << 3;
        const STATUS = 1 << 4;
        const PLAYER = 1 << 5;
        const IS_VACANT = 1 << 6;
        const IS_CLOSED = 1 << 7;
    }
}

impl Default for SlotChange {
    fn default() -> Self {
        Self::empty()
    }
}

impl SlotChange {
    /// The change itself plus the derived properties it invalidates.
    fn with_dependents(self) -> Self {
        let mut all = self;
        if self.contains(Self::CLAIM) {
            all |= Self::IS_VACANT;
        }
        if self.contains(Self::STATUS) {
            all |= Self::IS_CLOSED | Self::IS_VACANT;
        }
        all
    }
}

/// Outcome of a slot transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotTransition {
    pub changes: SlotChange,
    /// The occupant detached by the transition, with its empire binding updated.
    pub released: Option<Player>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSlot {
    slot_id: i32,
    empire_id: ObjectId,
    empire_name: String,
    claim: SlotClaim,
    status: SlotStatus,
    player: Option<Player>,
}

impl PlayerSlot {
    pub fn new(slot_id: i32, empire_id: ObjectId, empire_name: impl Into<String>) -> Self {
        Self {
            slot_id,
            empire_id,
            empire_name: empire_name.into(),
            claim: SlotClaim::Unassigned,
            status: SlotStatus::Open,
            player: None,
        }
    }

    pub fn slot_id(&self) -> i32 {
        self.slot_id
    }

    pub fn empire_id(&self) -> ObjectId {
        self.empire_id
    }

    pub fn empire_name(&self) -> &str {
        &self.empire_name
    }

    pub fn claim(&self) -> SlotClaim {
        self.claim
    }

    pub fn status(&self) -> SlotStatus {
        self.status
    }

    pub fn player(&self) -> Option<&Player> {
        self.player.as_ref()
    }

    pub fn is_vacant(&self) -> bool {
        self.claim == SlotClaim::Unassigned
            && matches!(self.status, SlotStatus::Open | SlotStatus::Computer)
    }

    pub fn is_closed(&self) -> bool {
        self.status == SlotStatus::Closed
    }

    /// Hook for locking seats once a match is under way. Slots are never
    /// frozen at the moment.
    pub fn is_frozen(&self) -> bool {
        false
    }

    pub fn set_slot_id(&mut self, slot_id: i32) -> SlotChange {
        if self.slot_id == slot_id {
            return SlotChange::empty();
        }
        self.slot_id = slot_id;
        SlotChange::SLOT_ID
    }

    pub fn set_empire(
        &mut self,
        empire_id: ObjectId,
        empire_name: impl Into<String>,
    ) -> SlotChange {
        let empire_name = empire_name.into();
        let mut changes = SlotChange::empty();
        if self.empire_id != empire_id {
            self.empire_id = empire_id;
            changes |= SlotChange::EMPIRE_ID;
        }
        if self.empire_name != empire_name {
            self.empire_name = empire_name;
            changes |= SlotChange::EMPIRE_NAME;
        }
        changes
    }

    pub fn set_claim(&mut self, claim: SlotClaim) -> SlotChange {
        if self.claim == claim {
            return SlotChange::empty();
        }
        self.claim = claim;
        SlotChange::CLAIM.with_dependents()
    }

    pub fn set_status(&mut self, status: SlotStatus) -> SlotChange {
        if self.status == status {
            return SlotChange::empty();
        }
        self.status = status;
        SlotChange::STATUS.with_dependents()
    }

    fn set_player(&mut self, player: Option<Player>) -> (SlotChange, Option<Player>) {
        if self.player == player {
            return (SlotChange::empty(), None);
        }
        let previous = std::mem::replace(&mut self.player, player);
        (SlotChange::PLAYER, previous)
    }

    /// Open the slot again. The occupant keeps its empire binding unless it
    /// points at this slot's empire.
    pub fn clear(&mut self) -> SlotTransition {
        let mut changes = self.set_status(SlotStatus::Open) | self.set_claim(SlotClaim::Unassigned);
        let (player_change, released) = self.set_player(None);
        changes |= player_change;
        let released = released.map(|mut player| {
            if player.empire_id == self.empire_id {
                player.empire_id = ObjectId::INVALID;
            }
            player
        });
        SlotTransition { changes, released }
    }

    /// Lock the slot. The occupant always loses its empire binding.
    pub fn close(&mut self) -> SlotTransition {
        let mut changes =
            self.set_status(SlotStatus::Closed) | self.set_claim(SlotClaim::Unassigned);
        let (player_change, released) = self.set_player(None);
        changes |= player_change;
        let released = released.map(|mut player| {
            player.empire_id = ObjectId::INVALID;
            player
        });
        SlotTransition { changes, released }
    }

    /// Closing delegates to [`close`](Self::close). Opening a closed slot
    /// delegates to [`clear`](Self::clear) unless the slot is frozen.
    pub fn set_closed(&mut self, closed: bool) -> SlotTransition {
        if closed {
            return self.close();
        }
        if self.is_frozen() || !self.is_closed() {
            return SlotTransition::default();
        }
        self.clear()
    }

    /// Seat `player`, binding it to this slot's empire.
    pub fn assign(&mut self, mut player: Player) -> SlotTransition {
        player.empire_id = self.empire_id;
        let mut changes = self.set_claim(SlotClaim::Assigned) | self.set_status(SlotStatus::Taken);
        let (player_change, released) = self.set_player(Some(player));
        changes |= player_change;
        let released = released.map(|mut previous| {
            previous.empire_id = ObjectId::INVALID;
            previous
        });
        SlotTransition { changes, released }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LobbyError {
    #[error("{count} empires exceed the {max} available slots")]
    TooManyEmpires { count: usize, max: usize },
    #[error("no slot with id {0}")]
    UnknownSlot(i32),
    #[error("no slot for empire {0}")]
    UnknownEmpire(ObjectId),
    #[error("slot {0} is closed")]
    SlotClosed(i32),
    #[error("slot {slot_id} is held by player {player_id}")]
    SlotTaken { slot_id: i32, player_id: i32 },
}

/// Every seat of a match, one per playable empire in id order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lobby {
    slots: Vec<PlayerSlot>,
}

impl Lobby {
    pub fn new(civilizations: &CivDatabase, config: &LobbyConfig) -> Result<Self, LobbyError> {
        let count = civilizations.empires().count();
        let max = config.max_slots();
        if count > max {
            return Err(LobbyError::TooManyEmpires { count, max });
        }
        let slots = civilizations
            .empires()
            .enumerate()
            .map(|(index, civ)| {
                let mut slot = PlayerSlot::new(index as i32, civ.civ_id, civ.short_name.clone());
                if config.computer_fills_vacant {
                    slot.set_status(SlotStatus::Computer);
                }
                slot
            })
            .collect();
        Ok(Self { slots })
    }

    pub fn slots(&self) -> &[PlayerSlot] {
        &self.slots
    }

    pub fn slot(&self, slot_id: i32) -> Option<&PlayerSlot> {
        self.slots.iter().find(|slot| slot.slot_id == slot_id)
    }

    fn slot_mut(&mut self, slot_id: i32) -> Result<&mut PlayerSlot, LobbyError> {
        self.slots
            .iter_mut()
            .find(|slot| slot.slot_id == slot_id)
            .ok_or(LobbyError::UnknownSlot(slot_id))
    }

    pub fn slot_for_empire(&self, empire_id: ObjectId) -> Option<&PlayerSlot> {
        self.slots.iter().find(|slot| slot.empire_id == empire_id)
    }

    pub fn vacant_slots(&self) -> impl Iterator<Item = &PlayerSlot> {
        self.slots.iter().filter(|slot| slot.is_vacant())
    }

    /// Seat `player` in the slot for `empire_id`, vacating any slot the
    /// player held before.
    ///
    /// Returns one `(slot_id, transition)` per slot that changed: vacated
    /// slots first, in slot order, then the target slot.
    pub fn assign_player(
        &mut self,
        empire_id: ObjectId,
        player: Player,
    ) -> Result<Vec<(i32, SlotTransition)>, LobbyError> {
        let index = self
            .slots
            .iter()
            .position(|slot| slot.empire_id == empire_id)
            .ok_or(LobbyError::UnknownEmpire(empire_id))?;
        let target = &self.slots[index];
        if target.is_closed() {
            return Err(LobbyError::SlotClosed(target.slot_id));
        }
        if let Some(occupant) = target.player.as_ref().filter(|occupant| occupant.is_human()) {
            if occupant.player_id != player.player_id {
                return Err(LobbyError::SlotTaken {
                    slot_id: target.slot_id,
                    player_id: occupant.player_id,
                });
            }
        }

        let mut transitions = Vec::new();
        if player.is_human() {
            for (other, slot) in self.slots.iter_mut().enumerate() {
                let seated_here = slot
                    .player
                    .as_ref()
                    .is_some_and(|occupant| occupant.player_id == player.player_id);
                if other != index && seated_here {
                    info!(
                        target: "empire_sync::lobby",
                        slot_id = slot.slot_id,
                        player_id = player.player_id,
                        "slot.vacated"
                    );
                    transitions.push((slot.slot_id, slot.clear()));
                }
            }
        }

        let slot = &mut self.slots[index];
        info!(
            target: "empire_sync::lobby",
            slot_id = slot.slot_id,
            empire_id = %empire_id,
            player_id = player.player_id,
            "slot.assigned"
        );
        transitions.push((slot.slot_id, slot.assign(player)));
        Ok(transitions)
    }

    pub fn close_slot(&mut self, slot_id: i32) -> Result<SlotTransition, LobbyError> {
        let transition = self.slot_mut(slot_id)?.close();
        info!(target: "empire_sync::lobby", slot_id, "slot.closed");
        Ok(transition)
    }

    pub fn clear_slot(&mut self, slot_id: i32) -> Result<SlotTransition, LobbyError> {
        let transition = self.slot_mut(slot_id)?.clear();
        info!(target: "empire_sync::lobby", slot_id, "slot.cleared");
        Ok(transition)
    }
}
