//! Authoritative-state synchronization core for the turn-based empire game.
//!
//! Hosts address "the current simulation" through a per-thread
//! [`SimulationContext`] stack, capture a [`TurnSnapshot`] per player each
//! turn, and persist sessions behind a [`SessionHeader`]. Identity and
//! ownership facts travel as compact value types ([`ObjectId`],
//! [`TurnNumber`], [`SectorClaim`]).

mod binary;
pub mod civilization;
pub mod claims;
pub mod config;
pub mod context;
pub mod diplomacy;
pub mod header;
mod ids;
mod location;
pub mod lobby;
pub mod objects;
pub mod options;
pub mod snapshot;

pub use civilization::{
    CivDatabase, Civilization, CivilizationManager, CivilizationManagerSet, SitRepEntry,
};
pub use claims::{ClaimError, SectorClaim, SectorClaimGrid, MAX_CLAIM_VALUE};
pub use config::{load_sync_config_from_env, SyncConfig, SyncConfigError};
pub use context::{with_context, ContextScope, SimulationContext};
pub use diplomacy::{
    Agreement, AgreementMatrix, ClauseType, CivilizationPairedMap, DiplomacyData, DiplomacyMatrix,
    Diplomat, DiplomatSet, ForeignPower, ForeignPowerStatus,
};
pub use header::{EmpireSlotRecord, HeaderError, SessionHeader, SessionTimestamp};
pub use ids::{ObjectId, ObjectOwnerPair, TurnNumber};
pub use location::MapLocation;
pub use lobby::{
    Lobby, LobbyError, Player, PlayerSlot, SlotChange, SlotClaim, SlotStatus, SlotTransition,
};
pub use objects::{ObjectKind, UniverseObject, UniverseObjectSet};
pub use options::GameOptions;
pub use snapshot::{SnapshotError, TurnSnapshot};
