//! Per-turn, per-player state transfer.
//!
//! A [`TurnSnapshot`] is captured from the authoritative context once per
//! turn for each player, shipped, and applied exactly once to the receiving
//! context. It carries every civilization manager and the shared matrices but
//! only the requesting player's own diplomat.

use std::sync::Arc;

use rayon::prelude::*;
use sync_proto::{
    decode_with, encode_with, payload_checksum, SerializationReader, SerializationWriter,
    StreamError,
};
use thiserror::Error;
use tracing::debug;

use crate::civilization::{CivilizationManager, CivilizationManagerSet};
use crate::claims::SectorClaimGrid;
use crate::config::SnapshotConfig;
use crate::context::SimulationContext;
use crate::diplomacy::{AgreementMatrix, DiplomacyMatrix, Diplomat, DiplomatSet};
use crate::ids::{ObjectId, TurnNumber};
use crate::lobby::Player;
use crate::objects::UniverseObjectSet;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("player {player_id} has not selected an empire")]
    PlayerWithoutEmpire { player_id: i32 },
    #[error("empire {0} has no diplomat")]
    MissingDiplomat(ObjectId),
    #[error(transparent)]
    Stream(#[from] StreamError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnSnapshot {
    turn_number: TurnNumber,
    civ_managers: Vec<CivilizationManager>,
    objects: UniverseObjectSet,
    sector_claims: SectorClaimGrid,
    agreement_matrix: AgreementMatrix,
    diplomacy_data: DiplomacyMatrix,
    diplomats: Vec<Diplomat>,
}

impl TurnSnapshot {
    pub fn create(
        context: &Arc<SimulationContext>,
        player: &Player,
    ) -> Result<Self, SnapshotError> {
        Self::create_with(context, player, &SnapshotConfig::default())
    }

    /// Capture `player`'s view of `context`.
    ///
    /// Fails before touching the context when the player has no empire.
    pub fn create_with(
        context: &Arc<SimulationContext>,
        player: &Player,
        config: &SnapshotConfig,
    ) -> Result<Self, SnapshotError> {
        let empire_id = player.empire_id;
        if !empire_id.is_valid() {
            return Err(SnapshotError::PlayerWithoutEmpire {
                player_id: player.player_id,
            });
        }

        let scope = SimulationContext::enter(context);
        let context = scope.context();

        let diplomat = context
            .diplomats()
            .get(empire_id)
            .cloned()
            .ok_or(SnapshotError::MissingDiplomat(empire_id))?;

        let mut civ_managers = context.managers().to_vec();
        if config.compact_managers() {
            civ_managers.iter_mut().for_each(CivilizationManager::compact);
        }

        let snapshot = Self {
            turn_number: context.turn_number(),
            civ_managers,
            objects: UniverseObjectSet::clone(&context.objects()),
            sector_claims: SectorClaimGrid::clone(&context.sector_claims()),
            agreement_matrix: AgreementMatrix::clone(&context.agreement_matrix()),
            diplomacy_data: DiplomacyMatrix::clone(&context.diplomacy_data()),
            diplomats: vec![diplomat],
        };
        debug!(
            target: "empire_sync::snapshot",
            context_id = context.context_id(),
            player_id = player.player_id,
            empire_id = %empire_id,
            turn = %snapshot.turn_number,
            objects = snapshot.objects.len(),
            "snapshot.created"
        );
        Ok(snapshot)
    }

    /// One snapshot per player, in `players` order.
    ///
    /// Runs on the rayon pool once there are at least
    /// [`SnapshotConfig::parallel_min_players`] players; each worker pushes the
    /// context onto its own stack.
    pub fn create_for_players(
        context: &Arc<SimulationContext>,
        players: &[Player],
        config: &SnapshotConfig,
    ) -> Result<Vec<Self>, SnapshotError> {
        if players.len() >= config.parallel_min_players().max(1) {
            players
                .par_iter()
                .map(|player| Self::create_with(context, player, config))
                .collect()
        } else {
            players
                .iter()
                .map(|player| Self::create_with(context, player, config))
                .collect()
        }
    }

    /// Install this snapshot into `context`, replacing every collection it
    /// carries.
    ///
    /// Diplomacy cells owned by the received diplomat are rebuilt from its
    /// foreign-power views, on top of the transmitted matrix, for every
    /// civilization `context` knows about.
    pub fn apply(self, context: &Arc<SimulationContext>) {
        let scope = SimulationContext::enter(context);
        let context = scope.context();

        context.set_turn_number(self.turn_number);
        context.replace_managers(self.civ_managers.into_iter().collect::<CivilizationManagerSet>());
        context.replace_objects(self.objects);
        context.replace_sector_claims(self.sector_claims);
        context.replace_agreement_matrix(self.agreement_matrix);

        let mut diplomacy = self.diplomacy_data;
        let mut diplomats = DiplomatSet::new();
        for mut diplomat in self.diplomats {
            let owner_id = diplomat.owner_id;
            for civ in context.civilizations().iter() {
                if civ.civ_id == owner_id {
                    continue;
                }
                if let Some(foreign_power) = diplomat.ensure_foreign_power(civ.civ_id) {
                    diplomacy.set(owner_id, civ.civ_id, foreign_power.diplomacy_data.clone());
                }
            }
            diplomats.insert(diplomat);
        }
        context.replace_diplomacy_data(diplomacy);
        context.replace_diplomats(diplomats);

        context.on_deserialized();
        debug!(
            target: "empire_sync::snapshot",
            context_id = context.context_id(),
            turn = %context.turn_number(),
            "snapshot.applied"
        );
    }

    pub fn write_to<W: SerializationWriter>(&self, writer: &mut W) -> Result<(), StreamError> {
        writer.write_optimized_int(i32::from(self.turn_number))?;
        writer.write_object(&self.objects)?;
        writer.write_array(&self.civ_managers)?;
        writer.write_object(&self.sector_claims)?;
        writer.write_object(&self.agreement_matrix)?;
        writer.write_object(&self.diplomacy_data)?;
        writer.write_array(&self.diplomats)
    }

    pub fn read_from<R: SerializationReader>(reader: &mut R) -> Result<Self, StreamError> {
        let turn_number = TurnNumber::from(reader.read_optimized_int()?);
        let objects = reader.read_object()?;
        let civ_managers = reader.read_array()?;
        let sector_claims = reader.read_object()?;
        let agreement_matrix = reader.read_object()?;
        let diplomacy_data = reader.read_object()?;
        let diplomats = reader.read_array()?;
        Ok(Self {
            turn_number,
            civ_managers,
            objects,
            sector_claims,
            agreement_matrix,
            diplomacy_data,
            diplomats,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, SnapshotError> {
        Ok(encode_with(|writer| self.write_to(writer))?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, SnapshotError> {
        Ok(decode_with(bytes, |reader| Self::read_from(reader))?)
    }

    pub fn checksum(&self) -> Result<u64, SnapshotError> {
        Ok(payload_checksum(&self.encode()?))
    }

    pub fn turn_number(&self) -> TurnNumber {
        self.turn_number
    }

    pub fn civ_managers(&self) -> &[CivilizationManager] {
        &self.civ_managers
    }

    pub fn objects(&self) -> &UniverseObjectSet {
        &self.objects
    }

    pub fn sector_claims(&self) -> &SectorClaimGrid {
        &self.sector_claims
    }

    pub fn agreement_matrix(&self) -> &AgreementMatrix {
        &self.agreement_matrix
    }

    pub fn diplomacy_data(&self) -> &DiplomacyMatrix {
        &self.diplomacy_data
    }

    pub fn diplomats(&self) -> &[Diplomat] {
        &self.diplomats
    }
}
