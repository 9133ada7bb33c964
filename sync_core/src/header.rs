//! Binary header at the front of a saved session.
//!
//! Layout, all integers little-endian and strings 7-bit length-prefixed:
//!
//! | field                  | encoding                      |
//! |------------------------|-------------------------------|
//! | options                | [`GameOptions`] fixed layout  |
//! | multiplayer flag       | 1 byte                        |
//! | local player name      | string                        |
//! | local player empire id | i32                           |
//! | turn number            | i32                           |
//! | timestamp ticks        | i64                           |
//! | timestamp offset ticks | i64                           |
//! | empire count           | 1 byte                        |
//! | per empire             | i32 id, string name, claim byte, status byte |
//!
//! There is no version tag; incompatible layouts must be negotiated by the
//! caller.

use std::io::{self, Read, Write};

use chrono::{DateTime, FixedOffset, Local, Offset, TimeZone, Utc};
use thiserror::Error;
use tracing::debug;

use crate::binary;
use crate::config::SavesConfig;
use crate::context::SimulationContext;
use crate::ids::{ObjectId, TurnNumber};
use crate::lobby::{Lobby, Player, SlotClaim, SlotStatus};
use crate::options::GameOptions;

pub const MAX_HEADER_EMPIRES: usize = u8::MAX as usize;

const TICKS_PER_SECOND: i64 = 10_000_000;
const NANOS_PER_TICK: i64 = 100;
/// Ticks from 0001-01-01T00:00:00 to the Unix epoch.
const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("session header i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error("{count} empires do not fit a session header (max {MAX_HEADER_EMPIRES})")]
    TooManyEmpires { count: usize },
    #[error("invalid {field} value {value}")]
    InvalidEnum { field: &'static str, value: i32 },
}

/// Wall-clock time in 100ns ticks since 0001-01-01, local to `offset_ticks`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SessionTimestamp {
    pub ticks: i64,
    pub offset_ticks: i64,
}

impl SessionTimestamp {
    pub fn now() -> Self {
        let now = Local::now();
        Self::from_datetime(now.with_timezone(&now.offset().fix()))
    }

    pub fn from_datetime(datetime: DateTime<FixedOffset>) -> Self {
        let local = Utc.from_utc_datetime(&datetime.naive_local());
        // Saturates for dates past the year 29000 or so.
        let ticks = local
            .timestamp()
            .saturating_mul(TICKS_PER_SECOND)
            .saturating_add(i64::from(local.timestamp_subsec_nanos()) / NANOS_PER_TICK)
            .saturating_add(UNIX_EPOCH_TICKS);
        let offset_ticks = i64::from(datetime.offset().local_minus_utc()) * TICKS_PER_SECOND;
        Self { ticks, offset_ticks }
    }

    /// `None` when either field is outside what chrono can represent.
    pub fn to_datetime(self) -> Option<DateTime<FixedOffset>> {
        let offset_secs = i32::try_from(self.offset_ticks / TICKS_PER_SECOND).ok()?;
        let offset = FixedOffset::east_opt(offset_secs)?;
        let since_epoch = self.ticks.checked_sub(UNIX_EPOCH_TICKS)?;
        let secs = since_epoch.div_euclid(TICKS_PER_SECOND);
        let nanos = u32::try_from(since_epoch.rem_euclid(TICKS_PER_SECOND) * NANOS_PER_TICK).ok()?;
        let local = DateTime::<Utc>::from_timestamp(secs, nanos)?.naive_utc();
        offset.from_local_datetime(&local).single()
    }
}

/// One empire's entry in the header, with its lobby seat state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmpireSlotRecord {
    pub empire_id: ObjectId,
    pub empire_name: String,
    pub claim: SlotClaim,
    pub status: SlotStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHeader {
    pub options: GameOptions,
    pub is_multiplayer: bool,
    pub local_player_name: String,
    pub local_player_empire_id: ObjectId,
    pub turn_number: TurnNumber,
    pub timestamp: SessionTimestamp,
    pub empires: Vec<EmpireSlotRecord>,
    /// Not persisted; set by whoever located the file.
    pub file_name: Option<String>,
    /// Not persisted.
    pub is_auto_save: bool,
}

impl SessionHeader {
    /// Describe `context` as seen by `local_player`, taking seat state from
    /// `lobby` where one exists.
    pub fn from_context(
        context: &SimulationContext,
        local_player: &Player,
        lobby: Option<&Lobby>,
    ) -> Self {
        let empires = context
            .civilizations()
            .empires()
            .map(|civ| {
                let slot = lobby.and_then(|lobby| lobby.slot_for_empire(civ.civ_id));
                EmpireSlotRecord {
                    empire_id: civ.civ_id,
                    empire_name: civ.short_name.clone(),
                    claim: slot.map(|slot| slot.claim()).unwrap_or_default(),
                    status: slot.map(|slot| slot.status()).unwrap_or_default(),
                }
            })
            .collect();
        Self {
            options: context.options().clone(),
            is_multiplayer: context.is_multiplayer(),
            local_player_name: local_player.name.clone(),
            local_player_empire_id: local_player.empire_id,
            turn_number: context.turn_number(),
            timestamp: SessionTimestamp::now(),
            empires,
            file_name: None,
            is_auto_save: false,
        }
    }

    pub fn title<'a>(&'a self, saves: &'a SavesConfig) -> &'a str {
        if self.is_auto_save {
            saves.autosave_title()
        } else {
            self.file_name.as_deref().unwrap_or_default()
        }
    }

    pub fn local_player_empire_name(&self) -> Option<&str> {
        self.empires
            .iter()
            .find(|empire| empire.empire_id == self.local_player_empire_id)
            .map(|empire| empire.empire_name.as_str())
    }

    pub fn empire_ids(&self) -> Vec<ObjectId> {
        self.empires.iter().map(|empire| empire.empire_id).collect()
    }

    pub fn empire_names(&self) -> Vec<&str> {
        self.empires.iter().map(|empire| empire.empire_name.as_str()).collect()
    }

    pub fn slot_claims(&self) -> Vec<SlotClaim> {
        self.empires.iter().map(|empire| empire.claim).collect()
    }

    pub fn slot_statuses(&self) -> Vec<SlotStatus> {
        self.empires.iter().map(|empire| empire.status).collect()
    }

    /// Fails with [`HeaderError::TooManyEmpires`] before writing anything.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), HeaderError> {
        let count = u8::try_from(self.empires.len()).map_err(|_| HeaderError::TooManyEmpires {
            count: self.empires.len(),
        })?;

        self.options.write_to(writer)?;
        binary::write_bool(writer, self.is_multiplayer)?;
        binary::write_string(writer, &self.local_player_name)?;
        binary::write_i32(writer, self.local_player_empire_id.value())?;
        binary::write_i32(writer, i32::from(self.turn_number))?;
        binary::write_i64(writer, self.timestamp.ticks)?;
        binary::write_i64(writer, self.timestamp.offset_ticks)?;
        binary::write_u8(writer, count)?;
        for empire in &self.empires {
            debug!(
                target: "empire_sync::header",
                empire_id = %empire.empire_id,
                empire = %empire.empire_name,
                claim = ?empire.claim,
                status = ?empire.status,
                "header.empire_written"
            );
            binary::write_i32(writer, empire.empire_id.value())?;
            binary::write_string(writer, &empire.empire_name)?;
            binary::write_u8(writer, empire.claim.into())?;
            binary::write_u8(writer, empire.status.into())?;
        }
        Ok(())
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, HeaderError> {
        let options = GameOptions::read_from(reader)?;
        let is_multiplayer = binary::read_bool(reader)?;
        let local_player_name = binary::read_string(reader)?;
        let local_player_empire_id = ObjectId::new(binary::read_i32(reader)?);
        let turn_number = TurnNumber::from(binary::read_i32(reader)?);
        let timestamp = SessionTimestamp {
            ticks: binary::read_i64(reader)?,
            offset_ticks: binary::read_i64(reader)?,
        };

        let count = usize::from(binary::read_u8(reader)?);
        let mut empires = Vec::with_capacity(count);
        for _ in 0..count {
            let empire_id = ObjectId::new(binary::read_i32(reader)?);
            let empire_name = binary::read_string(reader)?;
            let claim = binary::read_u8(reader)?;
            let status = binary::read_u8(reader)?;
            empires.push(EmpireSlotRecord {
                empire_id,
                empire_name,
                claim: SlotClaim::try_from(claim).map_err(|value| HeaderError::InvalidEnum {
                    field: "slot_claim",
                    value: i32::from(value),
                })?,
                status: SlotStatus::try_from(status).map_err(|value| HeaderError::InvalidEnum {
                    field: "slot_status",
                    value: i32::from(value),
                })?,
            });
        }

        Ok(Self {
            options,
            is_multiplayer,
            local_player_name,
            local_player_empire_id,
            turn_number,
            timestamp,
            empires,
            file_name: None,
            is_auto_save: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::civilization::{CivDatabase, Civilization};
    use crate::config::{LobbyConfig, SyncConfig};
    use std::io::Cursor;

    fn record(id: i32, name: &str, claim: SlotClaim, status: SlotStatus) -> EmpireSlotRecord {
        EmpireSlotRecord {
            empire_id: ObjectId::new(id),
            empire_name: name.to_string(),
            claim,
            status,
        }
    }

    fn header(empires: Vec<EmpireSlotRecord>) -> SessionHeader {
        SessionHeader {
            options: GameOptions::default(),
            is_multiplayer: true,
            local_player_name: "Sisko".to_string(),
            local_player_empire_id: ObjectId::new(1),
            turn_number: TurnNumber::new(42),
            timestamp: SessionTimestamp {
                ticks: 638_000_000_000_000_000,
                offset_ticks: -5 * 3_600 * TICKS_PER_SECOND,
            },
            empires,
            file_name: None,
            is_auto_save: false,
        }
    }

    fn round_trip(header: &SessionHeader) -> SessionHeader {
        let mut out = Vec::new();
        header.write_to(&mut out).unwrap();
        let mut cursor = Cursor::new(out);
        let read = SessionHeader::read_from(&mut cursor).unwrap();
        assert_eq!(cursor.position() as usize, cursor.get_ref().len());
        read
    }

    #[test]
    fn two_empires_read_back_in_order() {
        let header = header(vec![
            record(1, "Federation", SlotClaim::Assigned, SlotStatus::Taken),
            record(2, "Klingon", SlotClaim::Unassigned, SlotStatus::Open),
        ]);
        let read = round_trip(&header);
        assert_eq!(read, header);
        assert_eq!(read.empire_ids(), vec![ObjectId::new(1), ObjectId::new(2)]);
        assert_eq!(read.empire_names(), vec!["Federation", "Klingon"]);
        assert_eq!(read.slot_claims(), vec![SlotClaim::Assigned, SlotClaim::Unassigned]);
        assert_eq!(read.slot_statuses(), vec![SlotStatus::Taken, SlotStatus::Open]);
        assert_eq!(read.local_player_empire_name(), Some("Federation"));
    }

    #[test]
    fn empire_count_bounds() {
        assert!(round_trip(&header(Vec::new())).empires.is_empty());

        let full: Vec<_> = (0..255)
            .map(|i| record(i, &format!("Empire {i}"), SlotClaim::Unassigned, SlotStatus::Computer))
            .collect();
        assert_eq!(round_trip(&header(full.clone())).empires, full);

        let mut over = full;
        over.push(record(255, "One Too Many", SlotClaim::Unassigned, SlotStatus::Open));
        let mut out = Vec::new();
        let err = header(over).write_to(&mut out).unwrap_err();
        assert!(matches!(err, HeaderError::TooManyEmpires { count: 256 }));
        assert!(out.is_empty());
    }

    #[test]
    fn corrupt_slot_status_is_rejected() {
        let mut out = Vec::new();
        header(vec![record(1, "Federation", SlotClaim::Assigned, SlotStatus::Taken)])
            .write_to(&mut out)
            .unwrap();
        *out.last_mut().unwrap() = 17;
        let err = SessionHeader::read_from(&mut Cursor::new(out)).unwrap_err();
        assert!(matches!(
            err,
            HeaderError::InvalidEnum {
                field: "slot_status",
                value: 17
            }
        ));
    }

    #[test]
    fn truncated_header_is_io_error() {
        let mut out = Vec::new();
        header(Vec::new()).write_to(&mut out).unwrap();
        out.truncate(out.len() - 3);
        let err = SessionHeader::read_from(&mut Cursor::new(out)).unwrap_err();
        assert!(matches!(err, HeaderError::Io(ref e) if e.kind() == io::ErrorKind::UnexpectedEof));
    }

    #[test]
    fn title_prefers_autosave_label() {
        let config = SyncConfig::builtin();
        let mut header = header(Vec::new());
        assert_eq!(header.title(config.saves()), "");
        header.file_name = Some("Bajor campaign".to_string());
        assert_eq!(header.title(config.saves()), "Bajor campaign");
        header.is_auto_save = true;
        assert_eq!(header.title(config.saves()), "Autosave");
    }

    #[test]
    fn timestamp_converts_through_chrono() {
        let offset = FixedOffset::east_opt(2 * 3_600).unwrap();
        let moment = offset.with_ymd_and_hms(2024, 3, 9, 18, 30, 5).unwrap();
        let stamp = SessionTimestamp::from_datetime(moment);
        assert_eq!(stamp.offset_ticks, 2 * 3_600 * TICKS_PER_SECOND);
        assert_eq!(stamp.to_datetime(), Some(moment));

        let utc = FixedOffset::east_opt(0).unwrap();
        let epoch = utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(SessionTimestamp::from_datetime(epoch).ticks, UNIX_EPOCH_TICKS);
    }

    #[test]
    fn far_future_timestamp_saturates() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let far = utc.with_ymd_and_hms(200_000, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(SessionTimestamp::from_datetime(far).ticks, i64::MAX);
    }

    #[test]
    fn from_context_uses_lobby_seats() {
        let civs = CivDatabase::new([
            Civilization::new(ObjectId::new(1), "FEDERATION", "Federation"),
            Civilization::new(ObjectId::new(2), "KLINGONS", "Klingon"),
            Civilization::minor(ObjectId::new(5), "FERENGI", "Ferengi"),
        ]);
        let mut lobby = Lobby::new(&civs, &LobbyConfig::default()).unwrap();
        let context = SimulationContext::new(civs, GameOptions::default(), true);
        context.set_turn_number(TurnNumber::new(3));
        let player = Player::new(0, "Sisko");
        lobby.assign_player(ObjectId::new(1), player.clone()).unwrap();
        let seated = lobby
            .slot_for_empire(ObjectId::new(1))
            .unwrap()
            .player()
            .unwrap()
            .clone();

        let header = SessionHeader::from_context(&context, &seated, Some(&lobby));
        assert_eq!(header.turn_number, TurnNumber::new(3));
        assert_eq!(header.local_player_empire_id, ObjectId::new(1));
        assert_eq!(header.empires.len(), 2);
        assert_eq!(
            header.slot_statuses(),
            vec![SlotStatus::Taken, SlotStatus::Open]
        );

        let without_lobby = SessionHeader::from_context(&context, &player, None);
        assert_eq!(without_lobby.slot_claims(), vec![SlotClaim::Unassigned; 2]);
    }
}
