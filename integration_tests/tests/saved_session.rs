mod common;

use std::io::Cursor;

use common::{FEDERATION, KLINGONS, ROMULANS};
use sync_core::{
    load_sync_config_from_env, HeaderError, Lobby, SessionHeader, SlotClaim, SlotStatus,
    TurnNumber, TurnSnapshot,
};

#[test]
fn header_and_snapshot_share_one_file() -> anyhow::Result<()> {
    let host = common::seeded_galaxy();
    let player = common::host_player();
    let header = SessionHeader::from_context(&host, &player, None);
    let snapshot = TurnSnapshot::create(&host, &player)?;

    let mut file = Vec::new();
    header.write_to(&mut file)?;
    file.extend(snapshot.encode()?);

    let mut cursor = Cursor::new(file.as_slice());
    let restored = SessionHeader::read_from(&mut cursor)?;
    let body = &file[cursor.position() as usize..];
    let restored_snapshot = TurnSnapshot::decode(body)?;

    assert_eq!(restored, header);
    assert_eq!(restored.turn_number, TurnNumber::from(12));
    assert_eq!(restored.empire_ids(), vec![FEDERATION, KLINGONS, ROMULANS]);
    assert_eq!(restored.empire_names(), vec!["Federation", "Klingons", "Romulans"]);
    assert_eq!(restored.local_player_empire_name(), Some("Federation"));
    assert_eq!(restored_snapshot, snapshot);
    Ok(())
}

#[test]
fn lobby_seats_are_recorded_in_the_header() -> anyhow::Result<()> {
    let config_path = common::ensure_test_config();
    let (config, loaded_from) = load_sync_config_from_env();
    assert_eq!(loaded_from.as_deref(), Some(config_path.as_path()));

    let host = common::seeded_galaxy();
    let mut lobby = Lobby::new(host.civilizations(), config.lobby())?;
    lobby.assign_player(FEDERATION, common::host_player())?;
    lobby.assign_player(KLINGONS, common::guest_player())?;
    lobby.close_slot(2)?;

    let mut header = SessionHeader::from_context(&host, &common::host_player(), Some(&lobby));
    let mut bytes = Vec::new();
    header.write_to(&mut bytes)?;
    let restored = SessionHeader::read_from(&mut bytes.as_slice())?;

    assert_eq!(
        restored.slot_claims(),
        vec![SlotClaim::Assigned, SlotClaim::Assigned, SlotClaim::Unassigned]
    );
    assert_eq!(
        restored.slot_statuses(),
        vec![SlotStatus::Taken, SlotStatus::Taken, SlotStatus::Closed]
    );

    header.is_auto_save = true;
    assert_eq!(header.title(config.saves()), "Quicksave");
    Ok(())
}

#[test]
fn corrupt_slot_status_is_rejected() -> anyhow::Result<()> {
    let host = common::seeded_galaxy();
    let header = SessionHeader::from_context(&host, &common::host_player(), None);
    let mut bytes = Vec::new();
    header.write_to(&mut bytes)?;

    let last = bytes.len() - 1;
    bytes[last] = 9;
    let err = SessionHeader::read_from(&mut bytes.as_slice()).unwrap_err();

    assert!(matches!(err, HeaderError::InvalidEnum { value: 9, .. }));
    Ok(())
}
