mod common;

use common::{FEDERATION, KLINGONS, ROMULANS};
use sync_core::{
    ForeignPowerStatus, MapLocation, Player, SimulationContext, SnapshotError, SyncConfig,
    TurnNumber, TurnSnapshot,
};

#[test]
fn snapshot_survives_the_wire_and_applies_to_a_fresh_client() -> anyhow::Result<()> {
    let host = common::seeded_galaxy();
    let snapshot = TurnSnapshot::create(&host, &common::host_player())?;
    let bytes = snapshot.encode()?;
    let received = TurnSnapshot::decode(&bytes)?;
    assert_eq!(received.checksum()?, snapshot.checksum()?);
    assert_eq!(sync_proto::payload_checksum(&bytes), snapshot.checksum()?);

    let client = host.empty_like();
    received.apply(&client);

    assert_eq!(SimulationContext::depth(), 0);
    assert_eq!(client.turn_number(), TurnNumber::from(12));
    assert_eq!(*client.objects(), *host.objects());
    assert_eq!(*client.sector_claims(), *host.sector_claims());
    assert_eq!(*client.agreement_matrix(), *host.agreement_matrix());
    assert_eq!(client.managers().len(), 3);

    let diplomats = client.diplomats();
    assert_eq!(diplomats.len(), 1);
    assert!(diplomats.get(FEDERATION).is_some());
    assert!(diplomats.get(KLINGONS).is_none());

    let diplomacy = client.diplomacy_data();
    let to_klingons = diplomacy
        .get(FEDERATION, KLINGONS)
        .ok_or_else(|| anyhow::anyhow!("missing Federation view of the Klingons"))?;
    assert_eq!(to_klingons.status, ForeignPowerStatus::Neutral);
    assert_eq!(to_klingons.regard, 620);
    assert!(diplomacy.contains(FEDERATION, ROMULANS));
    assert!(!diplomacy.is_contact_made(FEDERATION, ROMULANS));
    assert!(diplomacy.is_contact_made(KLINGONS, ROMULANS));

    let max_object = client
        .objects()
        .max_object_id()
        .ok_or_else(|| anyhow::anyhow!("client has no objects"))?;
    assert!(client.generate_id() > max_object);
    Ok(())
}

#[test]
fn perceived_ownership_follows_applied_diplomacy() -> anyhow::Result<()> {
    let host = common::seeded_galaxy();
    let client = host.empty_like();
    TurnSnapshot::decode(&TurnSnapshot::create(&host, &common::host_player())?.encode()?)?
        .apply(&client);

    let border = MapLocation::new(5, 5);
    let claims = client.sector_claims();
    let diplomacy = client.diplomacy_data();
    assert!(claims.is_disputed(border));
    assert!(!claims.is_disputed_for(border, FEDERATION, &diplomacy));
    assert_eq!(claims.perceived_owner(border, FEDERATION, &diplomacy), Some(KLINGONS));
    assert!(!claims.is_claimed_by(border, ROMULANS, Some(FEDERATION), &diplomacy));
    assert!(claims.is_claimed_by(border, ROMULANS, None, &diplomacy));
    Ok(())
}

#[test]
fn every_player_gets_only_their_own_diplomat() -> anyhow::Result<()> {
    let host = common::seeded_galaxy();
    let config = SyncConfig::from_json_str(r#"{ "snapshot": { "parallel_min_players": 2 } }"#)?;
    let players = [
        common::host_player(),
        common::guest_player(),
        Player::new(2, "Sela").with_empire(ROMULANS),
    ];

    let snapshots = TurnSnapshot::create_for_players(&host, &players, config.snapshot())?;

    assert_eq!(snapshots.len(), players.len());
    for (player, snapshot) in players.iter().zip(&snapshots) {
        let owners: Vec<_> = snapshot
            .diplomats()
            .iter()
            .map(|diplomat| diplomat.owner_id)
            .collect();
        assert_eq!(owners, vec![player.empire_id]);
        assert_eq!(snapshot.civ_managers().len(), 3);
    }
    Ok(())
}

#[test]
fn observer_without_an_empire_gets_no_snapshot() {
    let host = common::seeded_galaxy();
    let spectator = Player::new(7, "Q");

    let err = TurnSnapshot::create(&host, &spectator).unwrap_err();

    assert!(matches!(err, SnapshotError::PlayerWithoutEmpire { player_id: 7 }));
    assert_eq!(SimulationContext::depth(), 0);
}

#[test]
fn truncated_payload_is_a_stream_error() -> anyhow::Result<()> {
    let host = common::seeded_galaxy();
    let bytes = TurnSnapshot::create(&host, &common::guest_player())?.encode()?;

    let err = TurnSnapshot::decode(&bytes[..bytes.len() / 2]).unwrap_err();

    assert!(matches!(err, SnapshotError::Stream(_)));
    Ok(())
}
