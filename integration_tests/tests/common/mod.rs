#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Once};

use sync_core::{
    Agreement, CivDatabase, Civilization, CivilizationManager, ClauseType, DiplomacyData,
    Diplomat, ForeignPowerStatus, GameOptions, MapLocation, ObjectId, ObjectKind, Player,
    SimulationContext, TurnNumber, UniverseObject,
};

static INIT: Once = Once::new();

pub const FEDERATION: ObjectId = ObjectId::new(0);
pub const KLINGONS: ObjectId = ObjectId::new(1);
pub const ROMULANS: ObjectId = ObjectId::new(2);
pub const BAJORANS: ObjectId = ObjectId::new(3);

pub fn ensure_test_config() -> PathBuf {
    let config_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("test_sync_config.json");

    INIT.call_once(|| {
        debug_assert!(
            config_path.exists(),
            "missing test sync config at {}",
            config_path.display()
        );
        std::env::set_var("SYNC_CONFIG_PATH", &config_path);
    });
    config_path
}

pub fn civilizations() -> CivDatabase {
    CivDatabase::new([
        Civilization::new(FEDERATION, "FEDERATION", "Federation"),
        Civilization::new(KLINGONS, "KLINGONS", "Klingons"),
        Civilization::new(ROMULANS, "ROMULANS", "Romulans"),
        Civilization::minor(BAJORANS, "BAJORANS", "Bajorans"),
    ])
}

pub fn host_player() -> Player {
    Player::new(Player::GAME_HOST_ID, "Picard").with_empire(FEDERATION)
}

pub fn guest_player() -> Player {
    Player::new(1, "Gowron").with_empire(KLINGONS)
}

/// A three-empire galaxy at turn 12.
///
/// The Federation has met the Klingons but not the Romulans; the Klingons
/// and Romulans share a border sector at (5, 5).
pub fn seeded_galaxy() -> Arc<SimulationContext> {
    let context = SimulationContext::new(civilizations(), GameOptions::default(), true);
    context.on_deserialized();
    context.set_turn_number(TurnNumber::from(12));

    context.update_objects(|objects| {
        for (owner_id, x, y) in [(FEDERATION, 1, 1), (KLINGONS, 5, 4), (ROMULANS, 6, 5)] {
            let object_id = context.generate_id();
            objects.insert(UniverseObject {
                object_id,
                owner_id,
                location: MapLocation::new(x, y),
                kind: ObjectKind::Colony,
                name: format!("Colony {object_id}"),
            });
        }
    });

    context.update_managers(|managers| {
        for civ_id in [FEDERATION, KLINGONS, ROMULANS] {
            let mut manager = CivilizationManager::new(civ_id);
            manager.credits = 1_000 + i64::from(civ_id.value()) * 250;
            managers.insert(manager);
        }
    });

    context.update_sector_claims(|claims| {
        claims.add_claim(MapLocation::new(1, 1), FEDERATION, 200);
        claims.add_claim(MapLocation::new(5, 5), KLINGONS, 90);
        claims.add_claim(MapLocation::new(5, 5), ROMULANS, 60);
    });

    context.update_agreement_matrix(|agreements| {
        agreements.add_agreement(Agreement {
            sender_id: FEDERATION,
            recipient_id: KLINGONS,
            clauses: vec![ClauseType::NonAggression],
            start_turn: TurnNumber::from(10),
        });
    });

    let met = |owner_id: ObjectId, counterparty_id: ObjectId| {
        let mut data = DiplomacyData::new(owner_id, counterparty_id);
        data.contact_turn = TurnNumber::from(3);
        data.set_status(ForeignPowerStatus::Neutral, TurnNumber::from(3));
        data
    };
    context.update_diplomacy_data(|matrix| {
        matrix.set(FEDERATION, KLINGONS, met(FEDERATION, KLINGONS));
        matrix.set(KLINGONS, FEDERATION, met(KLINGONS, FEDERATION));
        matrix.set(KLINGONS, ROMULANS, met(KLINGONS, ROMULANS));
        matrix.set(ROMULANS, KLINGONS, met(ROMULANS, KLINGONS));
    });

    context.update_diplomats(|diplomats| {
        for owner_id in [FEDERATION, KLINGONS, ROMULANS] {
            let mut diplomat = Diplomat::new(owner_id);
            diplomat.ensure_foreign_powers([FEDERATION, KLINGONS, ROMULANS]);
            diplomats.insert(diplomat);
        }
        if let Some(power) = diplomats
            .get_mut(FEDERATION)
            .and_then(|diplomat| diplomat.ensure_foreign_power(KLINGONS))
        {
            power.make_contact(TurnNumber::from(3));
            power.diplomacy_data.adjust_regard(120);
        }
    });

    context
}
