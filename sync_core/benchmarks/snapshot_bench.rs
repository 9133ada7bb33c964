use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use sync_core::{
    CivDatabase, Civilization, Diplomat, GameOptions, MapLocation, ObjectId, ObjectKind, Player,
    SimulationContext, TurnSnapshot, UniverseObject,
};

fn populated_context(objects: i32) -> std::sync::Arc<SimulationContext> {
    let civs = CivDatabase::new((0..4).map(|id| {
        Civilization::new(ObjectId::new(id), format!("CIV{id}"), format!("Civ {id}"))
    }));
    let context = SimulationContext::new(civs, GameOptions::default(), true);
    context.update_objects(|set| {
        for _ in 0..objects {
            let object_id = context.generate_id();
            set.insert(UniverseObject {
                object_id,
                owner_id: ObjectId::new(object_id.value() % 4),
                location: MapLocation::new(object_id.value() % 64, object_id.value() / 64),
                kind: ObjectKind::Fleet,
                name: format!("Fleet {object_id}"),
            });
        }
    });
    context.update_diplomats(|diplomats| {
        for id in 0..4 {
            let mut diplomat = Diplomat::new(ObjectId::new(id));
            diplomat.ensure_foreign_powers((0..4).map(ObjectId::new));
            diplomats.insert(diplomat);
        }
    });
    context
}

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot");
    let player = Player::new(0, "Bench").with_empire(ObjectId::new(0));

    for objects in [100i32, 1_000, 10_000] {
        let context = populated_context(objects);
        let Ok(snapshot) = TurnSnapshot::create(&context, &player) else {
            continue;
        };
        let Ok(bytes) = snapshot.encode() else {
            continue;
        };

        group.bench_with_input(BenchmarkId::new("encode", objects), &snapshot, |b, snapshot| {
            b.iter(|| snapshot.encode())
        });
        group.bench_with_input(BenchmarkId::new("decode", objects), &bytes, |b, bytes| {
            b.iter(|| TurnSnapshot::decode(bytes))
        });
    }

    group.finish();
}

criterion_group!(snapshot_benches, bench_snapshot);
criterion_main!(snapshot_benches);
