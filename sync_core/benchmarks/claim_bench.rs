use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use sync_core::{MapLocation, ObjectId, SectorClaim, SectorClaimGrid};

fn bench_claims(c: &mut Criterion) {
    let mut group = c.benchmark_group("claims");

    group.bench_function("pack_unpack", |b| {
        b.iter(|| {
            let claim = SectorClaim::new(black_box(ObjectId::new(3)), MapLocation::new(10, 20), 200)
                .map(u32::from)
                .unwrap_or_default();
            let decoded = SectorClaim::from(black_box(claim));
            (decoded.owner_id(), decoded.location(), decoded.weight())
        })
    });

    for edge in [16i32, 64, 128] {
        group.bench_with_input(BenchmarkId::new("grid_fill", edge), &edge, |b, &edge| {
            b.iter_batched(
                SectorClaimGrid::new,
                |mut grid| {
                    for x in 0..edge {
                        for y in 0..edge {
                            let owner = ObjectId::new((x + y) % 4);
                            grid.add_claim(MapLocation::new(x, y), owner, 40);
                        }
                    }
                    grid
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(claim_benches, bench_claims);
criterion_main!(claim_benches);
