//! Chamber draw benchmarks

use chrono::{TimeZone, Utc};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use raffle_core::DrawLabel;
use raffle_draw::{ChamberConfig, DrawSeed, DrawSimulator, Entrant, PhysicsDrawSimulator, RngState};

const ENTRANT_COUNTS: &[usize] = &[10, 100, 500];

fn entrants(n: usize) -> Vec<Entrant> {
    let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    (0..n)
        .map(|i| Entrant::new(format!("s{i:05}"), base + chrono::Duration::seconds(i as i64)))
        .collect()
}

fn bench_rng(c: &mut Criterion) {
    let mut group = c.benchmark_group("rng");
    group.throughput(Throughput::Elements(1024));
    group.bench_function("next_u64_x1024", |b| {
        let mut rng = RngState::new("bench");
        b.iter(|| {
            for _ in 0..1024 {
                black_box(rng.next_u64());
            }
        })
    });
    group.finish();
}

fn bench_draw(c: &mut Criterion) {
    let mut group = c.benchmark_group("chamber_draw");
    let sim = PhysicsDrawSimulator::new(ChamberConfig::standard()).unwrap();
    let seed = DrawSeed::new("bench");

    for &n in ENTRANT_COUNTS {
        let list = entrants(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("standard", n), &n, |b, _| {
            b.iter(|| black_box(sim.draw(&DrawLabel::Open, &list, &seed).unwrap()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_rng, bench_draw);
criterion_main!(benches);
