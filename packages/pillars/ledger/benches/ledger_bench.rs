//! Run with: cargo bench -p paladin-ledger

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;

use paladin_ledger::{AuditLedger, HmacDemoSigner, InMemoryStore};

fn seeded_ledger(entries: u64) -> AuditLedger {
    let ledger = AuditLedger::open(
        Box::new(InMemoryStore::new()),
        Box::new(HmacDemoSigner::new("bench", b"bench-key".to_vec())),
    )
    .unwrap();
    for i in 0..entries {
        ledger.append(json!({"kind": "INTENT_VERIFIED", "i": i})).unwrap();
    }
    ledger
}

fn benchmark_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger_append");
    group.throughput(Throughput::Elements(1));
    let ledger = AuditLedger::open(
        Box::new(InMemoryStore::new()),
        Box::new(HmacDemoSigner::new("bench", b"bench-key".to_vec())),
    )
    .unwrap();
    group.bench_function("single_entry", |b| {
        b.iter(|| ledger.append(black_box(json!({"kind": "INTENT_VERIFIED", "n": 1}))).unwrap());
    });
    group.finish();
}

fn benchmark_verify_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger_verify_chain");
    for size in [10u64, 100, 1_000] {
        let ledger = seeded_ledger(size);
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &ledger, |b, ledger| {
            b.iter(|| ledger.verify_chain().unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_append, benchmark_verify_chain);
criterion_main!(benches);
