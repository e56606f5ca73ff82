//! # Correlation Engine Benchmarks
//!
//! | Path | Operation | Target |
//! |------|-----------|--------|
//! | Pending table | insert + resolve | < 1µs |
//! | Pending table | insert + remove (cancellation) | < 1µs |
//! | Requester/Replier | in-memory round trip | < 50µs |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use reqrep_core::{CompletionHandle, PendingRequestTable, ReplierConfig, RequesterConfig};
use reqrep_tests::harness::{Rig, TextRequest};
use shared_types::CorrelationId;
use std::sync::Arc;
use std::time::Duration;

fn bench_pending_table(c: &mut Criterion) {
    let mut group = c.benchmark_group("pending-table");
    group.measurement_time(Duration::from_secs(5));

    let table = PendingRequestTable::<u64>::new();

    group.bench_function("insert_resolve", |b| {
        b.iter(|| {
            let id = CorrelationId::new();
            let (handle, _completion) = CompletionHandle::new();
            table.insert_if_absent(id, handle).unwrap();
            black_box(table.resolve(&id, 7))
        })
    });

    group.bench_function("insert_remove", |b| {
        b.iter(|| {
            let id = CorrelationId::new();
            let (handle, _completion) = CompletionHandle::new();
            table.insert_if_absent(id, handle).unwrap();
            black_box(table.remove(&id).map(|entry| entry.handle().cancel()))
        })
    });

    // Lookup cost with a populated table
    for outstanding in [100usize, 10_000] {
        let crowded = PendingRequestTable::<u64>::new();
        let mut completions = Vec::with_capacity(outstanding);
        for _ in 0..outstanding {
            let (handle, completion) = CompletionHandle::new();
            crowded.insert_if_absent(CorrelationId::new(), handle).unwrap();
            completions.push(completion);
        }

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::new("resolve_among_outstanding", outstanding),
            &crowded,
            |b, crowded| {
                b.iter(|| {
                    let id = CorrelationId::new();
                    let (handle, _completion) = CompletionHandle::new();
                    crowded.insert_if_absent(id, handle).unwrap();
                    black_box(crowded.resolve(&id, 1))
                })
            },
        );
    }

    group.finish();
}

fn bench_round_trip(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();

    let mut group = c.benchmark_group("round-trip");
    group.measurement_time(Duration::from_secs(10));

    let (rig, _replier, _subscription) = runtime.block_on(async {
        let rig = Rig::with_config(RequesterConfig::default().with_request_timeout(Duration::from_secs(1)));
        let (replier, subscription) = rig.serve(ReplierConfig::default(), Arc::default());
        (rig, replier, subscription)
    });

    group.bench_function("request_reply", |b| {
        b.iter(|| {
            runtime
                .block_on(rig.requester.request(TextRequest::new("bench"), None))
                .unwrap()
        })
    });

    group.finish();
}

criterion_group!(benches, bench_pending_table, bench_round_trip);
criterion_main!(benches);
