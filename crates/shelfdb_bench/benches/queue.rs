//! Action queue benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use shelfdb_core::ActionQueue;

/// Benchmark enqueueing and draining no-op tasks.
fn bench_enqueue_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("enqueue_drain");

    for batch in [10, 100, 1_000].iter() {
        group.throughput(Throughput::Elements(*batch as u64));
        group.bench_with_input(BenchmarkId::from_parameter(batch), batch, |b, &batch| {
            let queue = ActionQueue::start("bench").unwrap();

            b.iter(|| {
                let mut last = None;
                for i in 0..batch {
                    last = Some(
                        queue
                            .enqueue(move || {
                                black_box(i);
                                Ok(())
                            })
                            .unwrap(),
                    );
                }
                if let Some(handle) = last {
                    handle.wait();
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_enqueue_drain);
criterion_main!(benches);
