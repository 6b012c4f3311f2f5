use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use latbench::{Histogram, LatencyHistogram};
use rand::Rng;

fn bench_histogram(c: &mut Criterion) {
    let mut group = c.benchmark_group("histogram");

    let histogram = LatencyHistogram::new();
    let mut rng = rand::rng();
    group.bench_function("sample", |b| {
        b.iter(|| histogram.sample(black_box(rng.random_range(500..50_000))));
    });

    // Long-tailed latencies: mostly fast with a sprinkling of stalls.
    let values: Vec<u64> = (0..100_000)
        .map(|_| {
            if rng.random_bool(0.01) {
                rng.random_range(100_000..5_000_000)
            } else {
                rng.random_range(500..5_000)
            }
        })
        .collect();
    group.bench_function("percentiles_100k", |b| {
        b.iter_batched(
            || {
                let h = LatencyHistogram::new();
                for &value in &values {
                    h.sample(value);
                }
                h
            },
            |h| black_box(h.percentiles()),
            BatchSize::LargeInput,
        );
    });
    group.finish();
}

criterion_group!(benches, bench_histogram);
criterion_main!(benches);
