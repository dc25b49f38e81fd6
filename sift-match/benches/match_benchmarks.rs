use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sift_core::{DescriptorSet, DESCRIPTOR_LEN};
use sift_match::{ratio_filter, DescriptorMatcher, MatchStrategy};

/// Descriptor-like rows with values in `[0, 255]`
fn create_descriptors(n: usize, seed: usize) -> DescriptorSet {
    DescriptorSet::from_rows(
        DESCRIPTOR_LEN,
        (0..n).map(|i| {
            (0..DESCRIPTOR_LEN)
                .map(|d| (((i + seed) * 2654435761usize ^ d * 97) % 256) as f32)
                .collect::<Vec<_>>()
        }),
    )
}

/// Compare strategies for growing train sets
fn bench_knn_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("knn_match");

    for &n in &[100usize, 500, 2000] {
        let query = create_descriptors(n, 1);
        let train = create_descriptors(n, 7919);
        let strategies = [
            ("brute_force", MatchStrategy::BruteForce),
            ("kdtree_32", MatchStrategy::KdTree { leaf_checks: 32 }),
            ("kdtree_exact", MatchStrategy::KdTree { leaf_checks: 0 }),
        ];

        for (name, strategy) in strategies {
            let matcher = DescriptorMatcher::new(strategy);
            group.bench_with_input(BenchmarkId::new(name, n), &(&query, &train), |b, (q, t)| {
                b.iter(|| black_box(matcher.knn_match(black_box(q), black_box(t))))
            });
        }
    }

    group.finish();
}

/// Ratio test over a precomputed match list
fn bench_ratio_filter(c: &mut Criterion) {
    let query = create_descriptors(1000, 3);
    let train = create_descriptors(1000, 11);
    let matches = DescriptorMatcher::brute_force().knn_match(&query, &train);

    c.bench_function("ratio_filter_1000", |b| {
        b.iter(|| black_box(ratio_filter(black_box(&matches))))
    });
}

criterion_group!(benches, bench_knn_strategies, bench_ratio_filter);
criterion_main!(benches);
