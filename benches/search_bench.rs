use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use offset_finder::data::{SyntheticParams, SyntheticScene};
use offset_finder::matrix::{Fingerprint, TransformSet};
use offset_finder::search::{CancelToken, MatchStrategy, OffsetSearch, SearchOptions};
use offset_finder::utils::super_fast_hash;
use std::sync::Arc;

const TOLERANCE: f32 = 1e-4;

fn bench_fingerprint(c: &mut Criterion) {
    let mut group = c.benchmark_group("Fingerprint");
    let scene = SyntheticScene::generate(&SyntheticParams::default(), 1);
    let bytes = vec![0x5a_u8; 64];

    group.bench_function("super_fast_hash_64b", |b| b.iter(|| super_fast_hash(black_box(&bytes))));
    group.bench_function("round_and_hash", |b| {
        b.iter(|| Fingerprint::of(black_box(&scene.space[0]), 4))
    });
    group.bench_function("build_space_set", |b| {
        b.iter(|| TransformSet::with_tolerance(black_box(scene.space.clone()), TOLERANCE))
    });

    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("Offset Search");
    group.sample_size(20);
    let runtime = tokio::runtime::Runtime::new().unwrap();

    for decoys in [500, 5_000] {
        let params = SyntheticParams {
            model_size: 16,
            offsets: 8,
            decoys,
            translation_range: 100,
        };
        let scene = SyntheticScene::generate(&params, 7);
        let model = Arc::new(TransformSet::with_tolerance(scene.model, TOLERANCE));
        let space = Arc::new(TransformSet::with_tolerance(scene.space, TOLERANCE));

        for strategy in [MatchStrategy::Fingerprint, MatchStrategy::Tolerance] {
            // Direct scans are quadratic; keep them to the small scene
            if strategy == MatchStrategy::Tolerance && decoys > 500 {
                continue;
            }
            let engine = OffsetSearch::new(SearchOptions {
                strategy,
                ..SearchOptions::default()
            })
            .unwrap();

            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", strategy), space.len()),
                &space.len(),
                |b, _| {
                    b.iter(|| {
                        runtime
                            .block_on(engine.find_offsets(
                                Arc::clone(&model),
                                Arc::clone(&space),
                                TOLERANCE,
                                None,
                                &CancelToken::new(),
                                None,
                            ))
                            .unwrap()
                    })
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_fingerprint, bench_search);
criterion_main!(benches);
