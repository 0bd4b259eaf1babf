// Clustering benchmarks: kernel, engine, and the worker round trip
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use facegroup::simd::cosine_distance;
use facegroup::{FaceClusterer, FaceClusteringEngine, FaceGroupConfig, FaceInput, FaceRecord};
use rand::prelude::*;

fn random_unit(rng: &mut StdRng, dim: usize) -> Vec<f32> {
    let v: Vec<f32> = (0..dim).map(|_| rng.random_range(-1.0f32..1.0)).collect();
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    v.into_iter().map(|x| x / norm).collect()
}

fn generate_faces(n: usize, dim: usize, clustered: usize) -> Vec<FaceRecord> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..n)
        .map(|i| {
            let cluster_id = (i < clustered).then_some(i as i64 + 1);
            FaceRecord::new(format!("{i}_0"), random_unit(&mut rng, dim), cluster_id)
        })
        .collect()
}

fn benchmark_distance(c: &mut Criterion) {
    let mut group = c.benchmark_group("cosine_distance");
    let mut rng = StdRng::seed_from_u64(1);

    for dim in [192, 512].iter() {
        let a = random_unit(&mut rng, *dim);
        let b = random_unit(&mut rng, *dim);
        group.bench_with_input(BenchmarkId::from_parameter(dim), dim, |bench, _| {
            bench.iter(|| cosine_distance(black_box(&a), black_box(&b)));
        });
    }

    group.finish();
}

fn benchmark_cluster(c: &mut Criterion) {
    let mut group = c.benchmark_group("cluster");
    group.sample_size(10);
    let engine = FaceClusteringEngine::default();

    for size in [500, 2000].iter() {
        let fresh = generate_faces(*size, 192, 0);
        group.bench_with_input(BenchmarkId::new("fresh", size), size, |b, _| {
            b.iter(|| engine.cluster_at(black_box(fresh.clone()), None, 1).unwrap());
        });

        // most faces already clustered, only the last tenth is new
        let incremental = generate_faces(*size, 192, size * 9 / 10);
        group.bench_with_input(BenchmarkId::new("incremental", size), size, |b, _| {
            b.iter(|| engine.cluster_at(black_box(incremental.clone()), None, 1).unwrap());
        });
    }

    group.finish();
}

fn benchmark_worker_round_trip(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let clusterer = FaceClusterer::new(FaceGroupConfig::default()).unwrap();
    let batch: Vec<FaceInput> = generate_faces(500, 192, 0)
        .into_iter()
        .map(|f| FaceInput::from_values(f.face_id, f.cluster_id, &f.embedding))
        .collect();

    c.bench_function("predict_500", |b| {
        b.iter(|| {
            runtime
                .block_on(clusterer.predict(batch.clone(), None))
                .unwrap()
                .unwrap()
        });
    });

    runtime.block_on(async { clusterer.dispose() });
}

criterion_group!(benches, benchmark_distance, benchmark_cluster, benchmark_worker_round_trip);
criterion_main!(benches);
