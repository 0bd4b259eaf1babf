// Integration tests for FaceGroup
use facegroup::prelude::*;
use facegroup::{InMemoryEmbeddings, InMemoryFileMetadata, WorkerPhase};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::time::Duration;

fn clusterer() -> FaceClusterer {
    FaceClusterer::new(FaceGroupConfig::default()).unwrap()
}

/// Unit vector at `deg` degrees in the plane of the first two axes
fn planar(deg: f32) -> Vec<f32> {
    let r = deg.to_radians();
    vec![r.cos(), r.sin(), 0.0, 0.0]
}

fn normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    v.iter_mut().for_each(|x| *x /= norm);
    v
}

fn random_unit(rng: &mut StdRng, dim: usize) -> Vec<f32> {
    normalize((0..dim).map(|_| rng.random_range(-1.0f32..1.0)).collect())
}

fn jitter(rng: &mut StdRng, center: &[f32], amount: f32) -> Vec<f32> {
    normalize(center.iter().map(|x| x + rng.random_range(-amount..amount)).collect())
}

#[tokio::test]
async fn test_two_faces_of_one_person_and_a_stranger() {
    let clusterer = clusterer();
    // cosine distance 0.05 between the first two, 1.0 to the third
    let batch = vec![
        FaceInput::from_values("1_0", None, &planar(0.0)),
        FaceInput::from_values("2_0", None, &planar(18.19)),
        FaceInput::from_values("3_0", None, &[0.0, 0.0, 1.0, 0.0]),
    ];

    let delta = clusterer.predict(batch, None).await.unwrap().unwrap();
    assert_eq!(delta.len(), 3);
    assert_eq!(delta["1_0"], delta["2_0"]);
    assert_ne!(delta["1_0"], delta["3_0"]);
    assert_eq!(delta.values().collect::<HashSet<_>>().len(), 2);
    clusterer.dispose();
}

#[tokio::test]
async fn test_new_face_joins_known_person() {
    let clusterer = clusterer();
    let batch = vec![
        FaceInput::from_values("1_0", Some(100), &planar(0.0)),
        FaceInput::from_values("2_0", None, &planar(25.84)),
    ];

    let delta = clusterer.predict(batch, None).await.unwrap().unwrap();
    assert_eq!(delta, AssignmentDelta::from([("2_0".to_string(), 100)]));
    clusterer.dispose();
}

#[tokio::test]
async fn test_incremental_runs_keep_earlier_assignments() {
    let clusterer = clusterer();
    let mut rng = StdRng::seed_from_u64(7);
    let centers: Vec<Vec<f32>> = (0..4).map(|_| random_unit(&mut rng, 64)).collect();

    let mut source = InMemoryEmbeddings::default();
    for i in 0..40 {
        let embedding = jitter(&mut rng, &centers[i % 4], 0.02);
        source.push(FaceInput::from_values(format!("{i}_0"), None, &embedding));
    }

    let first = clusterer
        .predict_from_sources(&source, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.len(), 40);
    assert_eq!(first.values().collect::<HashSet<_>>().len(), 4);
    for i in 4..40 {
        assert_eq!(first[&format!("{i}_0")], first[&format!("{}_0", i % 4)]);
    }
    source.apply_delta(&first);

    // nothing new, nothing assigned
    let unchanged = clusterer
        .predict_from_sources(&source, None)
        .await
        .unwrap()
        .unwrap();
    assert!(unchanged.is_empty());

    let max_before = *first.values().max().unwrap();
    for i in 40..46 {
        let embedding = jitter(&mut rng, &centers[i % 4], 0.02);
        source.push(FaceInput::from_values(format!("{i}_0"), None, &embedding));
    }
    let stranger = random_unit(&mut rng, 64);
    source.push(FaceInput::from_values("99_0", None, &stranger));

    let second = clusterer
        .predict_from_sources(&source, None)
        .await
        .unwrap()
        .unwrap();
    let expected: HashSet<String> = (40..46).map(|i| format!("{i}_0")).chain(["99_0".to_string()]).collect();
    assert_eq!(second.keys().cloned().collect::<HashSet<_>>(), expected);
    for i in 40..46 {
        assert_eq!(second[&format!("{i}_0")], first[&format!("{}_0", i % 4)]);
    }
    assert_eq!(second["99_0"], max_before + 1);
    clusterer.dispose();
}

#[tokio::test]
async fn test_cluster_ids_never_go_backwards() {
    let clusterer = clusterer();
    let mut rng = StdRng::seed_from_u64(11);
    let mut batch = Vec::new();
    let mut max_input = i64::MIN;
    for i in 0..60 {
        let cluster_id = if i % 2 == 0 {
            let id = rng.random_range(1..1_000i64);
            max_input = max_input.max(id);
            Some(id)
        } else {
            None
        };
        batch.push(FaceInput::from_values(format!("{i}_0"), cluster_id, &random_unit(&mut rng, 16)));
    }
    let existing: HashSet<i64> = batch.iter().filter_map(|f| f.cluster_id).collect();

    let delta = clusterer.predict(batch, None).await.unwrap().unwrap();
    assert_eq!(delta.len(), 30);
    for id in delta.values() {
        assert!(existing.contains(id) || *id > max_input, "id {id} reuses or precedes existing ids");
    }
    let max_after = delta.values().chain(existing.iter()).copied().max().unwrap();
    assert!(max_after >= max_input);
    clusterer.dispose();
}

#[tokio::test]
async fn test_creation_times_decide_the_anchor() {
    let clusterer = clusterer();
    // 20 bridges 10 and 30, which are too far apart to link directly
    let embeddings = InMemoryEmbeddings::new(vec![
        FaceInput::from_values("10_0", None, &planar(0.0)),
        FaceInput::from_values("20_0", None, &planar(20.0)),
        FaceInput::from_values("30_0", None, &planar(50.0)),
    ]);

    let chained = clusterer
        .predict_from_sources(&embeddings, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(chained["10_0"], chained["20_0"]);
    assert_eq!(chained["20_0"], chained["30_0"]);

    // the bridge face is now the newest, so 30 is seen before it
    let metadata = InMemoryFileMetadata::new(CreationTimes::from([(10, 1_000), (30, 2_000), (20, 3_000)]));
    let before = facegroup_core::now_ms();
    let split = clusterer
        .predict_from_sources(&embeddings, Some(&metadata))
        .await
        .unwrap()
        .unwrap();
    let after = facegroup_core::now_ms();

    // the oldest face seeds the run with the clock, the next cluster follows it
    let seed = split["10_0"];
    assert!(seed >= before && seed <= after, "seed {seed} not in [{before}, {after}]");
    assert_eq!(split["30_0"], seed + 1);
    assert_eq!(split["20_0"], seed);
    clusterer.dispose();
}

#[tokio::test]
async fn test_empty_batch_is_rejected_without_spawning() {
    let clusterer = clusterer();
    assert!(clusterer.predict(Vec::new(), None).await.unwrap().is_none());
    assert_eq!(clusterer.host().phase(), WorkerPhase::NotSpawned);
    assert_eq!(clusterer.host().spawn_count(), 0);
}

#[tokio::test]
async fn test_overlapping_predict_is_rejected() {
    let clusterer = clusterer();
    let batch = || {
        vec![
            FaceInput::from_values("1_0", None, &planar(0.0)),
            FaceInput::from_values("2_0", None, &planar(90.0)),
        ]
    };

    let other = clusterer.clone();
    let (first, second) = tokio::join!(clusterer.predict(batch(), None), other.predict(batch(), None));
    assert!(first.unwrap().is_some());
    assert!(second.unwrap().is_none());

    // once the first run is done the next one goes through
    assert!(clusterer.predict(batch(), None).await.unwrap().is_some());
    clusterer.dispose();
}

#[tokio::test]
async fn test_malformed_embedding_fails_the_run() {
    let clusterer = clusterer();
    let batch = vec![
        FaceInput::from_values("1_0", None, &planar(0.0)),
        FaceInput::new("2_0", None, facegroup_core::Bytes::from_static(b"\xff\xff\xff")),
    ];

    let err = clusterer.predict(batch, None).await.unwrap_err();
    assert!(matches!(err, facegroup::worker::Error::Execution { .. }));
    assert!(err.to_string().contains("2_0"));

    let ok = vec![FaceInput::from_values("1_0", None, &planar(0.0))];
    assert!(clusterer.predict(ok, None).await.unwrap().is_some());
    clusterer.dispose();
}

#[tokio::test]
async fn test_mismatched_dimensions_fail_the_run() {
    let clusterer = clusterer();
    let batch = vec![
        FaceInput::from_values("1_0", None, &[1.0, 0.0, 0.0]),
        FaceInput::from_values("2_0", None, &[1.0, 0.0]),
    ];
    let err = clusterer.predict(batch, None).await.unwrap_err();
    assert!(err.to_string().contains("dimension"));
    clusterer.dispose();
}

#[tokio::test]
async fn test_worker_is_torn_down_when_idle() {
    let mut config = FaceGroupConfig::default();
    config.worker.idle_timeout_ms = 50;
    let clusterer = FaceClusterer::new(config).unwrap();

    let batch = vec![FaceInput::from_values("1_0", None, &planar(0.0))];
    assert!(clusterer.predict(batch.clone(), None).await.unwrap().is_some());
    assert_ne!(clusterer.host().phase(), WorkerPhase::NotSpawned);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(clusterer.host().phase(), WorkerPhase::NotSpawned);

    assert!(clusterer.predict(batch, None).await.unwrap().is_some());
    assert_eq!(clusterer.host().spawn_count(), 2);
    clusterer.dispose();
}

#[test]
fn test_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"clustering": {{"distance_threshold": 0.2, "expected_dim": 4}}, "worker": {{"thread_name": "faces"}}}}"#
    )
    .unwrap();

    let config = FaceGroupConfig::from_file(file.path()).unwrap();
    assert_eq!(config.clustering.distance_threshold, 0.2);
    assert_eq!(config.clustering.expected_dim, Some(4));
    assert_eq!(config.worker.thread_name, "faces");
    assert!(FaceClusterer::new(config).is_ok());
}

#[test]
fn test_delta_serializes_as_plain_map() {
    let delta: AssignmentDelta = HashMap::from([("1_0".to_string(), 42)]);
    assert_eq!(serde_json::to_string(&delta).unwrap(), r#"{"1_0":42}"#);
}
