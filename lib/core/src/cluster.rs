//! Incremental single-link face clustering.
//!
//! Faces are ordered oldest first, with already-clustered faces ahead of new
//! ones, and then visited once. A new face joins the cluster of its nearest
//! *earlier* face when that face is closer than the distance threshold, and
//! starts a new cluster otherwise. Faces that arrive with a cluster id are
//! never reassigned; they only serve as anchors for the faces after them.
//!
//! WARNING: the result depends on the order the faces are visited in. Feeding
//! back the same faces with the ids from a previous run reproduces that run
//! only because the creation-time sort and the seniority partition below are
//! both stable.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::analyze::log_cluster_report;
use crate::config::ClusteringConfig;
use crate::embedding::{decode_embedding, FaceInput};
use crate::face::{ClusterId, FaceRecord, FileId};
use crate::simd::cosine_distance;
use crate::{Error, Result};

/// Face id to cluster id, holding only assignments made by one run
pub type AssignmentDelta = HashMap<String, ClusterId>;

/// Source file id to creation time in microseconds
pub type CreationTimes = HashMap<FileId, i64>;

/// Wall clock in epoch milliseconds, the seed for freshly minted ids
#[inline]
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Decode a batch of serialized inputs into face records, in parallel.
/// Input order is preserved; the first undecodable payload fails the batch.
pub fn decode_batch(inputs: Vec<FaceInput>) -> Result<Vec<FaceRecord>> {
    inputs
        .into_par_iter()
        .map(|input| {
            let embedding = decode_embedding(&input.face_id, &input.embedding)?;
            Ok(FaceRecord::new(input.face_id, embedding, input.cluster_id))
        })
        .collect()
}

/// Sort by creation time (timeless faces last), then move clustered faces
/// ahead of unclustered ones. Both steps keep the relative input order of
/// equal elements.
pub fn order_for_clustering(mut records: Vec<FaceRecord>) -> Vec<FaceRecord> {
    // slice::sort_by_key is a stable merge sort
    records.sort_by_key(|r| (r.source_creation_time.is_none(), r.source_creation_time));

    let (mut ordered, fresh): (Vec<_>, Vec<_>) =
        records.into_iter().partition(|r| r.cluster_id.is_some());
    ordered.extend(fresh);
    ordered
}

/// Closest face among `earlier` to `embedding`, as (index, distance).
/// Scans from the most recent candidate backwards; on equal distances the
/// most recent candidate wins.
pub fn nearest_earlier(earlier: &[FaceRecord], embedding: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (j, candidate) in earlier.iter().enumerate().rev() {
        let distance = cosine_distance(embedding, &candidate.embedding);
        match best {
            Some((_, closest)) if distance >= closest => {}
            _ => best = Some((j, distance)),
        }
    }
    best
}

/// The clustering engine. Stateless between runs apart from its config.
#[derive(Debug, Clone, Default)]
pub struct FaceClusteringEngine {
    config: ClusteringConfig,
}

impl FaceClusteringEngine {
    pub fn new(config: ClusteringConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ClusteringConfig {
        &self.config
    }

    /// Decode and cluster a batch of serialized inputs
    pub fn run_batch(
        &self,
        inputs: Vec<FaceInput>,
        creation_times: Option<&CreationTimes>,
        now_ms: i64,
    ) -> Result<AssignmentDelta> {
        let started = Instant::now();
        let records = decode_batch(inputs)?;
        debug!(
            faces = records.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "decoded embeddings"
        );
        self.cluster_at(records, creation_times, now_ms)
    }

    /// Cluster a batch, minting new ids from the current wall clock
    pub fn cluster(
        &self,
        batch: Vec<FaceRecord>,
        creation_times: Option<&CreationTimes>,
    ) -> Result<AssignmentDelta> {
        self.cluster_at(batch, creation_times, now_ms())
    }

    /// Cluster a batch with an explicit seed for newly minted ids
    pub fn cluster_at(
        &self,
        mut batch: Vec<FaceRecord>,
        creation_times: Option<&CreationTimes>,
        now_ms: i64,
    ) -> Result<AssignmentDelta> {
        if batch.is_empty() {
            warn!("clustering called with an empty batch");
            return Ok(AssignmentDelta::new());
        }
        self.validate_batch(&batch)?;

        if let Some(times) = creation_times {
            for record in &mut batch {
                if let Some(&micros) = times.get(&record.file_id()?) {
                    record.source_creation_time = Some(micros);
                }
            }
        }

        let mut records = order_for_clustering(batch);
        let started = Instant::now();
        let total = records.len();
        let already_clustered = records.iter().take_while(|r| r.cluster_id.is_some()).count();
        info!(
            new_faces = total - already_clustered,
            clustered_faces = already_clustered,
            "clustering faces"
        );

        let mut delta = AssignmentDelta::new();
        let mut counter: ClusterId = match records[0].cluster_id {
            Some(id) => id,
            None => {
                records[0].cluster_id = Some(now_ms);
                delta.insert(records[0].face_id.clone(), now_ms);
                now_ms
            }
        };

        let threshold = self.config.distance_threshold;
        let interval = self.config.progress_log_interval;

        for i in 1..total {
            if interval > 0 && i % interval == 0 {
                debug!(processed = i, total, "clustering progress");
            }

            if let Some(existing) = records[i].cluster_id {
                counter = counter.max(existing);
                continue;
            }

            let (earlier, rest) = records.split_at_mut(i);
            let current = &mut rest[0];

            let assigned = match nearest_earlier(earlier, &current.embedding) {
                Some((j, distance)) if distance < threshold => match earlier[j].cluster_id {
                    Some(id) => id,
                    None => {
                        warn!(
                            face_id = %earlier[j].face_id,
                            "nearest neighbor has no cluster id, minting one"
                        );
                        counter += 1;
                        earlier[j].cluster_id = Some(counter);
                        delta.insert(earlier[j].face_id.clone(), counter);
                        counter
                    }
                },
                _ => {
                    counter += 1;
                    counter
                }
            };

            current.cluster_id = Some(assigned);
            delta.insert(current.face_id.clone(), assigned);
        }

        info!(
            faces = total,
            dim = records[0].dim(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            last_cluster_id = counter,
            assigned = delta.len(),
            "clustering finished"
        );

        log_cluster_report(&records);
        Ok(delta)
    }

    /// Every embedding must share one dimension, and face ids must be unique
    fn validate_batch(&self, batch: &[FaceRecord]) -> Result<()> {
        let expected = self.config.expected_dim.unwrap_or_else(|| batch[0].dim());
        let mut seen = HashSet::with_capacity(batch.len());
        for record in batch {
            if record.dim() != expected {
                warn!(face_id = %record.face_id, "embedding dimension mismatch");
                return Err(Error::InvalidDimension {
                    expected,
                    actual: record.dim(),
                });
            }
            if !seen.insert(record.face_id.as_str()) {
                return Err(Error::InvalidFaceId(format!("duplicate face id {}", record.face_id)));
            }
        }
        Ok(())
    }
}
