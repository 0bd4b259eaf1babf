use std::time::Instant;

use facegroup_core::{
    file_id_from_face_id, AssignmentDelta, CreationTimes, FaceClusteringEngine, FaceInput, FileId,
};
use tracing::{info, warn};

use crate::config::FaceGroupConfig;
use crate::host::WorkerHost;
use crate::source::{EmbeddingSource, FileMetadataSource};
use crate::Result;

/// Entry point for face clustering.
///
/// Cheap to clone; every clone drives the same worker. Pass it to whoever
/// needs to cluster rather than keeping it in a global.
#[derive(Clone)]
pub struct FaceClusterer {
    host: WorkerHost,
}

impl FaceClusterer {
    pub fn new(config: FaceGroupConfig) -> Result<Self> {
        let engine = FaceClusteringEngine::new(config.clustering)?;
        Ok(Self {
            host: WorkerHost::new(engine, config.worker),
        })
    }

    pub fn host(&self) -> &WorkerHost {
        &self.host
    }

    /// Cluster a batch of faces on the worker.
    ///
    /// Returns `Ok(None)` when the batch is empty or a run is already in
    /// flight; try again later in that case.
    pub async fn predict(
        &self,
        batch: Vec<FaceInput>,
        creation_times: Option<CreationTimes>,
    ) -> Result<Option<AssignmentDelta>> {
        if batch.is_empty() {
            warn!("predict called with no faces, skipping clustering");
            return Ok(None);
        }
        if self.host.is_running() {
            warn!("clustering is already running, skipping this call");
            return Ok(None);
        }

        let faces = batch.len();
        let started = Instant::now();
        let result = self.host.run_clustering(batch, creation_times).await;

        if let Ok(Some(delta)) = &result {
            info!(
                faces,
                assigned = delta.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "clustering round trip finished"
            );
        }
        result
    }

    /// Pull the batch from `embeddings` and, when given, creation times from
    /// `metadata`, then [`predict`](Self::predict).
    pub async fn predict_from_sources(
        &self,
        embeddings: &dyn EmbeddingSource,
        metadata: Option<&dyn FileMetadataSource>,
    ) -> Result<Option<AssignmentDelta>> {
        let batch = embeddings.face_embeddings()?;
        let creation_times = match metadata {
            Some(metadata) => {
                let mut file_ids: Vec<FileId> = batch
                    .iter()
                    .filter_map(|f| file_id_from_face_id(&f.face_id).ok())
                    .collect();
                file_ids.sort_unstable();
                file_ids.dedup();
                Some(metadata.creation_times(&file_ids)?)
            }
            None => None,
        };
        self.predict(batch, creation_times).await
    }

    pub fn dispose(&self) {
        self.host.dispose();
    }
}
