//! # FaceGroup
//!
//! Incremental face clustering for photo libraries.
//!
//! FaceGroup groups face embeddings into identity clusters with a
//! nearest-neighbor single-link rule, on a dedicated worker thread so the
//! caller's runtime is never blocked. Each run returns only the assignments it
//! made; feed the cluster ids back on the next run and earlier faces keep
//! their clusters while new faces are attached to them.
//!
//! ## Quick Start
//!
//! ### As a CLI
//!
//! ```bash
//! facegroup --input faces.json --creation-times times.json
//! ```
//!
//! ### As a Library
//!
//! ```rust,no_run
//! use facegroup::prelude::*;
//!
//! # async fn run() -> facegroup::worker::Result<()> {
//! let clusterer = FaceClusterer::new(FaceGroupConfig::default())?;
//!
//! let batch = vec![
//!     FaceInput::from_values("101_0", None, &[1.0, 0.0, 0.0]),
//!     FaceInput::from_values("102_0", None, &[0.99, 0.14, 0.0]),
//! ];
//! if let Some(delta) = clusterer.predict(batch, None).await? {
//!     for (face_id, cluster_id) in &delta {
//!         println!("{face_id} -> {cluster_id}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Crate Structure
//!
//! - [`facegroup-core`](https://docs.rs/facegroup-core) - cosine kernel, wire format, clustering engine
//! - [`facegroup-worker`](https://docs.rs/facegroup-worker) - worker thread lifecycle and facade

pub use facegroup_core::{
    file_id_from_face_id, AssignmentDelta, ClusterId, ClusterReport, ClusteringConfig,
    CreationTimes, FaceClusteringEngine, FaceInput, FaceRecord, FileId,
};

pub use facegroup_worker::{
    EmbeddingSource, FaceClusterer, FaceGroupConfig, FileMetadataSource, InMemoryEmbeddings,
    InMemoryFileMetadata, WorkerConfig, WorkerHost, WorkerPhase,
};

/// Error and result types of the engine
pub mod engine {
    pub use facegroup_core::{Error, Result};
}

/// Error and result types of the worker
pub mod worker {
    pub use facegroup_worker::{Error, Result};
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        AssignmentDelta, ClusterId, ClusteringConfig, CreationTimes, FaceClusterer,
        FaceGroupConfig, FaceInput, WorkerConfig,
    };
}

/// SIMD-optimized cosine distance
pub mod simd {
    pub use facegroup_core::simd::{checked_cosine_distance, cosine_distance, dot_product_simd, norm_simd};
}
