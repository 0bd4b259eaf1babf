//! # FaceGroup Core
//!
//! Core library for FaceGroup, the incremental face clustering worker.
//!
//! This crate provides the pure parts of the system:
//!
//! - [`simd`] - cosine distance kernel for unit-normalized embeddings
//! - [`EVector`] / [`FaceInput`] - protobuf wire format of an embedding
//! - [`FaceRecord`] - one face taking part in a clustering run
//! - [`FaceClusteringEngine`] - single-link incremental clustering
//! - [`ClusterReport`] - cluster size histogram for diagnostics
//!
//! ## Example
//!
//! ```rust
//! use facegroup_core::{FaceClusteringEngine, FaceRecord};
//!
//! let engine = FaceClusteringEngine::default();
//! let batch = vec![
//!     FaceRecord::new("1_face", vec![1.0, 0.0], Some(100)),
//!     FaceRecord::new("2_face", vec![0.995, 0.0998], None),
//! ];
//! let delta = engine.cluster(batch, None).unwrap();
//! assert_eq!(delta.get("2_face"), Some(&100));
//! ```

pub mod analyze;
pub mod cluster;
pub mod config;
pub mod embedding;
pub mod error;
pub mod face;

/// SIMD-optimized cosine distance
///
/// - AVX2/FMA on x86_64
/// - NEON on ARM64/Apple Silicon
pub mod simd;

pub use bytes::Bytes;

pub use analyze::{analyze_clusters, ClusterReport};
pub use cluster::{
    decode_batch, now_ms, order_for_clustering, AssignmentDelta, CreationTimes,
    FaceClusteringEngine,
};
pub use config::{ClusteringConfig, DEFAULT_DISTANCE_THRESHOLD};
pub use embedding::{decode_embedding, encode_embedding, EVector, FaceInput};
pub use error::{Error, Result};
pub use face::{file_id_from_face_id, ClusterId, FaceRecord, FileId};
