//! # FaceGroup Worker
//!
//! Runs the clustering engine from `facegroup-core` on a dedicated thread.
//!
//! - [`FaceClusterer`] - entry point; rejects empty batches and overlapping runs
//! - [`WorkerHost`] - lazy spawn, idle teardown, request/reply messaging
//! - [`WorkerRequest`] / [`WorkerResponse`] - the messages crossing the thread boundary
//! - [`EmbeddingSource`] / [`FileMetadataSource`] - where batches come from
//!
//! ## Flow
//!
//! ```text
//! caller ──predict──> FaceClusterer ──> WorkerHost ──envelope──> worker thread
//!                                          ^                        │
//!                                          └──── one-shot reply ────┘
//! ```

pub mod config;
pub mod error;
pub mod facade;
pub mod host;
pub mod message;
pub mod source;

pub use config::{FaceGroupConfig, WorkerConfig};
pub use error::{Error, Result};
pub use facade::FaceClusterer;
pub use host::{WorkerHost, WorkerPhase};
pub use message::{WorkerEnvelope, WorkerFault, WorkerReply, WorkerRequest, WorkerResponse};
pub use source::{EmbeddingSource, FileMetadataSource, InMemoryEmbeddings, InMemoryFileMetadata};
