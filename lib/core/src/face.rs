use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Cluster identifier, either carried over from a previous run or minted
pub type ClusterId = i64;

/// File identifier embedded in a face id
pub type FileId = i64;

/// One face taking part in a clustering run.
///
/// Built fresh from the input batch for every run and dropped afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceRecord {
    pub face_id: String,
    pub embedding: Vec<f32>,
    pub cluster_id: Option<ClusterId>,
    /// Creation time of the source file, microseconds since epoch
    pub source_creation_time: Option<i64>,
}

impl FaceRecord {
    pub fn new(face_id: impl Into<String>, embedding: Vec<f32>, cluster_id: Option<ClusterId>) -> Self {
        Self {
            face_id: face_id.into(),
            embedding,
            cluster_id,
            source_creation_time: None,
        }
    }

    #[must_use]
    pub fn with_creation_time(mut self, micros: i64) -> Self {
        self.source_creation_time = Some(micros);
        self
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.embedding.len()
    }

    #[inline]
    pub fn file_id(&self) -> Result<FileId> {
        file_id_from_face_id(&self.face_id)
    }
}

/// Extract the source file id from a face id of the form `<fileId>_<suffix>`.
pub fn file_id_from_face_id(face_id: &str) -> Result<FileId> {
    let (prefix, suffix) = face_id
        .split_once('_')
        .ok_or_else(|| Error::InvalidFaceId(face_id.to_string()))?;
    if suffix.is_empty() {
        return Err(Error::InvalidFaceId(face_id.to_string()));
    }
    prefix
        .parse::<FileId>()
        .map_err(|_| Error::InvalidFaceId(face_id.to_string()))
}
