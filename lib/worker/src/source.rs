//! Collaborators that feed a clustering run.
//!
//! Embedding extraction and file metadata live outside this crate; these
//! traits are the seams they plug into.

use facegroup_core::{CreationTimes, FaceInput, FileId};

use crate::Result;

/// Supplies every face to cluster: face id, prior cluster id and the
/// serialized embedding
pub trait EmbeddingSource: Send + Sync {
    fn face_embeddings(&self) -> Result<Vec<FaceInput>>;
}

/// Supplies creation times (microseconds since epoch) of source files
pub trait FileMetadataSource: Send + Sync {
    fn creation_times(&self, file_ids: &[FileId]) -> Result<CreationTimes>;
}

/// Fixed set of faces held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryEmbeddings {
    faces: Vec<FaceInput>,
}

impl InMemoryEmbeddings {
    pub fn new(faces: Vec<FaceInput>) -> Self {
        Self { faces }
    }

    pub fn push(&mut self, face: FaceInput) {
        self.faces.push(face);
    }

    /// Record the cluster ids from a finished run so the next run sees them
    pub fn apply_delta(&mut self, delta: &facegroup_core::AssignmentDelta) {
        for face in &mut self.faces {
            if let Some(&id) = delta.get(&face.face_id) {
                face.cluster_id = Some(id);
            }
        }
    }

    pub fn faces(&self) -> &[FaceInput] {
        &self.faces
    }
}

impl EmbeddingSource for InMemoryEmbeddings {
    fn face_embeddings(&self) -> Result<Vec<FaceInput>> {
        Ok(self.faces.clone())
    }
}

/// File creation times held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryFileMetadata {
    times: CreationTimes,
}

impl InMemoryFileMetadata {
    pub fn new(times: CreationTimes) -> Self {
        Self { times }
    }
}

impl FileMetadataSource for InMemoryFileMetadata {
    fn creation_times(&self, file_ids: &[FileId]) -> Result<CreationTimes> {
        Ok(file_ids
            .iter()
            .filter_map(|id| self.times.get(id).map(|&t| (*id, t)))
            .collect())
    }
}
