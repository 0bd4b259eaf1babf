//! Wire format for face embeddings.
//!
//! The upstream extractor stores every embedding as a protobuf message with a
//! single packed `repeated float` field, so the payload carries its own length
//! prefix. Decoding happens inside the clustering worker; a payload that fails
//! to decode fails the whole run.

use bytes::Bytes;
use prost::Message;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// `message EVector { repeated float values = 1; }`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EVector {
    #[prost(float, repeated, tag = "1")]
    pub values: Vec<f32>,
}

/// A face embedding as it arrives from the embedding provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceInput {
    pub face_id: String,
    pub cluster_id: Option<i64>,
    /// Serialized [`EVector`]
    pub embedding: Bytes,
}

impl FaceInput {
    pub fn new(face_id: impl Into<String>, cluster_id: Option<i64>, embedding: Bytes) -> Self {
        Self {
            face_id: face_id.into(),
            cluster_id,
            embedding,
        }
    }

    /// Build an input from raw floats, encoding them to the wire format
    pub fn from_values(face_id: impl Into<String>, cluster_id: Option<i64>, values: &[f32]) -> Self {
        Self::new(face_id, cluster_id, encode_embedding(values))
    }
}

#[inline]
#[must_use]
pub fn encode_embedding(values: &[f32]) -> Bytes {
    let msg = EVector {
        values: values.to_vec(),
    };
    Bytes::from(msg.encode_to_vec())
}

/// Decode one serialized embedding. An empty vector is rejected since it can
/// never take part in a distance computation.
pub fn decode_embedding(face_id: &str, payload: &[u8]) -> Result<Vec<f32>> {
    let msg = EVector::decode(payload).map_err(|e| Error::InvalidEmbedding {
        face_id: face_id.to_string(),
        reason: e.to_string(),
    })?;
    if msg.values.is_empty() {
        return Err(Error::InvalidEmbedding {
            face_id: face_id.to_string(),
            reason: "embedding has no values".to_string(),
        });
    }
    Ok(msg.values)
}
