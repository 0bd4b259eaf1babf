use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Cosine distance below which a face joins its nearest neighbor's cluster
pub const DEFAULT_DISTANCE_THRESHOLD: f32 = 0.3;

/// Configuration for a clustering run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    pub distance_threshold: f32,
    /// Emit a progress line every this many faces (0 disables)
    pub progress_log_interval: usize,
    /// When set, every embedding in a batch must have this dimension
    pub expected_dim: Option<usize>,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            distance_threshold: DEFAULT_DISTANCE_THRESHOLD,
            progress_log_interval: 250,
            expected_dim: None,
        }
    }
}

impl ClusteringConfig {
    pub fn validate(&self) -> Result<()> {
        // cosine distance of unit vectors lives in [0, 2]
        if !(self.distance_threshold > 0.0 && self.distance_threshold <= 2.0) {
            return Err(Error::InvalidConfig(format!(
                "distance_threshold must be in (0, 2], got {}",
                self.distance_threshold
            )));
        }
        if self.expected_dim == Some(0) {
            return Err(Error::InvalidConfig("expected_dim must be positive".to_string()));
        }
        Ok(())
    }
}
