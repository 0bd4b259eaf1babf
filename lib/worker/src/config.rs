use std::path::Path;
use std::time::Duration;

use facegroup_core::ClusteringConfig;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Lifecycle settings of the clustering worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Tear the worker down after this long without a call
    pub idle_timeout_ms: u64,
    /// Give up on the spawn handshake after this long
    pub spawn_timeout_ms: u64,
    pub thread_name: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ms: 30_000,
            spawn_timeout_ms: 5_000,
            thread_name: "facegroup-cluster".to_string(),
        }
    }
}

impl WorkerConfig {
    #[inline]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    #[inline]
    pub fn spawn_timeout(&self) -> Duration {
        Duration::from_millis(self.spawn_timeout_ms)
    }
}

/// Full configuration, as read from a JSON file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceGroupConfig {
    pub clustering: ClusteringConfig,
    pub worker: WorkerConfig,
}

impl FaceGroupConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(facegroup_core::Error::from)?;
        let config: Self = serde_json::from_str(&raw).map_err(facegroup_core::Error::from)?;
        config.clustering.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = FaceGroupConfig::default();
        assert_eq!(config.worker.idle_timeout(), Duration::from_secs(30));
        assert_eq!(config.clustering.distance_threshold, 0.3);
    }

    #[test]
    fn test_from_file_overrides_some_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"clustering": {{"distance_threshold": 0.25}}, "worker": {{"idle_timeout_ms": 1000}}}}"#
        )
        .unwrap();

        let config = FaceGroupConfig::from_file(file.path()).unwrap();
        assert_eq!(config.clustering.distance_threshold, 0.25);
        assert_eq!(config.worker.idle_timeout(), Duration::from_secs(1));
        assert_eq!(config.worker.thread_name, "facegroup-cluster");
    }

    #[test]
    fn test_from_file_rejects_invalid_threshold() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"clustering": {{"distance_threshold": 3.0}}}}"#).unwrap();
        assert!(FaceGroupConfig::from_file(file.path()).is_err());
    }
}
