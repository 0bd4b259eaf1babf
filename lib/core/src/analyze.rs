// Post-run cluster size histogram, logged for observability only

use ahash::AHashMap;
use serde::Serialize;

use crate::face::{ClusterId, FaceRecord};

/// Cluster size summary of one clustering run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClusterReport {
    pub total_faces: usize,
    pub total_clusters: usize,
    pub singleton_clusters: usize,
    pub more_than_5: usize,
    pub more_than_10: usize,
    pub more_than_20: usize,
    pub more_than_50: usize,
    pub more_than_100: usize,
    pub largest_cluster: usize,
}

/// Count faces per cluster and bucket the sizes. Faces without a cluster id
/// are counted in `total_faces` only.
pub fn analyze_clusters(records: &[FaceRecord]) -> ClusterReport {
    let mut sizes: AHashMap<ClusterId, usize> = AHashMap::new();
    for id in records.iter().filter_map(|r| r.cluster_id) {
        *sizes.entry(id).or_insert(0) += 1;
    }

    let mut report = ClusterReport {
        total_faces: records.len(),
        total_clusters: sizes.len(),
        ..Default::default()
    };
    for &size in sizes.values() {
        if size == 1 {
            report.singleton_clusters += 1;
        }
        if size > 5 {
            report.more_than_5 += 1;
        }
        if size > 10 {
            report.more_than_10 += 1;
        }
        if size > 20 {
            report.more_than_20 += 1;
        }
        if size > 50 {
            report.more_than_50 += 1;
        }
        if size > 100 {
            report.more_than_100 += 1;
        }
        report.largest_cluster = report.largest_cluster.max(size);
    }
    report
}

/// Analyze and log. The report is returned for tests; the engine discards it.
pub fn log_cluster_report(records: &[FaceRecord]) -> ClusterReport {
    let report = analyze_clusters(records);
    tracing::info!(
        total_faces = report.total_faces,
        total_clusters = report.total_clusters,
        singletons = report.singleton_clusters,
        more_than_5 = report.more_than_5,
        more_than_10 = report.more_than_10,
        more_than_20 = report.more_than_20,
        more_than_50 = report.more_than_50,
        more_than_100 = report.more_than_100,
        largest = report.largest_cluster,
        "cluster size histogram"
    );
    report
}
