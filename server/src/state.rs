use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use safestreets_shared::HeatmapEdge;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::{risk_penalty, route_attach_max_m};
use crate::edges::{EdgeRecord, load_edges_or_empty, read_edges};
use crate::graph::RoadGraph;

/// Everything derived from one read of the edge table. The heatmap payload
/// is serialized once and shared by every request.
#[derive(Debug)]
pub struct EdgeSnapshot {
    pub edge_count: usize,
    pub loaded_at: DateTime<Utc>,
    pub heatmap_json: Arc<Bytes>,
    pub heatmap_etag: String,
    pub graph: Arc<RoadGraph>,
}

impl EdgeSnapshot {
    pub fn from_records(records: &[EdgeRecord]) -> Self {
        let payload: Vec<HeatmapEdge> = records.iter().map(EdgeRecord::to_heatmap).collect();
        let heatmap_json = serde_json::to_vec(&payload)
            .map(Bytes::from)
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to serialize heatmap payload");
                Bytes::from_static(b"[]")
            });
        Self {
            edge_count: records.len(),
            loaded_at: Utc::now(),
            heatmap_etag: heatmap_etag(&heatmap_json),
            heatmap_json: Arc::new(heatmap_json),
            graph: Arc::new(RoadGraph::build(records)),
        }
    }
}

impl Default for EdgeSnapshot {
    fn default() -> Self {
        Self::from_records(&[])
    }
}

pub fn heatmap_etag(body: &[u8]) -> String {
    format!("\"heatmap-{:08x}\"", crc32fast::hash(body))
}

#[derive(Clone)]
pub struct AppState {
    pub edges: Arc<RwLock<EdgeSnapshot>>,
    pub edges_path: Arc<PathBuf>,
    pub risk_penalty: f64,
    pub route_attach_max_m: f64,
    pub observability: Arc<ObservabilityCounters>,
}

impl AppState {
    pub fn new(records: &[EdgeRecord], edges_path: impl Into<PathBuf>) -> Self {
        Self {
            edges: Arc::new(RwLock::new(EdgeSnapshot::from_records(records))),
            edges_path: Arc::new(edges_path.into()),
            risk_penalty: risk_penalty(),
            route_attach_max_m: route_attach_max_m(),
            observability: Arc::new(ObservabilityCounters::default()),
        }
    }

    /// Startup load. A missing or broken table serves an empty heatmap.
    pub async fn load(edges_path: impl Into<PathBuf>) -> Self {
        let edges_path = edges_path.into();
        let records = load_edges_or_empty(&edges_path).await;
        info!(edges = records.len(), path = %edges_path.display(), "edge table loaded");
        Self::new(&records, edges_path)
    }

    /// Re-read the table from disk. On failure the current snapshot stays.
    pub async fn reload(&self) -> Result<usize, String> {
        let records = read_edges(&self.edges_path).await?;
        let snapshot = tokio::task::spawn_blocking(move || EdgeSnapshot::from_records(&records))
            .await
            .map_err(|e| format!("rebuild task failed: {e}"))?;
        let count = snapshot.edge_count;
        *self.edges.write().await = snapshot;
        info!(edges = count, "edge table reloaded");
        Ok(count)
    }
}

#[derive(Debug, Default)]
pub struct ObservabilityCounters {
    heatmap_requests_total: AtomicU64,
    heatmap_not_modified_total: AtomicU64,
    heatmap_reload_failures_total: AtomicU64,
    route_requests_total: AtomicU64,
    route_rejected_total: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
pub struct ObservabilitySnapshot {
    pub heatmap_requests_total: u64,
    pub heatmap_not_modified_total: u64,
    pub heatmap_reload_failures_total: u64,
    pub route_requests_total: u64,
    pub route_rejected_total: u64,
}

impl ObservabilityCounters {
    pub fn snapshot(&self) -> ObservabilitySnapshot {
        ObservabilitySnapshot {
            heatmap_requests_total: self.heatmap_requests_total.load(Ordering::Relaxed),
            heatmap_not_modified_total: self.heatmap_not_modified_total.load(Ordering::Relaxed),
            heatmap_reload_failures_total: self
                .heatmap_reload_failures_total
                .load(Ordering::Relaxed),
            route_requests_total: self.route_requests_total.load(Ordering::Relaxed),
            route_rejected_total: self.route_rejected_total.load(Ordering::Relaxed),
        }
    }

    pub fn record_heatmap_request(&self) {
        self.heatmap_requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_heatmap_not_modified(&self) {
        self.heatmap_not_modified_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_heatmap_reload_failure(&self) {
        self.heatmap_reload_failures_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_route_request(&self) {
        self.route_requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_route_rejected(&self) {
        self.route_rejected_total.fetch_add(1, Ordering::Relaxed);
    }
}
