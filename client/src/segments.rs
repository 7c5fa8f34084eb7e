use std::sync::Arc;

use futures::future::BoxFuture;
use safestreets_shared::HeatmapEdge;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::geo::LngLat;

/// A street edge with its risk weight, already in `[lon, lat]` order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskEdge {
    pub from: LngLat,
    pub to: LngLat,
    pub risk: f64,
}

impl RiskEdge {
    /// Normalize one backend edge. Malformed coordinates or a non-numeric
    /// risk drop the edge; the risk is clamped to `[0, 1]`.
    pub fn from_wire(edge: &HeatmapEdge) -> Option<Self> {
        let from = LngLat::from_lat_lon(edge.from)?;
        let to = LngLat::from_lat_lon(edge.to)?;
        if !edge.risk_score.is_finite() {
            return None;
        }
        Some(Self {
            from,
            to,
            risk: edge.risk_score.clamp(0.0, 1.0),
        })
    }
}

pub fn ingest(wire: &[HeatmapEdge]) -> Vec<RiskEdge> {
    let edges: Vec<RiskEdge> = wire.iter().filter_map(RiskEdge::from_wire).collect();
    let skipped = wire.len() - edges.len();
    if skipped > 0 {
        debug!(skipped, "skipped malformed risk edges");
    }
    edges
}

/// Anything that can produce the raw heatmap payload.
pub trait EdgeSource: Send + Sync {
    fn fetch_edges(&self) -> BoxFuture<'_, Result<Vec<HeatmapEdge>, String>>;
}

/// Holds the risk edges for the lifetime of the process. The first `load`
/// starts the fetch; callers arriving while it is in flight wait on the same
/// fetch, and every later caller gets the memoized result.
#[derive(Debug, Default)]
pub struct SegmentCache {
    edges: OnceCell<Arc<[RiskEdge]>>,
}

impl SegmentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Never fails: a transport or parse error resolves to an empty list.
    pub async fn load<S>(&self, source: &S) -> Arc<[RiskEdge]>
    where
        S: EdgeSource + ?Sized,
    {
        let edges = self
            .edges
            .get_or_init(|| async {
                match source.fetch_edges().await {
                    Ok(wire) => {
                        let edges = ingest(&wire);
                        info!(count = edges.len(), "loaded risk edges");
                        Arc::from(edges)
                    }
                    Err(e) => {
                        warn!(error = %e, "failed to load risk edges, heat layer will be empty");
                        Arc::from(Vec::<RiskEdge>::new())
                    }
                }
            })
            .await;
        Arc::clone(edges)
    }

    pub fn get(&self) -> Option<Arc<[RiskEdge]>> {
        self.edges.get().cloned()
    }
}
