use serde::{Deserialize, Serialize};

/// One risk-weighted street edge as served by `GET /heatmap`.
///
/// Both endpoints are `[lat, lon]`. Geometry consumers want `[lon, lat]`, so
/// the swap happens exactly once, when edges are ingested by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapEdge {
    pub from: [f64; 2],
    pub to: [f64; 2],
    pub risk_score: f64,
}
