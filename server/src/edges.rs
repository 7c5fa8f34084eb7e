//! The risk edge table: one row per street segment, endpoints in `lat/lon`.

use std::path::Path;

use safestreets_shared::HeatmapEdge;
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct EdgeRecord {
    pub start_lat: f64,
    pub start_lon: f64,
    pub end_lat: f64,
    pub end_lon: f64,
    pub risk_score: f64,
}

impl EdgeRecord {
    pub fn is_valid(&self) -> bool {
        let lat_ok = |lat: f64| lat.is_finite() && (-90.0..=90.0).contains(&lat);
        let lon_ok = |lon: f64| lon.is_finite() && (-180.0..=180.0).contains(&lon);
        lat_ok(self.start_lat)
            && lat_ok(self.end_lat)
            && lon_ok(self.start_lon)
            && lon_ok(self.end_lon)
            && self.risk_score.is_finite()
    }

    pub fn start(&self) -> [f64; 2] {
        [self.start_lat, self.start_lon]
    }

    pub fn end(&self) -> [f64; 2] {
        [self.end_lat, self.end_lon]
    }

    pub fn to_heatmap(&self) -> HeatmapEdge {
        HeatmapEdge {
            from: self.start(),
            to: self.end(),
            risk_score: self.risk_score,
        }
    }
}

pub fn parse_edges(bytes: &[u8]) -> Result<Vec<EdgeRecord>, String> {
    let records: Vec<EdgeRecord> =
        serde_json::from_slice(bytes).map_err(|e| format!("parse error: {e}"))?;
    let total = records.len();
    let valid: Vec<EdgeRecord> = records.into_iter().filter(EdgeRecord::is_valid).collect();
    if valid.len() < total {
        warn!(dropped = total - valid.len(), "dropped invalid edge rows");
    }
    Ok(valid)
}

pub async fn read_edges(path: &Path) -> Result<Vec<EdgeRecord>, String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    parse_edges(&bytes)
}

/// Read the table, degrading to an empty one on any error.
pub async fn load_edges_or_empty(path: &Path) -> Vec<EdgeRecord> {
    match read_edges(path).await {
        Ok(records) => records,
        Err(e) => {
            warn!(error = %e, path = %path.display(), "edge table unavailable, serving empty heatmap");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_map_to_lat_lon_heatmap_edges() {
        let records = parse_edges(
            br#"[{"start_lat":40.0,"start_lon":-73.0,"end_lat":40.01,"end_lon":-73.0,"risk_score":0.5}]"#,
        )
        .expect("table parses");
        assert_eq!(
            records[0].to_heatmap(),
            HeatmapEdge {
                from: [40.0, -73.0],
                to: [40.01, -73.0],
                risk_score: 0.5
            }
        );
    }

    #[test]
    fn out_of_range_rows_are_dropped() {
        let records = parse_edges(
            br#"[
                {"start_lat":140.0,"start_lon":-73.0,"end_lat":40.01,"end_lon":-73.0,"risk_score":0.5},
                {"start_lat":40.0,"start_lon":-73.0,"end_lat":40.01,"end_lon":-73.0,"risk_score":0.1}
            ]"#,
        )
        .expect("table parses");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].risk_score, 0.1);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_edges(b"not json").is_err());
    }

    #[tokio::test]
    async fn missing_file_yields_empty_table() {
        let records = load_edges_or_empty(Path::new("/nonexistent/edges.json")).await;
        assert!(records.is_empty());
    }
}
