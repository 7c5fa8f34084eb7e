use serde::{Deserialize, Serialize};

use crate::geometry::GeoJson;
use crate::route::RouteKind;

/// Payload of `draw-routes`: finished geometries, each optional, plus the
/// route that should drive the camera and endpoint marker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrawRoutesDetail {
    #[serde(default)]
    pub fastest: Option<GeoJson>,
    #[serde(default)]
    pub safest: Option<GeoJson>,
    #[serde(default)]
    pub weighted: Option<GeoJson>,
    #[serde(default)]
    pub active: Option<RouteKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LngLatDetail {
    pub lng: f64,
    pub lat: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitRoutePointsDetail {
    pub origin: LngLatDetail,
    pub destination: LngLatDetail,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_routes_detail_accepts_partial_payloads() {
        let detail: DrawRoutesDetail = serde_json::from_str(
            r#"{"safest": {"type": "LineString", "coordinates": [[-73.99, 40.75]]}, "active": "safest"}"#,
        )
        .expect("detail should parse");
        assert!(detail.fastest.is_none());
        assert!(detail.safest.is_some());
        assert_eq!(detail.active, Some(RouteKind::Safest));
    }
}
