//! HTTP client for the SafeStreets backend: the heatmap edge table and the
//! three-way route search.

use futures::FutureExt;
use futures::future::BoxFuture;
use safestreets_shared::{GeoJson, HeatmapEdge, RouteKind, RouteRequest, RouteResponse};
use tracing::{debug, warn};

use crate::config;
use crate::geo::LngLat;
use crate::routes::RouteSet;
use crate::segments::EdgeSource;

const BODY_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("safestreets-client/0.1")
            .timeout(config::http_timeout())
            .connect_timeout(config::connect_timeout())
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to build configured HTTP client, using defaults");
                reqwest::Client::new()
            });
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(config::api_url())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn fetch_heatmap(&self) -> Result<Vec<HeatmapEdge>, String> {
        let resp = self
            .client
            .get(format!("{}/heatmap", self.base_url))
            .send()
            .await
            .map_err(|e| format!("fetch error: {e}"))?;
        let bytes = read_success_body(resp).await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            format!("parse error: {e}; body preview: {}", preview(&bytes))
        })
    }

    pub async fn fetch_route_response(
        &self,
        origin: LngLat,
        destination: LngLat,
    ) -> Result<RouteResponse, String> {
        let request = RouteRequest {
            from: [origin.lat, origin.lng],
            to: [destination.lat, destination.lng],
        };
        let resp = self
            .client
            .post(format!("{}/route", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("fetch error: {e}"))?;
        let bytes = read_success_body(resp).await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            format!("parse error: {e}; body preview: {}", preview(&bytes))
        })
    }

    /// Never fails: any error, or a response with no usable path, yields a
    /// straight-line placeholder for every route kind.
    pub async fn fetch_routes(&self, origin: LngLat, destination: LngLat) -> RouteSet {
        match self.fetch_route_response(origin, destination).await {
            Ok(response) => {
                let set = route_set_from_response(&response);
                if set.is_empty() {
                    warn!("backend returned no usable route, drawing fallback");
                    fallback_route_set(origin, destination)
                } else {
                    set
                }
            }
            Err(e) => {
                warn!(error = %e, "route request failed, drawing fallback");
                fallback_route_set(origin, destination)
            }
        }
    }
}

impl EdgeSource for HttpBackend {
    fn fetch_edges(&self) -> BoxFuture<'_, Result<Vec<HeatmapEdge>, String>> {
        self.fetch_heatmap().boxed()
    }
}

async fn read_success_body(resp: reqwest::Response) -> Result<bytes::Bytes, String> {
    let status = resp.status();
    let bytes = resp
        .bytes()
        .await
        .map_err(|e| format!("failed to read response body: {e}"))?;
    if !status.is_success() {
        return Err(format!("HTTP {status}; body preview: {}", preview(&bytes)));
    }
    Ok(bytes)
}

fn preview(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .chars()
        .take(BODY_PREVIEW_CHARS)
        .collect()
}

/// Convert `[lat, lon]` paths into `[lon, lat]` LineStrings. Paths with
/// fewer than two valid vertices are dropped.
pub fn route_set_from_response(response: &RouteResponse) -> RouteSet {
    let mut set = RouteSet::default();
    for kind in RouteKind::ALL {
        let positions: Vec<_> = response
            .path(kind)
            .unwrap_or_default()
            .iter()
            .filter_map(|pair| LngLat::from_lat_lon(*pair))
            .map(LngLat::to_position)
            .collect();
        if positions.len() < 2 {
            debug!(kind = kind.as_str(), "no drawable path");
            continue;
        }
        set.set_geometry(kind, Some(GeoJson::line_string(positions)));
    }
    set.active = [RouteKind::Safest, RouteKind::Weighted, RouteKind::Fastest]
        .into_iter()
        .find(|kind| set.has_geometry(*kind))
        .unwrap_or_default();
    set
}

pub fn fallback_route_set(origin: LngLat, destination: LngLat) -> RouteSet {
    let line = || {
        Some(GeoJson::line_string(vec![
            origin.to_position(),
            destination.to_position(),
        ]))
    };
    RouteSet {
        fastest: line(),
        safest: line(),
        weighted: line(),
        active: RouteKind::Safest,
    }
}
