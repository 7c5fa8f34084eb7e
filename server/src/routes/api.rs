use std::sync::Arc;

use axum::Json;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::Deserialize;
use tracing::warn;

use crate::config::HEATMAP_CACHE_CONTROL;
use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let (edges, nodes, loaded_at) = {
        let snapshot = state.edges.read().await;
        (
            snapshot.edge_count,
            snapshot.graph.node_count(),
            snapshot.loaded_at.to_rfc3339(),
        )
    };
    let observability = state.observability.snapshot();
    Json(serde_json::json!({
        "status": "ok",
        "edges": edges,
        "nodes": nodes,
        "loaded_at": loaded_at,
        "observability": {
            "heatmap_requests_total": observability.heatmap_requests_total,
            "heatmap_not_modified_total": observability.heatmap_not_modified_total,
            "heatmap_reload_failures_total": observability.heatmap_reload_failures_total,
            "route_requests_total": observability.route_requests_total,
            "route_rejected_total": observability.route_rejected_total,
        }
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct HeatmapQuery {
    #[serde(default)]
    pub nocache: bool,
}

/// Serve the pre-serialized edge list. `nocache=true` re-reads the table
/// first.
pub async fn get_heatmap(
    State(state): State<AppState>,
    Query(query): Query<HeatmapQuery>,
    headers: HeaderMap,
) -> Response {
    state.observability.record_heatmap_request();
    if query.nocache
        && let Err(e) = state.reload().await
    {
        state.observability.record_heatmap_reload_failure();
        warn!(error = %e, "heatmap reload failed, serving cached payload");
    }

    let (etag, json): (String, Arc<Bytes>) = {
        let snapshot = state.edges.read().await;
        (
            snapshot.heatmap_etag.clone(),
            Arc::clone(&snapshot.heatmap_json),
        )
    };

    if if_none_match_matches(&headers, &etag) {
        state.observability.record_heatmap_not_modified();
        return not_modified_response(HEATMAP_CACHE_CONTROL, Some(etag.as_str()));
    }

    json_bytes_response((*json).clone(), HEATMAP_CACHE_CONTROL, Some(etag.as_str()))
}

fn json_bytes_response(body: Bytes, cache_control: &'static str, etag: Option<&str>) -> Response {
    let mut response = Response::new(Body::from(body));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(cache_control),
    );
    if let Some(etag) = etag
        && let Ok(etag_header) = HeaderValue::from_str(etag)
    {
        headers.insert(header::ETAG, etag_header);
    }
    response
}

fn not_modified_response(cache_control: &'static str, etag: Option<&str>) -> Response {
    let mut response = StatusCode::NOT_MODIFIED.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(cache_control),
    );
    if let Some(etag) = etag
        && let Ok(etag_header) = HeaderValue::from_str(etag)
    {
        headers.insert(header::ETAG, etag_header);
    }
    response
}

fn normalize_etag(candidate: &str) -> &str {
    candidate.strip_prefix("W/").unwrap_or(candidate).trim()
}

fn if_none_match_matches(headers: &HeaderMap, etag: &str) -> bool {
    let Some(value) = headers.get(header::IF_NONE_MATCH) else {
        return false;
    };
    let Ok(raw) = value.to_str() else {
        return false;
    };

    raw.split(',').any(|candidate| {
        let candidate = candidate.trim();
        candidate == "*" || normalize_etag(candidate) == normalize_etag(etag)
    })
}
