use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use safestreets_shared::RouteRequest;
use tracing::{debug, warn};

use crate::state::AppState;

pub const ROUTE_BODY_ERROR: &str = "Expected JSON body with fields 'from' and 'to'";

fn valid_point(point: [f64; 2]) -> bool {
    point[0].is_finite()
        && point[1].is_finite()
        && (-90.0..=90.0).contains(&point[0])
        && (-180.0..=180.0).contains(&point[1])
}

/// Accepts any body; anything but `{"from":[lat,lon],"to":[lat,lon]}` is a
/// 400 with a fixed message.
pub fn parse_route_request(body: &[u8]) -> Option<RouteRequest> {
    let request: RouteRequest = serde_json::from_slice(body).ok()?;
    (valid_point(request.from) && valid_point(request.to)).then_some(request)
}

pub async fn post_route(State(state): State<AppState>, body: Bytes) -> Response {
    state.observability.record_route_request();
    let Some(request) = parse_route_request(&body) else {
        state.observability.record_route_rejected();
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": ROUTE_BODY_ERROR })),
        )
            .into_response();
    };

    let graph = Arc::clone(&state.edges.read().await.graph);
    let penalty = state.risk_penalty;
    let attach_max_m = state.route_attach_max_m;
    let result = tokio::task::spawn_blocking(move || {
        graph.route(request.from, request.to, penalty, attach_max_m)
    })
    .await;

    match result {
        Ok(response) => {
            debug!(empty = response.is_empty(), "route computed");
            Json(response).into_response()
        }
        Err(e) => {
            warn!(error = %e, "route computation panicked");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "route computation failed" })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, header};
    use safestreets_shared::RouteResponse;
    use tower::ServiceExt;

    use super::*;
    use crate::graph::tests::{A, B, D, diamond};

    async fn post(state: AppState, body: &'static str) -> (StatusCode, Bytes) {
        let app = crate::app::build_app(state);
        let request = Request::builder()
            .method("POST")
            .uri("/route")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .expect("build request");
        let response = app.oneshot(request).await.expect("route response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        (status, bytes)
    }

    #[test]
    fn request_validation() {
        assert!(parse_route_request(br#"{"from":[40.75,-73.99],"to":[40.76,-73.98]}"#).is_some());
        assert!(parse_route_request(br#"{"from":[40.75,-73.99]}"#).is_none());
        assert!(parse_route_request(br#"{"from":[40.75],"to":[40.76,-73.98]}"#).is_none());
        assert!(parse_route_request(br#"{"from":[-173.99,40.75],"to":[40.76,-73.98]}"#).is_none());
        assert!(parse_route_request(br#"{"from":[40.75,-73.99],"to":[40.76,-200.0]}"#).is_none());
        assert!(parse_route_request(b"").is_none());
    }

    #[tokio::test]
    async fn missing_fields_get_fixed_error() {
        let state = AppState::new(&diamond(), "/nonexistent/edges.json");
        let (status, body) = post(state.clone(), r#"{"from":[40.75,-73.99]}"#).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let json: serde_json::Value = serde_json::from_slice(&body).expect("error body");
        assert_eq!(json["error"], ROUTE_BODY_ERROR);
        assert_eq!(state.observability.snapshot().route_rejected_total, 1);
    }

    #[tokio::test]
    async fn returns_three_named_paths() {
        let state = temp_env::with_var("RISK_PENALTY", Some("4"), || {
            AppState::new(&diamond(), "/nonexistent/edges.json")
        });
        let (status, body) = post(state, r#"{"from":[40.75,-73.99],"to":[40.76,-73.98]}"#).await;

        assert_eq!(status, StatusCode::OK);
        let response: RouteResponse = serde_json::from_slice(&body).expect("route body");
        assert_eq!(response.fastest, Some(vec![A, B]));
        assert_eq!(response.safest, Some(vec![A, D, B]));
        assert!(response.weighted.is_some());
    }

    #[tokio::test]
    async fn empty_graph_returns_nulls() {
        let state = AppState::new(&[], "/nonexistent/edges.json");
        let (status, body) = post(state, r#"{"from":[40.75,-73.99],"to":[40.76,-73.98]}"#).await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).expect("route body");
        assert!(json["fastest"].is_null());
        assert!(json["safest"].is_null());
        assert!(json["weighted"].is_null());
    }
}
