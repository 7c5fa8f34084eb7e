use axum::Router;
use axum::routing::{get, post};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;

use crate::routes;
use crate::state::AppState;

pub(crate) fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/heatmap", get(routes::api::get_heatmap))
        .route("/route", post(routes::route::post_route))
        .route("/api/health", get(routes::api::health))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
