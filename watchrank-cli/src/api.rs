/// HTTP surface: the movie ratings endpoint plus a graph view and health probe.
use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde_json::json;

use crate::service::{RatingService, ServiceError};

/// Shared caches may hold a response for an hour and serve it stale for two more.
pub const CACHE_CONTROL_VALUE: &str = "public, s-maxage=3600, stale-while-revalidate=7200";

const SCORE_FAILURE_MESSAGE: &str = "Failed to calculate movie scores";

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RatingService>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/movies", get(get_movies))
        .route("/api/movies/graph", get(get_movie_graph))
        .route("/health", get(handle_health))
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: &str, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, create_router(state)).await
}

/// GET /api/movies: every watch event with its scores, in history order.
async fn get_movies(State(state): State<AppState>) -> Response {
    match state.service.ratings().await {
        Ok(snapshot) => ([(header::CACHE_CONTROL, CACHE_CONTROL_VALUE)], Json(&snapshot.movies)).into_response(),
        Err(e) => score_failure(e),
    }
}

/// GET /api/movies/graph: Bradley-Terry ratings and the direct comparison edges.
async fn get_movie_graph(State(state): State<AppState>) -> Response {
    match state.service.ratings().await {
        Ok(snapshot) => ([(header::CACHE_CONTROL, CACHE_CONTROL_VALUE)], Json(&snapshot.graph)).into_response(),
        Err(e) => score_failure(e),
    }
}

async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    let cached = state.service.cache().is_valid(Instant::now());
    Json(json!({ "status": "ok", "cached": cached }))
}

fn score_failure(err: ServiceError) -> Response {
    tracing::error!(error = %err, "failed to calculate movie scores");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": SCORE_FAILURE_MESSAGE })),
    )
        .into_response()
}
