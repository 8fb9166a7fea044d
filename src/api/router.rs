//! Persistence API router. Routes are nested under `/api/`.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::types::ApiContext;

/// Multipart framing on top of the chunk bytes.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn api_router(ctx: ApiContext) -> Router {
    let body_limit = ctx.max_chunk_bytes + MULTIPART_OVERHEAD;

    let api = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/uploads/chunk", post(endpoints::uploads::receive_chunk))
        .route("/uploads/:file_name", get(endpoints::uploads::assembled))
        .route(
            "/markers",
            post(endpoints::markers::save).get(endpoints::markers::list),
        )
        .with_state(ctx);

    Router::new()
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
