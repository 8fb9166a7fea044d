//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::repository;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub markers: i64,
}

/// `GET /api/health`
pub async fn check(State(ctx): State<ApiContext>) -> Result<Json<HealthResponse>, ApiError> {
    let markers = {
        let conn = ctx.db()?;
        repository::count_markers(&conn)?
    };

    Ok(Json(HealthResponse {
        status: "ok",
        version: crate::config::APP_VERSION,
        markers,
    }))
}
