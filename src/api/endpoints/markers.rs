//! Group persistence endpoints.
//!
//! `POST /api/markers` stores one date group per call. Two calls with the
//! same date are two groups.

use axum::extract::{Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::repository::{self, StoredGroup};
use crate::models::{parse_canonical_date, Measurement};
use crate::pipeline::storage::GroupSaveResponse;

#[derive(Deserialize)]
pub struct SaveMarkersRequest {
    pub markers: Vec<Measurement>,
    pub date: String,
}

#[derive(Deserialize)]
pub struct MarkersQuery {
    pub date: Option<String>,
}

#[derive(Serialize)]
pub struct MarkersResponse {
    pub groups: Vec<StoredGroup>,
}

/// `POST /api/markers`
pub async fn save(
    State(ctx): State<ApiContext>,
    Json(payload): Json<SaveMarkersRequest>,
) -> Result<Json<GroupSaveResponse>, ApiError> {
    let date = parse_canonical(&payload.date)?;

    let group_id = {
        let conn = ctx.db()?;
        repository::insert_marker_group(&conn, &date, &payload.markers)?
    };

    tracing::info!(
        group_id = %group_id,
        date = %payload.date,
        markers = payload.markers.len(),
        "Marker group saved"
    );

    Ok(Json(GroupSaveResponse::saved(format!(
        "Saved {} markers for {}",
        payload.markers.len(),
        payload.date
    ))))
}

/// `GET /api/markers?date=YYYY-MM-DD`
pub async fn list(
    State(ctx): State<ApiContext>,
    Query(query): Query<MarkersQuery>,
) -> Result<Json<MarkersResponse>, ApiError> {
    let date = query.date.as_deref().map(parse_canonical).transpose()?;

    let groups = {
        let conn = ctx.db()?;
        match date {
            Some(d) => repository::get_groups_by_date(&conn, &d)?,
            None => repository::get_all_groups(&conn)?,
        }
    };

    Ok(Json(MarkersResponse { groups }))
}

fn parse_canonical(raw: &str) -> Result<NaiveDate, ApiError> {
    parse_canonical_date(raw)
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid date '{raw}', expected YYYY-MM-DD")))
}
