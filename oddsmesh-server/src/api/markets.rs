//! Market read endpoints.
//!
//! - `GET /api/markets` – paged canonical list with summary odds
//! - `GET /api/markets/{id}` – detail by canonical id or event_uuid

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::{Json, Router, routing::get};
use serde::Deserialize;

use oddsmesh_core::entities::EventStatus;
use oddsmesh_core::processors::order_service::OrderError;

use super::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/markets", get(list_markets))
        .route("/api/markets/{id}", get(market_detail))
}

#[derive(Debug, Deserialize)]
struct ListMarketsQuery {
    #[serde(rename = "type", default = "default_event_type")]
    event_type: String,
    #[serde(default = "default_status")]
    status: String,
    #[serde(default = "default_page")]
    page: i64,
    #[serde(default = "default_page_size")]
    page_size: i64,
}

fn default_event_type() -> String {
    "sports".to_string()
}

fn default_status() -> String {
    "active".to_string()
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

async fn list_markets(
    state: State<AppState>,
    Query(query): Query<ListMarketsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let status = parse_status(&query.status)?;
    let result = state
        .markets
        .list_markets(&query.event_type, status, query.page, query.page_size)
        .await?;
    Ok(Json(result))
}

async fn market_detail(
    state: State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = state.markets.market_detail(&id).await?;
    Ok(Json(detail))
}

/// Empty string means "no filter".
fn parse_status(status: &str) -> Result<Option<EventStatus>, ApiError> {
    match status {
        "" => Ok(None),
        "active" => Ok(Some(EventStatus::Active)),
        "resolved" => Ok(Some(EventStatus::Resolved)),
        "canceled" => Ok(Some(EventStatus::Canceled)),
        other => Err(ApiError(OrderError::Validation(format!(
            "unknown status filter {other:?}"
        )))),
    }
}
