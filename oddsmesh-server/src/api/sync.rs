//! Operator sync trigger.
//!
//! `POST /sync/platform/{venue}` runs a full catalog pass for one venue,
//! then aggregation and result sync. Guarded by the operator secret.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::{Json, Router, routing::post};
use serde::Deserialize;

use super::SyncApiError;
use super::extractors::OperatorAuth;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/sync/platform/{venue}", post(sync_platform))
}

#[derive(Debug, Deserialize)]
struct SyncQuery {
    #[serde(rename = "type", default = "default_event_type")]
    event_type: String,
}

fn default_event_type() -> String {
    "sports".to_string()
}

async fn sync_platform(
    state: State<AppState>,
    _auth: OperatorAuth,
    Path(venue): Path<String>,
    Query(query): Query<SyncQuery>,
) -> Result<impl IntoResponse, SyncApiError> {
    let events = state.sync.sync_platform(&venue, &query.event_type).await?;
    Ok(Json(serde_json::json!({
        "message": format!("{venue} sync complete"),
        "events": events,
    })))
}
