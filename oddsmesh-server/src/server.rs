//! Router assembly and the serve loop.

use crate::api;
use crate::shutdown::wait_for_termination;
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Assemble the full application router: probes plus the market, order
/// and sync surfaces.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(liveness))
        .route("/ready", get(readiness))
        .merge(api::markets::router())
        .merge(api::orders::router())
        .merge(api::sync::router())
        .with_state(state)
}

/// Liveness: the process is up.
async fn liveness() -> Response {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
    .into_response()
}

/// Readiness: the process can reach its database.
async fn readiness(State(state): State<AppState>) -> Response {
    if let Err(e) = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.db)
        .await
    {
        tracing::warn!(error = %e, "readiness probe: database unreachable");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "degraded", "database": "unreachable" })),
        )
            .into_response();
    }
    Json(json!({ "status": "ready", "database": "ok" })).into_response()
}

/// Bind and serve until a termination signal lands; in-flight requests
/// drain before the call returns.
pub async fn serve(router: Router, addr: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "HTTP API up");
    axum::serve(listener, router)
        .with_graceful_shutdown(wait_for_termination())
        .await
}
