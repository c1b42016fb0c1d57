//! Order endpoints.
//!
//! - `POST /api/orders/prepare` – quote best odds + message to sign
//! - `POST /api/orders/place` – verify signature, route, place, persist
//! - `GET  /api/orders` – orders by wallet
//! - `GET  /api/orders/{order_uuid}` – order detail
//! - `GET  /api/orders/{order_uuid}/withdraw-info` – payout parameters
//! - `POST /api/orders/{order_uuid}/withdraw` – trigger withdraw
//! - `POST /api/orders/unfreeze` – release an unused deposit
//! - `GET  /api/orders/contract-order-status` – deposit status

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::{
    Json, Router,
    routing::{get, post},
};
use serde::Deserialize;

use oddsmesh_core::entities::OrderStatus;
use oddsmesh_core::processors::order_service::OrderError;
use oddsmesh_sdk::objects::{
    ContractOrderStatusResult, PlaceOrderRequest, PrepareOrderRequest, UnfreezeRequest,
    UnfreezeResult,
};

use super::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/orders", get(list_orders))
        .route("/api/orders/prepare", post(prepare_order))
        .route("/api/orders/place", post(place_order))
        .route("/api/orders/unfreeze", post(request_unfreeze))
        .route(
            "/api/orders/contract-order-status",
            get(contract_order_status),
        )
        .route("/api/orders/{order_uuid}", get(order_detail))
        .route(
            "/api/orders/{order_uuid}/withdraw-info",
            get(withdraw_info),
        )
        .route(
            "/api/orders/{order_uuid}/withdraw",
            post(request_withdraw),
        )
}

async fn prepare_order(
    state: State<AppState>,
    Json(req): Json<PrepareOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state.orders.prepare(&req).await?;
    Ok(Json(result))
}

async fn place_order(
    state: State<AppState>,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state.orders.place(&req).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
struct ListOrdersQuery {
    wallet: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default = "default_page")]
    page: i64,
    #[serde(default = "default_page_size")]
    page_size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

async fn list_orders(
    state: State<AppState>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<impl IntoResponse, ApiError> {
    if query.wallet.is_empty() {
        return Err(ApiError(OrderError::Validation(
            "wallet is required".to_string(),
        )));
    }
    let status = match query.status.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(parse_order_status(raw)?),
    };
    let result = state
        .orders
        .list_orders(&query.wallet, status, query.page, query.page_size)
        .await?;
    Ok(Json(result))
}

async fn order_detail(
    state: State<AppState>,
    Path(order_uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = state.orders.order_detail(&order_uuid).await?;
    Ok(Json(detail))
}

async fn withdraw_info(
    state: State<AppState>,
    Path(order_uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let info = state.orders.get_withdraw_info(&order_uuid).await?;
    Ok(Json(info))
}

async fn request_withdraw(
    state: State<AppState>,
    Path(order_uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.orders.request_withdraw(&order_uuid).await?;
    Ok(Json(
        serde_json::json!({ "message": "withdraw request recorded" }),
    ))
}

async fn request_unfreeze(
    state: State<AppState>,
    Json(req): Json<UnfreezeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tx_hash = state
        .orders
        .request_unfreeze(&req.contract_order_id, req.wallet.as_deref())
        .await?;
    Ok(Json(UnfreezeResult { tx_hash }))
}

#[derive(Debug, Deserialize)]
struct ContractOrderStatusQuery {
    contract_order_id: String,
}

async fn contract_order_status(
    state: State<AppState>,
    Query(query): Query<ContractOrderStatusQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let status = state
        .orders
        .contract_order_status(&query.contract_order_id)
        .await?;
    Ok(Json(ContractOrderStatusResult { status }))
}

fn parse_order_status(raw: &str) -> Result<OrderStatus, ApiError> {
    let status = match raw {
        "pending_lock" => OrderStatus::PendingLock,
        "placed" => OrderStatus::Placed,
        "settlable" => OrderStatus::Settlable,
        "settled" => OrderStatus::Settled,
        "withdraw_requested" => OrderStatus::WithdrawRequested,
        "withdrawn" => OrderStatus::Withdrawn,
        "refunded" => OrderStatus::Refunded,
        other => {
            return Err(ApiError(OrderError::Validation(format!(
                "unknown order status {other:?}"
            ))));
        }
    };
    Ok(status)
}
