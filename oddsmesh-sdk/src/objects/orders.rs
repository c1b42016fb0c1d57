//! Order lifecycle objects (`/api/orders/*`).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::OrderStatus;

/// `POST /api/orders/prepare` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareOrderRequest {
    /// Hex betId assigned by the escrow contract (64 hex chars).
    pub contract_order_id: String,
    /// Venue event uuid, or a numeric canonical id as a string.
    pub event_uuid: String,
    pub bet_option: String,
}

/// `POST /api/orders/prepare` response: the odds quote the user signs over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareOrderResult {
    /// Best live price, clamped to [0.01, 0.99].
    pub locked_odds: Decimal,
    /// The exact string to `personal_sign`.
    pub message_to_sign: String,
    /// Unix seconds; `place` rejects the signature after this.
    pub expires_at_sec: i64,
}

/// `POST /api/orders/place` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    pub contract_order_id: String,
    pub event_uuid: String,
    pub bet_option: String,
    /// Optional cross-check against the on-chain deposit amount.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    /// Client-side clamped odds; the server re-clamps regardless.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_odds: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_to_sign: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// `POST /api/orders/place` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOrderResult {
    pub order_uuid: String,
    pub platform_order_id: String,
    pub platform_id: i64,
    pub status: OrderStatus,
}

/// One row of `GET /api/orders`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderListItem {
    pub order_uuid: String,
    pub user_wallet: String,
    pub event_title: String,
    pub event_id: i64,
    pub platform_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_order_id: Option<String>,
    pub bet_option: String,
    pub bet_amount: Decimal,
    pub locked_odds: Decimal,
    pub status: OrderStatus,
    pub created_at: i64,
}

/// Paged order list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderListResult {
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub items: Vec<OrderListItem>,
}

/// `GET /api/orders/{order_uuid}` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetail {
    pub order_uuid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_order_id: Option<String>,
    pub user_wallet: String,
    pub event_id: i64,
    pub event_uuid: String,
    pub event_title: String,
    pub platform_id: i64,
    pub bet_option: String,
    pub bet_amount: Decimal,
    pub fund_currency: String,
    pub locked_odds: Decimal,
    pub expected_profit: Decimal,
    pub actual_profit: Decimal,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fund_lock_tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement_tx_hash: Option<String>,
    pub start_time: i64,
    pub end_time: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// How a settled order is paid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawKind {
    /// The user signs the withdraw transaction themselves.
    Chain,
    /// The backend computes payout minus fee and settles off-chain.
    Kalshi,
}

/// `GET /api/orders/{order_uuid}/withdraw-info` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawInfo {
    pub order_uuid: String,
    pub user_wallet: String,
    #[serde(rename = "type")]
    pub kind: WithdrawKind,
    pub amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    pub message: String,
}

/// `POST /api/orders/unfreeze` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnfreezeRequest {
    pub contract_order_id: String,
    /// Optional; when present it must match the deposit wallet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet: Option<String>,
}

/// `POST /api/orders/unfreeze` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnfreezeResult {
    pub tx_hash: String,
}

/// Coarse status of a deposit as seen by the frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractOrderStatus {
    /// Deposited, order can still be placed or unfrozen.
    Unprocessed,
    Placed,
    Refunded,
    NotFound,
}

/// `GET /api/orders/contract-order-status` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractOrderStatusResult {
    pub status: ContractOrderStatus,
}
