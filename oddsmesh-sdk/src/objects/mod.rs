//! API object definitions.
//!
//! All timestamps are unix milliseconds unless a field name says otherwise
//! (`expires_at_sec`). Prices and amounts are decimals serialized as
//! strings, so no precision is lost in transit.

mod markets;
mod orders;

pub use markets::{
    MarketAnalytics, MarketDetail, MarketDetailEvent, MarketListResult, MarketSummary,
    PlatformOption,
};
pub use orders::{
    ContractOrderStatus, ContractOrderStatusResult, OrderDetail, OrderListItem, OrderListResult,
    PlaceOrderRequest, PlaceOrderResult, PrepareOrderRequest, PrepareOrderResult, UnfreezeRequest,
    UnfreezeResult, WithdrawInfo, WithdrawKind,
};

use serde::{Deserialize, Serialize};

/// Lifecycle status of an aggregated order.
///
/// This is the API/DTO version. The database-typed version lives in
/// `oddsmesh-core::entities` and converts into this one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingLock,
    Placed,
    Settlable,
    Settled,
    WithdrawRequested,
    Withdrawn,
    Refunded,
}

impl OrderStatus {
    /// String form used in query parameters and DB filters.
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::PendingLock => "pending_lock",
            OrderStatus::Placed => "placed",
            OrderStatus::Settlable => "settlable",
            OrderStatus::Settled => "settled",
            OrderStatus::WithdrawRequested => "withdraw_requested",
            OrderStatus::Withdrawn => "withdrawn",
            OrderStatus::Refunded => "refunded",
        }
    }
}

/// Normalized status of a venue event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Active,
    Resolved,
    Canceled,
}

impl EventStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EventStatus::Active => "active",
            EventStatus::Resolved => "resolved",
            EventStatus::Canceled => "canceled",
        }
    }
}
