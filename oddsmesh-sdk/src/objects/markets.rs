//! Market list and detail objects (`GET /api/markets`, `GET /api/markets/{id}`).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::EventStatus;

/// One aggregated market in the list view — one row per canonical event,
/// with summary odds across all linked venues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSummary {
    pub canonical_id: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_team: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub away_team: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub status: EventStatus,
    /// Scheduled match time, unix millis.
    pub match_time: i64,
    pub platform_count: usize,
    pub best_price: Decimal,
    pub best_price_platform: String,
    pub best_price_option: String,
    /// `(max - min) / max * 100` across venues for the best-priced option.
    pub save_percent: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub win_odds: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draw_odds: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lose_odds: Option<Decimal>,
    /// event_uuid of the first linked venue event, for clients that address
    /// markets by venue event instead of canonical id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_uuid: Option<String>,
}

/// Paged market list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketListResult {
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub items: Vec<MarketSummary>,
}

/// Event header of the market detail view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDetailEvent {
    pub canonical_id: i64,
    pub title: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub status: EventStatus,
    pub start_time: i64,
    pub end_time: i64,
}

/// One venue-side price quote in the detail view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformOption {
    pub platform_id: i64,
    pub platform_name: String,
    pub option_name: String,
    pub price: Decimal,
}

/// Cross-venue price analytics for one canonical market.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketAnalytics {
    pub best_price: Decimal,
    pub best_price_platform: String,
    pub best_price_option: String,
    pub platform_count: usize,
    pub option_count: usize,
    pub price_min: Decimal,
    pub price_max: Decimal,
    /// `(max - min) / max * 100`.
    pub price_spread_pct: Decimal,
}

/// Full market detail (`GET /api/markets/{id}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDetail {
    pub event: MarketDetailEvent,
    pub platform_options: Vec<PlatformOption>,
    pub analytics: MarketAnalytics,
}
