//! Venue adapters.
//!
//! One adapter per venue, polymorphic over the capability set
//! {catalog, live-odds, result, trading}. Missing capabilities are simply
//! absent from the registry; callers see a typed lookup miss, never a
//! silent no-op.

pub mod kalshi;
pub mod polymarket;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal::RoundingStrategy;
use rust_decimal::prelude::ToPrimitive;
use std::collections::HashMap;
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};
use tokio::sync::mpsc;

use crate::config::VenueConfig;
use crate::entities::EventStatus;
use crate::entities::event::NewEvent;
use crate::entities::odds::NewOddsRow;

/// Stable venue ids as seeded in the venues table.
pub const VENUE_POLYMARKET: i64 = 1;
pub const VENUE_KALSHI: i64 = 2;

/// Errors surfaced by venue adapters. Platform-specific failures are not
/// wrapped further up the stack.
#[derive(Debug, thiserror::Error)]
pub enum VenueError {
    #[error("venue request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("venue API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("venue response parse error: {0}")]
    Parse(String),
    #[error("venue auth error: {0}")]
    Auth(String),
    #[error("venue capability not configured: {0}")]
    NotConfigured(&'static str),
    #[error("invalid order: {0}")]
    InvalidOrder(String),
    #[error("sync consumer stopped")]
    Canceled,
}

/// A venue event as fetched, before normalization. Status and timestamps
/// keep the venue's own spelling; `normalize` maps them.
#[derive(Debug, Clone)]
pub struct RawEvent {
    pub venue_event_id: String,
    pub title: String,
    pub venue_status: String,
    pub open_time: String,
    pub close_time: String,
    pub quotes: Vec<RawQuote>,
    pub result_source: Option<String>,
}

/// One option/price pair as the venue spells it.
#[derive(Debug, Clone)]
pub struct RawQuote {
    pub option: String,
    pub price: String,
}

/// Output of `normalize`: events and odds rows ready for the store.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub events: Vec<NewEvent>,
    pub odds: Vec<NewOddsRow>,
}

/// A live price row used on the prepare/place hot path and by the ticker.
#[derive(Debug, Clone)]
pub struct LiveOddsRow {
    pub option_name: String,
    pub price: Decimal,
}

/// A synced outcome for a finished event.
#[derive(Debug, Clone)]
pub struct EventOutcome {
    pub result: String,
    pub status: EventStatus,
}

/// An order as handed to a venue. `amount` is USD for fiat venues, the
/// native deposit amount otherwise; `locked_odds` is already clamped.
#[derive(Debug, Clone)]
pub struct VenuePlaceOrder {
    pub venue_event_id: String,
    pub bet_option: String,
    pub amount: Decimal,
    pub locked_odds: Decimal,
}

/// Catalog capability: enumerate a venue's events and normalize them.
#[async_trait]
pub trait VenueCatalog: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether [`fetch_events_streaming`](Self::fetch_events_streaming)
    /// emits multiple batches. Streaming venues are drained through the
    /// bounded sync channel instead of one full fetch.
    fn supports_streaming(&self) -> bool {
        false
    }

    /// One finite fetch of the venue's catalog. Not restartable mid-run.
    async fn fetch_events(&self, event_type: &str) -> Result<Vec<RawEvent>, VenueError>;

    /// Streaming variant: emit batches as they are fetched. Batches are
    /// mutually deduplicated by venue event id within one run (first
    /// occurrence wins). Returns the number of events emitted.
    async fn fetch_events_streaming(
        &self,
        event_type: &str,
        batches: mpsc::Sender<Vec<RawEvent>>,
    ) -> Result<usize, VenueError> {
        let events = self.fetch_events(event_type).await?;
        let total = events.len();
        if !events.is_empty() && batches.send(events).await.is_err() {
            return Err(VenueError::Canceled);
        }
        Ok(total)
    }

    /// Pure conversion of raw events into store rows. Clamps strings,
    /// parses venue timestamps (falling back to "now"), maps status.
    fn normalize(&self, raw: &[RawEvent], venue_id: i64) -> NormalizedBatch;
}

/// Live-odds capability, used by the ticker and on the order hot path.
#[async_trait]
pub trait LiveOddsSource: Send + Sync {
    async fn fetch_live_odds(&self, venue_event_id: &str) -> Result<Vec<LiveOddsRow>, VenueError>;
}

/// Result capability, used by result sync once an event has ended.
#[async_trait]
pub trait ResultSource: Send + Sync {
    async fn fetch_result(&self, venue_event_id: &str)
    -> Result<Option<EventOutcome>, VenueError>;
}

/// Trading capability: authenticate and place one venue-side order.
#[async_trait]
pub trait TradingVenue: Send + Sync {
    /// True when the venue prices in USD and deposits must pass through
    /// fiat conversion first.
    fn fiat_denominated(&self) -> bool {
        false
    }

    /// Returns the venue-assigned order id.
    async fn place_order(&self, req: &VenuePlaceOrder) -> Result<String, VenueError>;
}

/// Adapter registry keyed by venue id (and by name for catalogs).
#[derive(Default)]
pub struct AdapterRegistry {
    catalogs: HashMap<String, Arc<dyn VenueCatalog>>,
    live_odds: HashMap<i64, Arc<dyn LiveOddsSource>>,
    results: HashMap<i64, Arc<dyn ResultSource>>,
    trading: HashMap<i64, Arc<dyn TradingVenue>>,
}

impl AdapterRegistry {
    /// Build adapters for every configured venue. Trading registration is
    /// skipped when the venue's credentials are absent; the capability is
    /// then genuinely missing, not stubbed.
    pub fn from_config(venues: &HashMap<String, VenueConfig>) -> Self {
        let mut registry = Self::default();

        if let Some(cfg) = venues.get("polymarket") {
            match polymarket::PolymarketAdapter::new(cfg) {
                Ok(adapter) => {
                    let adapter = Arc::new(adapter);
                    registry
                        .catalogs
                        .insert("polymarket".to_string(), adapter.clone());
                    registry.live_odds.insert(VENUE_POLYMARKET, adapter.clone());
                    registry.results.insert(VENUE_POLYMARKET, adapter);
                }
                Err(e) => tracing::error!(error = %e, "failed to build polymarket adapter"),
            }
            match polymarket::PolymarketTrading::new(cfg) {
                Ok(trading) => {
                    registry.trading.insert(VENUE_POLYMARKET, Arc::new(trading));
                }
                Err(VenueError::NotConfigured(what)) => {
                    tracing::info!(missing = what, "polymarket trading disabled");
                }
                Err(e) => tracing::error!(error = %e, "failed to build polymarket trading"),
            }
        }

        if let Some(cfg) = venues.get("kalshi") {
            match kalshi::KalshiAdapter::new(cfg) {
                Ok(adapter) => {
                    let adapter = Arc::new(adapter);
                    registry
                        .catalogs
                        .insert("kalshi".to_string(), adapter.clone());
                    registry.live_odds.insert(VENUE_KALSHI, adapter.clone());
                    registry.results.insert(VENUE_KALSHI, adapter);
                }
                Err(e) => tracing::error!(error = %e, "failed to build kalshi adapter"),
            }
            match kalshi::KalshiTrading::new(cfg) {
                Ok(trading) => {
                    registry.trading.insert(VENUE_KALSHI, Arc::new(trading));
                }
                Err(VenueError::NotConfigured(what)) => {
                    tracing::info!(missing = what, "kalshi trading disabled");
                }
                Err(e) => tracing::error!(error = %e, "failed to build kalshi trading"),
            }
        }

        registry
    }

    pub fn catalog(&self, venue_name: &str) -> Option<Arc<dyn VenueCatalog>> {
        self.catalogs.get(venue_name).cloned()
    }

    pub fn live_odds(&self, venue_id: i64) -> Option<Arc<dyn LiveOddsSource>> {
        self.live_odds.get(&venue_id).cloned()
    }

    pub fn result_source(&self, venue_id: i64) -> Option<Arc<dyn ResultSource>> {
        self.results.get(&venue_id).cloned()
    }

    pub fn trading(&self, venue_id: i64) -> Option<Arc<dyn TradingVenue>> {
        self.trading.get(&venue_id).cloned()
    }
}

/// Build a per-venue HTTP client: timeout, gzip, optional proxy.
pub(crate) fn build_http_client(cfg: &VenueConfig) -> Result<reqwest::Client, VenueError> {
    let mut builder = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(cfg.timeout_secs.max(1)))
        .gzip(true);
    if let Some(proxy) = &cfg.proxy {
        match reqwest::Proxy::all(proxy) {
            Ok(proxy) => builder = builder.proxy(proxy),
            Err(e) => {
                tracing::warn!(proxy = %proxy, error = %e, "invalid proxy, continuing without");
            }
        }
    }
    Ok(builder.build()?)
}

// ---------------------------------------------------------------------------
// Shared normalization helpers
// ---------------------------------------------------------------------------

pub(crate) fn now_primitive() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc();
    PrimitiveDateTime::new(now.date(), now.time())
}

/// Clamp a venue string to a column width, logging when it truncates.
pub(crate) fn clamp_str(s: &str, max_len: usize, field: &str) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    tracing::warn!(field, len = s.len(), max_len, "venue string truncated");
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

/// Parse a venue timestamp under the accepted formats; fall back to "now"
/// and log when nothing matches.
pub(crate) fn parse_venue_time(value: &str, field: &str) -> PrimitiveDateTime {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        tracing::warn!(field, "venue timestamp empty, defaulting to now");
        return now_primitive();
    }

    if let Ok(odt) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        let utc = odt.to_offset(time::UtcOffset::UTC);
        return PrimitiveDateTime::new(utc.date(), utc.time());
    }

    let datetime_format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    if let Ok(dt) = PrimitiveDateTime::parse(trimmed, &datetime_format) {
        return dt;
    }

    let date_format = format_description!("[year]-[month]-[day]");
    if let Ok(date) = time::Date::parse(trimmed, &date_format) {
        return PrimitiveDateTime::new(date, time::Time::MIDNIGHT);
    }

    tracing::warn!(field, value = trimmed, "unparseable venue timestamp, defaulting to now");
    now_primitive()
}

/// Shared normalization body: clamp strings, parse timestamps, build the
/// options document and the odds rows. Status mapping is the only
/// venue-specific part and is passed in.
pub(crate) fn normalize_raw_events(
    raw: &[RawEvent],
    venue_id: i64,
    event_type: &str,
    map_status: fn(&str) -> EventStatus,
) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();
    for event in raw {
        let venue_event_id = clamp_str(&event.venue_event_id, 128, "platform_event_id");
        let title = clamp_str(&event.title, 256, "title");
        let start_time = parse_venue_time(&event.open_time, "open_time");
        let end_time = parse_venue_time(&event.close_time, "close_time");

        let mut options = serde_json::Map::new();
        for quote in &event.quotes {
            options.insert(
                quote.option.clone(),
                serde_json::Value::String("available".to_string()),
            );
        }

        batch.events.push(NewEvent {
            title,
            event_type: event_type.to_string(),
            platform_id: venue_id,
            platform_event_id: venue_event_id.clone(),
            start_time,
            end_time,
            options: serde_json::Value::Object(options),
            result: None,
            result_source: event
                .result_source
                .as_deref()
                .map(|s| clamp_str(s, 256, "result_source")),
            status: map_status(&event.venue_status),
        });

        for quote in &event.quotes {
            let option_name = clamp_str(&quote.option, 64, "option_name");
            let price = quote.price.parse::<Decimal>().unwrap_or_else(|_| {
                tracing::warn!(
                    venue_event_id = %venue_event_id,
                    option = %quote.option,
                    price = %quote.price,
                    "unparseable venue price, defaulting to 0"
                );
                Decimal::ZERO
            });
            batch.odds.push(NewOddsRow {
                event_id: None,
                unique_event_platform: NewOddsRow::key(venue_id, &venue_event_id, &option_name),
                platform_id: venue_id,
                option_name: option_name.clone(),
                option_type: crate::entities::OptionKind::classify(&option_name),
                price,
            });
        }
    }
    batch
}

// ---------------------------------------------------------------------------
// Venue unit policies
// ---------------------------------------------------------------------------

/// `round(price * 100)` for cent-denominated venues, clamped to 1..=99.
pub fn price_to_cents(price: Decimal) -> i32 {
    let cents = (price * Decimal::from(100))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i32()
        .unwrap_or(1);
    cents.clamp(1, 99)
}

/// Whole-USD contract count for cent-denominated venues, minimum 1.
pub fn usd_units(amount: Decimal) -> i64 {
    amount.floor().to_i64().unwrap_or(1).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn cents_conversion_rounds_and_clamps() {
        assert_eq!(price_to_cents(dec!(0.65)), 65);
        assert_eq!(price_to_cents(dec!(0.655)), 66);
        assert_eq!(price_to_cents(dec!(0.004)), 1);
        assert_eq!(price_to_cents(dec!(1.0)), 99);
        assert_eq!(price_to_cents(dec!(0.0)), 1);
    }

    #[test]
    fn usd_units_floor_with_minimum() {
        assert_eq!(usd_units(dec!(10.9)), 10);
        assert_eq!(usd_units(dec!(0.4)), 1);
        assert_eq!(usd_units(dec!(1.0)), 1);
    }

    #[test]
    fn venue_time_accepts_known_formats() {
        let rfc = parse_venue_time("2026-04-01T18:00:00Z", "t");
        assert_eq!(rfc.to_string(), "2026-04-01 18:00:00.0");
        let plain = parse_venue_time("2026-04-01 18:00:00", "t");
        assert_eq!(plain, rfc);
        let date_only = parse_venue_time("2026-04-01", "t");
        assert_eq!(date_only.date(), rfc.date());
    }

    #[test]
    fn venue_time_falls_back_to_now() {
        let before = now_primitive();
        let parsed = parse_venue_time("not a time", "t");
        assert!(parsed >= before);
    }

    #[test]
    fn clamp_preserves_short_strings() {
        assert_eq!(clamp_str("short", 64, "title"), "short");
        assert_eq!(clamp_str("abcdef", 3, "title"), "abc");
    }
}
