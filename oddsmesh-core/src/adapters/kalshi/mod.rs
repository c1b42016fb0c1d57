//! Kalshi adapter.
//!
//! Kalshi exposes its sports catalog as a heterogeneous set of series
//! tickers. The adapter discovers the active sports series via the
//! category filter, caches that list for four hours, and fans event
//! fetches out over the cached set — streaming one batch per series so the
//! sync pipeline can persist as it goes.

mod auth;
mod trading;

pub use trading::KalshiTrading;

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use tokio::sync::{RwLock, mpsc};

use super::{
    EventOutcome, LiveOddsRow, NormalizedBatch, RawEvent, RawQuote, VenueCatalog, VenueError,
    build_http_client, normalize_raw_events,
};
use crate::adapters::{LiveOddsSource, ResultSource};
use crate::config::VenueConfig;
use crate::entities::EventStatus;

/// Sports-series list TTL. Expiry is strictly time-based.
const SERIES_CACHE_TTL: std::time::Duration = std::time::Duration::from_secs(4 * 60 * 60);

/// Events per catalog page request.
const EVENTS_PAGE_LIMIT: u32 = 200;

#[derive(Default)]
struct SeriesCache {
    tickers: Vec<String>,
    fetched_at: Option<tokio::time::Instant>,
}

impl SeriesCache {
    fn fresh(&self) -> bool {
        self.fetched_at
            .map(|at| at.elapsed() < SERIES_CACHE_TTL)
            .unwrap_or(false)
    }
}

pub struct KalshiAdapter {
    base_url: String,
    http: reqwest::Client,
    /// Pinned tickers from config; bypasses discovery entirely.
    pinned_tickers: Vec<String>,
    series_cache: RwLock<SeriesCache>,
}

#[derive(Debug, Deserialize)]
struct SeriesListResponse {
    #[serde(default)]
    series: Vec<SeriesItem>,
}

#[derive(Debug, Deserialize)]
struct SeriesItem {
    #[serde(default)]
    ticker: String,
    #[serde(default)]
    category: String,
}

#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    events: Vec<KalshiEventApi>,
}

#[derive(Debug, Deserialize)]
struct EventResponse {
    event: KalshiEventApi,
}

#[derive(Debug, Deserialize)]
struct KalshiEventApi {
    #[serde(default)]
    event_ticker: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    strike_date: String,
    #[serde(default)]
    markets: Vec<KalshiMarketApi>,
}

#[derive(Debug, Deserialize)]
struct KalshiMarketApi {
    #[serde(default)]
    open_time: String,
    #[serde(default)]
    close_time: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    result: String,
    #[serde(default)]
    yes_ask_dollars: String,
    #[serde(default)]
    no_ask_dollars: String,
    #[serde(default)]
    last_price_dollars: String,
}

fn map_status(venue_status: &str) -> EventStatus {
    match venue_status {
        "open" | "active" => EventStatus::Active,
        "closed" | "settled" | "finalized" => EventStatus::Resolved,
        _ => EventStatus::Canceled,
    }
}

/// Whether a series category belongs to the sports catalog.
fn is_sports_category(category: &str) -> bool {
    let lower = category.trim().to_ascii_lowercase();
    if lower.is_empty() {
        return false;
    }
    if lower.contains("sport") {
        return true;
    }
    const SPORTS_KEYWORDS: &[&str] = &[
        "nfl",
        "nba",
        "mlb",
        "nhl",
        "soccer",
        "football",
        "basketball",
        "baseball",
        "hockey",
        "ufc",
        "boxing",
        "tennis",
        "golf",
        "olympics",
    ];
    SPORTS_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// Turn one API event into the venue-agnostic raw form, deriving YES/NO
/// quotes from the nested markets.
fn to_raw_event(event: &KalshiEventApi) -> RawEvent {
    let (open_time, close_time, status) = match event.markets.first() {
        Some(market) => (
            if market.open_time.is_empty() {
                event.strike_date.clone()
            } else {
                market.open_time.clone()
            },
            if market.close_time.is_empty() {
                event.strike_date.clone()
            } else {
                market.close_time.clone()
            },
            market.status.clone(),
        ),
        None => (
            event.strike_date.clone(),
            event.strike_date.clone(),
            "closed".to_string(),
        ),
    };

    let mut quotes = Vec::new();
    for market in &event.markets {
        // YES from the ask, else the last trade.
        let yes_price = if market.yes_ask_dollars.is_empty() {
            market.last_price_dollars.clone()
        } else {
            market.yes_ask_dollars.clone()
        };
        if !yes_price.is_empty() {
            quotes.push(RawQuote {
                option: "YES".to_string(),
                price: yes_price,
            });
        }
        // NO from the ask, else the last trade's complement.
        let no_price = if market.no_ask_dollars.is_empty() {
            market
                .last_price_dollars
                .parse::<rust_decimal::Decimal>()
                .ok()
                .map(|p| (rust_decimal::Decimal::ONE - p).to_string())
                .unwrap_or_default()
        } else {
            market.no_ask_dollars.clone()
        };
        if !no_price.is_empty() {
            quotes.push(RawQuote {
                option: "NO".to_string(),
                price: no_price,
            });
        }
    }

    RawEvent {
        venue_event_id: event.event_ticker.clone(),
        title: event.title.clone(),
        venue_status: status,
        open_time,
        close_time,
        quotes,
        result_source: None,
    }
}

impl KalshiAdapter {
    pub fn new(cfg: &VenueConfig) -> Result<Self, VenueError> {
        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            http: build_http_client(cfg)?,
            pinned_tickers: cfg.series_tickers.clone(),
            series_cache: RwLock::new(SeriesCache::default()),
        })
    }

    /// The active sports series tickers: pinned config wins, otherwise the
    /// TTL cache, otherwise one discovery fetch. Lookup takes the read
    /// lock; the refresh re-checks freshness under the write lock so
    /// concurrent expirations trigger exactly one fetch.
    async fn sports_series_tickers(&self) -> Result<Vec<String>, VenueError> {
        if !self.pinned_tickers.is_empty() {
            return Ok(self.pinned_tickers.clone());
        }

        {
            let cache = self.series_cache.read().await;
            if cache.fresh() {
                return Ok(cache.tickers.clone());
            }
        }

        let mut cache = self.series_cache.write().await;
        if cache.fresh() {
            return Ok(cache.tickers.clone());
        }
        let tickers = self.discover_sports_series().await?;
        cache.tickers = tickers.clone();
        cache.fetched_at = Some(tokio::time::Instant::now());
        Ok(tickers)
    }

    /// `GET /series?category=Sports`, falling back to the full series list
    /// filtered by category when the filtered call returns nothing.
    async fn discover_sports_series(&self) -> Result<Vec<String>, VenueError> {
        let filtered = self
            .fetch_series_list(Some(("category", "Sports")))
            .await?;
        if !filtered.is_empty() {
            tracing::info!(count = filtered.len(), "Kalshi sports series via category filter");
            return Ok(filtered);
        }
        let all = self.fetch_series_list(None).await?;
        tracing::info!(count = all.len(), "Kalshi sports series via full-list filter");
        Ok(all)
    }

    async fn fetch_series_list(
        &self,
        query: Option<(&str, &str)>,
    ) -> Result<Vec<String>, VenueError> {
        let url = format!("{}/series", self.base_url);
        let mut request = self.http.get(&url);
        if let Some((k, v)) = query {
            request = request.query(&[(k, v)]);
        }
        let resp = request.send().await?;
        if !resp.status().is_success() {
            return Err(VenueError::Api {
                status: resp.status().as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }
        let list: SeriesListResponse = resp.json().await?;
        Ok(list
            .series
            .iter()
            .filter(|s| is_sports_category(&s.category) && !s.ticker.trim().is_empty())
            .map(|s| s.ticker.trim().to_string())
            .collect())
    }

    async fn fetch_series_events(&self, ticker: &str) -> Result<Vec<KalshiEventApi>, VenueError> {
        let url = format!("{}/events", self.base_url);
        let limit = EVENTS_PAGE_LIMIT.to_string();
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("with_nested_markets", "true"),
                ("status", "open"),
                ("limit", limit.as_str()),
                ("series_ticker", ticker),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(VenueError::Api {
                status: resp.status().as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }
        let body: EventsResponse = resp.json().await?;
        Ok(body.events)
    }

    async fn fetch_event(&self, event_ticker: &str) -> Result<KalshiEventApi, VenueError> {
        let url = format!("{}/events/{}", self.base_url, event_ticker);
        let resp = self
            .http
            .get(&url)
            .query(&[("with_nested_markets", "true")])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(VenueError::Api {
                status: resp.status().as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }
        let body: EventResponse = resp.json().await?;
        Ok(body.event)
    }
}

#[async_trait]
impl VenueCatalog for KalshiAdapter {
    fn name(&self) -> &'static str {
        "Kalshi"
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    async fn fetch_events(&self, _event_type: &str) -> Result<Vec<RawEvent>, VenueError> {
        let tickers = self.sports_series_tickers().await?;
        let mut seen = HashSet::new();
        let mut raw_events = Vec::new();
        for ticker in &tickers {
            let events = match self.fetch_series_events(ticker).await {
                Ok(events) => events,
                Err(e) => {
                    tracing::warn!(series_ticker = %ticker, error = %e, "series fetch failed, skipping");
                    continue;
                }
            };
            for event in &events {
                if event.event_ticker.is_empty() || !seen.insert(event.event_ticker.clone()) {
                    continue;
                }
                raw_events.push(to_raw_event(event));
            }
        }
        tracing::info!(count = raw_events.len(), "fetched Kalshi events");
        Ok(raw_events)
    }

    async fn fetch_events_streaming(
        &self,
        _event_type: &str,
        batches: mpsc::Sender<Vec<RawEvent>>,
    ) -> Result<usize, VenueError> {
        let tickers = self.sports_series_tickers().await?;
        if tickers.is_empty() {
            tracing::warn!("Kalshi discovered no sports series, nothing to stream");
            return Ok(0);
        }

        let mut seen = HashSet::new();
        let mut total = 0usize;
        for ticker in &tickers {
            let events = match self.fetch_series_events(ticker).await {
                Ok(events) => events,
                Err(e) => {
                    tracing::warn!(series_ticker = %ticker, error = %e, "series fetch failed, skipping");
                    continue;
                }
            };
            let mut batch = Vec::new();
            for event in &events {
                // A game can appear under several series; the first
                // occurrence wins.
                if event.event_ticker.is_empty() || !seen.insert(event.event_ticker.clone()) {
                    continue;
                }
                batch.push(to_raw_event(event));
            }
            if batch.is_empty() {
                continue;
            }
            total += batch.len();
            if batches.send(batch).await.is_err() {
                return Err(VenueError::Canceled);
            }
        }
        tracing::info!(total, "Kalshi streaming fetch complete");
        Ok(total)
    }

    fn normalize(&self, raw: &[RawEvent], venue_id: i64) -> NormalizedBatch {
        normalize_raw_events(raw, venue_id, "sports", map_status)
    }
}

#[async_trait]
impl LiveOddsSource for KalshiAdapter {
    async fn fetch_live_odds(&self, venue_event_id: &str) -> Result<Vec<LiveOddsRow>, VenueError> {
        let event = self.fetch_event(venue_event_id).await?;
        let rows = to_raw_event(&event)
            .quotes
            .into_iter()
            .filter_map(|q| {
                q.price.parse().ok().map(|price| LiveOddsRow {
                    option_name: q.option,
                    price,
                })
            })
            .collect();
        Ok(rows)
    }
}

#[async_trait]
impl ResultSource for KalshiAdapter {
    async fn fetch_result(
        &self,
        venue_event_id: &str,
    ) -> Result<Option<EventOutcome>, VenueError> {
        let event = self.fetch_event(venue_event_id).await?;
        let Some(market) = event.markets.first() else {
            return Ok(None);
        };
        if market.result.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(EventOutcome {
            result: market.result.trim().to_ascii_uppercase(),
            status: EventStatus::Resolved,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sports_category_detection() {
        assert!(is_sports_category("Sports"));
        assert!(is_sports_category("esports"));
        assert!(is_sports_category("NBA Basketball"));
        assert!(!is_sports_category("Politics"));
        assert!(!is_sports_category(""));
    }

    #[test]
    fn raw_event_derives_yes_no_quotes() {
        let event = KalshiEventApi {
            event_ticker: "NBA-LAL-BOS".to_string(),
            title: "Lakers vs Celtics".to_string(),
            strike_date: "2026-04-01T18:00:00Z".to_string(),
            markets: vec![KalshiMarketApi {
                open_time: "2026-04-01T18:00:00Z".to_string(),
                close_time: "2026-04-01T21:00:00Z".to_string(),
                status: "open".to_string(),
                result: String::new(),
                yes_ask_dollars: "0.62".to_string(),
                no_ask_dollars: String::new(),
                last_price_dollars: "0.60".to_string(),
            }],
        };
        let raw = to_raw_event(&event);
        assert_eq!(raw.venue_status, "open");
        assert_eq!(raw.quotes.len(), 2);
        assert_eq!(raw.quotes[0].option, "YES");
        assert_eq!(raw.quotes[0].price, "0.62");
        assert_eq!(raw.quotes[1].option, "NO");
        // NO falls back to 1 - last_price.
        assert_eq!(raw.quotes[1].price, "0.40");
    }

    #[test]
    fn market_status_mapping() {
        assert_eq!(map_status("open"), EventStatus::Active);
        assert_eq!(map_status("closed"), EventStatus::Resolved);
        assert_eq!(map_status("weird"), EventStatus::Canceled);
    }
}
