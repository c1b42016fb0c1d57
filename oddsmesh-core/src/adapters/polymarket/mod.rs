//! Polymarket adapter.
//!
//! The catalog and live odds come from the Gamma API; order placement goes
//! through the CLOB (see [`trading`]). Gamma encodes option names and
//! prices as JSON-array *strings* inside JSON, so parsing goes through an
//! extra decode step.

mod trading;

pub use trading::PolymarketTrading;

use async_trait::async_trait;
use serde::Deserialize;

use super::{
    EventOutcome, LiveOddsRow, NormalizedBatch, RawEvent, RawQuote, VenueCatalog, VenueError,
    build_http_client, normalize_raw_events,
};
use crate::adapters::{LiveOddsSource, ResultSource};
use crate::config::VenueConfig;
use crate::entities::EventStatus;

/// A price at or above this is treated as the resolved winning outcome.
const RESOLVED_PRICE_FLOOR: &str = "0.99";

pub struct PolymarketAdapter {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SportsSeries {
    #[serde(default)]
    series: String,
    #[serde(default)]
    tags: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GammaEvent {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    active: bool,
    #[serde(default)]
    closed: bool,
    #[serde(default)]
    start_date: String,
    #[serde(default)]
    end_date: String,
    #[serde(default)]
    resolution_source: String,
    #[serde(default)]
    markets: Vec<GammaMarket>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GammaMarket {
    /// JSON-array string, e.g. `"[\"Yes\",\"No\"]"`.
    #[serde(default)]
    outcomes: String,
    /// JSON-array string of decimal strings.
    #[serde(default)]
    outcome_prices: String,
    #[serde(default)]
    clob_token_ids: String,
    #[serde(default)]
    accepting_orders: bool,
}

/// Decode Gamma's JSON-array-in-a-string fields.
fn parse_string_array(s: &str) -> Result<Vec<String>, VenueError> {
    let trimmed = s.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    serde_json::from_str(trimmed)
        .map_err(|e| VenueError::Parse(format!("bad JSON-array string {trimmed:?}: {e}")))
}

fn map_status(venue_status: &str) -> EventStatus {
    match venue_status {
        "active" => EventStatus::Active,
        "closed" => EventStatus::Resolved,
        _ => EventStatus::Canceled,
    }
}

impl PolymarketAdapter {
    pub fn new(cfg: &VenueConfig) -> Result<Self, VenueError> {
        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            http: build_http_client(cfg)?,
        })
    }

    /// `GET /sports` — the active sports series with their tag ids.
    async fn fetch_sports(&self) -> Result<Vec<SportsSeries>, VenueError> {
        let url = format!("{}/sports", self.base_url);
        let resp = self.http.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(VenueError::Api {
                status: resp.status().as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }
        Ok(resp.json().await?)
    }

    /// `GET /events?...` for one (series, tag) pair. Gamma sometimes
    /// returns a bare object instead of an array for single-event queries.
    async fn fetch_series_events(
        &self,
        series_id: &str,
        tag_id: &str,
    ) -> Result<Vec<GammaEvent>, VenueError> {
        let url = format!("{}/events", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("series_id", series_id),
                ("tag_id", tag_id),
                ("active", "true"),
                ("closed", "false"),
                ("order", "startTime"),
                ("ascending", "true"),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(VenueError::Api {
                status: resp.status().as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }
        let body: serde_json::Value = resp.json().await?;
        decode_events_value(body)
    }

    async fn fetch_event(&self, venue_event_id: &str) -> Result<GammaEvent, VenueError> {
        let url = format!("{}/events/{}", self.base_url, venue_event_id);
        let resp = self.http.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(VenueError::Api {
                status: resp.status().as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }
        let body: serde_json::Value = resp.json().await?;
        decode_events_value(body)?
            .into_iter()
            .next()
            .ok_or_else(|| VenueError::Parse(format!("event {venue_event_id} not found")))
    }
}

/// Accept both array and single-object event responses.
fn decode_events_value(body: serde_json::Value) -> Result<Vec<GammaEvent>, VenueError> {
    match body {
        serde_json::Value::Array(_) => {
            serde_json::from_value(body).map_err(|e| VenueError::Parse(e.to_string()))
        }
        serde_json::Value::Object(_) => {
            let event: GammaEvent =
                serde_json::from_value(body).map_err(|e| VenueError::Parse(e.to_string()))?;
            Ok(vec![event])
        }
        serde_json::Value::Null => Ok(Vec::new()),
        other => Err(VenueError::Parse(format!(
            "unexpected events payload type: {other}"
        ))),
    }
}

fn event_quotes(event: &GammaEvent) -> Vec<RawQuote> {
    let mut quotes = Vec::new();
    for market in &event.markets {
        let outcomes = match parse_string_array(&market.outcomes) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(event_id = %event.id, error = %e, "skipping market outcomes");
                continue;
            }
        };
        let prices = match parse_string_array(&market.outcome_prices) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(event_id = %event.id, error = %e, "skipping market prices");
                continue;
            }
        };
        for (i, outcome) in outcomes.iter().enumerate() {
            let Some(price) = prices.get(i) else {
                tracing::warn!(event_id = %event.id, outcome = %outcome, "outcome without price");
                continue;
            };
            quotes.push(RawQuote {
                option: outcome.clone(),
                price: price.clone(),
            });
        }
    }
    quotes
}

fn to_raw_event(event: &GammaEvent) -> RawEvent {
    let venue_status = if event.active && !event.closed {
        "active"
    } else if !event.active && event.closed {
        "closed"
    } else {
        "inactive"
    };
    RawEvent {
        venue_event_id: event.id.clone(),
        title: event.title.clone(),
        venue_status: venue_status.to_string(),
        open_time: event.start_date.clone(),
        close_time: event.end_date.clone(),
        quotes: event_quotes(event),
        result_source: if event.resolution_source.is_empty() {
            None
        } else {
            Some(event.resolution_source.clone())
        },
    }
}

#[async_trait]
impl VenueCatalog for PolymarketAdapter {
    fn name(&self) -> &'static str {
        "Polymarket"
    }

    async fn fetch_events(&self, _event_type: &str) -> Result<Vec<RawEvent>, VenueError> {
        let sports = self.fetch_sports().await?;

        // tag id -> series id; a series lists its tags comma-separated.
        let mut series_by_tag = Vec::new();
        for sport in &sports {
            for tag in sport.tags.split(',') {
                let tag = tag.trim();
                if !tag.is_empty() && !sport.series.is_empty() {
                    series_by_tag.push((tag.to_string(), sport.series.clone()));
                }
            }
        }

        let mut raw_events = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for (tag_id, series_id) in &series_by_tag {
            let events = match self.fetch_series_events(series_id, tag_id).await {
                Ok(events) => events,
                Err(e) => {
                    tracing::warn!(series_id, tag_id, error = %e, "series fetch failed, skipping");
                    continue;
                }
            };
            for event in &events {
                if event.id.is_empty() || !seen.insert(event.id.clone()) {
                    continue;
                }
                raw_events.push(to_raw_event(event));
            }
        }
        tracing::info!(count = raw_events.len(), "fetched Polymarket events");
        Ok(raw_events)
    }

    fn normalize(&self, raw: &[RawEvent], venue_id: i64) -> NormalizedBatch {
        normalize_raw_events(raw, venue_id, "sports", map_status)
    }
}

#[async_trait]
impl LiveOddsSource for PolymarketAdapter {
    async fn fetch_live_odds(&self, venue_event_id: &str) -> Result<Vec<LiveOddsRow>, VenueError> {
        let event = self.fetch_event(venue_event_id).await?;
        let rows = event_quotes(&event)
            .into_iter()
            .filter_map(|q| {
                q.price
                    .parse()
                    .ok()
                    .map(|price| LiveOddsRow {
                        option_name: q.option,
                        price,
                    })
            })
            .collect();
        Ok(rows)
    }
}

#[async_trait]
impl ResultSource for PolymarketAdapter {
    async fn fetch_result(
        &self,
        venue_event_id: &str,
    ) -> Result<Option<EventOutcome>, VenueError> {
        let event = self.fetch_event(venue_event_id).await?;
        if !event.closed {
            return Ok(None);
        }
        // Gamma reports the winning outcome by pinning its price to ~1.
        let floor: rust_decimal::Decimal = RESOLVED_PRICE_FLOOR
            .parse()
            .map_err(|_| VenueError::Parse("bad resolved price floor".to_string()))?;
        let winner = event_quotes(&event).into_iter().find(|q| {
            q.price
                .parse::<rust_decimal::Decimal>()
                .map(|p| p >= floor)
                .unwrap_or(false)
        });
        Ok(winner.map(|q| EventOutcome {
            result: q.option,
            status: EventStatus::Resolved,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_array_parsing() {
        assert_eq!(
            parse_string_array(r#"["Yes","No"]"#).unwrap(),
            vec!["Yes".to_string(), "No".to_string()]
        );
        assert!(parse_string_array("").unwrap().is_empty());
        assert!(parse_string_array("null").unwrap().is_empty());
        assert!(parse_string_array("not json").is_err());
    }

    #[test]
    fn status_mapping() {
        assert_eq!(map_status("active"), EventStatus::Active);
        assert_eq!(map_status("closed"), EventStatus::Resolved);
        assert_eq!(map_status("inactive"), EventStatus::Canceled);
    }

    #[test]
    fn quotes_zip_outcomes_and_prices() {
        let event = GammaEvent {
            id: "ev-1".to_string(),
            title: "Lakers vs Celtics".to_string(),
            active: true,
            closed: false,
            start_date: String::new(),
            end_date: String::new(),
            resolution_source: String::new(),
            markets: vec![GammaMarket {
                outcomes: r#"["Lakers","Celtics"]"#.to_string(),
                outcome_prices: r#"["0.61","0.39"]"#.to_string(),
                clob_token_ids: String::new(),
                accepting_orders: true,
            }],
        };
        let quotes = event_quotes(&event);
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].option, "Lakers");
        assert_eq!(quotes[1].price, "0.39");
    }
}
