//! Kalshi order placement.
//!
//! Kalshi prices in whole cents (1–99) and sizes in whole-dollar
//! contracts; the caller's USD amount and clamped decimal odds are
//! converted at the boundary.

use async_trait::async_trait;
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::auth;
use crate::adapters::{
    TradingVenue, VenueError, VenuePlaceOrder, build_http_client, price_to_cents, usd_units,
};
use crate::config::VenueConfig;

pub struct KalshiTrading {
    base_url: String,
    /// Path prefix of the trade API, kept for request signing.
    api_path: String,
    http: reqwest::Client,
    access_key: String,
    private_key: RsaPrivateKey,
}

#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    ticker: &'a str,
    side: &'a str,
    action: &'a str,
    count: i64,
    #[serde(rename = "type")]
    order_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    yes_price: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    no_price: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct CreateOrderResponse {
    order: CreatedOrder,
}

#[derive(Debug, Deserialize)]
struct CreatedOrder {
    #[serde(default)]
    order_id: String,
}

impl KalshiTrading {
    pub fn new(cfg: &VenueConfig) -> Result<Self, VenueError> {
        let Some(access_key) = cfg.auth_key.as_deref() else {
            return Err(VenueError::NotConfigured("kalshi auth_key"));
        };
        let Some(pem) = cfg.auth_secret.as_deref() else {
            return Err(VenueError::NotConfigured("kalshi auth_secret"));
        };
        let base_url = cfg.base_url.trim_end_matches('/').to_string();
        let api_path = url::Url::parse(&base_url)
            .map(|u| u.path().trim_end_matches('/').to_string())
            .map_err(|e| VenueError::Parse(format!("bad kalshi base_url: {e}")))?;
        Ok(Self {
            base_url,
            api_path,
            http: build_http_client(cfg)?,
            access_key: access_key.to_string(),
            private_key: auth::parse_private_key(pem)?,
        })
    }
}

#[async_trait]
impl TradingVenue for KalshiTrading {
    fn fiat_denominated(&self) -> bool {
        true
    }

    async fn place_order(&self, req: &VenuePlaceOrder) -> Result<String, VenueError> {
        let side = if req.bet_option.trim().eq_ignore_ascii_case("NO") {
            "no"
        } else {
            "yes"
        };
        let price_cents = price_to_cents(req.locked_odds);
        let count = usd_units(req.amount);

        let body = CreateOrderRequest {
            ticker: &req.venue_event_id,
            side,
            action: "buy",
            count,
            order_type: "limit",
            yes_price: (side == "yes").then_some(price_cents),
            no_price: (side == "no").then_some(price_cents),
        };

        let timestamp = (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000).to_string();
        let path = format!("{}/portfolio/orders", self.api_path);
        let signature = auth::sign_request(&self.private_key, &timestamp, "POST", &path)?;

        let url = format!("{}/portfolio/orders", self.base_url);
        let resp = self
            .http
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .header("KALSHI-ACCESS-KEY", &self.access_key)
            .header("KALSHI-ACCESS-TIMESTAMP", &timestamp)
            .header("KALSHI-ACCESS-SIGNATURE", signature)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(VenueError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: CreateOrderResponse =
            serde_json::from_str(&text).map_err(|e| VenueError::Parse(e.to_string()))?;
        if parsed.order.order_id.is_empty() {
            return Err(VenueError::Parse("Kalshi returned an empty order_id".to_string()));
        }
        tracing::info!(
            venue_event_id = %req.venue_event_id,
            order_id = %parsed.order.order_id,
            side,
            price_cents,
            count,
            "Kalshi order placed"
        );
        Ok(parsed.order.order_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_body_carries_only_the_chosen_side_price() {
        let yes = CreateOrderRequest {
            ticker: "NBA-LAL-BOS",
            side: "yes",
            action: "buy",
            count: 10,
            order_type: "limit",
            yes_price: Some(65),
            no_price: None,
        };
        let json = serde_json::to_value(&yes).unwrap();
        assert_eq!(json["yes_price"], 65);
        assert!(json.get("no_price").is_none());
        assert_eq!(json["type"], "limit");
    }
}
