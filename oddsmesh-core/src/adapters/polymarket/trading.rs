//! Polymarket CLOB order placement.
//!
//! The SDK owns EIP-712 signing, fee rates and authentication; this module
//! resolves the CLOB token for the requested option via Gamma and submits a
//! GTC limit buy.

use std::str::FromStr;

use alloy::primitives::U256;
use alloy::signers::Signer as AlloySigner;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use polymarket_client_sdk::POLYGON;
use polymarket_client_sdk::clob::types::{OrderType as SdkOrderType, Side as SdkSide};
use polymarket_client_sdk::clob::{Client as ClobClient, Config as ClobConfig};
use rust_decimal::Decimal;

use super::{build_http_client, decode_events_value, parse_string_array};
use crate::adapters::{TradingVenue, VenueError, VenuePlaceOrder};
use crate::config::VenueConfig;

const DEFAULT_CLOB_URL: &str = "https://clob.polymarket.com";

pub struct PolymarketTrading {
    gamma_base: String,
    clob_base: String,
    http: reqwest::Client,
    signer: PrivateKeySigner,
}

impl PolymarketTrading {
    pub fn new(cfg: &VenueConfig) -> Result<Self, VenueError> {
        let Some(private_key) = cfg.auth_private_key.as_deref() else {
            return Err(VenueError::NotConfigured("polymarket auth_private_key"));
        };
        let signer = PrivateKeySigner::from_str(private_key.trim())
            .map_err(|e| VenueError::Auth(format!("invalid polymarket private key: {e}")))?
            .with_chain_id(Some(POLYGON));
        Ok(Self {
            gamma_base: cfg.base_url.trim_end_matches('/').to_string(),
            clob_base: cfg
                .clob_base_url
                .as_deref()
                .unwrap_or(DEFAULT_CLOB_URL)
                .trim_end_matches('/')
                .to_string(),
            http: build_http_client(cfg)?,
            signer,
        })
    }

    /// Find the CLOB token id for the requested option. Two-outcome
    /// markets answer YES/NO positionally (first token is YES); anything
    /// else matches the option name among markets still accepting orders.
    async fn resolve_token_id(
        &self,
        venue_event_id: &str,
        bet_option: &str,
    ) -> Result<U256, VenueError> {
        let url = format!("{}/events/{}", self.gamma_base, venue_event_id);
        let resp = self.http.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(VenueError::Api {
                status: resp.status().as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }
        let body: serde_json::Value = resp.json().await?;
        let event = decode_events_value(body)?
            .into_iter()
            .next()
            .ok_or_else(|| VenueError::Parse(format!("event {venue_event_id} not found")))?;

        let bet_upper = bet_option.trim().to_ascii_uppercase();
        let is_yes_no = bet_upper == "YES" || bet_upper == "NO";

        for market in &event.markets {
            let outcomes = match parse_string_array(&market.outcomes) {
                Ok(v) if !v.is_empty() => v,
                _ => continue,
            };
            let tokens = match parse_string_array(&market.clob_token_ids) {
                Ok(v) if v.len() == outcomes.len() => v,
                _ => continue,
            };

            if outcomes.len() == 2 && is_yes_no {
                let idx = usize::from(bet_upper == "NO");
                return parse_token(&tokens[idx]);
            }
            if !market.accepting_orders {
                continue;
            }
            for (i, outcome) in outcomes.iter().enumerate() {
                if outcome.trim().eq_ignore_ascii_case(bet_option.trim()) {
                    return parse_token(&tokens[i]);
                }
            }
        }
        Err(VenueError::InvalidOrder(format!(
            "no CLOB token for option {bet_option:?} on event {venue_event_id}"
        )))
    }
}

fn parse_token(token: &str) -> Result<U256, VenueError> {
    U256::from_str(token.trim()).map_err(|e| VenueError::Parse(format!("bad token id: {e}")))
}

#[async_trait]
impl TradingVenue for PolymarketTrading {
    async fn place_order(&self, req: &VenuePlaceOrder) -> Result<String, VenueError> {
        let token_id = self
            .resolve_token_id(&req.venue_event_id, &req.bet_option)
            .await?;

        // Exactly 0 or 1 would be rejected by the CLOB; keep the price
        // strictly inside (0, 1) on the two-decimal tick grid.
        let price = req
            .locked_odds
            .round_dp(2)
            .clamp(Decimal::new(1, 2), Decimal::new(99, 2));
        let size = req.amount.max(Decimal::ONE);

        let config = ClobConfig::builder().use_server_time(true).build();
        let client = ClobClient::new(&self.clob_base, config)
            .map_err(|e| VenueError::Auth(format!("CLOB client: {e}")))?
            .authentication_builder(&self.signer)
            .authenticate()
            .await
            .map_err(|e| VenueError::Auth(format!("CLOB authentication: {e}")))?;

        let order = client
            .limit_order()
            .token_id(token_id)
            .order_type(SdkOrderType::GTC)
            .price(price)
            .size(size)
            .side(SdkSide::Buy)
            .build()
            .await
            .map_err(|e| VenueError::InvalidOrder(format!("build order: {e}")))?;

        let signed = client
            .sign(&self.signer, order)
            .await
            .map_err(|e| VenueError::Auth(format!("sign order: {e}")))?;

        let response = client
            .post_order(signed)
            .await
            .map_err(|e| VenueError::Api {
                status: 0,
                body: format!("post order: {e}"),
            })?;

        tracing::info!(
            venue_event_id = %req.venue_event_id,
            order_id = %response.order_id,
            "Polymarket order placed"
        );
        Ok(response.order_id)
    }
}
