//! Typed HTTP client for the Oddsmesh API.
//!
//! Used by operator tooling and integration tests. Market and order reads
//! are unauthenticated; the sync trigger carries the operator secret in the
//! `X-Oddsmesh-Operator` header.

use reqwest::{Client, StatusCode};
use url::Url;

use crate::objects::{
    ContractOrderStatusResult, MarketDetail, MarketListResult, OrderDetail, OrderListResult,
    PlaceOrderRequest, PlaceOrderResult, PrepareOrderRequest, PrepareOrderResult, UnfreezeRequest,
    UnfreezeResult, WithdrawInfo,
};

/// Header carrying the operator secret for operator-only endpoints.
pub const OPERATOR_HEADER: &str = "X-Oddsmesh-Operator";

/// Errors produced by the API client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("API error {status}: {message}")]
    Api { status: StatusCode, message: String },
}

/// Typed client over the Oddsmesh HTTP API.
#[derive(Debug, Clone)]
pub struct OddsmeshClient {
    http: Client,
    base_url: Url,
}

impl OddsmeshClient {
    pub fn new(base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url,
        }
    }

    /// Replace the default `reqwest::Client` with a custom one.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `GET /api/markets`
    pub async fn list_markets(
        &self,
        event_type: &str,
        status: &str,
        page: i64,
        page_size: i64,
    ) -> Result<MarketListResult, ClientError> {
        let url = self.base_url.join("/api/markets")?;
        let page = page.to_string();
        let page_size = page_size.to_string();
        let resp = self
            .http
            .get(url)
            .query(&[
                ("type", event_type),
                ("status", status),
                ("page", page.as_str()),
                ("page_size", page_size.as_str()),
            ])
            .send()
            .await?;
        parse_response(resp).await
    }

    /// `GET /api/markets/{id}` — `id` is a numeric canonical id or an
    /// event_uuid.
    pub async fn market_detail(&self, id: &str) -> Result<MarketDetail, ClientError> {
        let url = self.base_url.join(&format!("/api/markets/{id}"))?;
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }

    /// `POST /api/orders/prepare`
    pub async fn prepare_order(
        &self,
        req: &PrepareOrderRequest,
    ) -> Result<PrepareOrderResult, ClientError> {
        let url = self.base_url.join("/api/orders/prepare")?;
        let resp = self.http.post(url).json(req).send().await?;
        parse_response(resp).await
    }

    /// `POST /api/orders/place`
    pub async fn place_order(
        &self,
        req: &PlaceOrderRequest,
    ) -> Result<PlaceOrderResult, ClientError> {
        let url = self.base_url.join("/api/orders/place")?;
        let resp = self.http.post(url).json(req).send().await?;
        parse_response(resp).await
    }

    /// `GET /api/orders?wallet=...`
    pub async fn list_orders(
        &self,
        wallet: &str,
        status: Option<&str>,
        page: i64,
        page_size: i64,
    ) -> Result<OrderListResult, ClientError> {
        let url = self.base_url.join("/api/orders")?;
        let mut query = vec![
            ("wallet".to_string(), wallet.to_string()),
            ("page".to_string(), page.to_string()),
            ("page_size".to_string(), page_size.to_string()),
        ];
        if let Some(status) = status {
            query.push(("status".to_string(), status.to_string()));
        }
        let resp = self.http.get(url).query(&query).send().await?;
        parse_response(resp).await
    }

    /// `GET /api/orders/{order_uuid}`
    pub async fn order_detail(&self, order_uuid: &str) -> Result<OrderDetail, ClientError> {
        let url = self.base_url.join(&format!("/api/orders/{order_uuid}"))?;
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }

    /// `GET /api/orders/{order_uuid}/withdraw-info`
    pub async fn withdraw_info(&self, order_uuid: &str) -> Result<WithdrawInfo, ClientError> {
        let url = self
            .base_url
            .join(&format!("/api/orders/{order_uuid}/withdraw-info"))?;
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }

    /// `POST /api/orders/{order_uuid}/withdraw`
    pub async fn request_withdraw(&self, order_uuid: &str) -> Result<(), ClientError> {
        let url = self
            .base_url
            .join(&format!("/api/orders/{order_uuid}/withdraw"))?;
        let resp = self.http.post(url).send().await?;
        check_status(resp).await
    }

    /// `POST /api/orders/unfreeze`
    pub async fn unfreeze(&self, req: &UnfreezeRequest) -> Result<UnfreezeResult, ClientError> {
        let url = self.base_url.join("/api/orders/unfreeze")?;
        let resp = self.http.post(url).json(req).send().await?;
        parse_response(resp).await
    }

    /// `GET /api/orders/contract-order-status?contract_order_id=...`
    pub async fn contract_order_status(
        &self,
        contract_order_id: &str,
    ) -> Result<ContractOrderStatusResult, ClientError> {
        let url = self.base_url.join("/api/orders/contract-order-status")?;
        let resp = self
            .http
            .get(url)
            .query(&[("contract_order_id", contract_order_id)])
            .send()
            .await?;
        parse_response(resp).await
    }

    /// `POST /sync/platform/{venue}` — operator only.
    pub async fn trigger_sync(
        &self,
        venue: &str,
        operator_secret: &str,
    ) -> Result<(), ClientError> {
        let url = self.base_url.join(&format!("/sync/platform/{venue}"))?;
        let resp = self
            .http
            .post(url)
            .header(OPERATOR_HEADER, operator_secret)
            .send()
            .await?;
        check_status(resp).await
    }
}

/// Decode a JSON body on success, or surface the error body text.
async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let message = resp.text().await.unwrap_or_default();
        return Err(ClientError::Api { status, message });
    }
    Ok(resp.json().await?)
}

/// Like [`parse_response`] but for endpoints with no meaningful body.
async fn check_status(resp: reqwest::Response) -> Result<(), ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let message = resp.text().await.unwrap_or_default();
        return Err(ClientError::Api { status, message });
    }
    Ok(())
}
