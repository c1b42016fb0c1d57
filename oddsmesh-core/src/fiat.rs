//! Fiat conversion for USD-denominated venues.
//!
//! Kalshi prices in USD while deposits arrive as on-chain stablecoins; the
//! order service converts the deposit amount through this trait right before
//! placing a Kalshi order. The real rate source is an external collaborator;
//! the no-op provider treats USD-pegged stables as par.

use async_trait::async_trait;
use rust_decimal::Decimal;

/// Errors from the fiat rate source.
#[derive(Debug, thiserror::Error)]
pub enum FiatError {
    #[error("fiat conversion request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unsupported currency: {0}")]
    UnsupportedCurrency(String),
}

/// Converts a deposit amount in `currency` into USD.
#[async_trait]
pub trait FiatConversion: Send + Sync {
    async fn convert_to_usd(&self, amount: Decimal, currency: &str) -> Result<Decimal, FiatError>;
}

/// Par conversion for USD-pegged assets; anything else passes through
/// unchanged (the deposit contract only accepts stables today).
pub struct NoopFiatConversion;

#[async_trait]
impl FiatConversion for NoopFiatConversion {
    async fn convert_to_usd(&self, amount: Decimal, currency: &str) -> Result<Decimal, FiatError> {
        match currency.to_ascii_uppercase().as_str() {
            "USD" | "USDC" | "USDT" => Ok(amount),
            _ => Ok(amount),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn stables_convert_at_par() {
        let fiat = NoopFiatConversion;
        let amount = fiat
            .convert_to_usd(dec!(10.5), "USDC")
            .await
            .unwrap();
        assert_eq!(amount, dec!(10.5));
    }
}
