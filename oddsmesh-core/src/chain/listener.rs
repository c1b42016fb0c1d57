//! Chain listener: one WebSocket log subscription over the escrow and
//! settlement contracts.
//!
//! Decodes FundsLocked and Settled logs and drives the order-service
//! callbacks. The listener owns a single subscription; a broken stream
//! returns an error and the supervisor restarts it. Logs replay by block
//! on reconnect, and every write downstream is idempotent on tx_hash, so
//! re-delivery is harmless. Without a configured endpoint the listener
//! idles until shutdown.

use alloy::primitives::{Address, B256, U256};
use alloy::providers::{Provider, ProviderBuilder, WsConnect};
use alloy::rpc::types::{Filter, Log};
use alloy::sol_types::SolEvent;
use futures_util::StreamExt;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;

use super::{ChainError, FundsLocked, Settled, usdc_to_decimal};
use crate::config::ChainConfig;
use crate::events::ShutdownReceiver;
use crate::processors::order_service::{DepositSuccess, OrderService};

pub struct ChainListener {
    config: ChainConfig,
    order_service: Arc<OrderService>,
}

/// A settlement log decoded into callback arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct SettledEvent {
    pub order_uuid: String,
    pub tx_hash: String,
    pub payout: Decimal,
    pub fee: Decimal,
}

impl ChainListener {
    pub fn new(config: ChainConfig, order_service: Arc<OrderService>) -> Self {
        Self {
            config,
            order_service,
        }
    }

    /// Subscribe and process logs until the stream breaks or shutdown is
    /// signaled.
    pub async fn run(&self, mut shutdown_rx: ShutdownReceiver) -> Result<(), ChainError> {
        if !self.config.can_listen() {
            tracing::info!("chain listener idle: no ws_url or escrow address configured");
            let _ = shutdown_rx.changed().await;
            return Ok(());
        }
        let ws_url = self
            .config
            .ws_url
            .as_deref()
            .ok_or(ChainError::NotConfigured("ws_url"))?;
        let escrow = parse_address(self.config.escrow_address.as_deref(), "escrow")?;
        let settlement = match self.config.settlement_address.as_deref() {
            Some(addr) => Some(parse_address(Some(addr), "settlement")?),
            None => None,
        };

        let provider = ProviderBuilder::new()
            .connect_ws(WsConnect::new(ws_url))
            .await
            .map_err(|e| ChainError::Rpc(format!("ws connect: {e}")))?;

        let mut addresses = vec![escrow];
        if let Some(settlement) = settlement {
            addresses.push(settlement);
        }
        let filter = Filter::new()
            .address(addresses)
            .event_signature(vec![FundsLocked::SIGNATURE_HASH, Settled::SIGNATURE_HASH]);

        let subscription = provider
            .subscribe_logs(&filter)
            .await
            .map_err(|e| ChainError::Rpc(format!("subscribe_logs: {e}")))?;
        let mut stream = subscription.into_stream();
        tracing::info!(%escrow, "chain listener subscribed");

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("chain listener received shutdown signal");
                        return Ok(());
                    }
                }
                log = stream.next() => {
                    match log {
                        Some(log) => {
                            if let Err(e) = self.handle_log(&log).await {
                                tracing::warn!(
                                    tx_hash = ?log.transaction_hash,
                                    error = %e,
                                    "failed to process chain log"
                                );
                            }
                        }
                        None => {
                            return Err(ChainError::Rpc("log subscription closed".to_string()));
                        }
                    }
                }
            }
        }
    }

    async fn handle_log(&self, log: &Log) -> Result<(), ChainError> {
        let Some(topic0) = log.topic0() else {
            return Ok(());
        };
        match *topic0 {
            t if t == FundsLocked::SIGNATURE_HASH => {
                let deposit = decode_funds_locked(log)?;
                tracing::info!(
                    contract_order_id = %deposit.contract_order_id,
                    wallet = %deposit.user_wallet,
                    amount = %deposit.amount,
                    tx_hash = %deposit.tx_hash,
                    "FundsLocked observed"
                );
                self.order_service
                    .deposit_success(deposit)
                    .await
                    .map_err(|e| ChainError::Rpc(format!("deposit callback: {e}")))
            }
            t if t == Settled::SIGNATURE_HASH => {
                let settled = decode_settled(log)?;
                tracing::info!(
                    order_uuid = %settled.order_uuid,
                    payout = %settled.payout,
                    fee = %settled.fee,
                    tx_hash = %settled.tx_hash,
                    "Settled observed"
                );
                // Gas is unknown at this point.
                self.order_service
                    .on_settlement_completed(
                        &settled.order_uuid,
                        &settled.tx_hash,
                        settled.payout,
                        settled.fee,
                        Decimal::ZERO,
                    )
                    .await
                    .map_err(|e| ChainError::Rpc(format!("settlement callback: {e}")))
            }
            _ => Ok(()),
        }
    }
}

/// FundsLocked(bytes32 indexed betId, address from, uint256 amount): betId
/// in topics[1]; data is 12 pad bytes + 20 address bytes, then a 32-byte
/// amount in USDC-6 units.
pub fn decode_funds_locked(log: &Log) -> Result<DepositSuccess, ChainError> {
    let bet_id = indexed_bet_id(log)?;
    let data = &log.data().data;
    if data.len() < 64 {
        return Err(ChainError::Rpc(format!(
            "FundsLocked data too short: {} bytes",
            data.len()
        )));
    }
    let from = Address::from_slice(&data[12..32]);
    let amount = usdc_to_decimal(U256::from_be_slice(&data[32..64]));
    Ok(DepositSuccess {
        contract_order_id: alloy::hex::encode(bet_id),
        user_wallet: from.to_string(),
        amount,
        currency: "USDC".to_string(),
        tx_hash: tx_hash_hex(log)?,
        block_number: log.block_number.map(|n| n as i64),
        raw: raw_log_json(log),
    })
}

/// Settled(bytes32 indexed betId, uint256 payout, uint256 fee): data is
/// payout(32) || fee(32), USDC-6.
pub fn decode_settled(log: &Log) -> Result<SettledEvent, ChainError> {
    let bet_id = indexed_bet_id(log)?;
    let data = &log.data().data;
    if data.len() < 64 {
        return Err(ChainError::Rpc(format!(
            "Settled data too short: {} bytes",
            data.len()
        )));
    }
    Ok(SettledEvent {
        order_uuid: alloy::hex::encode(bet_id),
        tx_hash: tx_hash_hex(log)?,
        payout: usdc_to_decimal(U256::from_be_slice(&data[0..32])),
        fee: usdc_to_decimal(U256::from_be_slice(&data[32..64])),
    })
}

fn indexed_bet_id(log: &Log) -> Result<B256, ChainError> {
    log.topics()
        .get(1)
        .copied()
        .ok_or_else(|| ChainError::Rpc("log missing indexed betId topic".to_string()))
}

fn tx_hash_hex(log: &Log) -> Result<String, ChainError> {
    log.transaction_hash
        .map(|h| format!("0x{}", alloy::hex::encode(h)))
        .ok_or_else(|| ChainError::Rpc("log missing transaction hash".to_string()))
}

/// Minimal raw payload kept for audit/debugging.
fn raw_log_json(log: &Log) -> serde_json::Value {
    serde_json::json!({
        "address": log.address().to_string(),
        "topics": log
            .topics()
            .iter()
            .map(|t| format!("0x{}", alloy::hex::encode(t)))
            .collect::<Vec<_>>(),
        "data": format!("0x{}", alloy::hex::encode(&log.data().data)),
        "block_number": log.block_number,
    })
}

fn parse_address(addr: Option<&str>, what: &'static str) -> Result<Address, ChainError> {
    let addr = addr.ok_or(ChainError::NotConfigured(what))?;
    Address::from_str(addr).map_err(|e| ChainError::InvalidAddress(format!("{what}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Bytes, LogData, address, b256};
    use rust_decimal_macros::dec;

    fn rpc_log(topics: Vec<B256>, data: Vec<u8>) -> Log {
        Log {
            inner: alloy::primitives::Log {
                address: address!("0x00000000000000000000000000000000000000aa"),
                data: LogData::new_unchecked(topics, Bytes::from(data)),
            },
            block_hash: None,
            block_number: Some(123),
            block_timestamp: None,
            transaction_hash: Some(b256!(
                "1111111111111111111111111111111111111111111111111111111111111111"
            )),
            transaction_index: Some(0),
            log_index: Some(0),
            removed: false,
        }
    }

    fn funds_locked_log(amount_usdc6: u64) -> Log {
        let bet_id = b256!("deadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef");
        let wallet = address!("0x00000000000000000000000000000000000000bb");
        let mut data = vec![0u8; 64];
        data[12..32].copy_from_slice(wallet.as_slice());
        data[32..64].copy_from_slice(&U256::from(amount_usdc6).to_be_bytes::<32>());
        rpc_log(vec![FundsLocked::SIGNATURE_HASH, bet_id], data)
    }

    #[test]
    fn funds_locked_decodes_bet_id_wallet_and_amount() {
        let deposit = decode_funds_locked(&funds_locked_log(10_000_000)).unwrap();
        assert_eq!(
            deposit.contract_order_id,
            "deadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef"
        );
        assert_eq!(deposit.amount, dec!(10));
        assert_eq!(deposit.currency, "USDC");
        assert!(
            deposit
                .user_wallet
                .eq_ignore_ascii_case("0x00000000000000000000000000000000000000bb")
        );
        assert_eq!(deposit.block_number, Some(123));
        assert!(deposit.tx_hash.starts_with("0x1111"));
    }

    #[test]
    fn duplicate_logs_decode_identically() {
        // Re-delivered logs produce the same tx_hash, which the store's
        // unique key absorbs.
        let a = decode_funds_locked(&funds_locked_log(5_000_000)).unwrap();
        let b = decode_funds_locked(&funds_locked_log(5_000_000)).unwrap();
        assert_eq!(a.tx_hash, b.tx_hash);
        assert_eq!(a.contract_order_id, b.contract_order_id);
    }

    #[test]
    fn settled_decodes_payout_and_fee() {
        let bet_id = b256!("deadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef");
        let mut data = vec![0u8; 64];
        data[0..32].copy_from_slice(&U256::from(15_000_000u64).to_be_bytes::<32>());
        data[32..64].copy_from_slice(&U256::from(150_000u64).to_be_bytes::<32>());
        let settled = decode_settled(&rpc_log(vec![Settled::SIGNATURE_HASH, bet_id], data)).unwrap();
        assert_eq!(settled.payout, dec!(15));
        assert_eq!(settled.fee, dec!(0.15));
        assert_eq!(
            settled.order_uuid,
            "deadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef"
        );
    }

    #[test]
    fn short_data_is_rejected() {
        let bet_id = B256::ZERO;
        let log = rpc_log(vec![FundsLocked::SIGNATURE_HASH, bet_id], vec![0u8; 32]);
        assert!(decode_funds_locked(&log).is_err());
    }
}
