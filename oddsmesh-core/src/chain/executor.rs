//! The backend-owned on-chain signer.
//!
//! Sends `releaseFunds` (escrow) and `executeBetIntent` (bet router)
//! transactions: legacy EIP-155, chain id read from the RPC, pending
//! nonce, suggested gas price, fixed gas limits, then polls for the
//! receipt every two seconds for up to a minute. A receipt that reverts is
//! a hard error; the caller must not mutate state on it.

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, B256, FixedBytes, U256, keccak256};
use alloy::providers::Provider;
use alloy::providers::ProviderBuilder;
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::SolCall;
use std::str::FromStr;
use std::time::Duration;

use super::{BetIntent, ChainError, executeBetIntentCall, releaseFundsCall};
use crate::config::ChainConfig;

const RELEASE_FUNDS_GAS_LIMIT: u64 = 150_000;
const EXECUTE_INTENT_GAS_LIMIT: u64 = 300_000;
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const RECEIPT_POLL_ATTEMPTS: u32 = 30;

pub struct Executor {
    rpc_url: String,
    escrow_address: Address,
    bet_router_address: Option<Address>,
    signer: PrivateKeySigner,
}

impl Executor {
    /// Build from chain config; fails when the RPC, escrow address or
    /// executor key is missing.
    pub fn from_config(cfg: &ChainConfig) -> Result<Self, ChainError> {
        let rpc_url = cfg
            .rpc_url
            .clone()
            .ok_or(ChainError::NotConfigured("rpc_url"))?;
        let escrow = cfg
            .escrow_address
            .as_deref()
            .ok_or(ChainError::NotConfigured("escrow_address"))?;
        let key = cfg
            .executor_private_key
            .as_deref()
            .ok_or(ChainError::NotConfigured("executor_private_key"))?;

        let escrow_address = Address::from_str(escrow)
            .map_err(|e| ChainError::InvalidAddress(format!("escrow: {e}")))?;
        let bet_router_address = match cfg.bet_router_address.as_deref() {
            Some(addr) => Some(
                Address::from_str(addr)
                    .map_err(|e| ChainError::InvalidAddress(format!("bet router: {e}")))?,
            ),
            None => None,
        };
        let signer = PrivateKeySigner::from_str(key.trim().trim_start_matches("0x"))
            .map_err(|e| ChainError::InvalidKey(e.to_string()))?;

        Ok(Self {
            rpc_url,
            escrow_address,
            bet_router_address,
            signer,
        })
    }

    /// `releaseFunds(betId, to, amount)` on the escrow. `bet_id_hex` must
    /// be the full 64-hex-char betId from the FundsLocked log: a
    /// zero-padded shorter id hashes to a different bytes32 and would not
    /// match the on-chain lock, so any other length is rejected outright.
    pub async fn release_funds(
        &self,
        bet_id_hex: &str,
        to: Address,
        amount: U256,
    ) -> Result<String, ChainError> {
        let bet_id = parse_bet_id(bet_id_hex)?;
        let calldata = releaseFundsCall {
            betId: bet_id,
            to,
            amount,
        }
        .abi_encode();

        self.send_and_confirm(self.escrow_address, calldata, RELEASE_FUNDS_GAS_LIMIT)
            .await
    }

    /// `executeBetIntent(intent, signature)` on the bet router. Returns
    /// the computed betId hex (no 0x prefix), matching how the listener
    /// stores contract order ids.
    pub async fn execute_bet_intent(
        &self,
        user: Address,
        topic_id: B256,
        amount: U256,
        nonce: U256,
        deadline: U256,
        signature: Vec<u8>,
    ) -> Result<String, ChainError> {
        let bet_router = self
            .bet_router_address
            .ok_or(ChainError::NotConfigured("bet_router_address"))?;

        let calldata = executeBetIntentCall {
            intent: BetIntent {
                user,
                topicId: topic_id,
                amount,
                nonce,
                deadline,
            },
            signature: signature.into(),
        }
        .abi_encode();

        self.send_and_confirm(bet_router, calldata, EXECUTE_INTENT_GAS_LIMIT)
            .await?;
        Ok(alloy::hex::encode(compute_bet_id(user, topic_id, nonce)))
    }

    /// Sign, send and wait for a successful receipt. Returns the 0x tx
    /// hash.
    async fn send_and_confirm(
        &self,
        to: Address,
        calldata: Vec<u8>,
        gas_limit: u64,
    ) -> Result<String, ChainError> {
        let provider = ProviderBuilder::new()
            .wallet(self.signer.clone())
            .connect(&self.rpc_url)
            .await
            .map_err(|e| ChainError::Rpc(format!("connect: {e}")))?;

        let chain_id = provider
            .get_chain_id()
            .await
            .map_err(|e| ChainError::Rpc(format!("chain id: {e}")))?;
        let gas_price = provider
            .get_gas_price()
            .await
            .map_err(|e| ChainError::Rpc(format!("gas price: {e}")))?;
        // The nonce is always re-read from the chain; there is no
        // in-process counter to drift.
        let nonce = provider
            .get_transaction_count(self.signer.address())
            .pending()
            .await
            .map_err(|e| ChainError::Rpc(format!("pending nonce: {e}")))?;

        let tx = TransactionRequest::default()
            .with_to(to)
            .with_input(alloy::primitives::Bytes::from(calldata))
            .with_value(U256::ZERO)
            .with_nonce(nonce)
            .with_gas_price(gas_price)
            .with_gas_limit(gas_limit)
            .with_chain_id(chain_id);

        let pending = provider
            .send_transaction(tx)
            .await
            .map_err(|e| ChainError::Rpc(format!("send transaction: {e}")))?;
        let tx_hash = *pending.tx_hash();
        let tx_hash_hex = format!("0x{}", alloy::hex::encode(tx_hash));

        for _ in 0..RECEIPT_POLL_ATTEMPTS {
            match provider.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => {
                    if receipt.status() {
                        return Ok(tx_hash_hex);
                    }
                    return Err(ChainError::Reverted {
                        tx_hash: tx_hash_hex,
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(tx_hash = %tx_hash_hex, error = %e, "receipt poll failed");
                }
            }
            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }
        Err(ChainError::ReceiptTimeout {
            tx_hash: tx_hash_hex,
        })
    }
}

/// Decode and validate a contract order id into the on-chain bytes32.
fn parse_bet_id(bet_id_hex: &str) -> Result<FixedBytes<32>, ChainError> {
    let cleaned = bet_id_hex.trim().trim_start_matches("0x");
    if !cleaned.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ChainError::InvalidBetId(
            "contract_order_id contains non-hex characters".to_string(),
        ));
    }
    if cleaned.len() != 64 {
        return Err(ChainError::InvalidBetId(format!(
            "contract_order_id must be 64 hex chars (the exact FundsLocked betId), got {}",
            cleaned.len()
        )));
    }
    let raw = alloy::hex::decode(cleaned)
        .map_err(|e| ChainError::InvalidBetId(e.to_string()))?;
    Ok(FixedBytes::from_slice(&raw))
}

/// `keccak256(abi.encode(user, topicId, nonce))`, identical to the
/// router's `computeBetId`.
fn compute_bet_id(user: Address, topic_id: B256, nonce: U256) -> B256 {
    let mut data = Vec::with_capacity(96);
    data.extend_from_slice(&[0u8; 12]);
    data.extend_from_slice(user.as_slice());
    data.extend_from_slice(topic_id.as_slice());
    data.extend_from_slice(&nonce.to_be_bytes::<32>());
    keccak256(&data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bet_id_must_be_exactly_64_hex_chars() {
        let full = "ab".repeat(32);
        assert!(parse_bet_id(&full).is_ok());
        assert!(parse_bet_id(&format!("0x{full}")).is_ok());
        // Shorter ids would zero-pad to a different bytes32 on chain.
        assert!(parse_bet_id("deadbeef").is_err());
        assert!(parse_bet_id(&"ab".repeat(33)).is_err());
        assert!(parse_bet_id("zz").is_err());
    }

    #[test]
    fn compute_bet_id_is_abi_encoded_keccak() {
        let user = Address::ZERO;
        let topic = B256::ZERO;
        let nonce = U256::ZERO;
        // keccak of 96 zero bytes.
        assert_eq!(
            compute_bet_id(user, topic, nonce),
            keccak256([0u8; 96])
        );
    }
}
