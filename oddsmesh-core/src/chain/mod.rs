//! On-chain plumbing: log subscription (listener) and transaction
//! submission (executor).
//!
//! Only the events we consume and the calls we issue are declared; the
//! topic hashes come from the `sol!` definitions so they cannot drift from
//! the signatures.

pub mod executor;
pub mod listener;

use alloy::primitives::U256;
use alloy::sol;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

sol! {
    /// EscrowVault: funds locked against a betId.
    event FundsLocked(bytes32 indexed betId, address from, uint256 amount);

    /// Settlement: payout released for a betId.
    event Settled(bytes32 indexed betId, uint256 payout, uint256 fee);

    function releaseFunds(bytes32 betId, address to, uint256 amount);

    struct BetIntent {
        address user;
        bytes32 topicId;
        uint256 amount;
        uint256 nonce;
        uint256 deadline;
    }

    function executeBetIntent(BetIntent intent, bytes signature);
}

/// The escrow locks USDC; amounts on the wire are 6-decimals integers.
pub const USDC_DECIMALS: u32 = 6;

/// Errors from chain interaction. RPC failures and reverted receipts are
/// surfaced verbatim and never advance order state.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("chain not configured: {0}")]
    NotConfigured(&'static str),
    #[error("rpc error: {0}")]
    Rpc(String),
    #[error("invalid executor key: {0}")]
    InvalidKey(String),
    #[error("invalid contract address: {0}")]
    InvalidAddress(String),
    #[error("invalid betId: {0}")]
    InvalidBetId(String),
    #[error("transaction {tx_hash} reverted on chain")]
    Reverted { tx_hash: String },
    #[error("timed out waiting for receipt of {tx_hash}")]
    ReceiptTimeout { tx_hash: String },
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
}

/// Scale a raw USDC-6 integer into a decimal amount.
pub fn usdc_to_decimal(value: U256) -> Decimal {
    match u128::try_from(value) {
        Ok(units) => Decimal::from_i128_with_scale(units as i128, USDC_DECIMALS),
        Err(_) => {
            // Larger than u128 cannot be a real USDC amount; saturate.
            tracing::warn!(raw = %value, "USDC amount exceeds u128, saturating");
            Decimal::MAX
        }
    }
}

/// Scale a decimal amount into raw USDC-6 units, truncating sub-micro
/// precision.
pub fn decimal_to_usdc(amount: Decimal) -> Result<U256, ChainError> {
    if amount <= Decimal::ZERO {
        return Err(ChainError::InvalidAmount(format!(
            "amount must be positive, got {amount}"
        )));
    }
    let scaled = (amount * Decimal::from(10u64.pow(USDC_DECIMALS))).trunc();
    let units = scaled
        .to_u128()
        .ok_or_else(|| ChainError::InvalidAmount(format!("amount {amount} out of range")))?;
    Ok(U256::from(units))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::sol_types::SolEvent;
    use rust_decimal_macros::dec;

    #[test]
    fn topic_hashes_match_event_signatures() {
        assert_eq!(
            FundsLocked::SIGNATURE,
            "FundsLocked(bytes32,address,uint256)"
        );
        assert_eq!(Settled::SIGNATURE, "Settled(bytes32,uint256,uint256)");
        assert_eq!(
            FundsLocked::SIGNATURE_HASH,
            alloy::primitives::keccak256(FundsLocked::SIGNATURE.as_bytes())
        );
    }

    #[test]
    fn usdc_scaling_round_trips() {
        let ten = U256::from(10_000_000u64);
        assert_eq!(usdc_to_decimal(ten), dec!(10));
        assert_eq!(decimal_to_usdc(dec!(10)).unwrap(), ten);
        assert_eq!(decimal_to_usdc(dec!(5)).unwrap(), U256::from(5_000_000u64));
        assert_eq!(usdc_to_decimal(U256::from(150_000u64)), dec!(0.15));
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        assert!(decimal_to_usdc(dec!(0)).is_err());
        assert!(decimal_to_usdc(dec!(-1)).is_err());
    }
}
