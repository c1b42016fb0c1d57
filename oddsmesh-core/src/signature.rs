//! `personal_sign` verification for the order flow.
//!
//! `prepare` hands the frontend a `PlaceOrder:` message; `place` only goes
//! through when the EIP-191 signature over that exact message recovers to
//! the wallet that made the on-chain deposit and the embedded expiry is
//! still in the future.

use alloy::primitives::{Address, Signature, U256};
use rust_decimal::Decimal;

/// Seconds a prepared message stays valid.
pub const PREPARE_EXPIRY_SECS: i64 = 300;

/// Errors from signature verification.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("user wallet, message and signature are all required")]
    MissingField,
    #[error("signature is not valid hex")]
    InvalidHex,
    #[error("signature must be 65 bytes, got {0}")]
    InvalidLength(usize),
    #[error("invalid recovery id {0}")]
    InvalidRecoveryId(u8),
    #[error("signer recovery failed: {0}")]
    RecoveryFailed(String),
    #[error("recovered signer {recovered} does not match deposit wallet {expected}")]
    SignerMismatch { recovered: String, expected: String },
    #[error("deposit wallet is not a valid address")]
    InvalidWallet,
    #[error("message format is not a PlaceOrder message")]
    MalformedMessage,
    #[error("signed message has expired")]
    Expired,
}

/// Build the exact string the user signs. Odds are printed with six
/// decimals so the signed text matches byte-for-byte at place time.
pub fn build_place_order_message(
    contract_order_id: &str,
    event_uuid: &str,
    bet_option: &str,
    locked_odds: Decimal,
    expires_at: i64,
) -> String {
    format!("PlaceOrder:{contract_order_id}:{event_uuid}:{bet_option}:{locked_odds:.6}:{expires_at}")
}

/// Pull the trailing expiry out of a `PlaceOrder:` message.
pub fn message_expiry(message: &str) -> Result<i64, SignatureError> {
    let parts: Vec<&str> = message.split(':').collect();
    if parts.len() < 6 || parts[0] != "PlaceOrder" {
        return Err(SignatureError::MalformedMessage);
    }
    parts[parts.len() - 1]
        .parse::<i64>()
        .map_err(|_| SignatureError::MalformedMessage)
}

/// Verify that `signature_hex` is a wallet `personal_sign` of `message` by
/// `user_wallet`, and that the message is still fresh at `now_unix`.
pub fn verify_personal_sign(
    user_wallet: &str,
    message: &str,
    signature_hex: &str,
    now_unix: i64,
) -> Result<(), SignatureError> {
    if user_wallet.is_empty() || message.is_empty() || signature_hex.is_empty() {
        return Err(SignatureError::MissingField);
    }

    let raw = alloy::hex::decode(signature_hex.trim_start_matches("0x"))
        .map_err(|_| SignatureError::InvalidHex)?;
    if raw.len() != 65 {
        return Err(SignatureError::InvalidLength(raw.len()));
    }

    // Wallets return v as 27/28; recovery wants the 0/1 parity.
    let parity = match raw[64] {
        0 | 27 => false,
        1 | 28 => true,
        v => return Err(SignatureError::InvalidRecoveryId(v)),
    };
    let r = U256::from_be_slice(&raw[..32]);
    let s = U256::from_be_slice(&raw[32..64]);
    let signature = Signature::new(r, s, parity);

    let recovered = signature
        .recover_address_from_msg(message)
        .map_err(|e| SignatureError::RecoveryFailed(e.to_string()))?;
    let expected: Address = user_wallet
        .parse()
        .map_err(|_| SignatureError::InvalidWallet)?;
    if recovered != expected {
        return Err(SignatureError::SignerMismatch {
            recovered: recovered.to_string(),
            expected: expected.to_string(),
        });
    }

    if now_unix > message_expiry(message)? {
        return Err(SignatureError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::signers::SignerSync;
    use alloy::signers::local::PrivateKeySigner;
    use rust_decimal_macros::dec;

    fn wallet_style_hex(signer: &PrivateKeySigner, message: &str) -> String {
        let sig = signer.sign_message_sync(message.as_bytes()).unwrap();
        let mut bytes = [0u8; 65];
        bytes[..32].copy_from_slice(&sig.r().to_be_bytes::<32>());
        bytes[32..64].copy_from_slice(&sig.s().to_be_bytes::<32>());
        // Simulate a wallet that reports v as 27/28.
        bytes[64] = 27 + u8::from(sig.v());
        format!("0x{}", alloy::hex::encode(bytes))
    }

    #[test]
    fn message_format_is_stable() {
        let msg = build_place_order_message("deadbeef", "uuid-E", "YES", dec!(0.65), 1_700_000_000);
        assert_eq!(msg, "PlaceOrder:deadbeef:uuid-E:YES:0.650000:1700000000");
        assert_eq!(message_expiry(&msg).unwrap(), 1_700_000_000);
    }

    #[test]
    fn valid_signature_passes() {
        let signer = PrivateKeySigner::random();
        let msg = build_place_order_message("deadbeef", "1_ev", "YES", dec!(0.99), i64::MAX / 2);
        let sig = wallet_style_hex(&signer, &msg);
        verify_personal_sign(&signer.address().to_string(), &msg, &sig, 1_700_000_000).unwrap();
    }

    #[test]
    fn wrong_signer_is_rejected() {
        let signer = PrivateKeySigner::random();
        let other = PrivateKeySigner::random();
        let msg = build_place_order_message("deadbeef", "1_ev", "YES", dec!(0.5), i64::MAX / 2);
        let sig = wallet_style_hex(&signer, &msg);
        let err =
            verify_personal_sign(&other.address().to_string(), &msg, &sig, 1_700_000_000)
                .unwrap_err();
        assert!(matches!(err, SignatureError::SignerMismatch { .. }));
    }

    #[test]
    fn tampered_message_is_rejected() {
        let signer = PrivateKeySigner::random();
        let msg = build_place_order_message("deadbeef", "1_ev", "YES", dec!(0.5), i64::MAX / 2);
        let sig = wallet_style_hex(&signer, &msg);
        let tampered = msg.replace("YES", "NO");
        let err = verify_personal_sign(&signer.address().to_string(), &tampered, &sig, 0)
            .unwrap_err();
        assert!(matches!(err, SignatureError::SignerMismatch { .. }));
    }

    #[test]
    fn expired_message_is_rejected() {
        let signer = PrivateKeySigner::random();
        let msg = build_place_order_message("deadbeef", "1_ev", "YES", dec!(0.5), 1_000);
        let sig = wallet_style_hex(&signer, &msg);
        let err = verify_personal_sign(&signer.address().to_string(), &msg, &sig, 2_000)
            .unwrap_err();
        assert!(matches!(err, SignatureError::Expired));
    }
}
