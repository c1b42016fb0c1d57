//! Kalshi request signing.
//!
//! Every trade-API request carries `KALSHI-ACCESS-KEY`,
//! `KALSHI-ACCESS-TIMESTAMP` and `KALSHI-ACCESS-SIGNATURE`, where the
//! signature is RSA-PSS-SHA256 over `"{timestamp}{method}{path}"` (path
//! without query), base64-encoded. The salt length equals the digest
//! length.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::pss::SigningKey;
use rsa::signature::{RandomizedSigner, SignatureEncoding};
use sha2::Sha256;

use crate::adapters::VenueError;

/// Parse a PEM private key, accepting both PKCS#8 and PKCS#1 encodings.
pub(super) fn parse_private_key(pem: &str) -> Result<RsaPrivateKey, VenueError> {
    RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
        .map_err(|e| VenueError::Auth(format!("cannot parse Kalshi private key: {e}")))
}

/// Sign `"{timestamp}{method}{path}"` with RSA-PSS-SHA256.
pub(super) fn sign_request(
    key: &RsaPrivateKey,
    timestamp: &str,
    method: &str,
    path: &str,
) -> Result<String, VenueError> {
    let path = path.split('?').next().unwrap_or(path);
    let message = format!("{timestamp}{method}{path}");

    let signing_key = SigningKey::<Sha256>::new(key.clone());
    let signature = signing_key.sign_with_rng(&mut rand::thread_rng(), message.as_bytes());
    Ok(BASE64.encode(signature.to_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pss::{Signature, VerifyingKey};
    use rsa::signature::Verifier;

    #[test]
    fn signature_verifies_and_strips_query() {
        let mut rng = rand::thread_rng();
        let key = RsaPrivateKey::new(&mut rng, 2048).unwrap();

        let signed = sign_request(
            &key,
            "1700000000000",
            "POST",
            "/trade-api/v2/portfolio/orders?dry_run=true",
        )
        .unwrap();

        let raw = BASE64.decode(signed).unwrap();
        let signature = Signature::try_from(raw.as_slice()).unwrap();
        let verifying_key = VerifyingKey::<Sha256>::new(key.to_public_key());
        // The query string must not be part of the signed message.
        verifying_key
            .verify(
                b"1700000000000POST/trade-api/v2/portfolio/orders",
                &signature,
            )
            .unwrap();
    }
}
