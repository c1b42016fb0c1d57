//! Custom Axum extractors for request authentication.
//!
//! `OperatorAuth` verifies the `X-Oddsmesh-Operator` header against the
//! argon2 hash of the configured operator secret. Only the sync trigger
//! uses it.

use argon2::password_hash::PasswordHash;
use argon2::{Argon2, PasswordVerifier};
use axum::extract::FromRequestParts;
use axum::http::{StatusCode, request::Parts};
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

/// Header carrying the operator secret.
pub const OPERATOR_HEADER: &str = "X-Oddsmesh-Operator";

/// Proof that the request carried a valid operator secret.
pub struct OperatorAuth;

/// Errors that can occur during operator authentication.
#[derive(Debug, thiserror::Error)]
pub enum OperatorAuthError {
    #[error("missing {OPERATOR_HEADER} header")]
    MissingHeader,
    #[error("invalid {OPERATOR_HEADER} header")]
    InvalidHeader,
    #[error("operator secret rejected")]
    Rejected,
}

impl IntoResponse for OperatorAuthError {
    fn into_response(self) -> Response {
        let status = match self {
            OperatorAuthError::MissingHeader | OperatorAuthError::InvalidHeader => {
                StatusCode::UNAUTHORIZED
            }
            OperatorAuthError::Rejected => StatusCode::FORBIDDEN,
        };
        (status, self.to_string()).into_response()
    }
}

impl FromRequestParts<AppState> for OperatorAuth {
    type Rejection = OperatorAuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let secret = parts
            .headers
            .get(OPERATOR_HEADER)
            .ok_or(OperatorAuthError::MissingHeader)?
            .to_str()
            .map_err(|_| OperatorAuthError::InvalidHeader)?;

        let hash = PasswordHash::new(&state.operator_secret_hash)
            .map_err(|_| OperatorAuthError::Rejected)?;
        Argon2::default()
            .verify_password(secret.as_bytes(), &hash)
            .map_err(|_| OperatorAuthError::Rejected)?;
        Ok(OperatorAuth)
    }
}
