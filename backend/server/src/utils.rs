use axum::{Json, extract::rejection::JsonRejection, http::HeaderMap};
use chrono::Utc;
use rand::{Rng, distributions::Alphanumeric, thread_rng};

use crate::error::AppError;

pub const WALLET_HEADER: &str = "x-wallet-address";

/// Wallet address from the request body, falling back to the `x-wallet-address` header.
///
/// Nothing here proves the caller owns the address, it is taken as asserted.
pub fn resolve_address(
    from_body: Option<String>,
    headers: &HeaderMap,
    who: &str,
) -> Result<String, AppError> {
    from_body
        .or_else(|| {
            headers
                .get(WALLET_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        })
        .map(|address| address.trim().to_string())
        .filter(|address| !address.is_empty())
        .ok_or_else(|| AppError::Validation(format!("{who} address required")))
}

pub fn require(value: Option<String>, field: &str) -> Result<String, AppError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::Validation(format!("{field} is required")))
}

/// Accepts a missing body (no JSON content type) as the default payload.
pub fn optional_body<T: Default>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(T::default()),
        Err(rejection) => Err(rejection.into()),
    }
}

/// Stand-in transaction hash until purchases settle on chain.
pub fn mock_transaction_hash() -> String {
    let bytes: [u8; 32] = thread_rng().r#gen();

    format!("0x{}", hex::encode(bytes))
}

pub fn token_id() -> String {
    let suffix: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|c| (c as char).to_ascii_lowercase())
        .collect();

    format!("token-{}-{suffix}", Utc::now().timestamp_millis())
}
