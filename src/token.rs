//! Access-token inspection.
//!
//! DESIGN
//! ======
//! Tokens are JWTs issued by the task API. The client only reads the payload
//! to decide whether a refresh is due; it never verifies the signature. The
//! server remains the sole authority on token validity.
//!
//! Everything here is pure: callers pass the current time in milliseconds.

#[cfg(test)]
#[path = "token_test.rs"]
mod tests;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

/// Claims read from an access token payload. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenClaims {
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
}

/// Decode the payload segment of a JWT.
///
/// Returns `None` for anything that is not three dot-separated segments with
/// a base64url JSON payload carrying an integer `exp`.
#[must_use]
pub fn decode_claims(token: &str) -> Option<TokenClaims> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return None;
    };
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Whether `token` must be treated as expired at `now_ms`.
///
/// Expired iff `exp * 1000 <= now_ms`. Undecodable tokens are always expired.
#[must_use]
pub fn is_expired(token: &str, now_ms: i64) -> bool {
    match decode_claims(token) {
        Some(claims) => claims.exp.saturating_mul(1000) <= now_ms,
        None => true,
    }
}
