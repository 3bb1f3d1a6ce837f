//! Client-side JWT payload inspection.
//!
//! Only the expiry claim is read. Signatures are the backend's concern; the
//! client decodes the payload purely to decide whether to refresh before
//! sending a request.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

#[derive(Debug, serde::Deserialize)]
struct Claims {
    exp: Option<f64>,
}

/// Current time as seconds since Unix epoch.
#[must_use]
pub fn now_secs() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

/// Decode the `exp` claim. `Ok(None)` means the token carries no expiry.
///
/// # Errors
///
/// Returns a message describing why the token is not a readable JWT.
pub fn expiry(token: &str) -> Result<Option<i64>, String> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_)) => payload,
        _ => return Err("expected three dot-separated segments".into()),
    };
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| format!("payload is not base64url: {e}"))?;
    let claims: Claims = serde_json::from_slice(&bytes).map_err(|e| format!("payload is not JSON: {e}"))?;
    #[allow(clippy::cast_possible_truncation)]
    Ok(claims.exp.map(|exp| exp.floor() as i64))
}

/// Whether `token` is expired at `now` (seconds). Unreadable tokens count as expired.
#[must_use]
pub fn is_expired_at(token: &str, now: i64) -> bool {
    match expiry(token) {
        Ok(Some(exp)) => exp < now,
        Ok(None) => false,
        Err(reason) => {
            tracing::warn!(%reason, "invalid JWT format");
            true
        }
    }
}

/// Whether `token` is expired right now.
#[must_use]
pub fn is_expired(token: &str) -> bool {
    is_expired_at(token, now_secs())
}

#[cfg(test)]
#[path = "jwt_test.rs"]
mod tests;
