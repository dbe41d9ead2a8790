//! Local credential inspection.
//!
//! The client never holds the signing secret, so this is a structural check
//! only: the token must look like a JWT and must not be past its `exp`
//! claim. A token that passes here can still be refused by the server.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

pub fn validate_token(token: &str) -> Result<(), String> {
    if token.is_empty() {
        return Err("no token".into());
    }

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err("token is not a JWT".into());
    }

    let payload = URL_SAFE_NO_PAD
        .decode(parts[1])
        .map_err(|_| "token payload is not base64url".to_string())?;
    let claims: serde_json::Value =
        serde_json::from_slice(&payload).map_err(|_| "token payload is not JSON".to_string())?;

    let exp = claims
        .get("exp")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| "token has no exp claim".to_string())?;

    if exp <= chrono::Utc::now().timestamp() {
        return Err(format!("token expired at {exp}"));
    }

    Ok(())
}
