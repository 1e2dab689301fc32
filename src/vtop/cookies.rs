//! Portable cookie tokens.
//!
//! A token is the base64 encoding of a flat JSON object mapping cookie names
//! to values. Domain, path and expiry attributes are dropped; only what is
//! needed to replay the cookies on the next request survives.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::collections::BTreeMap;

use crate::vtop::errors::{Result, VtopError};
use crate::vtop::json::from_json_str;

/// Cookie name → value.
pub type CookieMap = BTreeMap<String, String>;

/// Serialize a cookie map into an opaque token.
pub fn encode(cookies: &CookieMap) -> String {
    // A map of strings always serializes.
    let json = serde_json::to_string(cookies).unwrap_or_else(|_| "{}".to_string());
    STANDARD.encode(json)
}

/// Restore a cookie map from a token produced by [`encode`].
pub fn decode(token: &str) -> Result<CookieMap> {
    let bytes = STANDARD
        .decode(token.trim())
        .map_err(|e| VtopError::Decode(format!("not base64 ({e})")))?;
    let json =
        String::from_utf8(bytes).map_err(|_| VtopError::Decode("not UTF-8".to_string()))?;
    from_json_str(&json).map_err(VtopError::Decode)
}
