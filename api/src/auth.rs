//! HMAC request signing.
//!
//! The signed message binds the timestamp, the request path with its query
//! and the shared secret: `"{timestamp}:{path_and_query}:{secret}"`. The
//! digest is hex-encoded then base64url-encoded and carried in the `sign`
//! header next to `timestamp`.

use axum::http::{HeaderMap, Uri};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Computes the signature for a timestamp and request target.
pub fn generate_signature(timestamp: &str, path_and_query: &str, key: &str) -> String {
    // HMAC-SHA-256 accepts keys of any length.
    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).expect("hmac key");
    mac.update(format!("{timestamp}:{path_and_query}:{key}").as_bytes());

    let hexdigest = hex::encode(mac.finalize().into_bytes());
    URL_SAFE.encode(hexdigest.as_bytes())
}

/// Checks the `timestamp` / `sign` headers against the request target.
pub fn authenticate(secret: &str, headers: &HeaderMap, uri: &Uri) -> bool {
    let Some(timestamp) = headers.get("timestamp").and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let Some(signature) = headers.get("sign").and_then(|v| v.to_str().ok()) else {
        return false;
    };

    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());

    let expected = generate_signature(timestamp, path_and_query, secret);
    constant_time_eq(expected.as_bytes(), signature.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
