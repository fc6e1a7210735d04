//! Upload URL signatures
//!
//! The XMPP server hands clients a PUT URL carrying `v=<hex hmac>`, where the
//! MAC is HMAC-SHA256 keyed by the shared secret over `"<key> <length>"`.
//! A signature authorizes exactly one (key, length) pair. It does not bind
//! the body bytes, the method or a point in time.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Supplied signature did not match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureMismatch {
    /// Signature the gateway computed; for operator logs only
    pub expected: String,
}

/// Message covered by the MAC.
///
/// An unknown length (streamed body without Content-Length) is rendered as
/// `-1`, the value HTTP servers conventionally report for it.
pub fn signed_message(key: &str, length: Option<u64>) -> String {
    match length {
        Some(len) => format!("{} {}", key, len),
        None => format!("{} -1", key),
    }
}

fn mac_for(secret: &[u8], key: &str, length: Option<u64>) -> HmacSha256 {
    // new_from_slice only fails for fixed-size keys; HMAC takes any length
    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC accepts keys of any length"),
    };
    mac.update(signed_message(key, length).as_bytes());
    mac
}

/// Compute the lowercase hex signature for `key` and `length`
pub fn sign(secret: &[u8], key: &str, length: Option<u64>) -> String {
    hex::encode(mac_for(secret, key, length).finalize().into_bytes())
}

/// Check a client-supplied hex signature in constant time
pub fn verify(
    secret: &[u8],
    key: &str,
    length: Option<u64>,
    supplied: &str,
) -> Result<(), SignatureMismatch> {
    let mac = mac_for(secret, key, length);
    let mismatch = |mac: &HmacSha256| SignatureMismatch {
        expected: hex::encode(mac.clone().finalize().into_bytes()),
    };

    let supplied = match hex::decode(supplied) {
        Ok(bytes) => bytes,
        Err(_) => return Err(mismatch(&mac)),
    };

    mac.clone()
        .verify_slice(&supplied)
        .map_err(|_| mismatch(&mac))
}
