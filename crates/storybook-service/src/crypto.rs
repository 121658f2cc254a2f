//! Cryptographic utilities for webhook verification.
//!
//! Stripe signs each delivery with a `Stripe-Signature` header of the form
//! `t=<unix seconds>,v1=<hex hmac>[,v1=<hex hmac>...]`. The signed message is
//! `"{t}.{raw body}"` and the key is the endpoint's signing secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed delivery, in seconds.
pub const SIGNATURE_TOLERANCE_SECONDS: i64 = 300;

/// Why a webhook signature was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    /// No signing secret is configured, so nothing can be verified.
    #[error("webhook signing secret not configured")]
    MissingSecret,

    /// The request carried no signature header.
    #[error("missing signature header")]
    MissingHeader,

    /// The header has no `t=` or no `v1=` component.
    #[error("malformed signature header")]
    Malformed,

    /// The signed timestamp is outside the tolerance window.
    #[error("signature timestamp outside tolerance")]
    Expired,

    /// No `v1` signature matched.
    #[error("signature mismatch")]
    Mismatch,
}

/// Compute HMAC-SHA256 and return hex-encoded result.
///
/// # Panics
///
/// This function will never panic in practice. The `expect` call is guarded by
/// the invariant that HMAC-SHA256 accepts keys of any size per RFC 2104.
#[must_use]
pub fn hmac_sha256_hex(secret: &str, message: &str) -> String {
    // INVARIANT: HMAC-SHA256 accepts keys of any size per RFC 2104, so
    // `new_from_slice` only fails if the Hmac implementation is broken.
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC-SHA256 accepts any key size");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time string comparison to prevent timing attacks.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

/// Verify a Stripe-style signature header against the raw payload.
///
/// `now` is the current Unix time in seconds.
///
/// # Errors
///
/// Returns a `SignatureError` describing the first check that failed.
pub fn verify_stripe_signature(
    payload: &str,
    header: Option<&str>,
    secret: Option<&str>,
    now: i64,
) -> Result<(), SignatureError> {
    let secret = secret
        .filter(|s| !s.is_empty())
        .ok_or(SignatureError::MissingSecret)?;
    let header = header.ok_or(SignatureError::MissingHeader)?;

    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", ts)) => timestamp = Some(ts),
            Some(("v1", sig)) => signatures.push(sig),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if signatures.is_empty() {
        return Err(SignatureError::Malformed);
    }
    let signed_at: i64 = timestamp.parse().map_err(|_| SignatureError::Malformed)?;
    if (now - signed_at).abs() > SIGNATURE_TOLERANCE_SECONDS {
        return Err(SignatureError::Expired);
    }

    let expected = hmac_sha256_hex(secret, &format!("{timestamp}.{payload}"));
    if signatures.iter().any(|sig| constant_time_eq(&expected, sig)) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Build a signature header for `payload`, as Stripe would send it.
///
/// Used by tests and local tooling that replay deliveries.
#[must_use]
pub fn sign_stripe_payload(payload: &str, secret: &str, timestamp: i64) -> String {
    let signature = hmac_sha256_hex(secret, &format!("{timestamp}.{payload}"));
    format!("t={timestamp},v1={signature}")
}
