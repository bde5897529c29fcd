//! Webhook request signing.
//!
//! A signature is the hex-encoded HMAC-SHA256 of `"{timestamp}.{payload}"`
//! keyed with the endpoint secret. Binding the timestamp into the MAC lets a
//! recipient reject replays: a captured request cannot be re-sent with a
//! fresh timestamp without invalidating its signature.
//!
//! Recipients use [`verify`] (or [`check_signature_at`] for a reason on
//! failure) against the raw request body and the [`TIMESTAMP_HEADER`] value.

mod error;
mod secret;

use std::time::Duration;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

pub use error::{SignatureError, SignerError};
pub use secret::{SECRET_LEN, generate_secret};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex signature.
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";
/// Header carrying the signing timestamp in unix seconds.
pub const TIMESTAMP_HEADER: &str = "X-Webhook-Timestamp";
/// Content type of every webhook body.
pub const CONTENT_TYPE: &str = "application/json";

/// Default replay window accepted by [`verify`].
pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(300);

/// Sign `payload` with `secret` at `timestamp` (unix seconds).
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> Result<String, SignerError> {
    Ok(hex::encode(compute_mac(payload, secret, timestamp)?))
}

/// Verify a signature against the wall clock.
pub fn verify(
    payload: &[u8],
    signature_hex: &str,
    secret: &str,
    timestamp: i64,
    tolerance: Duration,
) -> bool {
    verify_at(
        payload,
        signature_hex,
        secret,
        timestamp,
        tolerance,
        chrono::Utc::now().timestamp(),
    )
}

/// Verify a signature against an explicit clock reading `now`.
pub fn verify_at(
    payload: &[u8],
    signature_hex: &str,
    secret: &str,
    timestamp: i64,
    tolerance: Duration,
    now: i64,
) -> bool {
    check_signature_at(payload, signature_hex, secret, timestamp, tolerance, now).is_ok()
}

/// Like [`verify_at`] but reports why a signature was rejected.
///
/// The timestamp is checked before any MAC is computed.
pub fn check_signature_at(
    payload: &[u8],
    signature_hex: &str,
    secret: &str,
    timestamp: i64,
    tolerance: Duration,
    now: i64,
) -> Result<(), SignatureError> {
    let skew = now.abs_diff(timestamp);
    if skew > tolerance.as_secs() {
        return Err(SignatureError::OutsideTolerance {
            skew_secs: skew,
            tolerance_secs: tolerance.as_secs(),
        });
    }

    let provided = hex::decode(signature_hex).map_err(|_| SignatureError::Malformed)?;
    let expected =
        compute_mac(payload, secret, timestamp).map_err(|_| SignatureError::Mismatch)?;

    if bool::from(expected.as_slice().ct_eq(provided.as_slice())) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

fn compute_mac(payload: &[u8], secret: &str, timestamp: i64) -> Result<Vec<u8>, SignerError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| SignerError::InvalidKey(e.to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// The signature headers for one outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub signature: String,
    pub timestamp: String,
}

impl SignedHeaders {
    pub fn new(payload: &[u8], secret: &str, timestamp: i64) -> Result<Self, SignerError> {
        Ok(Self {
            signature: sign(payload, secret, timestamp)?,
            timestamp: timestamp.to_string(),
        })
    }

    /// Header name/value pairs, including `Content-Type`.
    pub fn pairs(&self) -> [(&'static str, &str); 3] {
        [
            (SIGNATURE_HEADER, self.signature.as_str()),
            (TIMESTAMP_HEADER, self.timestamp.as_str()),
            ("Content-Type", CONTENT_TYPE),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";
    const BODY: &[u8] = br#"{"id":42}"#;
    const TS: i64 = 1_700_000_000;

    #[test]
    fn sign_is_hex_sha256() {
        let sig = sign(BODY, SECRET, TS).unwrap();
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(sig, sign(BODY, SECRET, TS).unwrap());
    }

    #[test]
    fn known_vector() {
        // HMAC-SHA256("key", "1.x")
        let mut mac = HmacSha256::new_from_slice(b"key").unwrap();
        mac.update(b"1.x");
        let expected = hex::encode(mac.finalize().into_bytes());
        assert_eq!(sign(b"x", "key", 1).unwrap(), expected);
    }

    #[test]
    fn round_trip_within_tolerance() {
        let sig = sign(BODY, SECRET, TS).unwrap();
        assert!(verify_at(BODY, &sig, SECRET, TS, DEFAULT_TOLERANCE, TS));
        assert!(verify_at(BODY, &sig, SECRET, TS, DEFAULT_TOLERANCE, TS + 300));
        assert!(verify_at(BODY, &sig, SECRET, TS, DEFAULT_TOLERANCE, TS - 300));
    }

    #[test]
    fn round_trip_against_wall_clock() {
        let now = chrono::Utc::now().timestamp();
        let sig = sign(BODY, SECRET, now).unwrap();
        assert!(verify(BODY, &sig, SECRET, now, DEFAULT_TOLERANCE));
    }

    #[test]
    fn uppercase_hex_is_accepted() {
        let sig = sign(BODY, SECRET, TS).unwrap().to_uppercase();
        assert!(verify_at(BODY, &sig, SECRET, TS, DEFAULT_TOLERANCE, TS));
    }

    #[test]
    fn replay_outside_window_is_rejected() {
        let sig = sign(BODY, SECRET, TS).unwrap();
        let err =
            check_signature_at(BODY, &sig, SECRET, TS, DEFAULT_TOLERANCE, TS + 301).unwrap_err();
        assert_eq!(
            err,
            SignatureError::OutsideTolerance {
                skew_secs: 301,
                tolerance_secs: 300
            }
        );
        assert!(!verify_at(BODY, &sig, SECRET, TS, DEFAULT_TOLERANCE, TS - 301));
    }

    #[test]
    fn stale_timestamp_rejected_even_with_garbage_signature() {
        // Rejected on the clock alone, before the signature is decoded.
        let err = check_signature_at(BODY, "zz", SECRET, TS, DEFAULT_TOLERANCE, TS + 10_000)
            .unwrap_err();
        assert!(matches!(err, SignatureError::OutsideTolerance { .. }));
    }

    #[test]
    fn tampering_is_rejected() {
        let sig = sign(BODY, SECRET, TS).unwrap();
        assert!(!verify_at(br#"{"id":43}"#, &sig, SECRET, TS, DEFAULT_TOLERANCE, TS));
        assert!(!verify_at(BODY, &sig, "other-secret", TS, DEFAULT_TOLERANCE, TS));
        // Re-stamping a captured request invalidates it.
        assert!(!verify_at(BODY, &sig, SECRET, TS + 1, DEFAULT_TOLERANCE, TS));

        let mut flipped = sig.into_bytes();
        flipped[0] = if flipped[0] == b'0' { b'1' } else { b'0' };
        let flipped = String::from_utf8(flipped).unwrap();
        assert!(!verify_at(BODY, &flipped, SECRET, TS, DEFAULT_TOLERANCE, TS));
    }

    #[test]
    fn malformed_and_truncated_signatures() {
        let sig = sign(BODY, SECRET, TS).unwrap();
        assert_eq!(
            check_signature_at(BODY, "not-hex", SECRET, TS, DEFAULT_TOLERANCE, TS),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            check_signature_at(BODY, &sig[..32], SECRET, TS, DEFAULT_TOLERANCE, TS),
            Err(SignatureError::Mismatch)
        );
        assert!(!verify_at(BODY, "", SECRET, TS, DEFAULT_TOLERANCE, TS));
    }

    #[test]
    fn signed_headers() {
        let headers = SignedHeaders::new(BODY, SECRET, TS).unwrap();
        assert_eq!(headers.timestamp, "1700000000");
        let pairs = headers.pairs();
        assert_eq!(pairs[0].0, SIGNATURE_HEADER);
        assert_eq!(pairs[0].1, sign(BODY, SECRET, TS).unwrap());
        assert_eq!(pairs[2], ("Content-Type", "application/json"));
    }
}
