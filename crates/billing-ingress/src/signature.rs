//! `t=<unix>,v1=<hex>` HMAC-SHA256 webhook signatures.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::IngressError;

type HmacSha256 = Hmac<Sha256>;

/// Default accepted clock difference between sender and receiver.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Parsed signature header parts.
#[derive(Debug, PartialEq, Eq)]
struct SignatureParts {
    timestamp: i64,
    signatures: Vec<String>,
}

fn parse_header(header: &str) -> Result<SignatureParts, IngressError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let (key, value) = part
            .split_once('=')
            .ok_or(IngressError::MalformedSignature("expected key=value pairs"))?;
        match key.trim() {
            "t" => timestamp = value.trim().parse().ok(),
            "v1" => signatures.push(value.trim().to_string()),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(IngressError::MalformedSignature("missing timestamp"))?;
    if signatures.is_empty() {
        return Err(IngressError::MalformedSignature("missing v1 signature"));
    }
    Ok(SignatureParts { timestamp, signatures })
}

fn mac_of(secret: &str, timestamp: i64, payload: &[u8]) -> Result<Vec<u8>, IngressError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| IngressError::MalformedSignature("unusable secret"))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Header value signing `payload` at `timestamp`.
pub fn sign(secret: &str, payload: &[u8], timestamp: i64) -> Result<String, IngressError> {
    Ok(format!("t={},v1={}", timestamp, hex::encode(mac_of(secret, timestamp, payload)?)))
}

/// Check `header` against `payload`. Any listed `v1` signature may match.
pub fn verify(
    secret: &str,
    payload: &[u8],
    header: &str,
    now_unix: i64,
    tolerance_secs: i64,
) -> Result<(), IngressError> {
    let parts = parse_header(header)?;

    if (now_unix - parts.timestamp).abs() > tolerance_secs {
        return Err(IngressError::StaleTimestamp);
    }

    let expected = mac_of(secret, parts.timestamp, payload)?;
    let matched = parts.signatures.iter().any(|candidate| match hex::decode(candidate) {
        Ok(provided) => expected.ct_eq(&provided).unwrap_u8() == 1,
        Err(_) => false,
    });

    if matched {
        Ok(())
    } else {
        Err(IngressError::SignatureMismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";
    const PAYLOAD: &[u8] = br#"{"id":"evt_1","type":"invoice.paid","data":{"object":{}}}"#;

    #[test]
    fn test_parse_header() {
        let parts = parse_header("t=1234567890,v1=abc123,v0=old").unwrap();
        assert_eq!(parts.timestamp, 1234567890);
        assert_eq!(parts.signatures, vec!["abc123".to_string()]);
    }

    #[test]
    fn test_parse_header_invalid() {
        assert!(matches!(parse_header("invalid"), Err(IngressError::MalformedSignature(_))));
        assert!(matches!(parse_header("v1=abc"), Err(IngressError::MalformedSignature(_))));
        assert!(matches!(parse_header("t=123"), Err(IngressError::MalformedSignature(_))));
    }

    #[test]
    fn test_valid_signature() {
        let header = sign(SECRET, PAYLOAD, 1_700_000_000).unwrap();
        assert!(verify(SECRET, PAYLOAD, &header, 1_700_000_100, DEFAULT_TOLERANCE_SECS).is_ok());
    }

    #[test]
    fn test_wrong_secret_or_body() {
        let header = sign("other", PAYLOAD, 1_700_000_000).unwrap();
        assert!(matches!(
            verify(SECRET, PAYLOAD, &header, 1_700_000_000, DEFAULT_TOLERANCE_SECS),
            Err(IngressError::SignatureMismatch)
        ));

        let header = sign(SECRET, PAYLOAD, 1_700_000_000).unwrap();
        assert!(matches!(
            verify(SECRET, b"{}", &header, 1_700_000_000, DEFAULT_TOLERANCE_SECS),
            Err(IngressError::SignatureMismatch)
        ));

        let garbage = "t=1700000000,v1=not-hex";
        assert!(matches!(
            verify(SECRET, PAYLOAD, garbage, 1_700_000_000, DEFAULT_TOLERANCE_SECS),
            Err(IngressError::SignatureMismatch)
        ));
    }

    #[test]
    fn test_stale_timestamp() {
        let header = sign(SECRET, PAYLOAD, 1_000_000_000).unwrap();
        assert!(matches!(
            verify(SECRET, PAYLOAD, &header, 1_700_000_000, DEFAULT_TOLERANCE_SECS),
            Err(IngressError::StaleTimestamp)
        ));
    }

    #[test]
    fn test_rotated_secret_second_signature_matches() {
        let good = sign(SECRET, PAYLOAD, 1_700_000_000).unwrap();
        let good_sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t=1700000000,v1=deadbeef,v1={}", good_sig);
        assert!(verify(SECRET, PAYLOAD, &header, 1_700_000_000, DEFAULT_TOLERANCE_SECS).is_ok());
    }
}
