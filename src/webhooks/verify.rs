use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the timestamp and HMAC signature(s),
/// `t=<unix>,v1=<hex>[,v1=<hex>...]`. Unknown schemes are ignored so the
/// processor can rotate signing versions without breaking verification.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, PartialEq, Eq)]
pub enum VerifyError {
    MalformedHeader,
    SignatureMismatch,
    StaleEvent,
    /// Signature checked out but the body is not a parseable event. Only
    /// reachable with a correctly signed payload.
    Payload(String),
}

/// A webhook event that passed signature and freshness checks. Produced
/// exclusively by [`verify`]; the dispatcher refuses to exist without one.
#[derive(Debug, Clone)]
pub struct VerifiedEvent {
    pub event_id: String,
    pub event_type: String,
    /// The payment intent the event refers to, when it refers to one.
    pub intent_id: Option<String>,
    /// Event creation time from the payload (unix seconds).
    pub created: i64,
}

#[derive(Deserialize)]
struct EventEnvelope {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    created: i64,
    data: EventData,
}

#[derive(Deserialize)]
struct EventData {
    object: serde_json::Value,
}

struct SignatureHeader {
    timestamp: i64,
    timestamp_raw: String,
    v1: Vec<String>,
}

/// Verifies `signature_header` against the exact bytes of `raw_body`.
///
/// The HMAC is computed over `"{timestamp}.{raw_body}"` without ever
/// re-encoding the body; the payload is parsed only after a signature
/// matches. Signature candidates are compared in constant time and the
/// timestamp must fall within `tolerance_secs` of `now` in either direction.
pub fn verify(
    raw_body: &[u8],
    signature_header: &str,
    secret: &[u8],
    tolerance_secs: i64,
    now: DateTime<Utc>,
) -> Result<VerifiedEvent, VerifyError> {
    let header = parse_signature_header(signature_header)?;

    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|_| VerifyError::SignatureMismatch)?;
    mac.update(header.timestamp_raw.as_bytes());
    mac.update(b".");
    mac.update(raw_body);
    let expected = mac.finalize().into_bytes();

    let mut matched = false;
    for candidate in &header.v1 {
        let Ok(decoded) = hex::decode(candidate) else {
            continue;
        };
        if decoded.len() != expected.len() {
            continue;
        }
        matched |= bool::from(decoded.as_slice().ct_eq(expected.as_slice()));
    }
    if !matched {
        return Err(VerifyError::SignatureMismatch);
    }

    if (now.timestamp() - header.timestamp).abs() > tolerance_secs {
        return Err(VerifyError::StaleEvent);
    }

    let envelope: EventEnvelope = serde_json::from_slice(raw_body)
        .map_err(|err| VerifyError::Payload(err.to_string()))?;

    let intent_id = if envelope.event_type.starts_with("payment_intent.") {
        envelope
            .data
            .object
            .get("id")
            .and_then(|id| id.as_str())
            .map(str::to_string)
    } else {
        None
    };

    Ok(VerifiedEvent {
        event_id: envelope.id,
        event_type: envelope.event_type,
        intent_id,
        created: envelope.created,
    })
}

fn parse_signature_header(value: &str) -> Result<SignatureHeader, VerifyError> {
    let mut timestamp = None;
    let mut timestamp_raw = None;
    let mut v1 = Vec::new();

    for part in value.split(',') {
        let Some((key, val)) = part.trim().split_once('=') else {
            return Err(VerifyError::MalformedHeader);
        };
        match key {
            "t" => {
                let parsed: i64 = val.parse().map_err(|_| VerifyError::MalformedHeader)?;
                timestamp = Some(parsed);
                timestamp_raw = Some(val.to_string());
            }
            "v1" => v1.push(val.to_string()),
            _ => {}
        }
    }

    match (timestamp, timestamp_raw) {
        (Some(timestamp), Some(timestamp_raw)) if !v1.is_empty() => Ok(SignatureHeader {
            timestamp,
            timestamp_raw,
            v1,
        }),
        _ => Err(VerifyError::MalformedHeader),
    }
}
