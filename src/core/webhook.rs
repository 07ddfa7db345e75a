// Copyright (c) 2021 Tangram Robotics Inc. - All Rights Reserved
// Unauthorized copying of this file, via any medium is strictly prohibited
// Proprietary and confidential
// ----------------------------

//! Verify signed webhook deliveries from Mercury.
//!
//! Each delivery carries `X-Webhook-Timestamp` (unix seconds) and
//! `X-Webhook-Signature`, the hex HMAC-SHA256 of `"{timestamp}.{body}"` keyed
//! with the shared secret.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";
pub const TIMESTAMP_HEADER: &str = "x-webhook-timestamp";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq)]
pub enum SignatureError {
    #[error("Missing {0} header")]
    MissingHeader(&'static str),
    #[error("Malformed webhook timestamp")]
    MalformedTimestamp,
    #[error("Webhook timestamp outside tolerance")]
    StaleTimestamp,
    #[error("Malformed webhook signature")]
    MalformedSignature,
    #[error("Webhook signature mismatch")]
    Mismatch,
}

/// Hex HMAC-SHA256 of `"{timestamp}.{body}"`.
pub fn sign(secret: &[u8], timestamp: &str, body: &[u8]) -> String {
    hex::encode(digest(secret, timestamp, body))
}

fn digest(secret: &[u8], timestamp: &str, body: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC key of any size");
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);
    mac.finalize().into_bytes().to_vec()
}

/// Check a delivery's headers against its raw body.
///
/// `now` is the current unix time; deliveries more than `tolerance_seconds`
/// away from it are rejected so captured requests can't be replayed later.
pub fn verify(
    secret: &[u8],
    signature: Option<&str>,
    timestamp: Option<&str>,
    body: &[u8],
    now: i64,
    tolerance_seconds: u64,
) -> Result<(), SignatureError> {
    let signature = signature.ok_or(SignatureError::MissingHeader("X-Webhook-Signature"))?;
    let timestamp = timestamp.ok_or(SignatureError::MissingHeader("X-Webhook-Timestamp"))?;

    let sent_at: i64 = timestamp
        .trim()
        .parse()
        .map_err(|_| SignatureError::MalformedTimestamp)?;
    let within_tolerance = now
        .checked_sub(sent_at)
        .map_or(false, |age| age.unsigned_abs() <= tolerance_seconds);
    if !within_tolerance {
        return Err(SignatureError::StaleTimestamp);
    }

    let signature = signature.trim();
    let signature = signature.strip_prefix("sha256=").unwrap_or(signature);
    let provided = hex::decode(signature).map_err(|_| SignatureError::MalformedSignature)?;

    let expected = digest(secret, timestamp.trim(), body);
    // ct_eq is false for slices of different lengths
    if bool::from(expected.ct_eq(&provided)) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Body of a Mercury webhook delivery.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct WebhookEvent {
    /// Unique per event; redeliveries reuse it.
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: InvoiceEventData,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct InvoiceEventData {
    pub invoice_id: String,
    #[serde(default)]
    pub amount_cents: u64,
    #[serde(default)]
    pub status: String,
}

pub const INVOICE_PAID: &str = "invoice.paid";
