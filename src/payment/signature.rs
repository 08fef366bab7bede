//! Webhook signature verification.
//!
//! Header format: `t=<unix seconds>,v1=<hex hmac>[,v1=...]`. The signed
//! message is the timestamp, a `.`, and the request body exactly as it was
//! received, so verification must run before anything parses the body.

use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use crate::{EcommerceError, Result};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

#[derive(Clone)]
pub struct WebhookVerifier {
    secret: SecretString,
    tolerance_secs: i64,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier").field("secret", &"[REDACTED]").field("tolerance_secs", &self.tolerance_secs).finish()
    }
}

struct ParsedHeader<'a> {
    timestamp: i64,
    raw_timestamp: &'a str,
    signatures: Vec<&'a str>,
}

fn parse_header(header: &str) -> Result<ParsedHeader<'_>> {
    let mut raw_timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", v)) => raw_timestamp = Some(v),
            Some(("v1", v)) => signatures.push(v),
            _ => {}
        }
    }
    let raw_timestamp = raw_timestamp.ok_or_else(|| EcommerceError::InvalidSignature("missing timestamp".into()))?;
    let timestamp = raw_timestamp.parse::<i64>().map_err(|_| EcommerceError::InvalidSignature("malformed timestamp".into()))?;
    if signatures.is_empty() {
        return Err(EcommerceError::InvalidSignature("missing v1 signature".into()));
    }
    Ok(ParsedHeader { timestamp, raw_timestamp, signatures })
}

impl WebhookVerifier {
    pub fn new(secret: SecretString, tolerance_secs: u64) -> Self {
        Self { secret, tolerance_secs: i64::try_from(tolerance_secs).unwrap_or(i64::MAX) }
    }

    fn mac(&self, timestamp: &str, payload: &[u8]) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes()).expect("HMAC can take key of any size");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac
    }

    pub fn verify(&self, payload: &[u8], header: &str) -> Result<()> {
        self.verify_at(payload, header, Utc::now().timestamp())
    }

    pub fn verify_at(&self, payload: &[u8], header: &str, now: i64) -> Result<()> {
        let parsed = parse_header(header)?;
        if now.saturating_sub(parsed.timestamp).saturating_abs() > self.tolerance_secs {
            return Err(EcommerceError::InvalidSignature("timestamp outside tolerance".into()));
        }
        let mac = self.mac(parsed.raw_timestamp, payload);
        let matched = parsed.signatures.iter()
            .filter_map(|sig| hex::decode(sig).ok())
            .any(|sig| mac.clone().verify_slice(&sig).is_ok());
        if matched { Ok(()) } else { Err(EcommerceError::InvalidSignature("no matching signature".into())) }
    }

    /// Produce a header value for `payload`, as the provider would.
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> String {
        let ts = timestamp.to_string();
        let sig = hex::encode(self.mac(&ts, payload).finalize().into_bytes());
        format!("t={ts},v1={sig}")
    }
}
