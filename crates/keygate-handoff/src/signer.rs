//! HMAC-SHA256 signing and verification of denial messages.
//!
//! Signing: hex(HMAC-SHA256(secret, code|text|timestamp|nonce)).
//! Verification: required fields present, timestamp within the TTL in either
//! direction, signature equal in constant time. Any failure is a plain `false`.

use hmac::{Hmac, Mac};
use keygate_core::Timestamp;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{HandoffError, HandoffResult};
use crate::types::{DenialMessage, Nonce, SigningSecret};

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a denial message. It only has to survive one redirect hop.
pub const HANDOFF_TTL_SECONDS: u64 = 30;

/// The positional payload covered by the signature.
///
/// Fields are pipe-joined without escaping; the HMAC covers the whole string.
pub fn canonical_payload(code: u16, text: &str, timestamp: Timestamp, nonce: &Nonce) -> String {
    format!(
        "{}|{}|{}|{}",
        code,
        text,
        timestamp.seconds_since_epoch,
        nonce.as_str()
    )
}

#[derive(Debug, Clone)]
pub struct HandoffSigner {
    secret: SigningSecret,
}

impl HandoffSigner {
    pub fn new(secret: SigningSecret) -> Self {
        Self { secret }
    }

    /// Deterministic signature over the canonical payload.
    pub fn sign(
        &self,
        code: u16,
        text: &str,
        timestamp: Timestamp,
        nonce: &Nonce,
    ) -> HandoffResult<String> {
        let mut mac = HmacSha256::new_from_slice(self.secret.key_bytes())
            .map_err(|_| HandoffError::InternalError)?;
        mac.update(canonical_payload(code, text, timestamp, nonce).as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Build a fresh message stamped `now` with a new nonce.
    pub fn issue(&self, code: u16, text: &str, now: Timestamp) -> HandoffResult<DenialMessage> {
        let nonce = Nonce::generate();
        let signature = self.sign(code, text, now, &nonce)?;
        Ok(DenialMessage {
            code,
            text: text.to_string(),
            timestamp: now,
            nonce,
            signature,
        })
    }

    pub fn verify(&self, msg: &DenialMessage, now: Timestamp, ttl_seconds: u64) -> bool {
        if !msg.is_complete() {
            return false;
        }
        if now.abs_diff(msg.timestamp) > ttl_seconds {
            return false;
        }
        let expected = match self.sign(msg.code, &msg.text, msg.timestamp, &msg.nonce) {
            Ok(sig) => sig,
            Err(_) => return false,
        };
        expected.as_bytes().ct_eq(msg.signature.as_bytes()).into()
    }
}
