use keygate_core::{KeygateError, SecretSource, Timestamp, UNAUTHORIZED_CODE};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

use crate::error::{HandoffError, HandoffResult};

// ---------------------------------------------------------------------------
// SigningSecret: HMAC key, zeroized on drop
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct SigningSecret {
    key_bytes: Zeroizing<Vec<u8>>,
}

impl SigningSecret {
    pub fn new(key_bytes: impl Into<Vec<u8>>) -> HandoffResult<Self> {
        let key_bytes = Zeroizing::new(key_bytes.into());
        if key_bytes.is_empty() {
            return Err(HandoffError::SecretUnavailable);
        }
        Ok(Self { key_bytes })
    }

    /// Pull the secret from the host's secret source.
    pub fn from_source(source: &dyn SecretSource) -> HandoffResult<Self> {
        match source.signing_secret() {
            Ok(bytes) => Self::new(bytes.to_vec()),
            Err(KeygateError::MissingSecret) => Err(HandoffError::SecretUnavailable),
            Err(_) => Err(HandoffError::InternalError),
        }
    }

    pub fn key_bytes(&self) -> &[u8] {
        &self.key_bytes
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningSecret([REDACTED])")
    }
}

// ---------------------------------------------------------------------------
// Nonce: 128-bit random value, lowercase hex
// ---------------------------------------------------------------------------

/// Varies the signed payload between otherwise identical messages.
///
/// Not tracked server-side; replay protection comes from the TTL alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Nonce(String);

impl Nonce {
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 16];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Wrap a nonce received off the wire. Content is not validated here;
    /// the signature covers it.
    pub fn from_wire(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// DenialMessage: the wire artifact of the handoff
// ---------------------------------------------------------------------------

/// A signed denial, built fresh for every blocked cross-context redirect and
/// consumed by the very next request that carries it. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenialMessage {
    pub code: u16,
    pub text: String,
    pub timestamp: Timestamp,
    pub nonce: Nonce,
    pub signature: String,
}

impl DenialMessage {
    /// Whether every field the verifier requires is present.
    pub fn is_complete(&self) -> bool {
        !self.nonce.is_empty() && !self.signature.is_empty()
    }

    pub fn default_code() -> u16 {
        UNAUTHORIZED_CODE
    }
}
