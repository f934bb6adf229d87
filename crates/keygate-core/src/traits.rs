use serde_json::Value;
use zeroize::Zeroizing;

use crate::error::KeygateResult;

// ---------------------------------------------------------------------------
// SessionStore: the host's per-visitor, per-context session
//
// Opaque key/value storage. The host owns serialization of concurrent
// requests within one session; the gate only reads and writes its own flag.
// ---------------------------------------------------------------------------

pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value);
    fn clear(&self, key: &str);
}

// ---------------------------------------------------------------------------
// SecretSource: the process-wide HMAC signing secret
//
// Stable for the lifetime of the deployment; never rotated mid-request.
// ---------------------------------------------------------------------------

pub trait SecretSource: Send + Sync {
    /// Returns `KeygateError::MissingSecret` when no secret is configured.
    fn signing_secret(&self) -> KeygateResult<Zeroizing<Vec<u8>>>;
}
