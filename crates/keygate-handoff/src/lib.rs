//! Keygate denial handoff
//!
//! When a request is blocked in a context that cannot show an error to its
//! caller, the decision travels to the public site inside the redirect URL as
//! a signed message. The site verifies it and raises the error itself.
//!
//! Key features:
//! - HMAC-SHA256 over the positional payload `code|text|timestamp|nonce`
//! - 128-bit random nonce per message, hex-encoded
//! - Constant-time signature comparison
//! - Fixed 30-second TTL in place of a server-side nonce cache
//! - `ba_*` query parameter encoding and decoding

pub mod error;
pub mod signer;
pub mod types;
pub mod wire;

pub use error::{HandoffError, HandoffResult};
pub use signer::{canonical_payload, HandoffSigner, HANDOFF_TTL_SECONDS};
pub use types::{DenialMessage, Nonce, SigningSecret};
pub use wire::{append_to_url, decode_from_url, params, strip_from_url};
