//! Shared vocabulary for the keygate access gate.
//!
//! Holds the types every other crate agrees on: which client context a
//! request belongs to, which area a gate secures, the per-request
//! [`RequestContext`], and the two host seams the core calls into
//! ([`SessionStore`] and [`SecretSource`]).

pub mod error;
pub mod traits;
pub mod types;

pub use error::*;
pub use traits::*;
pub use types::*;
