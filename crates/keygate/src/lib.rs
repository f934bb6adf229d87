//! Keygate Root Library
//!
//! Gates a site's public and administrative entry points behind a URL key
//! parameter that is remembered for the rest of the session once presented.
//!
//! # Architecture
//!
//! The host calls two lifecycle hooks:
//!
//! - [`on_after_initialise`] once per request. On the site it first checks
//!   for an incoming signed denial ([`incoming`]), then runs the gate
//!   ([`gate`]) and, on a block, the dispatcher ([`dispatch`]).
//! - [`on_user_after_logout`] after a successful administrative logout.
//!
//! Both return an [`Outcome`] the host maps onto its own response
//! primitives. Session state and the signing secret come in through the
//! `SessionStore` and `SecretSource` traits; nothing here reads globals.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod gate;
pub mod http;
pub mod incoming;
pub mod session;

pub use config::{ConfigSecret, GateConfig, RootConfig, ServerConfig};
pub use dispatch::{resolve_redirect, Denial};
pub use error::{RootError, RootResult};
pub use gate::{Allowed, Blocked};

use keygate_core::{Client, RequestContext, SecretSource, SessionStore, Timestamp, Unauthorized};
use url::Url;

/// Status used for every redirect the gate issues.
pub const REDIRECT_STATUS: u16 = 303;

/// What the host should do with the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Carry on serving the request.
    Proceed,
    /// Answer with `303 See Other` to `location`.
    Redirect { location: Url },
    /// Render an error response.
    Raise(Unauthorized),
}

impl From<Denial> for Outcome {
    fn from(denial: Denial) -> Self {
        match denial {
            Denial::Redirect { location } | Denial::Handoff { location, .. } => {
                Outcome::Redirect { location }
            }
            Denial::Raise(err) => Outcome::Raise(err),
        }
    }
}

/// Per-request entry point.
pub fn on_after_initialise(
    ctx: &mut RequestContext,
    config: &GateConfig,
    session: &dyn SessionStore,
    secrets: &dyn SecretSource,
    now: Timestamp,
) -> RootResult<Outcome> {
    gate::log_diagnostics(config, ctx);

    if ctx.client.raises_locally() {
        if let Some(err) = incoming::check_incoming(config, ctx, secrets, now) {
            return Ok(Outcome::Raise(err));
        }
    }

    let blocked = match gate::evaluate(config, ctx, session) {
        Ok(_) => return Ok(Outcome::Proceed),
        Err(blocked) => blocked,
    };

    let denial = dispatch::dispatch(&blocked, config, ctx, secrets, now)?;
    Ok(denial.map(Outcome::from).unwrap_or(Outcome::Proceed))
}

/// Administrative logout: forget the key and send the user to the root.
///
/// Only acts in the administrative context.
pub fn on_user_after_logout(ctx: &RequestContext, session: &dyn SessionStore) -> Outcome {
    if ctx.client != Client::Admin {
        return Outcome::Proceed;
    }
    gate::forget(session);
    tracing::debug!("administrative logout, key flag cleared");
    Outcome::Redirect {
        location: ctx.app_root.clone(),
    }
}
