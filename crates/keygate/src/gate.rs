//! Gate decision engine.
//!
//! Evaluated once per request. The first matching rule wins:
//! unconfigured, already remembered, out of area, key presented, blocked.

use keygate_core::{Area, RequestContext, SessionStore, SESSION_FLAG_KEY};
use serde_json::Value;

use crate::config::GateConfig;

/// Why a request was let through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allowed {
    /// No key parameter name is configured.
    Unconfigured,
    /// The key was presented earlier in this session.
    Remembered,
    /// The gate does not secure this request's area.
    OutOfArea,
    /// The key is present on this request; the session now remembers it.
    KeyPresented,
}

/// A block decision, carrying the area the request was evaluated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blocked {
    pub area: Area,
}

pub fn is_remembered(session: &dyn SessionStore) -> bool {
    matches!(session.get(SESSION_FLAG_KEY), Some(Value::Bool(true)))
}

pub fn remember(session: &dyn SessionStore) {
    session.set(SESSION_FLAG_KEY, Value::Bool(true));
}

pub fn forget(session: &dyn SessionStore) {
    session.clear(SESSION_FLAG_KEY);
}

pub fn evaluate(
    config: &GateConfig,
    ctx: &RequestContext,
    session: &dyn SessionStore,
) -> Result<Allowed, Blocked> {
    if !config.is_configured() {
        return Ok(Allowed::Unconfigured);
    }
    if is_remembered(session) {
        return Ok(Allowed::Remembered);
    }

    let area = ctx.client.area();
    if !config.area.covers(area) {
        tracing::debug!(secured = %config.area, %area, "gate does not apply to this area");
        return Ok(Allowed::OutOfArea);
    }

    if ctx.has_param(config.key_name_for(ctx.client)) {
        remember(session);
        tracing::debug!(%area, "key presented, remembered for session");
        return Ok(Allowed::KeyPresented);
    }

    tracing::debug!(%area, "no key presented, blocking");
    Err(Blocked { area })
}

/// Diagnostic event for one gated request, emitted only with `debug = true`.
pub fn log_diagnostics(config: &GateConfig, ctx: &RequestContext) {
    if !config.debug {
        return;
    }
    match (ctx.client, ctx.action()) {
        (keygate_core::Client::Admin, action) => tracing::info!(
            target: "keygate::diagnostics",
            client = %ctx.client,
            current_url = %ctx.current_url,
            route = ctx.route(),
            action = action.as_deref().unwrap_or("-"),
            "gate request"
        ),
        _ => tracing::info!(
            target: "keygate::diagnostics",
            client = %ctx.client,
            current_url = %ctx.current_url,
            "gate request"
        ),
    }
}
