//! Denial dispatcher: turns a block decision into a redirect, a handoff
//! redirect carrying a signed message, or a locally raised error.

use keygate_core::{
    BlockMode, RequestContext, SecretSource, Timestamp, Unauthorized, UNAUTHORIZED_CODE,
};
use keygate_handoff::{
    append_to_url, strip_from_url, DenialMessage, HandoffSigner, SigningSecret,
};
use url::Url;

use crate::config::GateConfig;
use crate::error::RootResult;
use crate::gate::Blocked;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    /// Same-context redirect, no payload.
    Redirect { location: Url },
    /// Redirect into the site carrying a signed denial message.
    Handoff { location: Url, message: DenialMessage },
    /// Raise the error in the current context.
    Raise(Unauthorized),
}

/// Where a blocked request is sent.
///
/// `http://`/`https://` targets are used verbatim, `/path` targets are joined
/// onto the application root, anything else is the application root.
pub fn resolve_redirect(redirect_url: &str, app_root: &Url) -> Url {
    let target = redirect_url.trim();

    if target.starts_with("http://") || target.starts_with("https://") {
        match Url::parse(target) {
            Ok(url) => return url,
            Err(e) => {
                tracing::warn!(error = %e, "unparseable redirect_url, using application root");
                return app_root.clone();
            }
        }
    }

    if let Some(relative) = target.strip_prefix('/') {
        match app_root.join(relative.trim_start_matches('/')) {
            Ok(url) => return url,
            Err(e) => {
                tracing::warn!(error = %e, "unjoinable redirect_url, using application root");
            }
        }
    }

    app_root.clone()
}

/// Dispatch a block decision.
///
/// Returns `Ok(None)` when the resolved target is the current URL, ignoring
/// any `ba_*` parameters a previous handoff left on it; the request then
/// proceeds instead of looping.
pub fn dispatch(
    blocked: &Blocked,
    config: &GateConfig,
    ctx: &mut RequestContext,
    secrets: &dyn SecretSource,
    now: Timestamp,
) -> RootResult<Option<Denial>> {
    let target = resolve_redirect(&config.redirect_url, &ctx.app_root);
    ctx.resolved_redirect = Some(target.clone());

    if target.as_str() == strip_from_url(&ctx.current_url).as_str() {
        tracing::debug!(area = %blocked.area, target = %target, "redirect target is current url, not redirecting");
        return Ok(None);
    }

    match config.block_mode {
        BlockMode::Redirect => {
            tracing::debug!(area = %blocked.area, target = %target, "blocked, redirecting");
            Ok(Some(Denial::Redirect { location: target }))
        }
        BlockMode::Message if ctx.client.raises_locally() => {
            tracing::debug!(area = %blocked.area, "blocked, raising locally");
            Ok(Some(Denial::Raise(Unauthorized::with_code(
                UNAUTHORIZED_CODE,
                config.message.clone(),
            ))))
        }
        BlockMode::Message => {
            let signer = HandoffSigner::new(SigningSecret::from_source(secrets)?);
            let message = signer.issue(UNAUTHORIZED_CODE, &config.message, now)?;
            let location = append_to_url(&target, &message);
            tracing::debug!(area = %blocked.area, client = %ctx.client, "blocked, handing off denial");
            Ok(Some(Denial::Handoff { location, message }))
        }
    }
}
