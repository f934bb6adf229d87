//! Receiving side of the denial handoff.
//!
//! A request carrying a verified `ba_*` message raises the deferred error.
//! Anything less than a fully verified message is ignored and the request
//! falls through to normal gating.

use keygate_core::{RequestContext, SecretSource, Timestamp, Unauthorized};
use keygate_handoff::{decode_from_url, HandoffSigner, SigningSecret, HANDOFF_TTL_SECONDS};

use crate::config::GateConfig;

pub fn check_incoming(
    config: &GateConfig,
    ctx: &RequestContext,
    secrets: &dyn SecretSource,
    now: Timestamp,
) -> Option<Unauthorized> {
    let message = match decode_from_url(&ctx.current_url, &config.message) {
        Ok(Some(message)) => message,
        Ok(None) => return None,
        Err(e) => {
            tracing::debug!(error = %e, "ignoring undecodable handoff message");
            return None;
        }
    };

    let signer = match SigningSecret::from_source(secrets) {
        Ok(secret) => HandoffSigner::new(secret),
        Err(e) => {
            tracing::warn!(error = %e, "handoff message received but no signing secret is configured");
            return None;
        }
    };

    if !signer.verify(&message, now, HANDOFF_TTL_SECONDS) {
        tracing::debug!(
            ts = message.timestamp.seconds_since_epoch,
            now = now.seconds_since_epoch,
            "ignoring handoff message that failed verification"
        );
        return None;
    }

    tracing::debug!(code = message.code, "verified handoff message, raising");
    Some(Unauthorized::with_code(message.code, message.text))
}
