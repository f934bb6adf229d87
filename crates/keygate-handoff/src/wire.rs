//! `ba_*` query-string encoding of a [`DenialMessage`].

use keygate_core::Timestamp;
use std::collections::HashMap;
use url::Url;

use crate::error::{HandoffError, HandoffResult};
use crate::types::{DenialMessage, Nonce};

/// Query parameter names of the handoff payload.
pub mod params {
    pub const THROW: &str = "ba_throw";
    pub const CODE: &str = "ba_code";
    pub const MESSAGE: &str = "ba_msg";
    pub const TIMESTAMP: &str = "ba_ts";
    pub const NONCE: &str = "ba_n";
    pub const SIGNATURE: &str = "ba_sig";

    pub const ALL: [&str; 6] = [THROW, CODE, MESSAGE, TIMESTAMP, NONCE, SIGNATURE];
}

/// Append the message to `target` as query parameters, keeping any query the
/// target already has.
pub fn append_to_url(target: &Url, msg: &DenialMessage) -> Url {
    let mut url = target.clone();
    url.query_pairs_mut()
        .append_pair(params::THROW, "1")
        .append_pair(params::CODE, &msg.code.to_string())
        .append_pair(params::MESSAGE, &msg.text)
        .append_pair(params::TIMESTAMP, &msg.timestamp.seconds_since_epoch.to_string())
        .append_pair(params::NONCE, msg.nonce.as_str())
        .append_pair(params::SIGNATURE, &msg.signature);
    url
}

/// `url` without any `ba_*` parameters. Returned unchanged when it carries
/// none, so the rest of its query keeps its exact encoding.
pub fn strip_from_url(url: &Url) -> Url {
    let is_handoff = |key: &str| params::ALL.contains(&key);
    if !url.query_pairs().any(|(k, _)| is_handoff(k.as_ref())) {
        return url.clone();
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_handoff(k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut stripped = url.clone();
    if kept.is_empty() {
        stripped.set_query(None);
    } else {
        stripped.query_pairs_mut().clear().extend_pairs(&kept);
    }
    stripped
}

/// Read a handoff message off an incoming URL.
///
/// `Ok(None)` when the request does not carry one: `ba_throw` is not `1`, or
/// any of `ba_ts`, `ba_n`, `ba_sig` is missing or empty. A missing `ba_code`
/// means 401 and a missing `ba_msg` means `default_message`. Non-numeric
/// `ba_code` or `ba_ts` is `MalformedMessage`. Nothing here checks the
/// signature.
pub fn decode_from_url(url: &Url, default_message: &str) -> HandoffResult<Option<DenialMessage>> {
    let mut found: HashMap<&'static str, String> = HashMap::new();
    for (key, value) in url.query_pairs() {
        if let Some(name) = params::ALL.iter().find(|name| **name == key) {
            found.entry(*name).or_insert_with(|| value.into_owned());
        }
    }

    if found.get(params::THROW).map(String::as_str) != Some("1") {
        return Ok(None);
    }

    let non_empty = |name: &str| found.get(name).filter(|v| !v.is_empty()).cloned();
    let (Some(ts), Some(nonce), Some(signature)) = (
        non_empty(params::TIMESTAMP),
        non_empty(params::NONCE),
        non_empty(params::SIGNATURE),
    ) else {
        return Ok(None);
    };

    let code = match non_empty(params::CODE) {
        Some(raw) => raw
            .parse::<u16>()
            .map_err(|_| HandoffError::MalformedMessage)?,
        None => DenialMessage::default_code(),
    };
    let timestamp = ts
        .parse::<i64>()
        .map_err(|_| HandoffError::MalformedMessage)?;
    let text = found
        .get(params::MESSAGE)
        .cloned()
        .unwrap_or_else(|| default_message.to_string());

    Ok(Some(DenialMessage {
        code,
        text,
        timestamp: Timestamp::from_seconds(timestamp),
        nonce: Nonce::from_wire(nonce),
        signature,
    }))
}
