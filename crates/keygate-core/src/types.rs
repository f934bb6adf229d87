use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::error::{KeygateError, KeygateResult};

/// Session key holding the "key already presented" flag.
pub const SESSION_FLAG_KEY: &str = "block_access";

// ---------------------------------------------------------------------------
// Area: which client context(s) a gate secures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Area {
    /// Public site only.
    Site,
    /// Administrative backend only.
    Admin,
    /// Every context.
    #[default]
    All,
}

impl Area {
    pub fn as_str(&self) -> &'static str {
        match self {
            Area::Site => "site",
            Area::Admin => "admin",
            Area::All => "all",
        }
    }

    /// Whether a gate configured for `self` applies to a request in `area`.
    pub fn covers(&self, area: Area) -> bool {
        *self == Area::All || *self == area
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Area {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "site" => Ok(Area::Site),
            "admin" => Ok(Area::Admin),
            "all" => Ok(Area::All),
            other => Err(format!("unknown area '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Client: the execution context serving the current request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Client {
    /// Public-facing site. Can render errors to end users.
    Site,
    /// Administrative backend.
    Admin,
    /// Any other context (api, cli). Only ever matched by `Area::All`.
    Other,
}

impl Client {
    pub fn area(&self) -> Area {
        match self {
            Client::Site => Area::Site,
            Client::Admin => Area::Admin,
            Client::Other => Area::All,
        }
    }

    /// Contexts that raise denials themselves instead of handing them off.
    pub fn raises_locally(&self) -> bool {
        matches!(self, Client::Site)
    }
}

impl fmt::Display for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Client::Site => write!(f, "site"),
            Client::Admin => write!(f, "administrator"),
            Client::Other => write!(f, "other"),
        }
    }
}

// ---------------------------------------------------------------------------
// BlockMode: how a blocked request is answered
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockMode {
    /// Plain 303 to the configured target.
    #[default]
    Redirect,
    /// Raise an error, handing it off to the site when needed.
    Message,
}

impl FromStr for BlockMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redirect" => Ok(BlockMode::Redirect),
            "message" => Ok(BlockMode::Message),
            other => Err(format!("unknown block mode '{other}'")),
        }
    }
}

impl fmt::Display for BlockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockMode::Redirect => write!(f, "redirect"),
            BlockMode::Message => write!(f, "message"),
        }
    }
}

// ---------------------------------------------------------------------------
// Timestamp: unix seconds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds_since_epoch: i64,
}

impl Timestamp {
    pub fn now() -> Self {
        Self {
            seconds_since_epoch: chrono::Utc::now().timestamp(),
        }
    }

    pub fn from_seconds(seconds: i64) -> Self {
        Self {
            seconds_since_epoch: seconds,
        }
    }

    /// Absolute distance in seconds, in either direction.
    pub fn abs_diff(&self, other: Timestamp) -> u64 {
        self.seconds_since_epoch.abs_diff(other.seconds_since_epoch)
    }

    pub fn to_rfc3339(&self) -> String {
        chrono::DateTime::from_timestamp(self.seconds_since_epoch, 0)
            .map(|d| d.to_rfc3339())
            .unwrap_or_else(|| "invalid".to_string())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.seconds_since_epoch)
    }
}

// ---------------------------------------------------------------------------
// RequestContext: one per request, discarded afterwards
// ---------------------------------------------------------------------------

/// Everything the gate needs to know about the request being processed.
///
/// Built by the host once per request and threaded through the gate, the
/// dispatcher and the incoming handler. `resolved_redirect` is filled in by
/// the dispatcher when a block decision needs a target.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub client: Client,
    pub current_url: Url,
    pub app_root: Url,
    pub resolved_redirect: Option<Url>,
}

impl RequestContext {
    pub fn new(client: Client, current_url: Url, app_root: Url) -> Self {
        Self {
            client,
            current_url,
            app_root,
            resolved_redirect: None,
        }
    }

    /// Build a context from a root URL and a request path with optional query.
    pub fn from_path(client: Client, app_root: &Url, path_and_query: &str) -> KeygateResult<Self> {
        let current_url = app_root
            .join(path_and_query)
            .map_err(|e| KeygateError::InvalidUrl(format!("{path_and_query}: {e}")))?;
        Ok(Self::new(client, current_url, app_root.clone()))
    }

    /// Presence-only lookup: `?KEY`, `?KEY=` and `?KEY=x` all count.
    pub fn has_param(&self, name: &str) -> bool {
        self.current_url.query_pairs().any(|(k, _)| k == name)
    }

    /// First value of a query parameter, percent-decoded.
    pub fn param(&self, name: &str) -> Option<String> {
        self.current_url
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    pub fn route(&self) -> &str {
        self.current_url.path()
    }

    /// The administrative action named by `option`/`task`, when present.
    pub fn action(&self) -> Option<String> {
        match (self.param("option"), self.param("task")) {
            (Some(option), Some(task)) => Some(format!("{option}.{task}")),
            (Some(option), None) => Some(option),
            (None, Some(task)) => Some(task),
            (None, None) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> Url {
        Url::parse("https://example.com/").unwrap()
    }

    #[test]
    fn test_area_covers() {
        assert!(Area::All.covers(Area::Site));
        assert!(Area::All.covers(Area::Admin));
        assert!(Area::Site.covers(Area::Site));
        assert!(!Area::Site.covers(Area::Admin));
        assert!(!Area::Admin.covers(Area::Site));
        assert!(!Area::Site.covers(Area::All));
    }

    #[test]
    fn test_area_from_str_is_case_insensitive() {
        assert_eq!("SITE".parse::<Area>().unwrap(), Area::Site);
        assert_eq!(" Admin ".parse::<Area>().unwrap(), Area::Admin);
        assert_eq!("all".parse::<Area>().unwrap(), Area::All);
        assert!("backend".parse::<Area>().is_err());
    }

    #[test]
    fn test_area_serde_lowercase() {
        let json = serde_json::to_string(&Area::Admin).unwrap();
        assert_eq!(json, "\"admin\"");
        let area: Area = serde_json::from_str("\"site\"").unwrap();
        assert_eq!(area, Area::Site);
    }

    #[test]
    fn test_client_area_mapping() {
        assert_eq!(Client::Site.area(), Area::Site);
        assert_eq!(Client::Admin.area(), Area::Admin);
        assert_eq!(Client::Other.area(), Area::All);
        assert!(Client::Site.raises_locally());
        assert!(!Client::Admin.raises_locally());
        assert!(!Client::Other.raises_locally());
    }

    #[test]
    fn test_block_mode_default_and_parse() {
        assert_eq!(BlockMode::default(), BlockMode::Redirect);
        assert_eq!("Message".parse::<BlockMode>().unwrap(), BlockMode::Message);
        assert!("throw".parse::<BlockMode>().is_err());
    }

    #[test]
    fn test_timestamp_abs_diff_both_directions() {
        let a = Timestamp::from_seconds(1_000);
        let b = Timestamp::from_seconds(1_030);
        assert_eq!(a.abs_diff(b), 30);
        assert_eq!(b.abs_diff(a), 30);
    }

    #[test]
    fn test_timestamp_rfc3339() {
        let ts = Timestamp::from_seconds(0);
        assert_eq!(ts.to_rfc3339(), "1970-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_has_param_is_presence_only() {
        let ctx = RequestContext::from_path(Client::Site, &root(), "/?MY_SECRET").unwrap();
        assert!(ctx.has_param("MY_SECRET"));
        let ctx = RequestContext::from_path(Client::Site, &root(), "/?MY_SECRET=").unwrap();
        assert!(ctx.has_param("MY_SECRET"));
        let ctx = RequestContext::from_path(Client::Site, &root(), "/?other=1").unwrap();
        assert!(!ctx.has_param("MY_SECRET"));
    }

    #[test]
    fn test_param_is_percent_decoded() {
        let ctx =
            RequestContext::from_path(Client::Site, &root(), "/?ba_msg=Go%20away%7Cnow").unwrap();
        assert_eq!(ctx.param("ba_msg").as_deref(), Some("Go away|now"));
        assert_eq!(ctx.param("missing"), None);
    }

    #[test]
    fn test_from_path_keeps_root_host() {
        let ctx = RequestContext::from_path(Client::Admin, &root(), "/administrator/").unwrap();
        assert_eq!(ctx.current_url.as_str(), "https://example.com/administrator/");
        assert!(ctx.resolved_redirect.is_none());
    }

    #[test]
    fn test_action_from_option_and_task() {
        let ctx = RequestContext::from_path(
            Client::Admin,
            &root(),
            "/administrator/index.php?option=com_login&task=logout",
        )
        .unwrap();
        assert_eq!(ctx.action().as_deref(), Some("com_login.logout"));
        assert_eq!(ctx.route(), "/administrator/index.php");

        let ctx = RequestContext::from_path(Client::Admin, &root(), "/administrator/").unwrap();
        assert_eq!(ctx.action(), None);
    }
}
