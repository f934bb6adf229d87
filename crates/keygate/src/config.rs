use keygate_core::{Area, BlockMode, Client, KeygateError, KeygateResult, SecretSource};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;
use zeroize::Zeroizing;

use crate::dispatch::resolve_redirect;
use crate::error::{RootError, RootResult};

/// Environment variable that overrides the configured signing secret.
pub const SECRET_ENV: &str = "KEYGATE_SECRET";

/// Per-area gate configuration. Immutable for the lifetime of a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Which context(s) the gate secures.
    #[serde(default)]
    pub area: Area,

    /// Name of the URL parameter acting as the key. Empty disables the gate.
    #[serde(default)]
    pub security_key: String,

    /// Site-only override of `security_key`. Empty means unset.
    #[serde(default)]
    pub security_key_frontend: String,

    #[serde(default)]
    pub block_mode: BlockMode,

    /// Absolute URL, root-relative path, or empty for the application root.
    #[serde(default)]
    pub redirect_url: String,

    #[serde(default = "default_message")]
    pub message: String,

    /// Emit diagnostic events for every gated request.
    #[serde(default)]
    pub debug: bool,
}

fn default_message() -> String {
    "Unauthorized".to_string()
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            area: Area::default(),
            security_key: String::new(),
            security_key_frontend: String::new(),
            block_mode: BlockMode::default(),
            redirect_url: String::new(),
            message: default_message(),
            debug: false,
        }
    }
}

impl GateConfig {
    pub fn is_configured(&self) -> bool {
        !self.security_key.is_empty()
    }

    /// Whether a block can produce a signed handoff. Only the administrative
    /// context hands off; the site raises its own denials.
    pub fn hands_off(&self) -> bool {
        self.block_mode == BlockMode::Message && self.area.covers(Area::Admin)
    }

    /// The parameter name a request from `client` has to present.
    pub fn key_name_for(&self, client: Client) -> &str {
        match client {
            Client::Site if !self.security_key_frontend.is_empty() => &self.security_key_frontend,
            _ => &self.security_key,
        }
    }
}

/// Host adapter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Application root; redirects without an absolute target land here.
    #[serde(default = "default_app_root")]
    pub app_root: String,

    /// Path prefix served by the administrative context.
    #[serde(default = "default_admin_path")]
    pub admin_path: String,

    /// Sessions idle for longer than this are dropped.
    #[serde(default = "default_session_idle")]
    pub session_idle_secs: u64,
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_app_root() -> String {
    "http://127.0.0.1:8080/".to_string()
}

fn default_admin_path() -> String {
    "/administrator".to_string()
}

fn default_session_idle() -> u64 {
    3600
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            app_root: default_app_root(),
            admin_path: default_admin_path(),
            session_idle_secs: default_session_idle(),
        }
    }
}

impl ServerConfig {
    pub fn app_root_url(&self) -> RootResult<Url> {
        let url = Url::parse(&self.app_root)
            .map_err(|e| RootError::Config(format!("app_root '{}': {}", self.app_root, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(RootError::Config(format!(
                "app_root must be an http(s) URL, got '{}'",
                self.app_root
            )));
        }
        Ok(url)
    }

    /// Admin prefix without a trailing slash.
    pub fn admin_prefix(&self) -> &str {
        let trimmed = self.admin_path.trim_end_matches('/');
        if trimmed.is_empty() {
            "/"
        } else {
            trimmed
        }
    }

    /// Whether `path` is the admin prefix itself or lies below it.
    pub fn is_admin_path(&self, path: &str) -> bool {
        path.strip_prefix(self.admin_prefix())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }
}

/// HMAC secret as it appears in the config file. Never printed.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ConfigSecret(String);

impl ConfigSecret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// 32 random bytes, hex-encoded.
    pub fn generate() -> Self {
        let bytes: [u8; 32] = rand::random();
        Self(hex::encode(bytes))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ConfigSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "ConfigSecret(<unset>)")
        } else {
            write!(f, "ConfigSecret([REDACTED])")
        }
    }
}

/// Top-level configuration for the keygate binary.
///
/// Loaded from a TOML file (typically `~/.keygate/config.toml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RootConfig {
    /// HMAC signing secret for denial handoffs. `KEYGATE_SECRET` wins when set.
    #[serde(default, skip_serializing_if = "ConfigSecret::is_empty")]
    pub secret: ConfigSecret,

    #[serde(default)]
    pub gate: GateConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

/// Returns `$HOME/<suffix>` if HOME is available, otherwise `./<suffix>`.
fn dirs_or_default(suffix: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(suffix))
        .unwrap_or_else(|_| PathBuf::from(suffix))
}

impl RootConfig {
    /// Load configuration from a TOML file. If the file does not exist,
    /// returns a default configuration.
    pub fn load(path: &Path) -> RootResult<Self> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file without validating it, so a broken configuration
    /// can still be repaired and saved back.
    pub fn read(path: &Path) -> RootResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(RootError::Io)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Generate a signing secret when none is set, or always with `rotate`.
    /// Returns whether a new one was generated.
    pub fn ensure_secret(&mut self, rotate: bool) -> bool {
        if rotate || self.secret.is_empty() {
            self.secret = ConfigSecret::generate();
            return true;
        }
        false
    }

    /// Write the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> RootResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| RootError::Config(format!("TOML serialize error: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(RootError::Io)?;
        }
        std::fs::write(path, contents).map_err(RootError::Io)?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> RootResult<()> {
        self.server.app_root_url()?;
        if !self.server.admin_path.starts_with('/') {
            return Err(RootError::Config(format!(
                "admin_path must start with '/', got '{}'",
                self.server.admin_path
            )));
        }
        if self.server.admin_prefix() == "/" {
            return Err(RootError::Config(
                "admin_path must not be the site root".into(),
            ));
        }
        if self.server.port == 0 {
            return Err(RootError::Config("port must be > 0".into()));
        }
        if self.gate.hands_off() {
            if self.signing_secret().is_err() {
                return Err(RootError::Config(format!(
                    "block_mode 'message' needs a signing secret (set 'secret' or {})",
                    SECRET_ENV
                )));
            }
            let app_root = self.server.app_root_url()?;
            let target = resolve_redirect(&self.gate.redirect_url, &app_root);
            if target.origin() == app_root.origin() && self.server.is_admin_path(target.path()) {
                return Err(RootError::Config(format!(
                    "redirect_url '{}' points into the administrative context, \
                     which cannot raise a handed-off denial",
                    self.gate.redirect_url
                )));
            }
        }
        Ok(())
    }

    /// Return the path to the default config file location.
    pub fn default_config_path() -> PathBuf {
        dirs_or_default(".keygate/config.toml")
    }
}

impl SecretSource for RootConfig {
    fn signing_secret(&self) -> KeygateResult<Zeroizing<Vec<u8>>> {
        let from_env = std::env::var(SECRET_ENV).ok().filter(|v| !v.is_empty());
        let secret = match from_env {
            Some(value) => Zeroizing::new(value.into_bytes()),
            None => Zeroizing::new(self.secret.expose().as_bytes().to_vec()),
        };
        if secret.is_empty() {
            return Err(KeygateError::MissingSecret);
        }
        Ok(secret)
    }
}
