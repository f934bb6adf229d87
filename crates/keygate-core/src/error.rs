use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeygateError {
    #[error("signing secret is not configured")]
    MissingSecret,

    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

pub type KeygateResult<T> = Result<T, KeygateError>;

/// Default status carried by a denial.
pub const UNAUTHORIZED_CODE: u16 = 401;

/// A user-visible denial raised to the host's error renderer.
///
/// The host turns this into an HTTP error response. `code` follows HTTP
/// status conventions; anything outside the 4xx/5xx range renders as 401.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} ({code})")]
pub struct Unauthorized {
    pub code: u16,
    pub message: String,
}

impl Unauthorized {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: UNAUTHORIZED_CODE,
            message: message.into(),
        }
    }

    pub fn with_code(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Status the host should answer with.
    pub fn http_status(&self) -> u16 {
        if (400..=599).contains(&self.code) {
            self.code
        } else {
            UNAUTHORIZED_CODE
        }
    }
}
