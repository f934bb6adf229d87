use thiserror::Error;

/// Error type for the keygate binary, aggregating errors from the core and
/// handoff crates.
///
/// None of these are policy outcomes: a blocked request is an `Outcome`,
/// not an error. These surface only when the host itself is misconfigured.
#[derive(Debug, Error)]
pub enum RootError {
    #[error("core error: {0}")]
    Core(#[from] keygate_core::KeygateError),

    #[error("handoff error: {0}")]
    Handoff(#[from] keygate_handoff::HandoffError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for RootError {
    fn from(e: toml::de::Error) -> Self {
        RootError::Config(format!("TOML parse error: {}", e))
    }
}

pub type RootResult<T> = Result<T, RootError>;
