use thiserror::Error;

/// Error type for the keygate-handoff crate.
///
/// Messages are generic so nothing about the secret, a signature or a
/// rejected payload is echoed back to a caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandoffError {
    #[error("signing secret unavailable")]
    SecretUnavailable,

    #[error("malformed handoff message")]
    MalformedMessage,

    #[error("internal error")]
    InternalError,
}

pub type HandoffResult<T> = Result<T, HandoffError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages_are_generic() {
        let errors = vec![
            HandoffError::SecretUnavailable,
            HandoffError::MalformedMessage,
            HandoffError::InternalError,
        ];

        for err in &errors {
            let msg = err.to_string();
            assert!(!msg.contains("ba_sig"), "Error message leaked field: {msg}");
            assert!(!msg.contains("http"), "Error message leaked URL: {msg}");
        }
    }

    #[test]
    fn test_all_variants_distinct() {
        assert_ne!(HandoffError::SecretUnavailable, HandoffError::MalformedMessage);
        assert_ne!(HandoffError::MalformedMessage, HandoffError::InternalError);
    }
}
