//! Store error type.

use thiserror::Error;

/// Result type alias for store operations.
pub type DalResult<T> = Result<T, DalError>;

/// Errors a [`crate::ConfigStore`] can report.
///
/// `RecordNotFound` and `RecordExists` are ordinary outcomes of existence
/// patterns and of cursor exhaustion; callers decide where they are benign.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DalError {
    #[error("record not found")]
    RecordNotFound,

    #[error("record already exists")]
    RecordExists,

    #[error("store connection lost: {0}")]
    ConnectionLost(String),

    #[error("store error: {0}")]
    General(String),

    #[error("cursor {0} is not open")]
    CursorClosed(u64),
}

impl DalError {
    /// Creates a general error.
    pub fn general(message: impl Into<String>) -> Self {
        Self::General(message.into())
    }

    /// Returns true if the error means "no such row".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RecordNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(DalError::RecordNotFound.to_string(), "record not found");
        assert_eq!(
            DalError::general("bad table").to_string(),
            "store error: bad table"
        );
        assert_eq!(DalError::CursorClosed(4).to_string(), "cursor 4 is not open");
    }

    #[test]
    fn test_is_not_found() {
        assert!(DalError::RecordNotFound.is_not_found());
        assert!(!DalError::RecordExists.is_not_found());
    }
}
