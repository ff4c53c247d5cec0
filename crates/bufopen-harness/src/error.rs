//! Harness error type.

use std::io;

use thiserror::Error;

pub type HarnessResult<T> = Result<T, HarnessError>;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Bufopen(#[from] bufopen::Error),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A scenario observed something other than what it expected.
    #[error("{what}: expected {expected}, got {actual}")]
    Mismatch {
        what: &'static str,
        expected: String,
        actual: String,
    },

    #[error("unknown scenario '{0}'")]
    UnknownScenario(String),
}

impl HarnessError {
    pub fn mismatch(
        what: &'static str,
        expected: impl std::fmt::Debug,
        actual: impl std::fmt::Debug,
    ) -> Self {
        Self::Mismatch {
            what,
            expected: format!("{expected:?}"),
            actual: format!("{actual:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatch_message() {
        let err = HarnessError::mismatch("content", "abc", "abd");
        assert_eq!(
            err.to_string(),
            r#"content: expected "abc", got "abd""#
        );
    }

    #[test]
    fn test_bufopen_error_is_transparent() {
        let inner = bufopen::Error::Allocation { bytes: 8 };
        let msg = inner.to_string();
        let err = HarnessError::from(inner);
        assert_eq!(err.to_string(), msg);
    }
}
