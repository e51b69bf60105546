//! Engine errors.

use thiserror::Error;

/// Failure reported by an [`ActivitySource`](crate::ActivitySource).
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source could not be reached or refused the query.
    #[error("activity source unavailable for account {account}: {message}")]
    Unavailable {
        /// Account whose activities were requested.
        account: String,
        /// Error message from the source.
        message: String,
    },

    /// A record could not be decoded.
    #[error("malformed activity record: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Errors that abort a subledger computation.
///
/// Nothing is cached when a computation fails.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Activity retrieval failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Cross-account resolution re-entered an account that is still being
    /// computed.
    #[error("subledger cycle detected: {}", .cycle.join(" -> "))]
    Cycle {
        /// Account ids from the first occurrence to the re-entry.
        cycle: Vec<String>,
    },
}

/// Result alias for engine operations.
pub type Result<T, E = EngineError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message() {
        let err = EngineError::Cycle {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "subledger cycle detected: a -> b -> a");
    }

    #[test]
    fn test_source_error_is_transparent() {
        let err: EngineError = SourceError::Unavailable {
            account: "acct-1".into(),
            message: "connection refused".into(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "activity source unavailable for account acct-1: connection refused"
        );
    }
}
