// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for configuration and graph validation.
//!
//! Only the configuration path returns errors: a benchmark that cannot
//! be configured correctly should refuse to start, with one readable
//! line naming the offending flag or graph property. Runtime
//! corruption detected during execution is a caller bug and panics at
//! the point of detection instead — see
//! [`TaskGraph::execute_point`](crate::graph::TaskGraph::execute_point).
//! No external error crates — zero-dependency error type.

use std::fmt;

/// Errors produced while building or validating an application.
#[derive(Debug)]
pub enum Error {
    /// Bad command-line flag, missing argument, or out-of-range value.
    Config(String),
    /// A configured graph violates a structural invariant.
    Validation(String),
}

/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "invalid configuration: {msg}"),
            Self::Validation(msg) => write!(f, "graph validation failed: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_config_error() {
        let err = Error::Config(r#"flag "-steps" requires an argument"#.into());
        assert!(err.to_string().contains("invalid configuration"));
        assert!(err.to_string().contains("-steps"));
    }

    #[test]
    fn display_validation_error() {
        let err = Error::Validation("graph 0: period must be non-zero".into());
        assert!(err.to_string().starts_with("graph validation failed"));
        assert!(err.to_string().contains("period"));
    }

    #[test]
    fn error_has_no_source() {
        let err = Error::Config("x".into());
        assert!(std::error::Error::source(&err).is_none());
    }
}
