//! Error types and exit codes for ucg-engine

use std::fmt;
use std::process::ExitCode;

use serde::Serialize;
use thiserror::Error;

/// Structured query syntax error: where parsing stopped and what was wanted there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryParseError {
    /// Byte offset into the query text
    pub position: usize,
    /// Human-readable description of the expected token(s)
    pub expected: String,
    /// The token actually found (or "end of input")
    pub found: String,
}

impl QueryParseError {
    pub fn new(position: usize, expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self {
            position,
            expected: expected.into(),
            found: found.into(),
        }
    }
}

impl fmt::Display for QueryParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "at position {}: expected {}, found {}",
            self.position, self.expected, self.found
        )
    }
}

impl std::error::Error for QueryParseError {}

/// Main error type for ucg-engine operations
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Unknown node id: {id}")]
    UnknownNode { id: String },

    #[error("Query syntax error {0}")]
    QueryParse(#[from] QueryParseError),

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Fact extraction failed for {path}: {message}")]
    Extraction { path: String, message: String },

    #[error("Configuration error in {path}: {message}")]
    Config { path: String, message: String },

    #[error("Serialization failed: {message}")]
    Serialization { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GraphError {
    /// Convert error to a process exit code:
    /// - 1: IO / configuration error
    /// - 2: Unknown node or invalid request
    /// - 3: Query syntax error
    /// - 4: Extraction or serialization failure
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.exit_status())
    }

    /// Raw status byte behind [`GraphError::exit_code`]
    pub fn exit_status(&self) -> u8 {
        match self {
            Self::Io(_) | Self::Config { .. } => 1,
            Self::UnknownNode { .. } | Self::InvalidRequest { .. } => 2,
            Self::QueryParse(_) => 3,
            Self::Extraction { .. } | Self::Serialization { .. } => 4,
        }
    }

    pub fn unknown_node(id: impl Into<String>) -> Self {
        Self::UnknownNode { id: id.into() }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

/// Result type alias for ucg-engine operations
pub type Result<T> = std::result::Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display_includes_position() {
        let err = QueryParseError::new(6, "'('", "'n'");
        assert_eq!(err.to_string(), "at position 6: expected '(', found 'n'");

        let wrapped: GraphError = err.into();
        assert!(wrapped.to_string().contains("position 6"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(GraphError::unknown_node("x").exit_status(), 2);
        assert_eq!(
            GraphError::QueryParse(QueryParseError::new(0, "MATCH", "end of input")).exit_status(),
            3
        );
    }
}
