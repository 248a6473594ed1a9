//! Error taxonomy for a load run
//!
//! Every failure aborts the run. Nothing in the crate retries or recovers; the
//! category only tells the operator which stage broke.

use thiserror::Error;

/// Coarse classification of a failed run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Remote endpoint unreachable, bad compression stream, interrupted read
    SourceAccess,
    /// A field (or the header) does not fit the declared column typing
    TypeCoercion,
    /// Connection refused, authentication rejected, or a write was rejected
    Destination,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Invalid source URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("Failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "Source columns do not match the declared schema.\n\
         - Undeclared in source: [{unexpected}]\n\
         - Missing from source: [{missing}]"
    )]
    SchemaMismatch { unexpected: String, missing: String },

    #[error("Line {line}: malformed record: {message}")]
    MalformedRecord { line: u64, message: String },

    #[error("Line {line}: expected {expected} fields, found {found}")]
    FieldCount {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error(
        "Type mismatch at line {line}, column '{column}': cannot convert '{value}' to {expected}"
    )]
    TypeCoercion {
        line: u64,
        column: String,
        expected: &'static str,
        value: String,
    },

    #[error("Invalid column typing: {0}")]
    InvalidTyping(String),

    #[error(transparent)]
    Destination(#[from] sqlx::Error),
}

impl LoadError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        LoadError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            LoadError::InvalidUri { .. } | LoadError::Fetch { .. } | LoadError::Io { .. } => {
                ErrorCategory::SourceAccess
            }
            LoadError::SchemaMismatch { .. }
            | LoadError::MalformedRecord { .. }
            | LoadError::FieldCount { .. }
            | LoadError::TypeCoercion { .. }
            | LoadError::InvalidTyping(_) => ErrorCategory::TypeCoercion,
            LoadError::Destination(_) => ErrorCategory::Destination,
        }
    }
}
