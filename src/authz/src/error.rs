//! Error types for the permission evaluator

use crate::scope::ScopeError;
use std::time::Duration;
use thiserror::Error;

/// Failures reported by a directory provider.
///
/// The evaluator never retries and never wraps these: they surface through
/// [`AuthzError::Provider`] exactly as the provider produced them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Backend could not be reached
    #[error("Directory backend unavailable: {0}")]
    Unavailable(String),

    /// Caller is not allowed to read the requested data
    #[error("Unauthorized directory query: {0}")]
    Unauthorized(String),

    /// Requested object does not exist
    #[error("Directory object not found: {0}")]
    NotFound(String),

    /// Any other backend failure
    #[error("Directory backend error: {0}")]
    Backend(String),
}

/// Permission evaluator errors
#[derive(Debug, Error)]
pub enum AuthzError {
    /// Scope string failed structural parsing
    #[error(transparent)]
    MalformedScope(#[from] ScopeError),

    /// Evaluation requested with an empty operation list
    #[error("No operations supplied for permission evaluation")]
    NoOperations,

    /// Error surfaced by a directory provider
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Principal lacks one or more of the asserted operations
    #[error(
        "Principal '{principal}' is missing permissions on '{scope}': {}",
        .missing.join(", ")
    )]
    InsufficientPermission {
        principal: String,
        scope: String,
        missing: Vec<String>,
    },

    /// Evaluation did not finish before its deadline
    #[error("Permission evaluation exceeded deadline of {0:?}")]
    DeadlineExceeded(Duration),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Directory snapshot could not be loaded
    #[error("Invalid directory snapshot: {0}")]
    Snapshot(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AuthzError {
    /// Whether the error is meant to be shown to the user as-is.
    ///
    /// Everything other than a failed assertion is an infrastructure or
    /// caller bug.
    pub fn is_user_actionable(&self) -> bool {
        matches!(self, Self::InsufficientPermission { .. })
    }

    /// Operations reported missing by a failed assertion
    pub fn missing_operations(&self) -> &[String] {
        match self {
            Self::InsufficientPermission { missing, .. } => missing,
            _ => &[],
        }
    }
}

/// Result type for evaluator operations
pub type Result<T> = std::result::Result<T, AuthzError>;
