//! Error handling for the context library

use thiserror::Error;

/// Result type alias for context operations
pub type Result<T> = std::result::Result<T, ContextError>;

/// Boxed error carried by [`ContextError::Provider`]
pub type ProviderError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type surfaced to callers
///
/// Every entry point in the library either returns a result (possibly
/// empty) or fails with one of these variants. Policy-driven fallbacks
/// (no breakpoints, zero time range, zero-norm vectors) never surface
/// here; they take documented fallback branches instead.
#[derive(Error, Debug)]
pub enum ContextError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Provider failure: {source}")]
    Provider {
        #[source]
        source: ProviderError,
    },
}

impl ContextError {
    /// Wrap an external provider or tokenizer error without retrying it
    pub fn provider(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        ContextError::Provider {
            source: Box::new(source),
        }
    }

    /// Get error category for logging/metrics
    pub fn category(&self) -> &'static str {
        match self {
            ContextError::InvalidArgument(_) => "invalid_argument",
            ContextError::UnsupportedEncoding(_) => "unsupported_encoding",
            ContextError::InvalidQuery(_) => "invalid_query",
            ContextError::Cancelled => "cancelled",
            ContextError::Provider { .. } => "provider",
        }
    }

    /// Check whether the error originated outside the library
    pub fn is_external(&self) -> bool {
        matches!(self, ContextError::Provider { .. })
    }
}
