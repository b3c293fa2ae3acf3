//! Unified error handling for the sage crate
//!
//! Domain-specific errors ([`GenerateError`], [`ChannelError`]) live next to
//! the code that produces them; this module wraps them into a single [`Error`]
//! enum usable across module boundaries, together with a coarse
//! [`ErrorCategory`] used to pick a handling strategy.
//!
//! The taxonomy mirrors the cycle semantics: a `Store` error aborts the
//! current cycle (retried on the next tick), a `Generation` error only moves
//! the selector to the next fallback tier, a `Channel` error is isolated to
//! one channel, and `NoContentAvailable` ends a cycle with an operator report
//! instead of a publish.

use std::io;
use thiserror::Error;

// Re-export domain-specific errors for convenience
pub use crate::generator::GenerateError;
pub use crate::publish::channels::ChannelError;

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Storage and I/O errors
    Storage,
    /// Generator gateway errors
    Generation,
    /// Publishing channel errors
    Channel,
    /// Scheduler and cycle errors
    Scheduler,
    /// Configuration and validation errors
    Config,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Storage => "storage",
            Self::Generation => "generation",
            Self::Channel => "channel",
            Self::Scheduler => "scheduler",
            Self::Config => "config",
            Self::Other => "other",
        }
    }
}

/// Unified error type for the sage crate
#[derive(Error, Debug)]
pub enum Error {
    /// Underlying storage failure; the current operation is aborted and no
    /// partial write may be assumed
    #[error("Store unavailable: {0}")]
    Store(#[source] rusqlite::Error),

    /// Inserted content duplicates an existing item (by content hash)
    #[error("Duplicate content: matches existing quote {existing_id}")]
    DuplicateContent { existing_id: i64 },

    /// Generator gateway errors
    #[error("Generation failed: {0}")]
    Generation(#[from] GenerateError),

    /// Publishing channel errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// All selection tiers exhausted; reportable, never fatal to the scheduler
    #[error("No content available: pool is empty and generation is unavailable")]
    NoContentAvailable,

    /// A manual trigger arrived while a timer cycle was in flight
    #[error("A publish cycle is already in progress")]
    CycleInProgress,

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Check if this error is recoverable (retrying the cycle may succeed)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Store(_) => true, // next scheduled tick retries
            Self::DuplicateContent { .. } => false,
            Self::Generation(e) => e.is_recoverable(),
            Self::Channel(e) => e.is_recoverable(),
            Self::NoContentAvailable => false,
            Self::CycleInProgress => true,
            Self::Config(_) => false,
            Self::Io(_) => true,
            Self::Json(_) => false,
            Self::Http(_) => true,
            Self::Other { .. } => false,
        }
    }

    /// Get the error category for handling strategies
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Store(_) | Self::DuplicateContent { .. } | Self::Io(_) => ErrorCategory::Storage,
            Self::Generation(_) => ErrorCategory::Generation,
            Self::Channel(_) | Self::Http(_) => ErrorCategory::Channel,
            Self::NoContentAvailable | Self::CycleInProgress => ErrorCategory::Scheduler,
            Self::Config(_) => ErrorCategory::Config,
            Self::Json(_) | Self::Other { .. } => ErrorCategory::Other,
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }
}

// Conversion from rusqlite::Error
impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Store(err)
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
