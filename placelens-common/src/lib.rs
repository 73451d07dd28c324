//! Common types and utilities shared across placelens crates.
//!
//! This crate holds the error taxonomy and the observability helpers used
//! throughout the workspace. It stays small and dependency-light so every
//! crate can depend on it.
//!
//! # Overview
//!
//! - [`observability`]: centralised tracing/logging initialisation
//! - [`PlacelensError`] and [`Result`]: shared error handling
//!
//! # Examples
//!
//! Deciding whether a failure is worth retrying:
//!
//! ```rust
//! use placelens_common::PlacelensError;
//!
//! let err = PlacelensError::TransientRemote("429 Too Many Requests".into());
//! assert!(err.is_transient());
//! assert!(!err.is_fatal_to_run());
//!
//! let err = PlacelensError::Input("search_queries.csv not found".into());
//! assert!(err.is_fatal_to_run());
//! ```

pub mod observability;

/// Error types used across the placelens system.
///
/// Per-item failures (one query, one screenshot) degrade that item only.
/// [`PlacelensError::Input`] and [`PlacelensError::Config`] are the only
/// variants that abort a whole run.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PlacelensError {
    /// Local input was missing or malformed.
    #[error("Input error: {0}")]
    Input(String),

    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Remote failure expected to succeed on retry (rate limit, timeout, connection drop).
    #[error("Transient remote error: {0}")]
    TransientRemote(String),

    /// Remote rejected the request; retrying will not help.
    #[error("Remote rejected request: {0}")]
    FatalRemote(String),

    /// A response did not match the expected structured text.
    #[error("Unexpected response format: {0}")]
    Format(String),

    /// A local artifact (e.g. a screenshot) was missing or unreadable.
    #[error("Resource unavailable: {0}")]
    Resource(String),

    /// Anything else that went wrong while talking to a collaborator.
    #[error("Unexpected error: {0}")]
    Unexpected(String),

    /// A cooperative cancellation signal was observed.
    #[error("Operation cancelled")]
    Cancelled,
}

impl PlacelensError {
    /// True for failures the caller should retry with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientRemote(_))
    }

    /// True for failures that must unwind the whole run.
    pub fn is_fatal_to_run(&self) -> bool {
        matches!(self, Self::Input(_) | Self::Config(_))
    }

    /// Short stable name, used as the `kind` field of log events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Input(_) => "input",
            Self::Config(_) => "config",
            Self::TransientRemote(_) => "transient_remote",
            Self::FatalRemote(_) => "fatal_remote",
            Self::Format(_) => "format",
            Self::Resource(_) => "resource",
            Self::Unexpected(_) => "unexpected",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Convenient alias for results that use [`PlacelensError`].
pub type Result<T> = std::result::Result<T, PlacelensError>;
