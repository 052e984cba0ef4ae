//! Error types for boxcaps.
//!
//! Component crates keep their own narrow error enums; this unified type wraps
//! them at the binary boundary with:
//! - Stable error codes for machine parsing
//! - Category classification for grouping

use crate::literal::LiteralError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for boxcaps operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Path resolution and model-table errors.
    Config,
    /// Boot-info store errors (immutable violations, missing keys).
    Store,
    /// Derivation plan errors.
    Derivation,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Store => write!(f, "store"),
            ErrorCategory::Derivation => write!(f, "derivation"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type for boxcaps.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("model table error: {0}")]
    ModelTable(String),

    // Store errors (20-29)
    #[error("key '{0}' is immutable")]
    Immutable(String),

    #[error("key not found: {0}")]
    NotFound(String),

    #[error("invalid literal: {0}")]
    Literal(#[from] LiteralError),

    // Derivation errors (30-39)
    #[error("invalid derivation plan: {0}")]
    Plan(String),

    // I/O errors (40-49)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Stable numeric code.
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::ModelTable(_) => 11,
            Error::Immutable(_) => 20,
            Error::NotFound(_) => 21,
            Error::Literal(_) => 22,
            Error::Plan(_) => 30,
            Error::Io(_) => 40,
            Error::Json(_) => 41,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::ModelTable(_) => ErrorCategory::Config,
            Error::Immutable(_) | Error::NotFound(_) | Error::Literal(_) => ErrorCategory::Store,
            Error::Plan(_) => ErrorCategory::Derivation,
            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }
}
