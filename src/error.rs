//! Custom error types for docreview.
//!
//! This module defines all error types used throughout the application.
//! All functions return `Result<T, DocreviewError>` instead of using `unwrap()`.
//!
//! A malformed model response is NOT an error here: the normalizer models it
//! as a [`crate::normalizer::NormalizationFailure`] outcome. These variants
//! cover provider and configuration faults only.

use thiserror::Error;

/// Main error type for docreview operations.
///
/// Uses `thiserror` for ergonomic error handling and automatic `Display` implementation.
#[derive(Debug, Error)]
pub enum DocreviewError {
    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// External API returned an error
    #[error("API error: {code} - {message}")]
    Api {
        /// Error code from API
        code: i32,
        /// Error message from API
        message: String,
    },

    /// Rate limited by the completion provider
    #[error("Rate limited, retry after {0}s")]
    RateLimited(u64),

    /// Response parsing error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias using `DocreviewError`
pub type Result<T> = std::result::Result<T, DocreviewError>;

/// Extension trait for adding context to Option types
pub trait OptionExt<T> {
    /// Convert Option to Result with a parse error message
    fn ok_or_parse(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_parse(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| DocreviewError::Parse(msg.to_string()))
    }
}
