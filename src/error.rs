//! Error types for platemate
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for platemate
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Recipe catalog loading or parsing errors
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Frame source acquisition or release errors (fatal for the session)
    #[error("Capture error: {0}")]
    Capture(String),

    /// Classifier call errors (single cycle is skipped, loop continues)
    #[error("Classification error: {0}")]
    Classification(String),
}

/// Convenience Result type using platemate Error
pub type Result<T> = std::result::Result<T, Error>;
