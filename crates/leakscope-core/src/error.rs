//! Core error types for leakscope.
//!
//! This module defines the central error type shared by the pipeline crates,
//! the configuration errors raised at startup, and the reasons an email
//! candidate can be rejected during normalization.

use thiserror::Error;

/// Central error type for leakscope operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration errors (file loading, parsing, validation)
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An email candidate failed normalization
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailRejection),

    /// Validation errors (invalid input, constraints)
    #[error("validation error: {0}")]
    Validation(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to determine config directory path
    #[error("could not determine config directory (XDG base directories not available)")]
    NoConfigDir,

    /// Explicitly requested config file does not exist
    #[error("config file not found at {path}")]
    NotFound {
        /// Path where config was expected
        path: String,
    },

    /// Failed to parse TOML
    #[error("failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// I/O error reading config
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Reason for invalidity
        reason: String,
    },

    /// The input directory is missing; the pipeline cannot start without it
    #[error("input directory not available: {path}")]
    InputDirUnavailable {
        /// Configured input directory
        path: String,
    },
}

/// Why an email candidate was dropped.
///
/// Rejection is never an error for the scan itself; the candidate is simply
/// discarded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailRejection {
    /// Nothing left after trimming
    #[error("empty candidate")]
    Empty,

    /// Longer than the RFC 5321 path limit
    #[error("{len} characters exceeds the 254 character limit")]
    TooLong {
        /// Length of the cleaned candidate
        len: usize,
    },

    /// Local part is a `+`-prefixed phone number
    #[error("phone number captured as local part")]
    PhoneNumber,

    /// Does not match the canonical `local@domain.tld` shape
    #[error("not a canonical email address")]
    Malformed,

    /// Domain is excluded by policy
    #[error("domain {domain} is not allowed")]
    DisallowedDomain {
        /// Rejected domain
        domain: String,
    },
}

/// Result type alias using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
