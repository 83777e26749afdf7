//! Leakscope Core - Foundation crate for the leakscope credential pipeline.
//!
//! This crate provides the shared domain types, error handling, and
//! configuration management that the discovery, scanner, and server crates
//! depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths and env overrides
//! - [`types`] - Domain types (`Email`, `Credential`, `ScanResult`)
//!
//! # Example
//!
//! ```rust
//! use leakscope_core::{AppConfig, Email};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! assert_eq!(config.sink.batch_size, 50);
//!
//! let email = Email::parse("Admin@Example.org")?;
//! assert_eq!(email.as_str(), "admin@example.org");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{
    AppConfig, InputConfig, ScopeConfig, ServerConfig, SinkConfig, UnscopedPolicy,
    ValidationConfig,
};
pub use error::{ConfigError, ConfigResult, CoreError, EmailRejection, Result};
pub use types::{
    Credential, Email, ScanResult, ScanResultBuilder, MAX_CREDENTIAL_SPAN, MAX_EMAIL_LEN,
};
