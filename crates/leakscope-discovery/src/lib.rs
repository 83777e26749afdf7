//! Leakscope Discovery - turning raw inputs into scoped credential findings.
//!
//! Reads plain text, PDFs, and ZIP/RAR/7z archives (streaming large files in
//! overlapping chunks), extracts email and `email:password` candidates at the
//! byte level, normalizes them, and keeps only what is in scope.
//!
//! # Example
//!
//! ```rust
//! use leakscope_core::AppConfig;
//! use leakscope_discovery::Scanner;
//!
//! let mut config = AppConfig::default();
//! config.scope.target_domain = "example.org".to_string();
//! let scanner = Scanner::from_config(&config);
//!
//! let result = scanner.scan_text("admin@example.org:Secret123 bob@other.com:xyz");
//! assert_eq!(result.cred_count(), 1);
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod filesystem;
pub mod patterns;
pub mod reader;
pub mod scan;
pub mod scope;
pub mod validate;

// Re-export main types
pub use error::{ReadError, Result};
pub use filesystem::{discover_inputs, resolve_under};
pub use patterns::{CredentialPattern, PatternSet, RawFindings, MAX_CREDENTIAL_SPAN};
pub use reader::{open_source, ChunkedReader, ContainerKind, Content, ReaderLimits};
pub use scan::Scanner;
pub use scope::ScopeFilter;
pub use validate::Validator;
