//! Configuration management for leakscope.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides. Every field has a default, so the
//! pipeline can start with no configuration at all.

use crate::error::{ConfigError, ConfigResult};
use crate::types::{Email, MAX_CREDENTIAL_SPAN};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration.
///
/// Loaded from `~/.config/leakscope/config.toml` (or platform equivalent)
/// unless an explicit path is given.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Which credentials are relevant enough to alert on
    pub scope: ScopeConfig,
    /// Downstream alert sink settings
    pub sink: SinkConfig,
    /// Input directory, chunking, and archiving behavior
    pub input: InputConfig,
    /// Email validation policy
    pub validation: ValidationConfig,
    /// HTTP server settings
    pub server: ServerConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// An explicit `path` must exist; the default XDG path may be absent.
    ///
    /// # Errors
    /// Returns error if:
    /// - An explicit path is given but does not exist
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let config_path = match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound {
                        path: p.display().to_string(),
                    });
                }
                p.to_path_buf()
            }
            None => match Self::config_path() {
                Ok(p) => p,
                Err(e) => {
                    tracing::debug!("No config directory ({e}), using defaults");
                    return Ok(Self::default());
                }
            },
        };

        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(&config_path)?;
            Ok(toml::from_str(&contents)?)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration, apply environment overrides, and validate.
    ///
    /// Supports the following environment variables:
    /// - `LEAKSCOPE_TARGET_DOMAIN`, `LEAKSCOPE_TARGET_EMAIL`, `LEAKSCOPE_UNSCOPED`
    /// - `LEAKSCOPE_WEBHOOK_URL`, `LEAKSCOPE_BATCH_SIZE`,
    ///   `LEAKSCOPE_REQUEST_TIMEOUT_SECS`, `LEAKSCOPE_RETRY_ATTEMPTS`,
    ///   `LEAKSCOPE_RETRY_DELAY_SECS`
    /// - `LEAKSCOPE_INPUT_DIR`, `LEAKSCOPE_STATE_FILE`, `LEAKSCOPE_MAX_READ_BYTES`,
    ///   `LEAKSCOPE_ARCHIVE_EMPTY`, `LEAKSCOPE_SCAN_INTERVAL_SECS`
    /// - `LEAKSCOPE_BIND`
    pub fn load_with_env(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup.
    ///
    /// Values that fail to parse are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("LEAKSCOPE_TARGET_DOMAIN") {
            tracing::debug!("Override scope.target_domain from env: {}", val);
            self.scope.target_domain = val;
        }
        if let Some(val) = lookup("LEAKSCOPE_TARGET_EMAIL") {
            tracing::debug!("Override scope.target_email from env: {}", val);
            self.scope.target_email = val;
        }
        if let Some(val) = lookup("LEAKSCOPE_UNSCOPED") {
            match val.parse() {
                Ok(policy) => self.scope.unscoped = policy,
                Err(e) => tracing::debug!("Ignoring LEAKSCOPE_UNSCOPED: {}", e),
            }
        }
        if let Some(val) = lookup("LEAKSCOPE_WEBHOOK_URL") {
            self.sink.webhook_url = if val.trim().is_empty() {
                None
            } else {
                Some(val)
            };
        }
        override_parsed(&lookup, "LEAKSCOPE_BATCH_SIZE", &mut self.sink.batch_size);
        override_parsed(
            &lookup,
            "LEAKSCOPE_REQUEST_TIMEOUT_SECS",
            &mut self.sink.request_timeout_secs,
        );
        override_parsed(
            &lookup,
            "LEAKSCOPE_RETRY_ATTEMPTS",
            &mut self.sink.retry_attempts,
        );
        override_parsed(
            &lookup,
            "LEAKSCOPE_RETRY_DELAY_SECS",
            &mut self.sink.retry_delay_secs,
        );
        if let Some(val) = lookup("LEAKSCOPE_INPUT_DIR") {
            tracing::debug!("Override input.input_dir from env: {}", val);
            self.input.input_dir = PathBuf::from(val);
        }
        if let Some(val) = lookup("LEAKSCOPE_STATE_FILE") {
            self.input.state_file = PathBuf::from(val);
        }
        override_parsed(
            &lookup,
            "LEAKSCOPE_MAX_READ_BYTES",
            &mut self.input.max_read_bytes,
        );
        override_parsed(
            &lookup,
            "LEAKSCOPE_ARCHIVE_EMPTY",
            &mut self.input.archive_empty,
        );
        override_parsed(
            &lookup,
            "LEAKSCOPE_SCAN_INTERVAL_SECS",
            &mut self.input.scan_interval_secs,
        );
        if let Some(val) = lookup("LEAKSCOPE_BIND") {
            self.server.bind = val;
        }
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.sink.batch_size == 0 {
            return Err(invalid("sink.batch_size", "must be at least 1"));
        }
        if self.sink.retry_attempts == 0 {
            return Err(invalid("sink.retry_attempts", "must be at least 1"));
        }
        if self.input.chunk_size == 0 {
            return Err(invalid("input.chunk_size", "must be at least 1"));
        }
        if self.input.chunk_overlap < MAX_CREDENTIAL_SPAN {
            return Err(ConfigError::InvalidValue {
                field: "input.chunk_overlap".to_string(),
                reason: format!("must be at least {MAX_CREDENTIAL_SPAN} bytes"),
            });
        }
        if self.input.chunk_overlap >= self.input.chunk_size {
            return Err(invalid(
                "input.chunk_overlap",
                "must be smaller than input.chunk_size",
            ));
        }
        if !self.scope.target_email.trim().is_empty()
            && Email::parse(&self.scope.target_email).is_err()
        {
            return Err(invalid("scope.target_email", "not a valid email address"));
        }
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/leakscope/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("com", "leakscope", "leakscope").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, slot: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + std::fmt::Debug,
{
    if let Some(val) = lookup(key) {
        if let Ok(parsed) = val.trim().parse::<T>() {
            tracing::debug!("Override from env {}: {:?}", key, parsed);
            *slot = parsed;
        } else {
            tracing::debug!("Ignoring unparseable {}={}", key, val);
        }
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

/// What the scope filter does when neither a target domain nor a target
/// email is configured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnscopedPolicy {
    /// Accept everything (development)
    Open,
    /// Accept nothing (production)
    #[default]
    Closed,
}

impl std::str::FromStr for UnscopedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            other => Err(format!("expected 'open' or 'closed', got '{other}'")),
        }
    }
}

/// Scope settings. Read-only after startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Domain whose addresses are in scope, e.g. `example.org`
    pub target_domain: String,
    /// Single address (or address suffix) in scope
    pub target_email: String,
    /// Behavior when neither target is configured
    pub unscoped: UnscopedPolicy,
}

/// Downstream alert sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Webhook receiving forward payloads; unset means log-only
    pub webhook_url: Option<String>,
    /// Credentials per forwarded batch
    pub batch_size: usize,
    /// HTTP request timeout in seconds
    pub request_timeout_secs: u64,
    /// Attempts per batch, including the first
    pub retry_attempts: u32,
    /// Delay between attempts in seconds
    pub retry_delay_secs: u64,
}

impl SinkConfig {
    /// Request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Retry delay as a `Duration`.
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            batch_size: 50,
            request_timeout_secs: 15,
            retry_attempts: 3,
            retry_delay_secs: 5,
        }
    }
}

/// Input directory and read behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Directory watched for pending inputs
    pub input_dir: PathBuf,
    /// Where successfully forwarded inputs are moved (relative to `input_dir`)
    pub processed_dir: PathBuf,
    /// Persisted dedup history (relative to `input_dir`)
    pub state_file: PathBuf,
    /// Upper bound on bytes read from a single input
    pub max_read_bytes: u64,
    /// Bytes per chunk when streaming large files
    pub chunk_size: usize,
    /// Files larger than this are streamed in chunks
    pub chunk_threshold: u64,
    /// Bytes of the previous chunk re-scanned with the next one; at least
    /// [`MAX_CREDENTIAL_SPAN`]
    pub chunk_overlap: usize,
    /// Archive inputs that had no in-scope matches
    pub archive_empty: bool,
    /// Per-input read and extract timeout in seconds
    pub scan_timeout_secs: u64,
    /// Seconds between passes in `serve` mode (0 disables the loop)
    pub scan_interval_secs: u64,
}

impl InputConfig {
    /// Absolute processed directory.
    #[must_use]
    pub fn processed_path(&self) -> PathBuf {
        self.input_dir.join(&self.processed_dir)
    }

    /// Absolute state file path.
    #[must_use]
    pub fn state_path(&self) -> PathBuf {
        self.input_dir.join(&self.state_file)
    }

    /// Per-input timeout as a `Duration`.
    #[must_use]
    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    /// Fail unless the input directory exists.
    pub fn ensure_input_dir(&self) -> ConfigResult<()> {
        if self.input_dir.is_dir() {
            Ok(())
        } else {
            Err(ConfigError::InputDirUnavailable {
                path: self.input_dir.display().to_string(),
            })
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("/files"),
            processed_dir: PathBuf::from("_processed"),
            state_file: PathBuf::from(".alerted_creds.json"),
            max_read_bytes: 512 * 1024 * 1024,
            chunk_size: 4 * 1024 * 1024,
            chunk_threshold: 8 * 1024 * 1024,
            chunk_overlap: 1024,
            archive_empty: false,
            scan_timeout_secs: 600,
            scan_interval_secs: 300,
        }
    }
}

/// Email validation policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Domains whose addresses are always dropped
    pub blocked_domains: Vec<String>,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8001".to_string(),
        }
    }
}
