//! Leakscope Scanner - pass orchestration, deduplication and alert forwarding.
//!
//! This crate takes the scoped findings produced by `leakscope-discovery`
//! and turns them into alerts:
//!
//! - Cross-run deduplication against a persisted set of alerted credentials
//! - Batched forwarding to a webhook (or a logging sink) with bounded retries
//! - Archiving of inputs once at least one batch has been delivered
//! - Cooperative shutdown between inputs
//!
//! # Example
//!
//! ```rust,ignore
//! use leakscope_core::AppConfig;
//! use leakscope_scanner::Pipeline;
//!
//! let config = AppConfig::load_with_env(None)?;
//! let mut pipeline = Pipeline::from_config(&config)?;
//! let report = pipeline.run_pass().await?;
//! println!("{} fresh credentials forwarded", report.fresh_creds());
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod dedup;
pub mod error;
pub mod orchestrator;
pub mod retry;
pub mod sink;

// Re-export commonly used types
pub use dedup::{dedupe, AlertedKeySet};
pub use error::{PipelineError, Result, SinkError, StateError};
pub use orchestrator::{Disposition, PassReport, Pipeline, UnitOutcome, UnitReport};
pub use retry::{Backoff, RetryPolicy, Sleeper, TokioSleeper};
pub use sink::{sink_from_config, AlertSink, CredentialRecord, ForwardPayload, LogSink, WebhookSink};
