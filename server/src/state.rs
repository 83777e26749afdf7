use leakscope_core::AppConfig;
use leakscope_discovery::Scanner;
use leakscope_scanner::{sink_from_config, AlertSink, SinkError};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Shared, read-only state for request handlers.
///
/// Handlers never see the alerted credential set; only the pass loop owns it.
#[derive(Clone)]
pub struct AppState {
    pub scanner: Arc<Scanner>,
    pub sink: Arc<dyn AlertSink>,
    /// Root that `filepath` requests must resolve under
    pub input_root: PathBuf,
    pub scan_timeout: Duration,
}

impl AppState {
    #[must_use]
    pub fn new(config: &AppConfig, sink: Arc<dyn AlertSink>) -> Self {
        Self {
            scanner: Arc::new(Scanner::from_config(config)),
            sink,
            input_root: config.input.input_dir.clone(),
            scan_timeout: config.input.scan_timeout(),
        }
    }

    /// # Errors
    /// Returns error if the webhook client cannot be created.
    pub fn from_config(config: &AppConfig) -> Result<Self, SinkError> {
        Ok(Self::new(config, sink_from_config(&config.sink)?))
    }
}
