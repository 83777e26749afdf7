//! Pass orchestration over the input directory.
//!
//! A pass discovers pending inputs and takes each one through
//! scan → dedupe → forward → archive before starting the next. Anything
//! that goes wrong with one input is recorded in its [`UnitReport`] and the
//! pass moves on; only an unlistable input directory ends a pass early. A
//! state file that cannot be written at the end of a pass is reported in
//! [`PassReport::state_error`].

use crate::dedup::{dedupe, AlertedKeySet};
use crate::error::{PipelineError, Result, SinkError};
use crate::retry::{RetryPolicy, Sleeper, TokioSleeper};
use crate::sink::{sink_from_config, AlertSink, ForwardPayload};
use chrono::{DateTime, Utc};
use leakscope_core::{AppConfig, Credential, InputConfig, ScanResult};
use leakscope_discovery::{discover_inputs, Scanner};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Terminal state of one input unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UnitOutcome {
    /// Scanned cleanly, no in-scope credentials
    NoMatches,
    /// Every credential had been alerted on before
    DedupedEmpty,
    /// At least one batch was accepted by the sink
    Forwarded { batches_sent: usize, batches_failed: usize },
    /// Every batch failed after exhausting retries
    ForwardFailed { batches: usize },
    /// Could not be read, parsed, or scanned in time
    Unreadable { error: String },
    /// Vanished between discovery and processing
    Missing,
}

impl UnitOutcome {
    /// Whether a file with this outcome moves to the processed directory.
    #[must_use]
    pub fn archives(&self, archive_empty: bool) -> bool {
        match self {
            Self::NoMatches => archive_empty,
            Self::DedupedEmpty | Self::Forwarded { .. } => true,
            Self::ForwardFailed { .. } | Self::Unreadable { .. } | Self::Missing => false,
        }
    }
}

/// Where an input ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Moved to the processed directory
    Archived,
    /// Left in place for a later pass
    Retained,
    /// Inline text; nothing to move
    Inline,
}

/// What happened to one input.
#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    pub source: String,
    pub outcome: UnitOutcome,
    pub disposition: Disposition,
    /// Distinct in-scope emails found
    pub emails: usize,
    /// Distinct in-scope credentials found, before cross-run dedup
    pub raw_creds: usize,
    /// Credentials selected for forwarding
    pub fresh_creds: usize,
}

impl UnitReport {
    fn failed(source: String, outcome: UnitOutcome) -> Self {
        Self {
            source,
            outcome,
            disposition: Disposition::Retained,
            emails: 0,
            raw_creds: 0,
            fresh_creds: 0,
        }
    }
}

/// Summary of one pass.
#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub units: Vec<UnitReport>,
    /// Shutdown was requested before every input was processed
    pub cancelled: bool,
    /// The alerted credential state could not be saved after the pass;
    /// credentials forwarded in this pass may be forwarded again
    pub state_error: Option<String>,
}

impl PassReport {
    fn start() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            units: Vec::new(),
            cancelled: false,
            state_error: None,
        }
    }

    fn count(&self, disposition: Disposition) -> usize {
        self.units
            .iter()
            .filter(|u| u.disposition == disposition)
            .count()
    }

    #[must_use]
    pub fn archived(&self) -> usize {
        self.count(Disposition::Archived)
    }

    #[must_use]
    pub fn retained(&self) -> usize {
        self.count(Disposition::Retained)
    }

    #[must_use]
    pub fn raw_creds(&self) -> usize {
        self.units.iter().map(|u| u.raw_creds).sum()
    }

    #[must_use]
    pub fn fresh_creds(&self) -> usize {
        self.units.iter().map(|u| u.fresh_creds).sum()
    }

    #[must_use]
    pub fn unit(&self, source: &str) -> Option<&UnitReport> {
        self.units.iter().find(|u| u.source == source)
    }
}

/// Drives inputs through the pipeline, one at a time.
///
/// Owns the [`AlertedKeySet`]; `&mut self` on every processing method keeps
/// two units from ever touching it concurrently.
pub struct Pipeline {
    scanner: Arc<Scanner>,
    history: AlertedKeySet,
    sink: Arc<dyn AlertSink>,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    cancel: CancellationToken,
    input: InputConfig,
    batch_size: usize,
}

impl Pipeline {
    #[must_use]
    pub fn new(config: &AppConfig, history: AlertedKeySet, sink: Arc<dyn AlertSink>) -> Self {
        Self {
            scanner: Arc::new(Scanner::from_config(config)),
            history,
            sink,
            retry: RetryPolicy::from_config(&config.sink),
            sleeper: Arc::new(TokioSleeper),
            cancel: CancellationToken::new(),
            input: config.input.clone(),
            batch_size: config.sink.batch_size.max(1),
        }
    }

    /// Load the persisted history and pick the sink from configuration.
    ///
    /// # Errors
    /// Returns error if the webhook client cannot be created.
    pub fn from_config(config: &AppConfig) -> std::result::Result<Self, SinkError> {
        let history = AlertedKeySet::load(config.input.state_path());
        let sink = sink_from_config(&config.sink)?;
        Ok(Self::new(config, history, sink))
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn history(&self) -> &AlertedKeySet {
        &self.history
    }

    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Process every pending input in the input directory.
    ///
    /// Cancellation is checked between inputs: the current input always
    /// finishes and the state is persisted before returning.
    ///
    /// # Errors
    /// Returns error if the input directory cannot be listed.
    pub async fn run_pass(&mut self) -> Result<PassReport> {
        let mut report = PassReport::start();
        let input_dir = self.input.input_dir.clone();
        let processed = self.input.processed_path();

        let inputs = discover_inputs(&input_dir, &processed)
            .await
            .map_err(|source| PipelineError::Discovery {
                path: input_dir.display().to_string(),
                source,
            })?;

        info!(run_id = %report.run_id, inputs = inputs.len(), "starting pass");

        for path in inputs {
            if self.cancel.is_cancelled() {
                info!(run_id = %report.run_id, "shutdown requested, stopping pass");
                report.cancelled = true;
                break;
            }

            let unit = self.process_file(&path).await;
            report.units.push(unit);

            if self.history.is_dirty() {
                if let Err(e) = self.history.persist() {
                    error!(error = %e, "failed to persist alerted credential state");
                }
            }
        }

        if let Err(e) = self.history.persist() {
            error!(run_id = %report.run_id, error = %e, "failed to persist alerted credential state");
            report.state_error = Some(e.to_string());
        }
        report.finished_at = Some(Utc::now());

        info!(
            run_id = %report.run_id,
            units = report.units.len(),
            archived = report.archived(),
            retained = report.retained(),
            raw_creds = report.raw_creds(),
            fresh_creds = report.fresh_creds(),
            cancelled = report.cancelled,
            state_saved = report.state_error.is_none(),
            "pass complete"
        );
        Ok(report)
    }

    /// Process inline text as one unit: scan, dedupe, forward.
    ///
    /// # Errors
    /// Returns error if the state file cannot be written.
    pub async fn process_text(&mut self, source: &str, text: &str) -> Result<UnitReport> {
        let result = self.scanner.scan_text(text);
        let mut unit = self.deliver(source, result).await;
        unit.disposition = Disposition::Inline;
        if self.history.is_dirty() {
            self.history.persist()?;
        }
        Ok(unit)
    }

    async fn process_file(&mut self, path: &Path) -> UnitReport {
        let source = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());

        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            warn!(%source, "input disappeared before processing, skipping");
            return UnitReport::failed(source, UnitOutcome::Missing);
        }

        let result = match self.scan_file(path).await {
            Ok(result) => result,
            Err(e) => {
                warn!(%source, error = %e, "input unreadable, retaining");
                return UnitReport::failed(source, UnitOutcome::Unreadable { error: e });
            }
        };

        let mut unit = self.deliver(&source, result).await;
        if unit.outcome.archives(self.input.archive_empty) {
            match self.archive(path).await {
                Ok(dest) => {
                    info!(%source, dest = %dest.display(), "input archived");
                    unit.disposition = Disposition::Archived;
                }
                Err(e) => error!(%source, error = %e, "failed to archive input, retaining"),
            }
        } else {
            debug!(%source, outcome = ?unit.outcome, "input retained");
        }
        unit
    }

    /// Read and scan on the blocking pool, bounded by the scan timeout.
    async fn scan_file(&self, path: &Path) -> std::result::Result<ScanResult, String> {
        Arc::clone(&self.scanner)
            .scan_path_with_timeout(path.to_path_buf(), self.input.scan_timeout())
            .await
            .map_err(|e| e.to_string())
    }

    /// Dedupe a scan result and forward what is fresh.
    async fn deliver(&mut self, source: &str, result: ScanResult) -> UnitReport {
        let emails = result.email_count();
        let raw_creds = result.cred_count();
        let mut unit = UnitReport {
            source: source.to_string(),
            outcome: UnitOutcome::NoMatches,
            disposition: Disposition::Retained,
            emails,
            raw_creds,
            fresh_creds: 0,
        };

        if raw_creds == 0 {
            info!(source, "no in-scope credentials");
            return unit;
        }

        let fresh = dedupe(result.into_creds(), &mut self.history);
        unit.fresh_creds = fresh.len();
        if fresh.is_empty() {
            info!(source, raw_creds, "all credentials alerted earlier");
            unit.outcome = UnitOutcome::DedupedEmpty;
            return unit;
        }

        info!(source, raw_creds, fresh_creds = fresh.len(), "forwarding new credentials");
        let (sent, failed) = self.forward(source, &fresh).await;
        unit.outcome = if sent > 0 {
            UnitOutcome::Forwarded {
                batches_sent: sent,
                batches_failed: failed,
            }
        } else {
            error!(source, batches = failed, "every batch failed, input retained");
            UnitOutcome::ForwardFailed { batches: failed }
        };
        unit
    }

    /// Send `fresh` in order, in batches, each with its own retries.
    async fn forward(&self, source: &str, fresh: &[Credential]) -> (usize, usize) {
        let mut sent = 0;
        let mut failed = 0;

        for (index, batch) in fresh.chunks(self.batch_size).enumerate() {
            let payload = ForwardPayload::from_batch(source, batch);
            let label = format!("forward of {source} batch {}", index + 1);
            let sink = self.sink.as_ref();
            let body = &payload;

            match self
                .retry
                .run(self.sleeper.as_ref(), &label, move |_| sink.send(body))
                .await
            {
                Ok(()) => {
                    info!(
                        source,
                        batch = index + 1,
                        creds = batch.len(),
                        sink = sink.name(),
                        "batch sent"
                    );
                    sent += 1;
                }
                Err(e) => {
                    error!(source, batch = index + 1, error = %e, "batch failed after retries");
                    failed += 1;
                }
            }
        }
        (sent, failed)
    }

    async fn archive(&self, path: &Path) -> io::Result<PathBuf> {
        let processed = self.input.processed_path();
        tokio::fs::create_dir_all(&processed).await?;

        let name = path
            .file_name()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "input has no file name"))?;
        let mut dest = processed.join(name);
        if tokio::fs::try_exists(&dest).await? {
            let stamp = Utc::now().format("%Y%m%dT%H%M%S");
            dest = processed.join(format!("{}.{stamp}", name.to_string_lossy()));
        }

        tokio::fs::rename(path, &dest).await?;
        Ok(dest)
    }
}
