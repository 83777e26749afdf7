//! Read → extract → validate → scope, for one input.

use crate::error::{ReadError, Result};
use crate::patterns::{PatternSet, RawFindings};
use crate::reader::{open_source, Content, ReaderLimits};
use crate::scope::ScopeFilter;
use crate::validate::Validator;
use leakscope_core::{AppConfig, Credential, ScanResult, ScanResultBuilder};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Turns one input into its scoped [`ScanResult`].
///
/// Holds only read-only state, so a single scanner can be shared across
/// threads.
#[derive(Debug, Clone)]
pub struct Scanner {
    patterns: PatternSet,
    validator: Validator,
    scope: ScopeFilter,
    limits: ReaderLimits,
}

impl Scanner {
    #[must_use]
    pub fn new(
        patterns: PatternSet,
        validator: Validator,
        scope: ScopeFilter,
        limits: ReaderLimits,
    ) -> Self {
        Self {
            patterns,
            validator,
            scope,
            limits,
        }
    }

    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            PatternSet::new(),
            Validator::from_config(&config.validation),
            ScopeFilter::new(&config.scope),
            ReaderLimits::from_config(&config.input),
        )
    }

    #[must_use]
    pub fn limits(&self) -> &ReaderLimits {
        &self.limits
    }

    #[must_use]
    pub fn scope(&self) -> &ScopeFilter {
        &self.scope
    }

    /// Scan inline text.
    #[must_use]
    pub fn scan_text(&self, text: &str) -> ScanResult {
        self.scan_bytes(text.as_bytes())
    }

    /// Scan an in-memory buffer.
    #[must_use]
    pub fn scan_bytes(&self, buf: &[u8]) -> ScanResult {
        let mut builder = ScanResultBuilder::new();
        self.collect(&mut builder, buf);
        builder.build()
    }

    /// Scan a file of any supported container kind.
    ///
    /// Large plain files are scanned window by window; a read error partway
    /// through keeps whatever the earlier windows produced.
    ///
    /// # Errors
    /// Returns error if the input cannot be opened at all.
    pub fn scan_path(&self, path: &Path) -> Result<ScanResult> {
        self.scan_path_until(path, &AtomicBool::new(false))
    }

    /// [`Scanner::scan_path`], checking `stop` before every chunk.
    ///
    /// Only chunked scans can be stopped; whole-buffer reads, PDFs and
    /// archives run to completion once started.
    ///
    /// # Errors
    /// Returns [`ReadError::Interrupted`] once `stop` is set, or any error
    /// [`Scanner::scan_path`] returns.
    pub fn scan_path_until(&self, path: &Path, stop: &AtomicBool) -> Result<ScanResult> {
        let mut builder = ScanResultBuilder::new();

        match open_source(path, &self.limits)? {
            Content::Whole(bytes) => self.collect(&mut builder, &bytes),
            Content::Chunked(windows) => {
                let mut scanned = 0usize;
                for window in windows {
                    if stop.load(Ordering::Relaxed) {
                        return Err(ReadError::Interrupted {
                            path: path.display().to_string(),
                            chunks: scanned,
                        });
                    }
                    match window {
                        Ok(window) => {
                            self.collect(&mut builder, &window);
                            scanned += 1;
                        }
                        Err(e) => {
                            warn!(
                                path = %path.display(),
                                error = %e,
                                chunks = scanned,
                                "read failed mid-stream, keeping partial results"
                            );
                            break;
                        }
                    }
                }
                debug!(path = %path.display(), chunks = scanned, "chunked scan complete");
            }
        }

        let result = builder.build();
        debug!(
            path = %path.display(),
            emails = result.email_count(),
            creds = result.cred_count(),
            "input scanned"
        );
        Ok(result)
    }

    /// Scan a file on the blocking pool, giving up after `timeout`.
    ///
    /// A timed-out chunked scan is told to stop and exits at its next chunk.
    ///
    /// # Errors
    /// Returns [`ReadError::TimedOut`] when the deadline passes,
    /// [`ReadError::Task`] if the scan panicked, or the scan's own error.
    pub async fn scan_path_with_timeout(
        self: Arc<Self>,
        path: PathBuf,
        timeout: Duration,
    ) -> Result<ScanResult> {
        let stop = Arc::new(AtomicBool::new(false));
        let task = {
            let stop = Arc::clone(&stop);
            let path = path.clone();
            tokio::task::spawn_blocking(move || self.scan_path_until(&path, &stop))
        };

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(ReadError::Task(e.to_string())),
            Err(_) => {
                stop.store(true, Ordering::Relaxed);
                warn!(path = %path.display(), ?timeout, "scan timed out, stopping it");
                Err(ReadError::TimedOut {
                    path: path.display().to_string(),
                    after: timeout,
                })
            }
        }
    }

    fn collect(&self, builder: &mut ScanResultBuilder, buf: &[u8]) {
        let RawFindings { emails, creds } = self.patterns.extract(buf);

        for raw in emails {
            match self.validator.normalize(&raw) {
                Ok(email) if self.scope.in_scope(&email) => builder.add_email(email),
                Ok(_) => {}
                Err(reason) => trace!(%reason, "email candidate dropped"),
            }
        }

        for (raw_email, password) in creds {
            let email = match self.validator.normalize(&raw_email) {
                Ok(email) => email,
                Err(reason) => {
                    trace!(%reason, "credential candidate dropped");
                    continue;
                }
            };
            if !self.scope.in_scope(&email) {
                continue;
            }
            match Credential::new(email, password) {
                Ok(credential) => builder.add_credential(credential),
                Err(e) => trace!(error = %e, "credential candidate dropped"),
            }
        }
    }
}
