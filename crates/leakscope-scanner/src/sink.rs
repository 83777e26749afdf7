//! Forwarding fresh credentials downstream.

use crate::error::SinkError;
use async_trait::async_trait;
use leakscope_core::{Credential, SinkConfig};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// One credential as it travels on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialRecord {
    pub email: String,
    pub password: String,
}

impl From<&Credential> for CredentialRecord {
    fn from(credential: &Credential) -> Self {
        Self {
            email: credential.email.as_str().to_string(),
            password: credential.password.clone(),
        }
    }
}

/// Body of a forward to the alert sink.
///
/// Deserialization accepts the legacy `matches` name for `emails`, fills
/// missing fields with defaults, and ignores unknown fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwardPayload {
    pub source: String,
    #[serde(alias = "matches")]
    pub emails: Vec<String>,
    pub email_count: usize,
    pub creds: Vec<CredentialRecord>,
    pub cred_count: usize,
}

impl ForwardPayload {
    /// Payload for one batch of fresh credentials.
    #[must_use]
    pub fn from_batch(source: impl Into<String>, batch: &[Credential]) -> Self {
        let emails: BTreeSet<String> = batch
            .iter()
            .map(|c| c.email.as_str().to_string())
            .collect();

        Self {
            source: source.into(),
            email_count: emails.len(),
            emails: emails.into_iter().collect(),
            cred_count: batch.len(),
            creds: batch.iter().map(CredentialRecord::from).collect(),
        }
    }

    /// Rebuild a payload from loosely shaped parts.
    ///
    /// Keeps emails containing `@` and credentials with both halves present.
    /// Emails are trimmed, sorted and deduplicated; when none were sent, the
    /// credential emails are used. Returns `None` when nothing survives.
    #[must_use]
    pub fn sanitized(
        source: impl Into<String>,
        emails: Vec<String>,
        creds: Vec<CredentialRecord>,
    ) -> Option<Self> {
        let creds: Vec<CredentialRecord> = creds
            .into_iter()
            .map(|c| CredentialRecord {
                email: c.email.trim().to_string(),
                password: c.password,
            })
            .filter(|c| !c.email.is_empty() && !c.password.is_empty())
            .collect();

        let mut unique: BTreeSet<String> = emails
            .iter()
            .map(|e| e.trim())
            .filter(|e| e.contains('@'))
            .map(str::to_string)
            .collect();
        if unique.is_empty() {
            unique = creds.iter().map(|c| c.email.clone()).collect();
        }

        if unique.is_empty() && creds.is_empty() {
            return None;
        }

        Some(Self {
            source: source.into(),
            email_count: unique.len(),
            emails: unique.into_iter().collect(),
            cred_count: creds.len(),
            creds,
        })
    }
}

/// Downstream receiver of forwarded batches.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Deliver one batch. `Ok` means the sink accepted it.
    async fn send(&self, payload: &ForwardPayload) -> Result<(), SinkError>;
}

/// Posts payloads as JSON to a webhook.
pub struct WebhookSink {
    client: Client,
    url: String,
}

impl WebhookSink {
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, SinkError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SinkError::Client(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl AlertSink for WebhookSink {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, payload: &ForwardPayload) -> Result<(), SinkError> {
        let response = self.client.post(&self.url).json(payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(
            source = %payload.source,
            creds = payload.cred_count,
            status = status.as_u16(),
            "batch accepted by webhook"
        );
        Ok(())
    }
}

/// Accepts every batch and only logs it. Used when no webhook is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl AlertSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, payload: &ForwardPayload) -> Result<(), SinkError> {
        info!(
            source = %payload.source,
            emails = payload.email_count,
            creds = payload.cred_count,
            "no webhook configured, forward skipped"
        );
        Ok(())
    }
}

/// The webhook sink if a URL is configured, the log sink otherwise.
///
/// # Errors
/// Returns error if the HTTP client cannot be created.
pub fn sink_from_config(config: &SinkConfig) -> Result<Arc<dyn AlertSink>, SinkError> {
    match config.webhook_url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => {
            info!(url, "forwarding alerts to webhook");
            Ok(Arc::new(WebhookSink::new(url, config.request_timeout())?))
        }
        _ => Ok(Arc::new(LogSink)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leakscope_core::Email;

    fn cred(email: &str, password: &str) -> Credential {
        Credential::new(Email::parse(email).unwrap(), password).unwrap()
    }

    fn record(email: &str, password: &str) -> CredentialRecord {
        CredentialRecord {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_from_batch_shape() {
        let batch = vec![
            cred("b@example.org", "x"),
            cred("a@example.org", "y"),
            cred("a@example.org", "z"),
        ];
        let payload = ForwardPayload::from_batch("dump.txt", &batch);

        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            serde_json::json!({
                "source": "dump.txt",
                "emails": ["a@example.org", "b@example.org"],
                "email_count": 2,
                "creds": [
                    {"email": "b@example.org", "password": "x"},
                    {"email": "a@example.org", "password": "y"},
                    {"email": "a@example.org", "password": "z"}
                ],
                "cred_count": 3
            })
        );
    }

    #[test]
    fn test_accepts_legacy_matches_and_unknown_fields() {
        let payload: ForwardPayload = serde_json::from_str(
            r#"{"source":"s","matches":["a@example.org"],"count":1,"extra":{"x":1}}"#,
        )
        .unwrap();

        assert_eq!(payload.emails, vec!["a@example.org".to_string()]);
        assert!(payload.creds.is_empty());
    }

    #[test]
    fn test_sanitized_backfills_emails_from_creds() {
        let payload = ForwardPayload::sanitized(
            "s",
            vec!["not-an-email".to_string()],
            vec![record(" b@example.org ", "pw"), record("", "pw"), record("c@example.org", "")],
        )
        .unwrap();

        assert_eq!(payload.emails, vec!["b@example.org".to_string()]);
        assert_eq!(payload.creds, vec![record("b@example.org", "pw")]);
        assert_eq!(payload.email_count, 1);
        assert_eq!(payload.cred_count, 1);
    }

    #[test]
    fn test_sanitized_nothing_left() {
        assert!(ForwardPayload::sanitized("s", vec![" ".to_string()], Vec::new()).is_none());
    }

    #[test]
    fn test_sink_from_config() {
        let mut config = SinkConfig::default();
        assert_eq!(sink_from_config(&config).unwrap().name(), "log");

        config.webhook_url = Some("http://127.0.0.1:9/hook".to_string());
        assert_eq!(sink_from_config(&config).unwrap().name(), "webhook");
    }

    #[tokio::test]
    async fn test_log_sink_accepts() {
        let payload = ForwardPayload::from_batch("s", &[cred("a@example.org", "pw")]);
        assert!(LogSink.send(&payload).await.is_ok());
    }
}
