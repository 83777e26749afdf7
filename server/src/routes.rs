//! HTTP routes.
//!
//! - `GET /health` liveness probe
//! - `POST /extract` scan a file under the input root, or inline text
//! - `POST /ingest` sanitize a payload and relay it to the alert sink

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use leakscope_core::ScanResult;
use leakscope_discovery::{resolve_under, ReadError};
use leakscope_scanner::{CredentialRecord, ForwardPayload};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::info;

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/extract", post(extract))
        .route("/ingest", post(ingest))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ExtractRequest {
    pub filepath: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    pub emails: Vec<String>,
    pub email_count: usize,
    pub creds: Vec<CredentialRecord>,
    pub cred_count: usize,
}

impl From<ScanResult> for ExtractResponse {
    fn from(result: ScanResult) -> Self {
        Self {
            emails: result.emails().map(|e| e.as_str().to_string()).collect(),
            email_count: result.email_count(),
            creds: result.creds().map(CredentialRecord::from).collect(),
            cred_count: result.cred_count(),
        }
    }
}

async fn extract(
    State(state): State<AppState>,
    body: Result<Json<ExtractRequest>, JsonRejection>,
) -> ApiResult<Json<ExtractResponse>> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let result = match (request.filepath, request.text) {
        (Some(filepath), _) => {
            let path = confine(&state.input_root, Path::new(&filepath))?;
            scan_file(&state, path).await?
        }
        (None, Some(text)) => state.scanner.scan_text(&text),
        (None, None) => {
            return Err(ApiError::BadRequest(
                "request needs either filepath or text".to_string(),
            ))
        }
    };

    Ok(Json(result.into()))
}

/// Resolve a requested path, refusing anything outside `root`.
fn confine(root: &Path, requested: &Path) -> ApiResult<PathBuf> {
    if let Some(path) = resolve_under(root, requested) {
        return Ok(path);
    }

    let joined = root.join(requested);
    let lexically_inside = joined.starts_with(root)
        && !joined.components().any(|c| c == Component::ParentDir);
    if lexically_inside && std::fs::symlink_metadata(&joined).is_err() {
        Err(ApiError::NotFound(format!("{} does not exist", requested.display())))
    } else {
        Err(ApiError::Forbidden(
            "path is outside the input directory".to_string(),
        ))
    }
}

async fn scan_file(state: &AppState, path: PathBuf) -> ApiResult<ScanResult> {
    match Arc::clone(&state.scanner)
        .scan_path_with_timeout(path, state.scan_timeout)
        .await
    {
        Ok(result) => Ok(result),
        Err(e @ ReadError::Task(_)) => Err(ApiError::Internal(e.to_string())),
        Err(e) => Err(ApiError::Unprocessable(e.to_string())),
    }
}

/// Loosely shaped relay input; anything unexpected is dropped, not rejected.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct IngestRequest {
    pub source: Option<String>,
    pub filepath: Option<String>,
    pub emails: Option<Vec<Value>>,
    pub matches: Option<Vec<Value>>,
    pub creds: Vec<Value>,
}

impl IngestRequest {
    fn into_payload(self) -> Result<ForwardPayload, String> {
        let source = self
            .source
            .or(self.filepath)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "unknown".to_string());

        let emails = self
            .emails
            .or(self.matches)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();

        let creds = self
            .creds
            .iter()
            .filter_map(|c| {
                Some(CredentialRecord {
                    email: c.get("email")?.as_str()?.to_string(),
                    password: c.get("password")?.as_str()?.to_string(),
                })
            })
            .collect();

        ForwardPayload::sanitized(source.clone(), emails, creds).ok_or(source)
    }
}

async fn ingest(
    State(state): State<AppState>,
    body: Result<Json<IngestRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let payload = match request.into_payload() {
        Ok(payload) => payload,
        Err(source) => {
            info!(%source, "ingest carried no usable data");
            return Ok(Json(serde_json::json!({ "status": "no data", "source": source })));
        }
    };

    state
        .sink
        .send(&payload)
        .await
        .map_err(|e| ApiError::Upstream(format!("forward failed: {e}")))?;

    info!(
        source = %payload.source,
        emails = payload.email_count,
        creds = payload.cred_count,
        sink = state.sink.name(),
        "ingest relayed"
    );

    serde_json::to_value(&payload)
        .map(Json)
        .map_err(|e| ApiError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ingest_request(value: Value) -> IngestRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_emails_take_precedence_over_matches() {
        let payload = ingest_request(json!({
            "source": "a.txt",
            "emails": ["x@example.org"],
            "matches": ["y@example.org"]
        }))
        .into_payload()
        .unwrap();
        assert_eq!(payload.emails, vec!["x@example.org".to_string()]);
    }

    #[test]
    fn test_non_string_entries_are_dropped() {
        let payload = ingest_request(json!({
            "filepath": "/files/a.txt",
            "matches": [1, null, "ok@example.org"],
            "creds": [{"email": "ok@example.org"}, "junk", {"email": "ok@example.org", "password": "pw"}]
        }))
        .into_payload()
        .unwrap();

        assert_eq!(payload.source, "/files/a.txt");
        assert_eq!(payload.emails, vec!["ok@example.org".to_string()]);
        assert_eq!(payload.cred_count, 1);
    }

    #[test]
    fn test_empty_ingest_reports_source() {
        let result = ingest_request(json!({})).into_payload();
        assert_eq!(result, Err("unknown".to_string()));
    }

    #[test]
    fn test_confine_rejects_parent_escape() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(matches!(
            confine(dir.path(), Path::new("../../etc/passwd")),
            Err(ApiError::Forbidden(_))
        ));
        assert!(matches!(
            confine(dir.path(), Path::new("missing.txt")),
            Err(ApiError::NotFound(_))
        ));
    }
}
