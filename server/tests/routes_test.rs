use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use leakscope_core::AppConfig;
use leakscope_scanner::{AlertSink, ForwardPayload, SinkError};
use leakscope_server::{build_app, AppState};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::ServiceExt;

#[derive(Default)]
struct RecordingSink {
    payloads: Mutex<Vec<ForwardPayload>>,
    reject: bool,
}

#[async_trait]
impl AlertSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, payload: &ForwardPayload) -> Result<(), SinkError> {
        if self.reject {
            return Err(SinkError::Rejected {
                status: 500,
                body: "down".to_string(),
            });
        }
        self.payloads.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

fn app(root: &Path, sink: Arc<RecordingSink>) -> Router {
    let mut config = AppConfig::default();
    config.input.input_dir = root.to_path_buf();
    config.scope.target_domain = "example.org".to_string();
    build_app(AppState::new(&config, sink))
}

async fn post(app: Router, uri: &str, body: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_health() {
    let dir = TempDir::new().unwrap();
    let response = app(dir.path(), Arc::default())
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn test_extract_inline_text() {
    let dir = TempDir::new().unwrap();
    let body = json!({
        "text": "leak dump: admin@example.org:Secret123 more text bob@other.com:xyz"
    });

    let (status, value) = post(app(dir.path(), Arc::default()), "/extract", &body.to_string()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        value,
        json!({
            "emails": ["admin@example.org"],
            "email_count": 1,
            "creds": [{"email": "admin@example.org", "password": "Secret123"}],
            "cred_count": 1
        })
    );
}

#[tokio::test]
async fn test_extract_file_under_root() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("dump.csv"), "ops@example.org,hunter2\n").unwrap();

    let (status, value) = post(
        app(dir.path(), Arc::default()),
        "/extract",
        &json!({ "filepath": "dump.csv" }).to_string(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["cred_count"], 1);
    // Extraction never moves the file
    assert!(dir.path().join("dump.csv").exists());
}

#[tokio::test]
async fn test_extract_rejects_paths_outside_root() {
    let root = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();
    let secret = outside.path().join("secret.txt");
    std::fs::write(&secret, "admin@example.org:Secret123").unwrap();

    let (status, value) = post(
        app(root.path(), Arc::default()),
        "/extract",
        &json!({ "filepath": secret }).to_string(),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(value["code"], "forbidden");

    let (status, _) = post(
        app(root.path(), Arc::default()),
        "/extract",
        &json!({ "filepath": "../../../../etc/passwd" }).to_string(),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_extract_missing_file() {
    let dir = TempDir::new().unwrap();
    let (status, _) = post(
        app(dir.path(), Arc::default()),
        "/extract",
        &json!({ "filepath": "nope.txt" }).to_string(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_extract_malformed_requests() {
    let dir = TempDir::new().unwrap();

    let (status, _) = post(app(dir.path(), Arc::default()), "/extract", "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, value) = post(app(dir.path(), Arc::default()), "/extract", "{}").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value["code"], "bad_request");
}

#[tokio::test]
async fn test_ingest_relays_sanitized_payload() {
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(RecordingSink::default());
    let body = json!({
        "source": "leak.txt",
        "matches": ["b@example.org", "a@example.org", "a@example.org", "junk"],
        "count": 2,
        "creds": [{"email": "a@example.org", "password": "pw"}, {"email": "", "password": "x"}]
    });

    let (status, value) = post(app(dir.path(), sink.clone()), "/ingest", &body.to_string()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["emails"], json!(["a@example.org", "b@example.org"]));
    assert_eq!(value["email_count"], 2);
    assert_eq!(value["cred_count"], 1);

    let forwarded = sink.payloads.lock().unwrap().clone();
    assert_eq!(forwarded.len(), 1);
    assert_eq!(forwarded[0].source, "leak.txt");
}

#[tokio::test]
async fn test_ingest_without_data() {
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(RecordingSink::default());

    let (status, value) = post(
        app(dir.path(), sink.clone()),
        "/ingest",
        &json!({ "filepath": "/files/x.txt", "emails": ["nope"] }).to_string(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(value, json!({ "status": "no data", "source": "/files/x.txt" }));
    assert!(sink.payloads.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_ingest_sink_failure_is_bad_gateway() {
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(RecordingSink {
        reject: true,
        ..RecordingSink::default()
    });

    let (status, value) = post(
        app(dir.path(), sink),
        "/ingest",
        &json!({ "emails": ["a@example.org"] }).to_string(),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(value["code"], "sink_unavailable");
}
