use thiserror::Error;

/// A batch could not be delivered to the alert sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("sink rejected batch with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// The persisted dedup state could not be written.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to write state file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Failures that end a pass early.
///
/// Anything scoped to one input is recorded in the pass report instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("cannot list input directory {path}: {source}")]
    Discovery {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    State(#[from] StateError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
