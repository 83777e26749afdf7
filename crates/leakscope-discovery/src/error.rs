use crate::reader::ContainerKind;
use std::time::Duration;
use thiserror::Error;

/// Failures while turning an input into bytes.
///
/// These never abort a pass; the orchestrator logs them and retains the
/// input.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{kind} archive {path} could not be opened: {message}")]
    Archive {
        kind: ContainerKind,
        path: String,
        message: String,
    },

    #[error("{path} is {size} bytes, over the {limit} byte read limit")]
    TooLarge { path: String, size: u64, limit: u64 },

    #[error("scan of {path} stopped after {chunks} chunks")]
    Interrupted { path: String, chunks: usize },

    #[error("scan of {path} timed out after {after:?}")]
    TimedOut { path: String, after: Duration },

    #[error("scan task failed: {0}")]
    Task(String),
}

impl ReadError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn archive(
        kind: ContainerKind,
        path: &std::path::Path,
        message: impl std::fmt::Display,
    ) -> Self {
        Self::Archive {
            kind,
            path: path.display().to_string(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReadError>;
