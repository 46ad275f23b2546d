use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use taskforge_core::TaskforgeError;
use thiserror::Error;

/// Failure of a single backend call, before any retry decision.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("backend unavailable ({status}): {message}")]
    Unavailable { status: u16, message: String },

    #[error("rate limited")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("undecodable response: {0}")]
    Decode(String),
}

impl BackendError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BackendError::Connection(_)
                | BackendError::Timeout(_)
                | BackendError::Unavailable { .. }
                | BackendError::RateLimited { .. }
        )
    }

    /// Server-provided minimum wait, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            BackendError::RateLimited {
                retry_after_secs: Some(secs),
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

impl From<BackendError> for TaskforgeError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NotFound(msg) => TaskforgeError::NotFound(msg),
            BackendError::Rejected { message, .. } => TaskforgeError::ValidationRejected(message),
            BackendError::Decode(msg) => {
                TaskforgeError::ValidationRejected(format!("undecodable backend response: {msg}"))
            }
            transient => TaskforgeError::TransientFailure {
                attempts: 1,
                message: transient.to_string(),
            },
        }
    }
}

/// A task as the external backend reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub column_id: String,
    #[serde(default)]
    pub owner: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRemoteTask {
    pub title: String,
    pub description: String,
    pub column_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteComment {
    pub id: String,
    pub task_id: String,
    pub body: String,
}

/// Contract consumed from the external task backend.
///
/// `HttpBackend` talks to a real server over HTTP.
/// `MemoryBackend` keeps everything in process for tests and dry runs.
#[async_trait]
pub trait TaskBackend: Send + Sync {
    /// Create a task. Repeating a call with the same idempotency key must
    /// return the task created by the first call.
    async fn create_task(
        &self,
        project_id: &str,
        task: &NewRemoteTask,
        idempotency_key: &str,
    ) -> Result<RemoteTask, BackendError>;

    async fn get_task(&self, id: &str) -> Result<RemoteTask, BackendError>;

    async fn update_owner(&self, id: &str, owner: &str) -> Result<RemoteTask, BackendError>;

    async fn move_column(&self, id: &str, column_id: &str) -> Result<RemoteTask, BackendError>;

    async fn add_comment(&self, id: &str, body: &str) -> Result<RemoteComment, BackendError>;

    async fn list_tasks(&self, project_id: &str) -> Result<Vec<RemoteTask>, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(BackendError::Connection("refused".into()).is_transient());
        assert!(BackendError::Timeout(Duration::from_secs(30)).is_transient());
        assert!(BackendError::Unavailable {
            status: 503,
            message: String::new()
        }
        .is_transient());
        assert!(BackendError::RateLimited {
            retry_after_secs: None
        }
        .is_transient());
        assert!(!BackendError::NotFound("t-1".into()).is_transient());
        assert!(!BackendError::Rejected {
            status: 422,
            message: "bad column".into()
        }
        .is_transient());
        assert!(!BackendError::Decode("eof".into()).is_transient());
    }

    #[test]
    fn test_rejection_message_is_verbatim() {
        let err: TaskforgeError = BackendError::Rejected {
            status: 422,
            message: "unknown project 'p-9'".into(),
        }
        .into();
        assert_eq!(
            err,
            TaskforgeError::ValidationRejected("unknown project 'p-9'".into())
        );
    }

    #[test]
    fn test_retry_after_only_for_rate_limits() {
        let limited = BackendError::RateLimited {
            retry_after_secs: Some(7),
        };
        assert_eq!(limited.retry_after(), Some(Duration::from_secs(7)));
        assert_eq!(BackendError::Connection("x".into()).retry_after(), None);
    }
}
