use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskforgeError {
    /// Malformed caller input, rejected before any computation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The backend refused the operation. Never retried.
    #[error("rejected: {0}")]
    ValidationRejected(String),

    #[error("transient failure after {attempts} attempt(s): {message}")]
    TransientFailure { attempts: u32, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error("cancelled: {0}")]
    Cancelled(String),
}

impl TaskforgeError {
    pub fn kind(&self) -> &'static str {
        match self {
            TaskforgeError::InvalidArgument(_) => "invalid_argument",
            TaskforgeError::ValidationRejected(_) => "validation_rejected",
            TaskforgeError::TransientFailure { .. } => "transient_failure",
            TaskforgeError::NotFound(_) => "not_found",
            TaskforgeError::ConfigurationMissing(_) => "configuration_missing",
            TaskforgeError::Cancelled(_) => "cancelled",
        }
    }

    /// Process exit code used by the CLI. Zero is reserved for success.
    pub fn exit_code(&self) -> i32 {
        match self {
            TaskforgeError::InvalidArgument(_) => 2,
            TaskforgeError::ValidationRejected(_) => 3,
            TaskforgeError::TransientFailure { .. } => 4,
            TaskforgeError::NotFound(_) => 5,
            TaskforgeError::ConfigurationMissing(_) => 6,
            TaskforgeError::Cancelled(_) => 7,
        }
    }
}
