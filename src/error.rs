//! Error types for offload.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Failures reported by a dispatcher for its single outstanding call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    /// The workload raised an error (or panicked) while computing.
    #[error("Worker fault: {reason}")]
    WorkerFault { reason: String },

    /// The worker exited with a non-zero code before delivering a result.
    #[error("Worker stopped with exit code {code}")]
    AbnormalTermination { code: i32 },

    /// The worker went away without a result or an exit code.
    #[error("Worker disconnected before delivering a result")]
    Disconnected,

    #[error("Dispatcher already used; it accepts a single dispatch")]
    AlreadyDispatched,

    #[error("Failed to start worker thread: {0}")]
    Spawn(String),
}

impl DispatchError {
    /// Exit code carried by an abnormal termination, if any.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::AbnormalTermination { code } => Some(*code),
            _ => None,
        }
    }
}

/// Result type alias for offload.
pub type Result<T> = std::result::Result<T, Error>;
