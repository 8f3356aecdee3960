//! Framework-style RPC status codes and the error the services return.

use wirebench_engine::runner::RunError;
use wirebench_storage::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    InvalidArgument,
    /// Entity absent or access denied. Authorization failures never
    /// surface as a distinct code, to prevent id enumeration.
    NotFound,
    FailedPrecondition,
    Unimplemented,
    Unavailable,
    Internal,
    Canceled,
}

#[derive(Debug, thiserror::Error)]
#[error("{code:?}: {message}")]
pub struct RpcError {
    pub code: Code,
    pub message: String,
}

impl RpcError {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(Code::InvalidArgument, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(Code::NotFound, message)
    }

    pub fn failed_precondition(message: impl Into<String>) -> Self {
        Self::new(Code::FailedPrecondition, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Code::Internal, message)
    }

    pub fn canceled(message: impl Into<String>) -> Self {
        Self::new(Code::Canceled, message)
    }
}

impl From<StoreError> for RpcError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity } => Self::not_found(format!("{entity} not found")),
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<RunError> for RpcError {
    fn from(err: RunError) -> Self {
        match err {
            RunError::Canceled => Self::canceled("flow run canceled"),
            RunError::Graph(graph) => Self::failed_precondition(graph.to_string()),
            other => Self::internal(other.to_string()),
        }
    }
}
