use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockflow_infra::WorkflowError;

/// Failure categories visible to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    State,
    NotFound,
    InsufficientStock,
    ConcurrencyConflict,
    Infrastructure,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::State => "invalid_state",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InsufficientStock => "insufficient_stock",
            ErrorKind::ConcurrencyConflict => "conflict",
            ErrorKind::Infrastructure => "infrastructure_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{}: {message}", .kind.code())]
pub struct ServiceError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ServiceError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

pub fn workflow_error_to_service(err: WorkflowError) -> ServiceError {
    match err {
        WorkflowError::Validation(msg) => ServiceError::new(ErrorKind::Validation, msg),
        WorkflowError::State(msg) => ServiceError::new(ErrorKind::State, msg),
        WorkflowError::NotFound(msg) => ServiceError::new(ErrorKind::NotFound, msg),
        e @ WorkflowError::InsufficientStock { .. } => {
            ServiceError::new(ErrorKind::InsufficientStock, e.to_string())
        }
        WorkflowError::ConcurrencyConflict(msg) => {
            ServiceError::new(ErrorKind::ConcurrencyConflict, msg)
        }
        WorkflowError::InvariantViolation(msg) => {
            ServiceError::new(ErrorKind::Infrastructure, format!("invariant violated: {msg}"))
        }
        WorkflowError::Deserialize(msg) => ServiceError::new(ErrorKind::Infrastructure, msg),
        WorkflowError::Gateway(e) => ServiceError::new(ErrorKind::Infrastructure, e.to_string()),
    }
}

impl From<WorkflowError> for ServiceError {
    fn from(value: WorkflowError) -> Self {
        workflow_error_to_service(value)
    }
}
