use axum::http::StatusCode;

use crate::db::models::submission::{
    Role, Submission, SubmissionKind, SubmissionState, WorkflowAction,
};
use crate::db::store::StoreError;

pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Everything a workflow operation can refuse with.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("A {role} cannot {action} a {kind} submission that is {from}")]
    InvalidTransition {
        kind: SubmissionKind,
        from: SubmissionState,
        role: Role,
        action: WorkflowAction,
    },

    #[error("A reason is required when rejecting")]
    MissingReason,

    /// The stored row moved on; carries what is stored now so the caller can
    /// re-present it instead of repeating the write.
    #[error("Submission {} was modified concurrently and is now {}", .current.id, .current.state)]
    StaleVersion { current: Box<Submission> },

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Storage unavailable: {0}")]
    CollaboratorUnavailable(#[from] StoreError),
}

impl WorkflowError {
    pub fn not_found(kind: SubmissionKind, id: uuid::Uuid) -> Self {
        WorkflowError::NotFound(format!("{kind} submission {id}"))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            WorkflowError::Validation(_) | WorkflowError::MissingReason => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            WorkflowError::InvalidTransition { .. }
            | WorkflowError::StaleVersion { .. }
            | WorkflowError::Conflict(_) => StatusCode::CONFLICT,
            WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
            WorkflowError::Forbidden(_) => StatusCode::FORBIDDEN,
            WorkflowError::CollaboratorUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Stable machine-readable code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            WorkflowError::Validation(_) => "validation_error",
            WorkflowError::InvalidTransition { .. } => "invalid_transition",
            WorkflowError::MissingReason => "missing_reason",
            WorkflowError::StaleVersion { .. } => "stale_version",
            WorkflowError::NotFound(_) => "not_found",
            WorkflowError::Conflict(_) => "conflict",
            WorkflowError::Forbidden(_) => "forbidden",
            WorkflowError::CollaboratorUnavailable(_) => "collaborator_unavailable",
        }
    }
}
