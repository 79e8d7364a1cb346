// src/db/store.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::models::submission::{
    ReviewerStamp, Submission, SubmissionKind, SubmissionPayload, SubmissionState,
};

/// Failures reported by a persistence backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Duplicate row: {0}")]
    Duplicate(String),

    #[error("Stored row {id} is unreadable: {detail}")]
    Corrupt { id: Uuid, detail: String },
}

/// A single guarded state change. Applied only if the stored state still
/// equals `expected`.
#[derive(Debug, Clone)]
pub struct StateWrite {
    pub kind: SubmissionKind,
    pub id: Uuid,
    pub expected: SubmissionState,
    pub next: SubmissionState,
    pub rejection_reason: Option<String>,
    /// Replacement payload (resubmission only).
    pub payload: Option<SubmissionPayload>,
    pub updated_at: DateTime<Utc>,
    pub stamp: ReviewerStamp,
}

/// Document attachment, guarded the same way as a state change.
#[derive(Debug, Clone)]
pub struct DocumentWrite {
    pub kind: SubmissionKind,
    pub id: Uuid,
    pub expected: SubmissionState,
    pub reference: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub enum WriteOutcome {
    Applied(Submission),
    /// Row exists but its state no longer matches the expected one.
    StateMismatch,
    Missing,
}

/// Persistence seam for submissions. Every mutating call is conditional on
/// the expected previous state.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    async fn insert(&self, submission: &Submission) -> Result<(), StoreError>;

    async fn fetch(&self, kind: SubmissionKind, id: Uuid) -> Result<Option<Submission>, StoreError>;

    /// Rows of the given kinds, optionally restricted to one requester.
    async fn list(
        &self,
        kinds: &[SubmissionKind],
        requester: Option<Uuid>,
    ) -> Result<Vec<Submission>, StoreError>;

    async fn apply(&self, write: &StateWrite) -> Result<WriteOutcome, StoreError>;

    async fn set_document(&self, write: &DocumentWrite) -> Result<WriteOutcome, StoreError>;

    async fn delete(&self, kind: SubmissionKind, id: Uuid) -> Result<bool, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
