// src/db/memory.rs
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::db::models::submission::{Submission, SubmissionKind};
use crate::db::store::{DocumentWrite, StateWrite, StoreError, SubmissionStore, WriteOutcome};
use crate::workflow::transition::advance;

/// Process-local store. Compare-and-set happens under one lock, so it gives
/// the same stale-write guarantees as the Postgres predicate.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<HashMap<(SubmissionKind, Uuid), Submission>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn insert(&self, submission: &Submission) -> Result<(), StoreError> {
        self.rows
            .lock()
            .await
            .insert((submission.kind, submission.id), submission.clone());
        Ok(())
    }

    async fn fetch(&self, kind: SubmissionKind, id: Uuid) -> Result<Option<Submission>, StoreError> {
        Ok(self.rows.lock().await.get(&(kind, id)).cloned())
    }

    async fn list(
        &self,
        kinds: &[SubmissionKind],
        requester: Option<Uuid>,
    ) -> Result<Vec<Submission>, StoreError> {
        let rows = self.rows.lock().await;
        Ok(rows
            .values()
            .filter(|s| kinds.contains(&s.kind))
            .filter(|s| requester.map_or(true, |id| s.requester_id == id))
            .cloned()
            .collect())
    }

    async fn apply(&self, write: &StateWrite) -> Result<WriteOutcome, StoreError> {
        let mut rows = self.rows.lock().await;
        let Some(row) = rows.get_mut(&(write.kind, write.id)) else {
            return Ok(WriteOutcome::Missing);
        };
        if row.state != write.expected {
            return Ok(WriteOutcome::StateMismatch);
        }

        row.state = write.next;
        row.rejection_reason = write.rejection_reason.clone();
        if let Some(payload) = &write.payload {
            row.payload = payload.clone();
        }
        row.updated_at = advance(row.updated_at, write.updated_at);

        let mut stamp = write.stamp.clone();
        stamp.at = row.updated_at;
        row.reviewer_stamps.push(stamp);

        Ok(WriteOutcome::Applied(row.clone()))
    }

    async fn set_document(&self, write: &DocumentWrite) -> Result<WriteOutcome, StoreError> {
        let mut rows = self.rows.lock().await;
        let Some(row) = rows.get_mut(&(write.kind, write.id)) else {
            return Ok(WriteOutcome::Missing);
        };
        if row.state != write.expected {
            return Ok(WriteOutcome::StateMismatch);
        }
        row.document_ref = Some(write.reference.clone());
        row.updated_at = advance(row.updated_at, write.updated_at);
        Ok(WriteOutcome::Applied(row.clone()))
    }

    async fn delete(&self, kind: SubmissionKind, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.rows.lock().await.remove(&(kind, id)).is_some())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
