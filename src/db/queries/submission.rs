use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool};
use tracing::warn;
use uuid::Uuid;

use crate::db::models::submission::{
    ParseEnumError, ReviewerStamp, Role, Submission, SubmissionKind, SubmissionPayload,
    SubmissionState, WorkflowAction,
};
use crate::db::store::{DocumentWrite, StateWrite, StoreError, SubmissionStore, WriteOutcome};

/// Columns shared by `noc_requests`, `internship_applications`,
/// `weekly_reports` and `certificates`.
#[derive(Debug, FromRow)]
struct SubmissionRow {
    id: Uuid,
    student_id: Uuid,
    requester_name: String,
    status: String,
    payload: serde_json::Value,
    rejection_reason: Option<String>,
    document_ref: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SubmissionRow {
    /// Maps the loosely-typed row into the closed domain types.
    fn into_submission(
        self,
        kind: SubmissionKind,
        reviewer_stamps: Vec<ReviewerStamp>,
    ) -> Result<Submission, StoreError> {
        let id = self.id;
        let corrupt = |detail: String| StoreError::Corrupt { id, detail };

        let state = self
            .status
            .parse::<SubmissionState>()
            .map_err(|e| corrupt(e.to_string()))?;
        let payload: SubmissionPayload =
            serde_json::from_value(self.payload).map_err(|e| corrupt(format!("payload: {e}")))?;
        if payload.kind() != kind {
            return Err(corrupt(format!(
                "payload kind {} stored in {}",
                payload.kind(),
                kind.table()
            )));
        }

        Ok(Submission {
            id,
            kind,
            requester_id: self.student_id,
            requester_name: self.requester_name,
            payload,
            state,
            rejection_reason: self.rejection_reason,
            document_ref: self.document_ref,
            created_at: self.created_at,
            updated_at: self.updated_at,
            reviewer_stamps,
        })
    }
}

#[derive(Debug, FromRow)]
struct StampRow {
    submission_id: Uuid,
    actor_id: Uuid,
    actor_role: String,
    action: String,
    from_state: String,
    to_state: String,
    acted_at: DateTime<Utc>,
}

impl StampRow {
    fn into_stamp(self) -> Result<ReviewerStamp, StoreError> {
        let id = self.submission_id;
        let corrupt = |e: ParseEnumError| StoreError::Corrupt {
            id,
            detail: format!("reviewer stamp: {e}"),
        };
        Ok(ReviewerStamp {
            actor_id: self.actor_id,
            role: self.actor_role.parse::<Role>().map_err(corrupt)?,
            action: self.action.parse::<WorkflowAction>().map_err(corrupt)?,
            from_state: self.from_state.parse::<SubmissionState>().map_err(corrupt)?,
            to_state: self.to_state.parse::<SubmissionState>().map_err(corrupt)?,
            at: self.acted_at,
        })
    }
}

fn select_sql(kind: SubmissionKind) -> String {
    format!(
        r#"
        SELECT s.id, s.student_id, COALESCE(p.full_name, '') AS requester_name, s.status,
               s.payload, s.rejection_reason, s.document_ref, s.created_at, s.updated_at
        FROM {} s
        LEFT JOIN profiles p ON p.id = s.student_id
        "#,
        kind.table()
    )
}

async fn load_stamps(
    conn: &mut PgConnection,
    kind: SubmissionKind,
    ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<ReviewerStamp>>, StoreError> {
    let rows = sqlx::query_as::<_, StampRow>(
        r#"
        SELECT submission_id, actor_id, actor_role, action, from_state, to_state, acted_at
        FROM reviewer_stamps
        WHERE submission_kind = $1 AND submission_id = ANY($2)
        ORDER BY acted_at, id
        "#,
    )
    .bind(kind.as_str())
    .bind(ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut grouped: HashMap<Uuid, Vec<ReviewerStamp>> = HashMap::new();
    for row in rows {
        grouped.entry(row.submission_id).or_default().push(row.into_stamp()?);
    }
    Ok(grouped)
}

async fn fetch_in(
    conn: &mut PgConnection,
    kind: SubmissionKind,
    id: Uuid,
) -> Result<Option<Submission>, StoreError> {
    let row = sqlx::query_as::<_, SubmissionRow>(&format!("{} WHERE s.id = $1", select_sql(kind)))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let mut stamps = load_stamps(conn, kind, &[id]).await?;
    row.into_submission(kind, stamps.remove(&id).unwrap_or_default())
        .map(Some)
}

async fn exists_in(conn: &mut PgConnection, kind: SubmissionKind, id: Uuid) -> Result<bool, StoreError> {
    let exists: bool = sqlx::query_scalar(&format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)",
        kind.table()
    ))
    .bind(id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(exists)
}

fn unique_as_duplicate(e: sqlx::Error) -> StoreError {
    match e.as_database_error() {
        Some(db) if db.is_unique_violation() => StoreError::Duplicate(db.message().to_string()),
        _ => StoreError::Database(e),
    }
}

/// Rows that fail to map are logged and left out, so one bad row cannot take
/// down a whole listing.
fn readable_rows(
    kind: SubmissionKind,
    rows: Vec<SubmissionRow>,
    mut stamps: HashMap<Uuid, Vec<ReviewerStamp>>,
) -> Vec<Submission> {
    rows.into_iter()
        .filter_map(|row| {
            let trail = stamps.remove(&row.id).unwrap_or_default();
            match row.into_submission(kind, trail) {
                Ok(submission) => Some(submission),
                Err(e) => {
                    warn!(kind = %kind, "skipping unreadable row: {}", e);
                    None
                }
            }
        })
        .collect()
}

/// Postgres-backed store. State writes are `UPDATE ... WHERE id = $id AND
/// status = ANY($expected)`; zero rows means someone else got there first.
#[derive(Clone)]
pub struct PgSubmissionStore {
    pool: PgPool,
}

impl PgSubmissionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn miss(&self, kind: SubmissionKind, id: Uuid) -> Result<WriteOutcome, StoreError> {
        let mut conn = self.pool.acquire().await?;
        if exists_in(&mut conn, kind, id).await? {
            Ok(WriteOutcome::StateMismatch)
        } else {
            Ok(WriteOutcome::Missing)
        }
    }
}

#[async_trait]
impl SubmissionStore for PgSubmissionStore {
    async fn insert(&self, submission: &Submission) -> Result<(), StoreError> {
        let payload = serde_json::to_value(&submission.payload).map_err(|e| StoreError::Corrupt {
            id: submission.id,
            detail: format!("payload: {e}"),
        })?;

        sqlx::query(&format!(
            r#"
            INSERT INTO {} (id, student_id, status, payload, rejection_reason, document_ref, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
            submission.kind.table()
        ))
        .bind(submission.id)
        .bind(submission.requester_id)
        .bind(submission.state.as_str())
        .bind(payload)
        .bind(&submission.rejection_reason)
        .bind(&submission.document_ref)
        .bind(submission.created_at)
        .bind(submission.updated_at)
        .execute(&self.pool)
        .await
        .map_err(unique_as_duplicate)?;
        Ok(())
    }

    async fn fetch(&self, kind: SubmissionKind, id: Uuid) -> Result<Option<Submission>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        fetch_in(&mut conn, kind, id).await
    }

    async fn list(
        &self,
        kinds: &[SubmissionKind],
        requester: Option<Uuid>,
    ) -> Result<Vec<Submission>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let mut submissions = Vec::new();

        for &kind in kinds {
            let rows = sqlx::query_as::<_, SubmissionRow>(&format!(
                "{} WHERE ($1::uuid IS NULL OR s.student_id = $1) ORDER BY s.created_at DESC",
                select_sql(kind)
            ))
            .bind(requester)
            .fetch_all(&mut *conn)
            .await?;

            let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
            let stamps = load_stamps(&mut conn, kind, &ids).await?;
            submissions.extend(readable_rows(kind, rows, stamps));
        }
        Ok(submissions)
    }

    async fn apply(&self, write: &StateWrite) -> Result<WriteOutcome, StoreError> {
        let payload = write
            .payload
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| StoreError::Corrupt { id: write.id, detail: format!("payload: {e}") })?;

        let mut tx = self.pool.begin().await?;
        let updated_at: Option<DateTime<Utc>> = sqlx::query_scalar(&format!(
            r#"
            UPDATE {}
            SET status = $1,
                rejection_reason = $2,
                payload = COALESCE($3, payload),
                updated_at = GREATEST($4, updated_at + INTERVAL '1 microsecond')
            WHERE id = $5 AND status = ANY($6)
            RETURNING updated_at
            "#,
            write.kind.table()
        ))
        .bind(write.next.as_str())
        .bind(&write.rejection_reason)
        .bind(payload)
        .bind(write.updated_at)
        .bind(write.id)
        .bind(write.expected.stored_names())
        .fetch_optional(&mut *tx)
        .await
        .map_err(unique_as_duplicate)?;

        let Some(updated_at) = updated_at else {
            tx.rollback().await?;
            return self.miss(write.kind, write.id).await;
        };

        sqlx::query(
            r#"
            INSERT INTO reviewer_stamps
                (submission_kind, submission_id, actor_id, actor_role, action, from_state, to_state, acted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(write.kind.as_str())
        .bind(write.id)
        .bind(write.stamp.actor_id)
        .bind(write.stamp.role.as_str())
        .bind(write.stamp.action.as_str())
        .bind(write.stamp.from_state.as_str())
        .bind(write.stamp.to_state.as_str())
        .bind(updated_at)
        .execute(&mut *tx)
        .await?;

        let updated = fetch_in(&mut *tx, write.kind, write.id).await?;
        tx.commit().await?;
        Ok(updated.map_or(WriteOutcome::Missing, WriteOutcome::Applied))
    }

    async fn set_document(&self, write: &DocumentWrite) -> Result<WriteOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;
        let touched = sqlx::query(&format!(
            r#"
            UPDATE {}
            SET document_ref = $1,
                updated_at = GREATEST($2, updated_at + INTERVAL '1 microsecond')
            WHERE id = $3 AND status = ANY($4)
            "#,
            write.kind.table()
        ))
        .bind(&write.reference)
        .bind(write.updated_at)
        .bind(write.id)
        .bind(write.expected.stored_names())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if touched == 0 {
            tx.rollback().await?;
            return self.miss(write.kind, write.id).await;
        }

        let updated = fetch_in(&mut *tx, write.kind, write.id).await?;
        tx.commit().await?;
        Ok(updated.map_or(WriteOutcome::Missing, WriteOutcome::Applied))
    }

    async fn delete(&self, kind: SubmissionKind, id: Uuid) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM reviewer_stamps WHERE submission_kind = $1 AND submission_id = $2")
            .bind(kind.as_str())
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let removed = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", kind.table()))
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(removed > 0)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").fetch_optional(&self.pool).await?;
        Ok(())
    }
}
