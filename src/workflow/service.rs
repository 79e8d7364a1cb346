//! Workflow operations over a [`SubmissionStore`].

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::models::submission::{
    DocumentLink, ReviewRequest, ReviewerStamp, Role, Submission, SubmissionKind,
    SubmissionPayload, SubmissionState, WorkflowAction,
};
use crate::db::store::{DocumentWrite, StateWrite, StoreError, SubmissionStore, WriteOutcome};
use crate::workflow::error::{WorkflowError, WorkflowResult};
use crate::workflow::filter::{Scope, SubmissionFilter};
use crate::workflow::principal::Principal;
use crate::workflow::transition::{self, next_timestamp};

/// Where uploaded documents are served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentLinks {
    pub public_url: String,
    pub bucket: String,
}

impl DocumentLinks {
    pub fn resolve(&self, reference: &str) -> String {
        format!(
            "{}/{}/{}",
            self.public_url.trim_end_matches('/'),
            self.bucket.trim_matches('/'),
            reference.trim_start_matches('/')
        )
    }
}

/// Object-storage references must stay inside the bucket.
pub fn validate_reference(reference: &str) -> WorkflowResult<String> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(WorkflowError::Validation("document reference is required".into()));
    }
    if reference.starts_with('/')
        || reference.contains('\\')
        || reference.split('/').any(|part| part == ".." || part.is_empty())
    {
        return Err(WorkflowError::Validation(format!(
            "document reference '{reference}' must be a relative path inside the bucket"
        )));
    }
    Ok(reference.to_string())
}

pub struct WorkflowService {
    store: Arc<dyn SubmissionStore>,
    documents: DocumentLinks,
}

impl WorkflowService {
    pub fn new(store: Arc<dyn SubmissionStore>, documents: DocumentLinks) -> Self {
        Self { store, documents }
    }

    /// Creates a submission in its kind's initial state.
    pub async fn submit(
        &self,
        principal: &Principal,
        kind: SubmissionKind,
        payload: SubmissionPayload,
        document_ref: Option<String>,
    ) -> WorkflowResult<Submission> {
        if principal.role != Role::Student {
            return Err(WorkflowError::Forbidden(
                "Only students can create submissions".into(),
            ));
        }
        check_payload(kind, &payload)?;
        let document_ref = document_ref.as_deref().map(validate_reference).transpose()?;

        if let Some(week) = payload.week_number() {
            self.reject_duplicate_week(principal.id, week, None).await?;
        }

        let now = Utc::now();
        let submission = Submission {
            id: Uuid::new_v4(),
            kind,
            requester_id: principal.id,
            requester_name: principal.name.clone(),
            payload,
            state: transition::initial_state(kind),
            rejection_reason: None,
            document_ref,
            created_at: now,
            updated_at: now,
            reviewer_stamps: Vec::new(),
        };
        self.store.insert(&submission).await.map_err(|e| match e {
            StoreError::Duplicate(detail) => WorkflowError::Conflict(detail),
            other => other.into(),
        })?;

        info!(
            submission_id = %submission.id,
            kind = %kind,
            requester = %principal.id,
            state = %submission.state,
            "submission created"
        );
        Ok(submission)
    }

    /// `own` is the report being resubmitted, which may keep its week.
    async fn reject_duplicate_week(
        &self,
        requester: Uuid,
        week: i32,
        own: Option<Uuid>,
    ) -> WorkflowResult<()> {
        let existing = self
            .store
            .list(&[SubmissionKind::WeeklyReport], Some(requester))
            .await?;
        match existing
            .iter()
            .filter(|s| Some(s.id) != own)
            .find(|s| s.payload.week_number() == Some(week))
        {
            None => Ok(()),
            Some(found) if found.state == SubmissionState::NeedsRevision => {
                Err(WorkflowError::Conflict(format!(
                    "The report for week {week} needs revision; resubmit {} instead",
                    found.id
                )))
            }
            Some(_) => Err(WorkflowError::Conflict(format!(
                "A weekly report for week {week} already exists"
            ))),
        }
    }

    /// Fetches a submission the principal is allowed to see. Anything outside
    /// the caller's scope reads as not found.
    pub async fn get(
        &self,
        principal: &Principal,
        kind: SubmissionKind,
        id: Uuid,
    ) -> WorkflowResult<Submission> {
        let submission = self.fetch_existing(kind, id).await?;
        if !Scope::for_principal(principal).allows(&submission) {
            return Err(WorkflowError::not_found(kind, id));
        }
        Ok(submission)
    }

    pub async fn list(
        &self,
        principal: &Principal,
        filter: &SubmissionFilter,
    ) -> WorkflowResult<Vec<Submission>> {
        let scope = Scope::for_principal(principal);
        let kinds: Vec<SubmissionKind> = scope
            .kinds()
            .into_iter()
            .filter(|k| filter.kind.map_or(true, |wanted| wanted == *k))
            .collect();
        if kinds.is_empty() {
            return Ok(Vec::new());
        }
        let candidates = self.store.list(&kinds, scope.requester()).await?;
        Ok(filter.apply(&scope, candidates))
    }

    /// Moves a submission along exactly one edge of its kind's table.
    pub async fn transition(
        &self,
        principal: &Principal,
        kind: SubmissionKind,
        id: Uuid,
        request: &ReviewRequest,
    ) -> WorkflowResult<Submission> {
        let current = self.get(principal, kind, id).await?;
        if let Some(expected) = request.expected_state {
            if expected != current.state {
                return Err(self.stale(current));
            }
        }

        let plan = transition::plan(
            kind,
            current.state,
            principal.role,
            request.decision,
            request.reason.as_deref(),
        )?;

        let updated_at = next_timestamp(current.updated_at);
        let write = StateWrite {
            kind,
            id,
            expected: plan.from,
            next: plan.to,
            rejection_reason: plan.rejection_reason,
            payload: None,
            updated_at,
            stamp: ReviewerStamp {
                actor_id: principal.id,
                role: principal.role,
                action: WorkflowAction::from(request.decision),
                from_state: plan.from,
                to_state: plan.to,
                at: updated_at,
            },
        };
        let updated = self.write(&write).await?;

        info!(
            submission_id = %id,
            kind = %kind,
            reviewer = %principal.id,
            role = %principal.role,
            from = %plan.from,
            to = %plan.to,
            "submission transitioned"
        );
        Ok(updated)
    }

    /// The owner sends a submission back for review with a corrected payload.
    pub async fn resubmit(
        &self,
        principal: &Principal,
        kind: SubmissionKind,
        id: Uuid,
        payload: SubmissionPayload,
        expected_state: Option<SubmissionState>,
    ) -> WorkflowResult<Submission> {
        let current = self.get(principal, kind, id).await?;
        if current.requester_id != principal.id {
            return Err(WorkflowError::Forbidden(
                "Only the requester can resubmit".into(),
            ));
        }
        if let Some(expected) = expected_state {
            if expected != current.state {
                return Err(self.stale(current));
            }
        }
        let to = transition::resubmit_target(kind, current.state).ok_or(
            WorkflowError::InvalidTransition {
                kind,
                from: current.state,
                role: principal.role,
                action: WorkflowAction::Resubmit,
            },
        )?;
        check_payload(kind, &payload)?;
        if let Some(week) = payload.week_number() {
            if current.payload.week_number() != Some(week) {
                self.reject_duplicate_week(principal.id, week, Some(id)).await?;
            }
        }

        let updated_at = next_timestamp(current.updated_at);
        let write = StateWrite {
            kind,
            id,
            expected: current.state,
            next: to,
            rejection_reason: None,
            payload: Some(payload),
            updated_at,
            stamp: ReviewerStamp {
                actor_id: principal.id,
                role: principal.role,
                action: WorkflowAction::Resubmit,
                from_state: current.state,
                to_state: to,
                at: updated_at,
            },
        };
        let updated = self.write(&write).await?;

        info!(submission_id = %id, kind = %kind, from = %current.state, to = %to, "submission resubmitted");
        Ok(updated)
    }

    pub async fn attach_document(
        &self,
        principal: &Principal,
        kind: SubmissionKind,
        id: Uuid,
        reference: &str,
    ) -> WorkflowResult<Submission> {
        let current = self.get(principal, kind, id).await?;
        if current.requester_id != principal.id {
            return Err(WorkflowError::Forbidden(
                "Only the requester can attach documents".into(),
            ));
        }
        if current.state.is_terminal() {
            return Err(WorkflowError::Conflict(format!(
                "Submission {id} is {} and can no longer change",
                current.state
            )));
        }
        let reference = validate_reference(reference)?;

        let write = DocumentWrite {
            kind,
            id,
            expected: current.state,
            reference,
            updated_at: next_timestamp(current.updated_at),
        };
        match self.store.set_document(&write).await? {
            WriteOutcome::Applied(updated) => {
                info!(submission_id = %id, kind = %kind, "document attached");
                Ok(updated)
            }
            WriteOutcome::StateMismatch => Err(self.stale_after_write(kind, id).await),
            WriteOutcome::Missing => Err(WorkflowError::not_found(kind, id)),
        }
    }

    pub async fn document_url(
        &self,
        principal: &Principal,
        kind: SubmissionKind,
        id: Uuid,
    ) -> WorkflowResult<DocumentLink> {
        let submission = self.get(principal, kind, id).await?;
        let reference = submission
            .document_ref
            .ok_or_else(|| WorkflowError::NotFound(format!("Document for submission {id}")))?;
        Ok(DocumentLink {
            url: self.documents.resolve(&reference),
            reference,
        })
    }

    /// Administrative removal; the only way a row leaves the workflow.
    pub async fn delete(
        &self,
        principal: &Principal,
        kind: SubmissionKind,
        id: Uuid,
    ) -> WorkflowResult<()> {
        if principal.role != Role::SuperAdmin {
            return Err(WorkflowError::Forbidden(
                "Only super admins can delete submissions".into(),
            ));
        }
        if !self.store.delete(kind, id).await? {
            return Err(WorkflowError::not_found(kind, id));
        }
        warn!(submission_id = %id, kind = %kind, admin = %principal.id, "submission deleted by admin");
        Ok(())
    }

    pub async fn ping(&self) -> WorkflowResult<()> {
        Ok(self.store.ping().await?)
    }

    async fn fetch_existing(&self, kind: SubmissionKind, id: Uuid) -> WorkflowResult<Submission> {
        self.store
            .fetch(kind, id)
            .await?
            .ok_or_else(|| WorkflowError::not_found(kind, id))
    }

    async fn write(&self, write: &StateWrite) -> WorkflowResult<Submission> {
        let outcome = self.store.apply(write).await.map_err(|e| match e {
            StoreError::Duplicate(detail) => WorkflowError::Conflict(detail),
            other => other.into(),
        })?;
        match outcome {
            WriteOutcome::Applied(updated) => Ok(updated),
            WriteOutcome::StateMismatch => Err(self.stale_after_write(write.kind, write.id).await),
            WriteOutcome::Missing => Err(WorkflowError::not_found(write.kind, write.id)),
        }
    }

    async fn stale_after_write(&self, kind: SubmissionKind, id: Uuid) -> WorkflowError {
        match self.fetch_existing(kind, id).await {
            Ok(current) => self.stale(current),
            Err(err) => err,
        }
    }

    fn stale(&self, current: Submission) -> WorkflowError {
        warn!(
            submission_id = %current.id,
            kind = %current.kind,
            state = %current.state,
            "rejected stale write"
        );
        WorkflowError::StaleVersion { current: Box::new(current) }
    }
}

fn check_payload(kind: SubmissionKind, payload: &SubmissionPayload) -> WorkflowResult<()> {
    if payload.kind() != kind {
        return Err(WorkflowError::Validation(format!(
            "payload is a {} but the submission is a {kind}",
            payload.kind()
        )));
    }
    payload.validate().map_err(WorkflowError::Validation)
}

#[cfg(test)]
pub(crate) mod tests {
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::db::models::submission::{
        ApplicationDetails, Decision, NocDetails, WeeklyReportDetails,
    };
    use crate::workflow::filter::StatusFilter;

    pub(crate) fn links() -> DocumentLinks {
        DocumentLinks {
            public_url: "https://storage.example.edu/object/public".into(),
            bucket: "documents".into(),
        }
    }

    pub(crate) fn service() -> WorkflowService {
        WorkflowService::new(Arc::new(MemoryStore::new()), links())
    }

    pub(crate) fn student(name: &str) -> Principal {
        Principal::new(Uuid::new_v4(), name, Role::Student)
    }

    pub(crate) fn teacher() -> Principal {
        Principal::new(Uuid::new_v4(), "Dr. Mehta", Role::Teacher)
    }

    pub(crate) fn tpo() -> Principal {
        Principal::new(Uuid::new_v4(), "Placement Cell", Role::Tpo)
    }

    pub(crate) fn noc(company: &str) -> SubmissionPayload {
        SubmissionPayload::Noc(NocDetails {
            company_name: company.into(),
            role: "Software Intern".into(),
            start_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 8, 1).unwrap(),
            stipend: Some(15000),
            description: None,
        })
    }

    fn weekly(week: i32) -> SubmissionPayload {
        SubmissionPayload::WeeklyReport(WeeklyReportDetails {
            company_name: "Infosys".into(),
            week_number: week,
            hours_worked: 38,
            summary: "Wrote integration tests".into(),
        })
    }

    pub(crate) fn approve() -> ReviewRequest {
        ReviewRequest { decision: Decision::Approve, reason: None, expected_state: None }
    }

    pub(crate) fn reject(reason: &str) -> ReviewRequest {
        ReviewRequest {
            decision: Decision::Reject,
            reason: Some(reason.into()),
            expected_state: None,
        }
    }

    #[tokio::test]
    async fn noc_happy_path() {
        let svc = service();
        let rahul = student("Rahul Sharma");
        let created = svc.submit(&rahul, SubmissionKind::Noc, noc("TCS"), None).await.unwrap();
        assert_eq!(created.state, SubmissionState::PendingTeacher);
        assert_eq!(created.rejection_reason, None);

        let after_teacher = svc
            .transition(&teacher(), SubmissionKind::Noc, created.id, &approve())
            .await
            .unwrap();
        assert_eq!(after_teacher.state, SubmissionState::PendingTpo);
        assert_eq!(after_teacher.rejection_reason, None);
        assert!(after_teacher.updated_at > created.updated_at);

        let after_tpo = svc
            .transition(&tpo(), SubmissionKind::Noc, created.id, &approve())
            .await
            .unwrap();
        assert_eq!(after_tpo.state, SubmissionState::Approved);
        assert_eq!(after_tpo.rejection_reason, None);
        assert!(after_tpo.updated_at > after_teacher.updated_at);

        let trail: Vec<_> = after_tpo
            .reviewer_stamps
            .iter()
            .map(|s| (s.role, s.from_state, s.to_state))
            .collect();
        assert_eq!(
            trail,
            vec![
                (Role::Teacher, SubmissionState::PendingTeacher, SubmissionState::PendingTpo),
                (Role::Tpo, SubmissionState::PendingTpo, SubmissionState::Approved),
            ]
        );
    }

    #[tokio::test]
    async fn noc_rejected_by_teacher_is_final() {
        let svc = service();
        let created = svc
            .submit(&student("Priya Patel"), SubmissionKind::Noc, noc("Zoho"), None)
            .await
            .unwrap();

        let rejected = svc
            .transition(&teacher(), SubmissionKind::Noc, created.id, &reject("Incomplete documents"))
            .await
            .unwrap();
        assert_eq!(rejected.state, SubmissionState::RejectedTeacher);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("Incomplete documents"));

        let err = svc
            .transition(&tpo(), SubmissionKind::Noc, created.id, &approve())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidTransition { .. }));

        let stored = svc.get(&teacher(), SubmissionKind::Noc, created.id).await.unwrap();
        assert_eq!(stored.state, SubmissionState::RejectedTeacher);
        assert_eq!(stored.reviewer_stamps.len(), 1);
    }

    #[tokio::test]
    async fn illegal_moves_leave_state_untouched() {
        let svc = service();
        let rahul = student("Rahul Sharma");
        let created = svc.submit(&rahul, SubmissionKind::Noc, noc("TCS"), None).await.unwrap();

        let tpo_too_early = svc.transition(&tpo(), SubmissionKind::Noc, created.id, &approve()).await;
        let student_self_approve = svc
            .transition(&rahul, SubmissionKind::Noc, created.id, &approve())
            .await;
        let no_reason = svc
            .transition(&teacher(), SubmissionKind::Noc, created.id, &reject("  "))
            .await;

        assert!(matches!(tpo_too_early, Err(WorkflowError::InvalidTransition { .. })));
        assert!(matches!(student_self_approve, Err(WorkflowError::InvalidTransition { .. })));
        assert!(matches!(no_reason, Err(WorkflowError::MissingReason)));

        let stored = svc.get(&teacher(), SubmissionKind::Noc, created.id).await.unwrap();
        assert_eq!(stored.state, SubmissionState::PendingTeacher);
        assert_eq!(stored.updated_at, created.updated_at);
        assert!(stored.reviewer_stamps.is_empty());
    }

    #[tokio::test]
    async fn concurrent_reviews_have_exactly_one_winner() {
        let svc = Arc::new(service());
        let created = svc
            .submit(&student("Rahul Sharma"), SubmissionKind::Noc, noc("TCS"), None)
            .await
            .unwrap();

        let requests = [
            ReviewRequest {
                decision: Decision::Approve,
                reason: None,
                expected_state: Some(SubmissionState::PendingTeacher),
            },
            ReviewRequest {
                decision: Decision::Reject,
                reason: Some("Missing offer letter".into()),
                expected_state: Some(SubmissionState::PendingTeacher),
            },
        ];
        let tasks: Vec<_> = requests
            .into_iter()
            .map(|request| {
                let svc = Arc::clone(&svc);
                let id = created.id;
                tokio::spawn(async move {
                    svc.transition(&teacher(), SubmissionKind::Noc, id, &request).await
                })
            })
            .collect();

        let mut winners = Vec::new();
        let mut stale = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(updated) => winners.push(updated.state),
                Err(WorkflowError::StaleVersion { .. }) => stale += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(winners.len(), 1);
        assert_eq!(stale, 1);

        let stored = svc.get(&teacher(), SubmissionKind::Noc, created.id).await.unwrap();
        assert_eq!(stored.state, winners[0]);
    }

    /// Serves a frozen snapshot on reads so the conditional write is the
    /// only thing that can notice the row moved.
    struct FrozenReads {
        inner: Arc<MemoryStore>,
        snapshot: Submission,
    }

    #[async_trait]
    impl SubmissionStore for FrozenReads {
        async fn insert(&self, submission: &Submission) -> Result<(), StoreError> {
            self.inner.insert(submission).await
        }
        async fn fetch(&self, _: SubmissionKind, _: Uuid) -> Result<Option<Submission>, StoreError> {
            Ok(Some(self.snapshot.clone()))
        }
        async fn list(
            &self,
            kinds: &[SubmissionKind],
            requester: Option<Uuid>,
        ) -> Result<Vec<Submission>, StoreError> {
            self.inner.list(kinds, requester).await
        }
        async fn apply(&self, write: &StateWrite) -> Result<WriteOutcome, StoreError> {
            self.inner.apply(write).await
        }
        async fn set_document(&self, write: &DocumentWrite) -> Result<WriteOutcome, StoreError> {
            self.inner.set_document(write).await
        }
        async fn delete(&self, kind: SubmissionKind, id: Uuid) -> Result<bool, StoreError> {
            self.inner.delete(kind, id).await
        }
        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn conditional_write_catches_a_stale_read() {
        let store = Arc::new(MemoryStore::new());
        let live = WorkflowService::new(store.clone(), links());
        let created = live
            .submit(&student("Rahul Sharma"), SubmissionKind::Noc, noc("TCS"), None)
            .await
            .unwrap();
        live.transition(&teacher(), SubmissionKind::Noc, created.id, &approve())
            .await
            .unwrap();

        let lagging = WorkflowService::new(
            Arc::new(FrozenReads { inner: store.clone(), snapshot: created.clone() }),
            links(),
        );
        let err = lagging
            .transition(&teacher(), SubmissionKind::Noc, created.id, &reject("Too late"))
            .await
            .unwrap_err();

        match err {
            // the frozen store reports its snapshot, the live row is ahead of it
            WorkflowError::StaleVersion { current } => assert_eq!(current.id, created.id),
            other => panic!("expected stale version, got {other}"),
        }
        let stored = store.fetch(SubmissionKind::Noc, created.id).await.unwrap().unwrap();
        assert_eq!(stored.state, SubmissionState::PendingTpo);
        assert_eq!(stored.rejection_reason, None);
    }

    #[tokio::test]
    async fn expected_state_mismatch_returns_current_row() {
        let svc = service();
        let created = svc
            .submit(&student("Rahul Sharma"), SubmissionKind::Noc, noc("TCS"), None)
            .await
            .unwrap();
        svc.transition(&teacher(), SubmissionKind::Noc, created.id, &approve())
            .await
            .unwrap();

        let request = ReviewRequest {
            decision: Decision::Approve,
            reason: None,
            expected_state: Some(SubmissionState::PendingTeacher),
        };
        match svc.transition(&tpo(), SubmissionKind::Noc, created.id, &request).await {
            Err(WorkflowError::StaleVersion { current }) => {
                assert_eq!(current.state, SubmissionState::PendingTpo)
            }
            other => panic!("expected stale version, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn list_applies_scope_and_search() {
        let svc = service();
        let rahul = student("Rahul Sharma");
        let priya = student("Priya Patel");
        svc.submit(&rahul, SubmissionKind::Noc, noc("TCS"), None).await.unwrap();
        svc.submit(&priya, SubmissionKind::Noc, noc("Zoho"), None).await.unwrap();
        svc.submit(&priya, SubmissionKind::WeeklyReport, weekly(1), None).await.unwrap();

        let search = SubmissionFilter { search_text: Some("priya".into()), ..Default::default() };
        let found = svc.list(&teacher(), &search).await.unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|s| s.requester_name == "Priya Patel"));

        let for_tpo = svc.list(&tpo(), &search).await.unwrap();
        assert_eq!(for_tpo.len(), 1);
        assert_eq!(for_tpo[0].kind, SubmissionKind::Noc);

        let own = svc.list(&rahul, &SubmissionFilter::default()).await.unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].requester_name, "Rahul Sharma");

        let pending_tpo = SubmissionFilter {
            status: StatusFilter::Only(SubmissionState::PendingTpo),
            ..Default::default()
        };
        assert!(svc.list(&teacher(), &pending_tpo).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn other_students_cannot_see_a_submission() {
        let svc = service();
        let created = svc
            .submit(&student("Rahul Sharma"), SubmissionKind::Noc, noc("TCS"), None)
            .await
            .unwrap();
        let err = svc
            .get(&student("Priya Patel"), SubmissionKind::Noc, created.id)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound(_)));
    }

    #[tokio::test]
    async fn weekly_report_revision_cycle() {
        let svc = service();
        let priya = student("Priya Patel");
        let created = svc
            .submit(&priya, SubmissionKind::WeeklyReport, weekly(4), None)
            .await
            .unwrap();
        assert_eq!(created.state, SubmissionState::Submitted);

        let sent_back = svc
            .transition(&teacher(), SubmissionKind::WeeklyReport, created.id, &reject("Add hours breakdown"))
            .await
            .unwrap();
        assert_eq!(sent_back.state, SubmissionState::NeedsRevision);

        let duplicate = svc.submit(&priya, SubmissionKind::WeeklyReport, weekly(4), None).await;
        assert!(matches!(duplicate, Err(WorkflowError::Conflict(_))));

        let resubmitted = svc
            .resubmit(&priya, SubmissionKind::WeeklyReport, created.id, weekly(4), None)
            .await
            .unwrap();
        assert_eq!(resubmitted.state, SubmissionState::Submitted);
        assert_eq!(resubmitted.rejection_reason, None);
        assert!(resubmitted.updated_at > sent_back.updated_at);
        assert_eq!(
            resubmitted.reviewer_stamps.last().map(|s| s.action),
            Some(WorkflowAction::Resubmit)
        );

        let approved = svc
            .transition(&teacher(), SubmissionKind::WeeklyReport, created.id, &approve())
            .await
            .unwrap();
        assert_eq!(approved.state, SubmissionState::Approved);

        let again = svc
            .resubmit(&priya, SubmissionKind::WeeklyReport, created.id, weekly(4), None)
            .await;
        assert!(matches!(again, Err(WorkflowError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn tpo_has_no_stage_in_weekly_reports() {
        let svc = service();
        let created = svc
            .submit(&student("Priya Patel"), SubmissionKind::WeeklyReport, weekly(1), None)
            .await
            .unwrap();
        let err = svc
            .transition(&tpo(), SubmissionKind::WeeklyReport, created.id, &approve())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound(_)), "got {err:?}");

        let stored = svc.get(&teacher(), SubmissionKind::WeeklyReport, created.id).await.unwrap();
        assert_eq!(stored.state, SubmissionState::Submitted);
        assert!(stored.reviewer_stamps.is_empty());
    }

    #[tokio::test]
    async fn reviewing_another_students_submission_as_student_is_not_found() {
        let svc = service();
        let created = svc
            .submit(&student("Rahul Sharma"), SubmissionKind::Noc, noc("TCS"), None)
            .await
            .unwrap();
        let err = svc
            .transition(&student("Priya Patel"), SubmissionKind::Noc, created.id, &approve())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn resubmission_cannot_move_onto_a_taken_week() {
        let svc = service();
        let priya = student("Priya Patel");
        svc.submit(&priya, SubmissionKind::WeeklyReport, weekly(1), None).await.unwrap();
        let second = svc
            .submit(&priya, SubmissionKind::WeeklyReport, weekly(2), None)
            .await
            .unwrap();
        svc.transition(&teacher(), SubmissionKind::WeeklyReport, second.id, &reject("Wrong dates"))
            .await
            .unwrap();

        let err = svc
            .resubmit(&priya, SubmissionKind::WeeklyReport, second.id, weekly(1), None)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Conflict(_)), "got {err:?}");

        let weeks: Vec<_> = svc
            .list(&priya, &SubmissionFilter::default())
            .await
            .unwrap()
            .iter()
            .map(|s| s.payload.week_number())
            .collect();
        assert_eq!(weeks.len(), 2);
        assert!(weeks.contains(&Some(1)) && weeks.contains(&Some(2)));

        let moved = svc
            .resubmit(&priya, SubmissionKind::WeeklyReport, second.id, weekly(3), None)
            .await
            .unwrap();
        assert_eq!(moved.payload.week_number(), Some(3));
        assert_eq!(moved.state, SubmissionState::Submitted);
    }

    /// Reports a unique-index hit on every state write.
    struct UniqueIndexOnWrite {
        inner: MemoryStore,
    }

    #[async_trait]
    impl SubmissionStore for UniqueIndexOnWrite {
        async fn insert(&self, submission: &Submission) -> Result<(), StoreError> {
            self.inner.insert(submission).await
        }
        async fn fetch(&self, kind: SubmissionKind, id: Uuid) -> Result<Option<Submission>, StoreError> {
            self.inner.fetch(kind, id).await
        }
        async fn list(
            &self,
            kinds: &[SubmissionKind],
            requester: Option<Uuid>,
        ) -> Result<Vec<Submission>, StoreError> {
            self.inner.list(kinds, requester).await
        }
        async fn apply(&self, _: &StateWrite) -> Result<WriteOutcome, StoreError> {
            Err(StoreError::Duplicate("weekly_reports_student_week".into()))
        }
        async fn set_document(&self, write: &DocumentWrite) -> Result<WriteOutcome, StoreError> {
            self.inner.set_document(write).await
        }
        async fn delete(&self, kind: SubmissionKind, id: Uuid) -> Result<bool, StoreError> {
            self.inner.delete(kind, id).await
        }
        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn unique_index_on_write_is_a_conflict() {
        let svc = WorkflowService::new(
            Arc::new(UniqueIndexOnWrite { inner: MemoryStore::new() }),
            links(),
        );
        let created = svc
            .submit(&student("Priya Patel"), SubmissionKind::WeeklyReport, weekly(5), None)
            .await
            .unwrap();
        let err = svc
            .transition(&teacher(), SubmissionKind::WeeklyReport, created.id, &approve())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Conflict(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn submit_checks_role_and_payload() {
        let svc = service();
        let as_teacher = svc.submit(&teacher(), SubmissionKind::Noc, noc("TCS"), None).await;
        assert!(matches!(as_teacher, Err(WorkflowError::Forbidden(_))));

        let wrong_kind = svc
            .submit(&student("Rahul Sharma"), SubmissionKind::Certificate, noc("TCS"), None)
            .await;
        assert!(matches!(wrong_kind, Err(WorkflowError::Validation(_))));

        let application = SubmissionPayload::InternshipApplication(ApplicationDetails {
            company_name: "Zoho".into(),
            role: String::new(),
            opportunity_id: None,
            cover_letter: None,
        });
        let blank_role = svc
            .submit(&student("Rahul Sharma"), SubmissionKind::InternshipApplication, application, None)
            .await;
        assert!(matches!(blank_role, Err(WorkflowError::Validation(_))));
    }

    #[tokio::test]
    async fn documents_attach_and_resolve() {
        let svc = service();
        let rahul = student("Rahul Sharma");
        let created = svc.submit(&rahul, SubmissionKind::Noc, noc("TCS"), None).await.unwrap();

        assert_err!(svc.attach_document(&rahul, SubmissionKind::Noc, created.id, "../etc/passwd").await);
        assert_err!(svc.attach_document(&teacher(), SubmissionKind::Noc, created.id, "x.pdf").await);

        let attached = assert_ok!(
            svc.attach_document(&rahul, SubmissionKind::Noc, created.id, "offer-letters/rahul.pdf")
                .await
        );
        assert_eq!(attached.document_ref.as_deref(), Some("offer-letters/rahul.pdf"));
        assert!(attached.updated_at > created.updated_at);

        let link = svc.document_url(&teacher(), SubmissionKind::Noc, created.id).await.unwrap();
        assert_eq!(
            link.url,
            "https://storage.example.edu/object/public/documents/offer-letters/rahul.pdf"
        );
    }

    #[tokio::test]
    async fn closed_submissions_refuse_documents() {
        let svc = service();
        let rahul = student("Rahul Sharma");
        let created = svc.submit(&rahul, SubmissionKind::Noc, noc("TCS"), None).await.unwrap();
        svc.transition(&teacher(), SubmissionKind::Noc, created.id, &reject("Wrong company"))
            .await
            .unwrap();
        let err = svc
            .attach_document(&rahul, SubmissionKind::Noc, created.id, "late.pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Conflict(_)));
    }

    #[tokio::test]
    async fn only_super_admin_deletes() {
        let svc = service();
        let rahul = student("Rahul Sharma");
        let created = svc.submit(&rahul, SubmissionKind::Noc, noc("TCS"), None).await.unwrap();
        let admin = Principal::new(Uuid::new_v4(), "Admin", Role::SuperAdmin);

        assert!(matches!(
            svc.delete(&teacher(), SubmissionKind::Noc, created.id).await,
            Err(WorkflowError::Forbidden(_))
        ));
        assert_ok!(svc.delete(&admin, SubmissionKind::Noc, created.id).await);
        assert!(matches!(
            svc.delete(&admin, SubmissionKind::Noc, created.id).await,
            Err(WorkflowError::NotFound(_))
        ));
    }

    #[test]
    fn references_must_stay_inside_the_bucket() {
        assert!(validate_reference("reports/week-1.pdf").is_ok());
        assert!(validate_reference("/abs/path.pdf").is_err());
        assert!(validate_reference("a//b.pdf").is_err());
        assert!(validate_reference("a/../b.pdf").is_err());
        assert!(validate_reference("  ").is_err());
    }
}
