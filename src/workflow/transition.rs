//! Transition tables and the guard every reviewer action goes through.

use chrono::{DateTime, Duration, Utc};

use crate::db::models::submission::{
    Decision, ReviewerRole, Role, SubmissionKind, SubmissionState, WorkflowAction,
};
use crate::workflow::error::WorkflowError;

/// One legal reviewer move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub from: SubmissionState,
    pub decision: Decision,
    pub by: ReviewerRole,
    pub to: SubmissionState,
}

const fn edge(
    from: SubmissionState,
    decision: Decision,
    by: ReviewerRole,
    to: SubmissionState,
) -> Edge {
    Edge { from, decision, by, to }
}

use Decision::{Approve, Reject};
use ReviewerRole::{Teacher, Tpo};
use SubmissionState::*;

/// NOC requests and internship applications. Teacher approval hands the
/// submission straight to the TPO stage.
const TWO_STAGE: &[Edge] = &[
    edge(PendingTeacher, Approve, Teacher, PendingTpo),
    edge(PendingTeacher, Reject, Teacher, RejectedTeacher),
    edge(PendingTpo, Approve, Tpo, Approved),
    edge(PendingTpo, Reject, Tpo, Rejected),
];

const WEEKLY_REPORT: &[Edge] = &[
    edge(Submitted, Approve, Teacher, Approved),
    edge(Submitted, Reject, Teacher, NeedsRevision),
];

const CERTIFICATE: &[Edge] = &[
    edge(Submitted, Approve, Teacher, Approved),
    edge(Submitted, Reject, Teacher, Rejected),
];

pub fn edges(kind: SubmissionKind) -> &'static [Edge] {
    match kind {
        SubmissionKind::Noc | SubmissionKind::InternshipApplication => TWO_STAGE,
        SubmissionKind::WeeklyReport => WEEKLY_REPORT,
        SubmissionKind::Certificate => CERTIFICATE,
    }
}

pub fn initial_state(kind: SubmissionKind) -> SubmissionState {
    if kind.is_two_stage() {
        PendingTeacher
    } else {
        Submitted
    }
}

/// States a submission of `kind` can ever be in, in workflow order.
pub fn states_for(kind: SubmissionKind) -> Vec<SubmissionState> {
    let mut states = vec![initial_state(kind)];
    for e in edges(kind) {
        for state in [e.from, e.to] {
            if !states.contains(&state) {
                states.push(state);
            }
        }
    }
    states
}

/// Where the owning student may send a submission back to after a
/// revision request.
pub fn resubmit_target(kind: SubmissionKind, from: SubmissionState) -> Option<SubmissionState> {
    match (kind, from) {
        (SubmissionKind::WeeklyReport, NeedsRevision) => Some(Submitted),
        _ => None,
    }
}

pub fn next_state(
    kind: SubmissionKind,
    by: ReviewerRole,
    from: SubmissionState,
    decision: Decision,
) -> Option<SubmissionState> {
    edges(kind)
        .iter()
        .find(|e| e.from == from && e.by == by && e.decision == decision)
        .map(|e| e.to)
}

pub fn can_transition(
    kind: SubmissionKind,
    role: Role,
    from: SubmissionState,
    decision: Decision,
) -> bool {
    role.reviewer()
        .and_then(|by| next_state(kind, by, from, decision))
        .is_some()
}

/// A validated move, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionPlan {
    pub from: SubmissionState,
    pub to: SubmissionState,
    pub rejection_reason: Option<String>,
}

/// Checks the reason first, then the edge. A reject without a reason is
/// always `MissingReason`, whatever the state.
pub fn plan(
    kind: SubmissionKind,
    from: SubmissionState,
    role: Role,
    decision: Decision,
    reason: Option<&str>,
) -> Result<TransitionPlan, WorkflowError> {
    let reason = reason.map(str::trim).filter(|r| !r.is_empty());

    let rejection_reason = match (decision, reason) {
        (Reject, None) => return Err(WorkflowError::MissingReason),
        (Reject, Some(r)) => Some(r.to_string()),
        (Approve, Some(_)) => {
            return Err(WorkflowError::Validation(
                "a reason is only accepted when rejecting".into(),
            ))
        }
        (Approve, None) => None,
    };

    let to = role
        .reviewer()
        .and_then(|by| next_state(kind, by, from, decision))
        .ok_or(WorkflowError::InvalidTransition {
            kind,
            from,
            role,
            action: WorkflowAction::from(decision),
        })?;

    debug_assert_eq!(to.is_rejection(), rejection_reason.is_some());
    Ok(TransitionPlan { from, to, rejection_reason })
}

/// Smallest timestamp strictly after `previous`, preferring `candidate`.
pub fn advance(previous: DateTime<Utc>, candidate: DateTime<Utc>) -> DateTime<Utc> {
    let floor = previous + Duration::microseconds(1);
    if candidate >= floor {
        candidate
    } else {
        floor
    }
}

pub fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    advance(previous, Utc::now())
}
