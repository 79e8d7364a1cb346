//! One status presentation table for every screen.

use serde::Serialize;
use utoipa::ToSchema;

use crate::db::models::submission::{SubmissionKind, SubmissionState};
use crate::workflow::transition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct StatusBadge {
    pub state: &'static str,
    pub label: &'static str,
    pub color_class: &'static str,
    pub icon: &'static str,
}

const fn badge(
    state: &'static str,
    label: &'static str,
    color_class: &'static str,
    icon: &'static str,
) -> StatusBadge {
    StatusBadge { state, label, color_class, icon }
}

pub const UNKNOWN: StatusBadge =
    badge("unknown", "Unknown", "bg-gray-100 text-gray-800", "help-circle");

const BADGES: [(SubmissionState, StatusBadge); 7] = [
    (
        SubmissionState::PendingTeacher,
        badge("pending_teacher", "Pending Teacher Approval", "bg-yellow-100 text-yellow-800", "clock"),
    ),
    (
        SubmissionState::PendingTpo,
        badge("pending_tpo", "Pending TPO Approval", "bg-blue-100 text-blue-800", "clock"),
    ),
    (
        SubmissionState::Approved,
        badge("approved", "Approved", "bg-green-100 text-green-800", "check-circle"),
    ),
    (
        SubmissionState::RejectedTeacher,
        badge("rejected_teacher", "Rejected by Teacher", "bg-red-100 text-red-800", "x-circle"),
    ),
    (
        SubmissionState::Rejected,
        badge("rejected", "Rejected", "bg-red-100 text-red-800", "x-circle"),
    ),
    (
        SubmissionState::Submitted,
        badge("submitted", "Submitted", "bg-yellow-100 text-yellow-800", "file-text"),
    ),
    (
        SubmissionState::NeedsRevision,
        badge("needs_revision", "Needs Revision", "bg-orange-100 text-orange-800", "alert-circle"),
    ),
];

/// Per-kind wording. Colors and icons stay shared.
const LABEL_OVERRIDES: [(SubmissionKind, SubmissionState, &str); 5] = [
    (SubmissionKind::Noc, SubmissionState::Rejected, "Rejected by TPO"),
    (SubmissionKind::InternshipApplication, SubmissionState::Rejected, "Rejected by TPO"),
    (SubmissionKind::WeeklyReport, SubmissionState::Submitted, "Under Review"),
    (SubmissionKind::Certificate, SubmissionState::Submitted, "Pending Verification"),
    (SubmissionKind::Certificate, SubmissionState::Approved, "Verified"),
];

pub fn present(state: SubmissionState) -> StatusBadge {
    BADGES
        .iter()
        .find(|(s, _)| *s == state)
        .map(|(_, b)| *b)
        .unwrap_or(UNKNOWN)
}

pub fn present_for(kind: SubmissionKind, state: SubmissionState) -> StatusBadge {
    let mut shown = present(state);
    if let Some((_, _, label)) = LABEL_OVERRIDES
        .iter()
        .find(|(k, s, _)| *k == kind && *s == state)
    {
        shown.label = *label;
    }
    shown
}

/// For raw stored strings that may predate the closed set.
pub fn present_raw(raw: &str) -> StatusBadge {
    raw.parse::<SubmissionState>()
        .map(present)
        .unwrap_or(UNKNOWN)
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct KindStatuses {
    pub kind: SubmissionKind,
    pub badges: Vec<StatusBadge>,
}

/// Every state each kind can reach, with its badge.
pub fn status_table() -> Vec<KindStatuses> {
    SubmissionKind::ALL
        .into_iter()
        .map(|kind| KindStatuses {
            kind,
            badges: transition::states_for(kind)
                .into_iter()
                .map(|state| present_for(kind, state))
                .collect(),
        })
        .collect()
}
