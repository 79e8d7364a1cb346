// src/db/models/submission.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Returned when a stored or user-supplied string is not part of a closed set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {what}: '{value}'")]
pub struct ParseEnumError {
    pub what: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(what: &'static str, value: &str) -> Self {
        Self { what, value: value.to_string() }
    }
}

/// The four kinds of student submission, each backed by its own table.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionKind {
    Noc,
    InternshipApplication,
    WeeklyReport,
    Certificate,
}

impl SubmissionKind {
    pub const ALL: [SubmissionKind; 4] = [
        SubmissionKind::Noc,
        SubmissionKind::InternshipApplication,
        SubmissionKind::WeeklyReport,
        SubmissionKind::Certificate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SubmissionKind::Noc => "noc",
            SubmissionKind::InternshipApplication => "internship_application",
            SubmissionKind::WeeklyReport => "weekly_report",
            SubmissionKind::Certificate => "certificate",
        }
    }

    /// Backing table name. Only ever interpolated from this closed set.
    pub fn table(self) -> &'static str {
        match self {
            SubmissionKind::Noc => "noc_requests",
            SubmissionKind::InternshipApplication => "internship_applications",
            SubmissionKind::WeeklyReport => "weekly_reports",
            SubmissionKind::Certificate => "certificates",
        }
    }

    /// NOC requests and internship applications pass through teacher and TPO.
    pub fn is_two_stage(self) -> bool {
        matches!(self, SubmissionKind::Noc | SubmissionKind::InternshipApplication)
    }
}

impl fmt::Display for SubmissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubmissionKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "noc" | "noc_request" | "noc_requests" => Ok(SubmissionKind::Noc),
            "internship_application" | "internship_applications" => {
                Ok(SubmissionKind::InternshipApplication)
            }
            "weekly_report" | "weekly_reports" => Ok(SubmissionKind::WeeklyReport),
            "certificate" | "certificates" => Ok(SubmissionKind::Certificate),
            other => Err(ParseEnumError::new("submission kind", other)),
        }
    }
}

/// Closed workflow state set shared by every submission kind.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    PendingTeacher,
    PendingTpo,
    Approved,
    RejectedTeacher,
    Rejected,
    Submitted,
    NeedsRevision,
}

impl SubmissionState {
    pub const ALL: [SubmissionState; 7] = [
        SubmissionState::PendingTeacher,
        SubmissionState::PendingTpo,
        SubmissionState::Approved,
        SubmissionState::RejectedTeacher,
        SubmissionState::Rejected,
        SubmissionState::Submitted,
        SubmissionState::NeedsRevision,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SubmissionState::PendingTeacher => "pending_teacher",
            SubmissionState::PendingTpo => "pending_tpo",
            SubmissionState::Approved => "approved",
            SubmissionState::RejectedTeacher => "rejected_teacher",
            SubmissionState::Rejected => "rejected",
            SubmissionState::Submitted => "submitted",
            SubmissionState::NeedsRevision => "needs_revision",
        }
    }

    /// Every stored spelling that decodes to this state. Conditional writes
    /// match against all of them so legacy rows stay writable.
    pub fn stored_names(self) -> &'static [&'static str] {
        match self {
            SubmissionState::PendingTeacher => &["pending_teacher"],
            SubmissionState::PendingTpo => &["pending_tpo", "approved_teacher"],
            SubmissionState::Approved => &["approved"],
            SubmissionState::RejectedTeacher => &["rejected_teacher"],
            SubmissionState::Rejected => &["rejected"],
            SubmissionState::Submitted => &["submitted", "pending_review", "pending"],
            SubmissionState::NeedsRevision => &["needs_revision"],
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SubmissionState::Approved | SubmissionState::RejectedTeacher | SubmissionState::Rejected
        )
    }

    /// States that must carry a rejection reason.
    pub fn is_rejection(self) -> bool {
        matches!(
            self,
            SubmissionState::RejectedTeacher
                | SubmissionState::Rejected
                | SubmissionState::NeedsRevision
        )
    }
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubmissionState {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        SubmissionState::ALL
            .into_iter()
            .find(|state| state.stored_names().contains(&normalized.as_str()))
            .ok_or_else(|| ParseEnumError::new("submission state", s))
    }
}

/// Role claim carried by the authenticated principal.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Teacher,
    Tpo,
    SuperAdmin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Tpo => "tpo",
            Role::SuperAdmin => "super_admin",
        }
    }

    /// The reviewer stage this role may act on, if any.
    pub fn reviewer(self) -> Option<ReviewerRole> {
        match self {
            Role::Teacher => Some(ReviewerRole::Teacher),
            Role::Tpo => Some(ReviewerRole::Tpo),
            Role::Student | Role::SuperAdmin => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "teacher" => Ok(Role::Teacher),
            "tpo" | "tp_officer" | "tnp_officer" => Ok(Role::Tpo),
            "super_admin" | "admin" => Ok(Role::SuperAdmin),
            _ => Err(ParseEnumError::new("role", s)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReviewerRole {
    Teacher,
    Tpo,
}

impl ReviewerRole {
    pub fn role(self) -> Role {
        match self {
            ReviewerRole::Teacher => Role::Teacher,
            ReviewerRole::Tpo => Role::Tpo,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

/// Anything recorded in a submission's audit trail.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowAction {
    Approve,
    Reject,
    Resubmit,
}

impl WorkflowAction {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowAction::Approve => "approve",
            WorkflowAction::Reject => "reject",
            WorkflowAction::Resubmit => "resubmit",
        }
    }
}

impl fmt::Display for WorkflowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowAction {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(WorkflowAction::Approve),
            "reject" => Ok(WorkflowAction::Reject),
            "resubmit" => Ok(WorkflowAction::Resubmit),
            other => Err(ParseEnumError::new("workflow action", other)),
        }
    }
}

impl From<Decision> for WorkflowAction {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Approve => WorkflowAction::Approve,
            Decision::Reject => WorkflowAction::Reject,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NocDetails {
    pub company_name: String,
    pub role: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub stipend: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ApplicationDetails {
    pub company_name: String,
    pub role: String,
    #[serde(default)]
    pub opportunity_id: Option<Uuid>,
    #[serde(default)]
    pub cover_letter: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WeeklyReportDetails {
    pub company_name: String,
    pub week_number: i32,
    pub hours_worked: i32,
    pub summary: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CertificateDetails {
    pub company_name: String,
    pub title: String,
    #[serde(default)]
    pub issued_on: Option<NaiveDate>,
}

/// Kind-specific fields, tagged by kind so stored JSON round-trips into the
/// right variant.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubmissionPayload {
    Noc(NocDetails),
    InternshipApplication(ApplicationDetails),
    WeeklyReport(WeeklyReportDetails),
    Certificate(CertificateDetails),
}

fn require(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{field} is required"))
    } else {
        Ok(())
    }
}

impl SubmissionPayload {
    pub fn kind(&self) -> SubmissionKind {
        match self {
            SubmissionPayload::Noc(_) => SubmissionKind::Noc,
            SubmissionPayload::InternshipApplication(_) => SubmissionKind::InternshipApplication,
            SubmissionPayload::WeeklyReport(_) => SubmissionKind::WeeklyReport,
            SubmissionPayload::Certificate(_) => SubmissionKind::Certificate,
        }
    }

    pub fn organization(&self) -> &str {
        match self {
            SubmissionPayload::Noc(d) => &d.company_name,
            SubmissionPayload::InternshipApplication(d) => &d.company_name,
            SubmissionPayload::WeeklyReport(d) => &d.company_name,
            SubmissionPayload::Certificate(d) => &d.company_name,
        }
    }

    pub fn title(&self) -> String {
        match self {
            SubmissionPayload::Noc(d) => d.role.clone(),
            SubmissionPayload::InternshipApplication(d) => d.role.clone(),
            SubmissionPayload::WeeklyReport(d) => format!("Week {}", d.week_number),
            SubmissionPayload::Certificate(d) => d.title.clone(),
        }
    }

    pub fn week_number(&self) -> Option<i32> {
        match self {
            SubmissionPayload::WeeklyReport(d) => Some(d.week_number),
            _ => None,
        }
    }

    /// Required-field checks run before anything is written.
    pub fn validate(&self) -> Result<(), String> {
        require("company_name", self.organization())?;
        match self {
            SubmissionPayload::Noc(d) => {
                require("role", &d.role)?;
                if d.end_date < d.start_date {
                    return Err("end_date must not be before start_date".into());
                }
                if matches!(d.stipend, Some(s) if s < 0) {
                    return Err("stipend must not be negative".into());
                }
            }
            SubmissionPayload::InternshipApplication(d) => require("role", &d.role)?,
            SubmissionPayload::WeeklyReport(d) => {
                require("summary", &d.summary)?;
                if d.week_number < 1 {
                    return Err("week_number must be at least 1".into());
                }
                if !(0..=168).contains(&d.hours_worked) {
                    return Err("hours_worked must be between 0 and 168".into());
                }
            }
            SubmissionPayload::Certificate(d) => require("title", &d.title)?,
        }
        Ok(())
    }
}

/// One entry in a submission's audit trail.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, ToSchema)]
pub struct ReviewerStamp {
    pub actor_id: Uuid,
    pub role: Role,
    pub action: WorkflowAction,
    pub from_state: SubmissionState,
    pub to_state: SubmissionState,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
pub struct Submission {
    pub id: Uuid,
    pub kind: SubmissionKind,
    pub requester_id: Uuid,
    pub requester_name: String,
    #[schema(value_type = Object)]
    pub payload: SubmissionPayload,
    pub state: SubmissionState,
    pub rejection_reason: Option<String>,
    pub document_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub reviewer_stamps: Vec<ReviewerStamp>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NewSubmission {
    #[schema(value_type = Object)]
    pub payload: SubmissionPayload,
    #[serde(default)]
    pub document_ref: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReviewRequest {
    pub decision: Decision,
    #[serde(default)]
    pub reason: Option<String>,
    /// State the reviewer was looking at; a mismatch is reported as stale.
    #[serde(default)]
    pub expected_state: Option<SubmissionState>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResubmitRequest {
    #[schema(value_type = Object)]
    pub payload: SubmissionPayload,
    #[serde(default)]
    pub expected_state: Option<SubmissionState>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AttachDocumentRequest {
    pub reference: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, ToSchema)]
pub struct DocumentLink {
    pub reference: String,
    pub url: String,
}
