//! Visibility scopes and list filters.

use std::str::FromStr;

use uuid::Uuid;

use crate::db::models::submission::{
    ParseEnumError, ReviewerRole, Role, Submission, SubmissionKind, SubmissionState,
};
use crate::workflow::principal::Principal;
use crate::workflow::transition;

/// Which submissions a caller may see at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Requester(Uuid),
    Reviewer(ReviewerRole),
    Everything,
}

impl Scope {
    pub fn for_principal(principal: &Principal) -> Self {
        match principal.role {
            Role::Student => Scope::Requester(principal.id),
            Role::Teacher => Scope::Reviewer(ReviewerRole::Teacher),
            Role::Tpo => Scope::Reviewer(ReviewerRole::Tpo),
            Role::SuperAdmin => Scope::Everything,
        }
    }

    /// Kinds visible in this scope. A reviewer sees the kinds it has a stage in.
    pub fn kinds(&self) -> Vec<SubmissionKind> {
        match self {
            Scope::Reviewer(role) => SubmissionKind::ALL
                .into_iter()
                .filter(|kind| transition::edges(*kind).iter().any(|e| e.by == *role))
                .collect(),
            Scope::Requester(_) | Scope::Everything => SubmissionKind::ALL.to_vec(),
        }
    }

    pub fn requester(&self) -> Option<Uuid> {
        match self {
            Scope::Requester(id) => Some(*id),
            _ => None,
        }
    }

    pub fn allows(&self, submission: &Submission) -> bool {
        match self {
            Scope::Requester(id) => submission.requester_id == *id,
            Scope::Reviewer(_) => self.kinds().contains(&submission.kind),
            Scope::Everything => true,
        }
    }
}

/// Exact-match status filter; `all` means no filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(SubmissionState),
}

impl FromStr for StatusFilter {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "all" => Ok(StatusFilter::All),
            other => other.parse().map(StatusFilter::Only),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionFilter {
    pub search_text: Option<String>,
    pub status: StatusFilter,
    pub kind: Option<SubmissionKind>,
}

impl SubmissionFilter {
    fn needle(&self) -> Option<String> {
        self.search_text
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    pub fn matches(&self, submission: &Submission) -> bool {
        if let Some(kind) = self.kind {
            if submission.kind != kind {
                return false;
            }
        }
        if let StatusFilter::Only(state) = self.status {
            if submission.state != state {
                return false;
            }
        }
        match self.needle() {
            None => true,
            Some(needle) => [
                submission.requester_name.to_lowercase(),
                submission.payload.organization().to_lowercase(),
                submission.payload.title().to_lowercase(),
            ]
            .iter()
            .any(|field| field.contains(&needle)),
        }
    }

    /// Narrows a candidate set to what `scope` may see and this filter keeps,
    /// newest first.
    pub fn apply(&self, scope: &Scope, candidates: Vec<Submission>) -> Vec<Submission> {
        let mut kept: Vec<Submission> = candidates
            .into_iter()
            .filter(|s| scope.allows(s) && self.matches(s))
            .collect();
        kept.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        kept
    }
}
