use std::sync::Arc;

use async_graphql::{Context, ErrorExtensions, Object, Result, SimpleObject};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::models::submission::{Submission, SubmissionKind};
use crate::workflow::error::WorkflowError;
use crate::workflow::filter::{StatusFilter, SubmissionFilter};
use crate::workflow::presenter::{self, status_table};
use crate::workflow::principal::Principal;
use crate::workflow::service::WorkflowService;

#[derive(SimpleObject, Clone)]
#[graphql(rename_args = "camelCase")]
pub struct BadgeGQL {
    pub state: String,
    pub label: String,
    pub color_class: String,
    pub icon: String,
}

impl From<presenter::StatusBadge> for BadgeGQL {
    fn from(badge: presenter::StatusBadge) -> Self {
        Self {
            state: badge.state.into(),
            label: badge.label.into(),
            color_class: badge.color_class.into(),
            icon: badge.icon.into(),
        }
    }
}

#[derive(SimpleObject, Clone)]
#[graphql(rename_args = "camelCase")]
pub struct KindBadgesGQL {
    pub kind: String,
    pub badges: Vec<BadgeGQL>,
}

#[derive(SimpleObject, Clone)]
#[graphql(rename_args = "camelCase")]
pub struct SubmissionGQL {
    pub id: Uuid,
    pub kind: String,
    pub state: String,
    pub badge: BadgeGQL,
    pub requester_id: Uuid,
    pub requester_name: String,
    pub organization: String,
    pub title: String,
    pub rejection_reason: Option<String>,
    pub document_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Submission> for SubmissionGQL {
    fn from(s: Submission) -> Self {
        Self {
            badge: presenter::present_for(s.kind, s.state).into(),
            id: s.id,
            kind: s.kind.to_string(),
            state: s.state.to_string(),
            requester_id: s.requester_id,
            organization: s.payload.organization().to_string(),
            title: s.payload.title(),
            requester_name: s.requester_name,
            rejection_reason: s.rejection_reason,
            document_ref: s.document_ref,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

fn gql_error(err: WorkflowError) -> async_graphql::Error {
    let code = err.code();
    async_graphql::Error::new(err.to_string()).extend_with(|_, e| e.set("code", code))
}

fn bad_argument(message: String) -> async_graphql::Error {
    async_graphql::Error::new(message).extend_with(|_, e| e.set("code", "BAD_REQUEST"))
}

#[derive(Default)]
pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// Submissions visible to the caller, newest first.
    async fn submissions(
        &self,
        ctx: &Context<'_>,
        kind: Option<String>,
        status: Option<String>,
        search: Option<String>,
    ) -> Result<Vec<SubmissionGQL>> {
        let principal = ctx.data::<Principal>()?;
        let workflow = ctx.data::<Arc<WorkflowService>>()?;

        let kind = kind
            .as_deref()
            .map(str::parse::<SubmissionKind>)
            .transpose()
            .map_err(|e| bad_argument(e.to_string()))?;
        let status = status
            .as_deref()
            .unwrap_or("all")
            .parse::<StatusFilter>()
            .map_err(|e| bad_argument(e.to_string()))?;
        let filter = SubmissionFilter { search_text: search, status, kind };

        let found = workflow.list(principal, &filter).await.map_err(gql_error)?;
        Ok(found.into_iter().map(SubmissionGQL::from).collect())
    }

    /// One submission, if the caller may see it.
    async fn submission(
        &self,
        ctx: &Context<'_>,
        kind: String,
        id: Uuid,
    ) -> Result<Option<SubmissionGQL>> {
        let principal = ctx.data::<Principal>()?;
        let workflow = ctx.data::<Arc<WorkflowService>>()?;
        let kind = kind.parse::<SubmissionKind>().map_err(|e| bad_argument(e.to_string()))?;

        match workflow.get(principal, kind, id).await {
            Ok(found) => Ok(Some(found.into())),
            Err(WorkflowError::NotFound(_)) => Ok(None),
            Err(other) => Err(gql_error(other)),
        }
    }

    async fn status_badges(&self) -> Vec<KindBadgesGQL> {
        status_table()
            .into_iter()
            .map(|k| KindBadgesGQL {
                kind: k.kind.to_string(),
                badges: k.badges.into_iter().map(BadgeGQL::from).collect(),
            })
            .collect()
    }
}
