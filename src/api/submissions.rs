use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use utoipa::{IntoParams, OpenApi};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::models::submission::{
    AttachDocumentRequest, Decision, DocumentLink, NewSubmission, ParseEnumError, ResubmitRequest,
    ReviewRequest, ReviewerStamp, Submission, SubmissionKind, SubmissionState,
};
use crate::utils::api_response::ApiResponse;
use crate::workflow::error::WorkflowError;
use crate::workflow::filter::{StatusFilter, SubmissionFilter};
use crate::workflow::principal::Principal;

pub fn submission_routes() -> Router<AppState> {
    Router::new()
        .route("/submissions", get(list_submissions))
        .route("/submissions/{kind}", post(create_submission))
        .route(
            "/submissions/{kind}/{id}",
            get(get_submission).delete(delete_submission),
        )
        .route("/submissions/{kind}/{id}/review", post(review_submission))
        .route("/submissions/{kind}/{id}/resubmit", post(resubmit_submission))
        .route(
            "/submissions/{kind}/{id}/document",
            get(get_document).put(attach_document),
        )
}

/// Query string accepted by the list endpoint.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// Restrict to one submission kind
    pub kind: Option<String>,
    /// Status name, or `all`
    pub status: Option<String>,
    /// Case-insensitive match on student name, organization or title
    pub search: Option<String>,
}

impl ListQuery {
    fn into_filter(self) -> Result<SubmissionFilter, WorkflowError> {
        let invalid = |e: ParseEnumError| WorkflowError::Validation(e.to_string());
        let kind = self
            .kind
            .as_deref()
            .map(str::parse::<SubmissionKind>)
            .transpose()
            .map_err(invalid)?;
        let status = self
            .status
            .as_deref()
            .unwrap_or("all")
            .parse::<StatusFilter>()
            .map_err(invalid)?;
        Ok(SubmissionFilter { search_text: self.search, status, kind })
    }
}

fn parse_kind(raw: &str) -> Result<SubmissionKind, ApiResponse<()>> {
    raw.parse::<SubmissionKind>()
        .map_err(|e| ApiResponse::error(StatusCode::NOT_FOUND, e.to_string(), None))
}

/// Submit a new NOC, application, weekly report or certificate
#[utoipa::path(
    post,
    path = "/submissions/{kind}",
    params(("kind" = String, Path, description = "noc, internship_application, weekly_report or certificate")),
    request_body = NewSubmission,
    responses(
        (status = 201, description = "Submission created", body = Submission),
        (status = 403, description = "Caller is not a student"),
        (status = 409, description = "Duplicate weekly report"),
        (status = 422, description = "Payload failed validation")
    ),
    tag = "Submissions",
    security(("bearerAuth" = []))
)]
pub async fn create_submission(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(kind): Path<String>,
    Json(body): Json<NewSubmission>,
) -> Result<ApiResponse<Submission>, ApiResponse<()>> {
    let kind = parse_kind(&kind)?;
    let created = state
        .workflow
        .submit(&principal, kind, body.payload, body.document_ref)
        .await?;
    Ok(ApiResponse::success(StatusCode::CREATED, "Submission created", created))
}

/// List the submissions visible to the caller
#[utoipa::path(
    get,
    path = "/submissions",
    params(ListQuery),
    responses(
        (status = 200, description = "Submissions, newest first", body = [Submission]),
        (status = 422, description = "Unknown kind or status filter")
    ),
    tag = "Submissions",
    security(("bearerAuth" = []))
)]
pub async fn list_submissions(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<ListQuery>,
) -> Result<ApiResponse<Vec<Submission>>, ApiResponse<()>> {
    let filter = query.into_filter()?;
    let submissions = state.workflow.list(&principal, &filter).await?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        format!("{} submissions", submissions.len()),
        submissions,
    ))
}

/// Fetch one submission
#[utoipa::path(
    get,
    path = "/submissions/{kind}/{id}",
    params(
        ("kind" = String, Path, description = "Submission kind"),
        ("id" = Uuid, Path, description = "Submission ID")
    ),
    responses(
        (status = 200, description = "Submission found", body = Submission),
        (status = 404, description = "Submission not found")
    ),
    tag = "Submissions",
    security(("bearerAuth" = []))
)]
pub async fn get_submission(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((kind, id)): Path<(String, Uuid)>,
) -> Result<ApiResponse<Submission>, ApiResponse<()>> {
    let kind = parse_kind(&kind)?;
    let submission = state.workflow.get(&principal, kind, id).await?;
    Ok(ApiResponse::success(StatusCode::OK, "Submission found", submission))
}

/// Approve or reject a submission at the caller's stage
#[utoipa::path(
    post,
    path = "/submissions/{kind}/{id}/review",
    params(
        ("kind" = String, Path, description = "Submission kind"),
        ("id" = Uuid, Path, description = "Submission ID")
    ),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Decision recorded", body = Submission),
        (status = 404, description = "Submission not found"),
        (status = 409, description = "Illegal move, or the submission changed underneath the reviewer"),
        (status = 422, description = "Rejection without a reason")
    ),
    tag = "Submissions",
    security(("bearerAuth" = []))
)]
pub async fn review_submission(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((kind, id)): Path<(String, Uuid)>,
    Json(body): Json<ReviewRequest>,
) -> Result<ApiResponse<Submission>, ApiResponse<()>> {
    let kind = parse_kind(&kind)?;
    let updated = state.workflow.transition(&principal, kind, id, &body).await?;
    let message = match body.decision {
        Decision::Approve => "Submission approved",
        Decision::Reject => "Submission rejected",
    };
    Ok(ApiResponse::success(StatusCode::OK, message, updated))
}

/// Resubmit a weekly report that was sent back for revision
#[utoipa::path(
    post,
    path = "/submissions/{kind}/{id}/resubmit",
    params(
        ("kind" = String, Path, description = "Submission kind"),
        ("id" = Uuid, Path, description = "Submission ID")
    ),
    request_body = ResubmitRequest,
    responses(
        (status = 200, description = "Submission resubmitted", body = Submission),
        (status = 409, description = "Submission is not awaiting revision")
    ),
    tag = "Submissions",
    security(("bearerAuth" = []))
)]
pub async fn resubmit_submission(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((kind, id)): Path<(String, Uuid)>,
    Json(body): Json<ResubmitRequest>,
) -> Result<ApiResponse<Submission>, ApiResponse<()>> {
    let kind = parse_kind(&kind)?;
    let updated = state
        .workflow
        .resubmit(&principal, kind, id, body.payload, body.expected_state)
        .await?;
    Ok(ApiResponse::success(StatusCode::OK, "Submission resubmitted", updated))
}

/// Attach an uploaded document to an open submission
#[utoipa::path(
    put,
    path = "/submissions/{kind}/{id}/document",
    params(
        ("kind" = String, Path, description = "Submission kind"),
        ("id" = Uuid, Path, description = "Submission ID")
    ),
    request_body = AttachDocumentRequest,
    responses(
        (status = 200, description = "Document attached", body = Submission),
        (status = 403, description = "Caller does not own the submission"),
        (status = 409, description = "Submission is closed")
    ),
    tag = "Submissions",
    security(("bearerAuth" = []))
)]
pub async fn attach_document(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((kind, id)): Path<(String, Uuid)>,
    Json(body): Json<AttachDocumentRequest>,
) -> Result<ApiResponse<Submission>, ApiResponse<()>> {
    let kind = parse_kind(&kind)?;
    let updated = state
        .workflow
        .attach_document(&principal, kind, id, &body.reference)
        .await?;
    Ok(ApiResponse::success(StatusCode::OK, "Document attached", updated))
}

/// Resolve the public URL of a submission's document
#[utoipa::path(
    get,
    path = "/submissions/{kind}/{id}/document",
    params(
        ("kind" = String, Path, description = "Submission kind"),
        ("id" = Uuid, Path, description = "Submission ID")
    ),
    responses(
        (status = 200, description = "Document link", body = DocumentLink),
        (status = 404, description = "No document attached")
    ),
    tag = "Submissions",
    security(("bearerAuth" = []))
)]
pub async fn get_document(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((kind, id)): Path<(String, Uuid)>,
) -> Result<ApiResponse<DocumentLink>, ApiResponse<()>> {
    let kind = parse_kind(&kind)?;
    let link = state.workflow.document_url(&principal, kind, id).await?;
    Ok(ApiResponse::success(StatusCode::OK, "Document found", link))
}

/// Delete a submission (super admin only)
#[utoipa::path(
    delete,
    path = "/submissions/{kind}/{id}",
    params(
        ("kind" = String, Path, description = "Submission kind"),
        ("id" = Uuid, Path, description = "Submission ID")
    ),
    responses(
        (status = 200, description = "Submission deleted"),
        (status = 403, description = "Caller is not a super admin"),
        (status = 404, description = "Submission not found")
    ),
    tag = "Submissions",
    security(("bearerAuth" = []))
)]
pub async fn delete_submission(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((kind, id)): Path<(String, Uuid)>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    let kind = parse_kind(&kind)?;
    state.workflow.delete(&principal, kind, id).await?;
    Ok(ApiResponse::success(StatusCode::OK, "Submission deleted", ()))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        create_submission,
        list_submissions,
        get_submission,
        review_submission,
        resubmit_submission,
        attach_document,
        get_document,
        delete_submission
    ),
    components(schemas(
        Submission, ReviewerStamp, SubmissionKind, SubmissionState, Decision,
        NewSubmission, ReviewRequest, ResubmitRequest, AttachDocumentRequest, DocumentLink
    )),
    tags(
        (name = "Submissions", description = "Internship submissions and their approval workflow")
    )
)]
pub struct SubmissionDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::service::tests::{approve, noc, reject, service, student, teacher, tpo};

    fn state() -> AppState {
        AppState::new(service())
    }

    fn new_noc(company: &str) -> Json<NewSubmission> {
        Json(NewSubmission { payload: noc(company), document_ref: None })
    }

    #[tokio::test]
    async fn submit_then_review_over_http() {
        let state = state();
        let rahul = student("Rahul Sharma");
        let created = create_submission(
            State(state.clone()),
            Extension(rahul.clone()),
            Path("noc".into()),
            new_noc("Infosys"),
        )
        .await
        .unwrap();
        assert_eq!(created.status_code, 201);
        let id = created.data.unwrap().id;

        let reviewed = review_submission(
            State(state.clone()),
            Extension(teacher()),
            Path(("noc".into(), id)),
            Json(approve()),
        )
        .await
        .unwrap();
        assert_eq!(reviewed.data.unwrap().state, SubmissionState::PendingTpo);

        let fetched = get_submission(State(state), Extension(rahul), Path(("noc".into(), id)))
            .await
            .unwrap();
        assert_eq!(fetched.data.unwrap().reviewer_stamps.len(), 1);
    }

    #[tokio::test]
    async fn workflow_errors_keep_their_status() {
        let state = state();
        let created = create_submission(
            State(state.clone()),
            Extension(student("Priya Patel")),
            Path("noc".into()),
            new_noc("Wipro"),
        )
        .await
        .unwrap();
        let id = created.data.unwrap().id;

        let no_reason = review_submission(
            State(state.clone()),
            Extension(teacher()),
            Path(("noc".into(), id)),
            Json(ReviewRequest { decision: Decision::Reject, reason: None, expected_state: None }),
        )
        .await
        .unwrap_err();
        assert_eq!(no_reason.status_code, 422);

        let early_tpo = review_submission(
            State(state.clone()),
            Extension(tpo()),
            Path(("noc".into(), id)),
            Json(reject("not yet")),
        )
        .await
        .unwrap_err();
        assert_eq!(early_tpo.status_code, 409);

        let missing = get_submission(
            State(state),
            Extension(teacher()),
            Path(("noc".into(), Uuid::new_v4())),
        )
        .await
        .unwrap_err();
        assert_eq!(missing.status_code, 404);
    }

    #[tokio::test]
    async fn unknown_kind_is_not_found() {
        let err = create_submission(
            State(state()),
            Extension(student("Rahul Sharma")),
            Path("transcript".into()),
            new_noc("TCS"),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code, 404);
    }

    #[tokio::test]
    async fn list_query_filters_by_status() {
        let state = state();
        let rahul = student("Rahul Sharma");
        for company in ["TCS", "Infosys"] {
            create_submission(
                State(state.clone()),
                Extension(rahul.clone()),
                Path("noc".into()),
                new_noc(company),
            )
            .await
            .unwrap();
        }

        let query = ListQuery {
            kind: Some("noc".into()),
            status: Some("pending_teacher".into()),
            search: Some("infosys".into()),
        };
        let listed = list_submissions(State(state.clone()), Extension(teacher()), Query(query))
            .await
            .unwrap();
        assert_eq!(listed.data.unwrap().len(), 1);

        let bad = ListQuery { status: Some("archived".into()), ..Default::default() };
        let err = list_submissions(State(state), Extension(teacher()), Query(bad))
            .await
            .unwrap_err();
        assert_eq!(err.status_code, 422);
    }
}
