use axum::{http::StatusCode, routing::get, Router};
use utoipa::OpenApi;

use crate::app_state::AppState;
use crate::utils::api_response::ApiResponse;
use crate::workflow::presenter::{status_table, KindStatuses, StatusBadge};

pub fn status_routes() -> Router<AppState> {
    Router::new().route("/statuses", get(list_statuses))
}

/// Badge label, color class and icon for every state of every submission kind
#[utoipa::path(
    get,
    path = "/statuses",
    responses(
        (status = 200, description = "Status presentation table", body = [KindStatuses])
    ),
    tag = "Statuses"
)]
pub async fn list_statuses() -> ApiResponse<Vec<KindStatuses>> {
    ApiResponse::success(StatusCode::OK, "Status table", status_table())
}

#[derive(OpenApi)]
#[openapi(
    paths(list_statuses),
    components(schemas(KindStatuses, StatusBadge)),
    tags((name = "Statuses", description = "How workflow states are displayed"))
)]
pub struct StatusDoc;
