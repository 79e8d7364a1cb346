use async_graphql::Request;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{extract::Extension, routing::get, Router};

use crate::app_state::AppState;
use crate::graphql::graph_schema::AppSchema;
use crate::workflow::principal::Principal;

pub fn graphql_routes(schema: AppSchema) -> Router<AppState> {
    Router::new()
        .route("/graphql", get(graphql_handler).post(graphql_handler))
        .layer(Extension(schema))
}

pub async fn graphql_handler(
    Extension(schema): Extension<AppSchema>,
    Extension(principal): Extension<Principal>,
    req: GraphQLRequest,
) -> GraphQLResponse {
    let gql_request: Request = req.into_inner().data(principal);
    schema.execute(gql_request).await.into()
}
