use std::sync::Arc;

use async_graphql::{EmptyMutation, EmptySubscription, Schema};

use crate::graphql::graph::QueryRoot;
use crate::workflow::service::WorkflowService;

pub type AppSchema = Schema<QueryRoot, EmptyMutation, EmptySubscription>;

pub fn create_schema(workflow: Arc<WorkflowService>) -> AppSchema {
    Schema::build(QueryRoot, EmptyMutation, EmptySubscription)
        .data(workflow)
        .finish()
}
