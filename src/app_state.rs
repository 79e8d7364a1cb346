use std::sync::Arc;

use crate::workflow::service::WorkflowService;

#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<WorkflowService>,
}

impl AppState {
    pub fn new(workflow: WorkflowService) -> Self {
        Self { workflow: Arc::new(workflow) }
    }
}
