use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::models::submission::Role;

/// The authenticated caller, as vouched for by the auth provider's token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
}

impl Principal {
    pub fn new(id: Uuid, name: impl Into<String>, role: Role) -> Self {
        Self { id, name: name.into(), role }
    }
}
