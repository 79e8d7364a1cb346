use serde::{Deserialize, Serialize};
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::openapi::Components;
use utoipa::Modify;
use uuid::Uuid;

use crate::db::models::submission::Role;
use crate::workflow::principal::Principal;

/// JWT Claims issued by the auth provider.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject - profile UUID
    pub sub: String,
    /// Display name of the caller
    #[serde(default)]
    pub name: String,
    /// Role claim (student, teacher, tpo, super_admin)
    pub role: String,
    /// Expiration timestamp (UNIX TIME)
    pub exp: usize,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ClaimsError {
    #[error("Invalid user ID format in token")]
    Subject,
    #[error("Unknown role '{0}' in token")]
    Role(String),
}

impl Claims {
    /// Resolves the caller behind this token.
    pub fn principal(&self) -> Result<Principal, ClaimsError> {
        let id = Uuid::parse_str(self.sub.trim()).map_err(|_| ClaimsError::Subject)?;
        let role = self
            .role
            .parse::<Role>()
            .map_err(|_| ClaimsError::Role(self.role.clone()))?;
        Ok(Principal::new(id, self.name.trim(), role))
    }
}

/// Registers the `bearerAuth` scheme referenced by the secured paths.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let mut components = openapi.components.clone().unwrap_or(Components::default());
        components.add_security_scheme(
            "bearerAuth",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
        openapi.components = Some(components);
    }
}
