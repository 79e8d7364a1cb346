use axum::{
    body::Body,
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde_json::json;

use crate::api::auth::Claims;
use crate::config::Config;
use crate::utils::api_response::ApiResponse;
use crate::workflow::principal::Principal;

/// Verifies a bearer token and resolves the caller it names.
pub fn decode_principal(token: &str, secret: &str) -> Result<Principal, ApiResponse<()>> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        tracing::error!("JWT decoding failed: {:?}", e);
        ApiResponse::error(
            StatusCode::UNAUTHORIZED,
            "Invalid token",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    token_data.claims.principal().map_err(|e| {
        tracing::error!("Unusable JWT claims: {}", e);
        ApiResponse::error(StatusCode::UNAUTHORIZED, e.to_string(), None)
    })
}

/// JWT Middleware: puts the caller's [`Principal`] into request extensions.
pub async fn jwt_middleware(mut req: Request<Body>, next: Next) -> Result<Response, Response> {
    let auth_header = req.headers().get("Authorization").ok_or_else(|| {
        tracing::error!("Missing Authorization header");
        ApiResponse::<()>::error(StatusCode::UNAUTHORIZED, "Missing Authorization header", None)
            .into_response()
    })?;

    let token_str = auth_header.to_str().map_err(|_| {
        tracing::error!("Invalid Authorization header format");
        ApiResponse::<()>::error(StatusCode::BAD_REQUEST, "Invalid Authorization header format", None)
            .into_response()
    })?;

    let token = token_str.strip_prefix("Bearer ").ok_or_else(|| {
        tracing::error!("Invalid token format (missing 'Bearer ' prefix)");
        ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "Invalid token format (missing 'Bearer ' prefix)",
            None,
        )
        .into_response()
    })?;

    let principal =
        decode_principal(token, &Config::get().jwt_secret).map_err(IntoResponse::into_response)?;

    tracing::debug!(user_id = %principal.id, role = %principal.role, "JWT decoded");
    req.extensions_mut().insert(principal);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::submission::Role;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use uuid::Uuid;

    const SECRET: &str = "test-secret";

    fn token(sub: &str, role: &str, secret: &str) -> String {
        let claims = Claims {
            sub: sub.into(),
            name: "Rahul Sharma".into(),
            role: role.into(),
            exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn valid_token_yields_principal() {
        let id = Uuid::new_v4();
        let principal = decode_principal(&token(&id.to_string(), "teacher", SECRET), SECRET).unwrap();
        assert_eq!(principal, Principal::new(id, "Rahul Sharma", Role::Teacher));
    }

    #[test]
    fn wrong_secret_is_unauthorized() {
        let err = decode_principal(&token(&Uuid::new_v4().to_string(), "teacher", "other"), SECRET)
            .unwrap_err();
        assert_eq!(err.status_code, 401);
    }

    #[test]
    fn unknown_role_is_unauthorized() {
        let err = decode_principal(&token(&Uuid::new_v4().to_string(), "janitor", SECRET), SECRET)
            .unwrap_err();
        assert_eq!(err.status_code, 401);
    }
}
