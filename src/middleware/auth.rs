//! Authentication extractors
//!
//! Resolve the caller once from the bearer token. Handlers receive a typed
//! [`Principal`] and pass it on explicitly.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use serde::Serialize;
use std::sync::Arc;

use crate::auth::{verify_token, JwtError, TokenKeys};
use crate::models::Principal;

/// Error response for authentication failures
#[derive(Debug, Serialize)]
struct AuthError {
    error: AuthErrorDetails,
}

#[derive(Debug, Serialize)]
struct AuthErrorDetails {
    code: String,
    message: String,
}

impl AuthError {
    fn new(code: &str, message: &str) -> Self {
        Self {
            error: AuthErrorDetails {
                code: code.to_string(),
                message: message.to_string(),
            },
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = if self.error.code == "FORBIDDEN" {
            StatusCode::FORBIDDEN
        } else {
            StatusCode::UNAUTHORIZED
        };
        (status, Json(self)).into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    Arc<TokenKeys>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| {
                    AuthError::new(
                        "MISSING_TOKEN",
                        "Authorization header with Bearer token required",
                    )
                    .into_response()
                })?;

        let keys = Arc::<TokenKeys>::from_ref(state);

        let claims = verify_token(bearer.token(), keys.secret()).map_err(|e| {
            let (code, message) = match e {
                JwtError::TokenExpired => ("TOKEN_EXPIRED", "Token has expired"),
                _ => ("INVALID_TOKEN", "Invalid token"),
            };
            AuthError::new(code, message).into_response()
        })?;

        claims.principal().map_err(|_| {
            AuthError::new("INVALID_TOKEN", "Invalid tenant ID in token").into_response()
        })
    }
}

/// A caller holding the admin role
#[derive(Debug, Clone, Copy)]
pub struct AdminPrincipal(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for AdminPrincipal
where
    Arc<TokenKeys>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let principal = Principal::from_request_parts(parts, state).await?;

        if !principal.is_admin() {
            return Err(AuthError::new("FORBIDDEN", "Admin access required").into_response());
        }

        Ok(AdminPrincipal(principal))
    }
}
