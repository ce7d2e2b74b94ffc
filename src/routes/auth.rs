//! Bearer-token auth extractor.
//!
//! Authentication lives in an external verification service; this module
//! only lifts the `Authorization: Bearer …` header into a verified identity.
//! Use `AuthUser` as a handler parameter to require authentication.

use axum::extract::FromRef;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;

use crate::services::auth::{AuthError, VerifiedUser};
use crate::state::AppState;

/// Authenticated user extracted from the bearer token.
pub struct AuthUser {
    pub user: VerifiedUser,
}

fn bearer_token(parts: &axum::http::request::Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts) else {
            return Err(StatusCode::UNAUTHORIZED);
        };

        let app_state = AppState::from_ref(state);
        let user = app_state.verifier.verify(token).await.map_err(|e| match e {
            AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthError::Upstream(_) | AuthError::Malformed(_) => {
                tracing::error!(error = %e, "identity verification failed");
                StatusCode::BAD_GATEWAY
            }
        })?;

        Ok(Self { user })
    }
}
