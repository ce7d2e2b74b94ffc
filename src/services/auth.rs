//! Identity verification — the external token-verification collaborator.
//!
//! ARCHITECTURE
//! ============
//! This server never mints or stores credentials. Every request carries a
//! bearer token issued elsewhere; `IdentityVerifier` exchanges it for a
//! verified subject id plus display attributes, or fails. The HTTP
//! implementation calls the configured verification endpoint; tests inject
//! a static verifier instead.

use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid or expired token")]
    Unauthorized,
    #[error("verifier request failed: {0}")]
    Upstream(String),
    #[error("verifier returned malformed identity: {0}")]
    Malformed(String),
}

/// Verified subject identity returned by the external service.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifiedUser {
    /// Subject id; boards are owned and scoped by this.
    pub id: Uuid,
    /// Display name used for presence.
    pub name: String,
}

/// Exchange a bearer credential for a verified identity.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<VerifiedUser, AuthError>;
}

// =============================================================================
// HTTP IMPLEMENTATION
// =============================================================================

/// Verifier backed by an HTTP endpoint (`AUTH_VERIFY_URL`).
pub struct HttpVerifier {
    endpoint: String,
    http: reqwest::Client,
}

impl HttpVerifier {
    #[must_use]
    pub fn new(endpoint: String) -> Self {
        Self { endpoint, http: reqwest::Client::new() }
    }

    /// Build from `AUTH_VERIFY_URL`.
    ///
    /// # Errors
    ///
    /// Returns an error message when the variable is unset.
    pub fn from_env() -> Result<Self, String> {
        let endpoint = std::env::var("AUTH_VERIFY_URL").map_err(|_| "AUTH_VERIFY_URL required".to_owned())?;
        Ok(Self::new(endpoint))
    }
}

#[async_trait]
impl IdentityVerifier for HttpVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedUser, AuthError> {
        let response = self
            .http
            .get(&self.endpoint)
            .bearer_auth(token)
            .header("User-Agent", "syncboard")
            .send()
            .await
            .map_err(|e| AuthError::Upstream(e.to_string()))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AuthError::Unauthorized);
        }
        if !response.status().is_success() {
            return Err(AuthError::Upstream(format!("verifier status {}", response.status())));
        }

        response
            .json::<VerifiedUser>()
            .await
            .map_err(|e| AuthError::Malformed(e.to_string()))
    }
}
