//! External identity-provider verification.
//!
//! The OAuth handshake itself is a black box: all this module needs back
//! is a verified email address and display name. The verifier is an
//! explicitly constructed object carried in the application config, so
//! tests swap in a stub and nothing lives in module-level state.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::errors::{AppError, AppResult};

const TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    pub email: String,
    pub full_name: Option<String>,
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, id_token: &str) -> AppResult<VerifiedIdentity>;
}

/// Verifies Google ID tokens against the tokeninfo endpoint and checks
/// the audience against our client id.
pub struct GoogleTokenVerifier {
    client_id: String,
    http: reqwest::Client,
}

impl GoogleTokenVerifier {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            http: reqwest::Client::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: String,
    email: String,
    email_verified: Option<String>,
    name: Option<String>,
}

#[async_trait]
impl IdentityVerifier for GoogleTokenVerifier {
    async fn verify(&self, id_token: &str) -> AppResult<VerifiedIdentity> {
        let response = self
            .http
            .get(TOKENINFO_URL)
            .query(&[("id_token", id_token)])
            .send()
            .await
            .map_err(|err| AppError::internal(format!("token verification request failed: {err}")))?;

        if !response.status().is_success() {
            return Err(AppError::token_invalid("identity provider rejected the token"));
        }

        let info: TokenInfo = response
            .json()
            .await
            .map_err(|err| AppError::token_invalid(format!("malformed tokeninfo response: {err}")))?;

        if info.aud != self.client_id {
            return Err(AppError::token_invalid("token was not issued for this application"));
        }

        if info.email_verified.as_deref() != Some("true") {
            return Err(AppError::token_invalid("email address is not verified"));
        }

        Ok(VerifiedIdentity {
            email: info.email,
            full_name: info.name,
        })
    }
}

/// External identity-provider settings: the verifier plus the corporate
/// domain allowlist applied before auto-provisioning a user.
#[derive(Clone)]
pub struct OAuthConfig {
    pub allowed_domain: String,
    pub verifier: Arc<dyn IdentityVerifier>,
}

impl OAuthConfig {
    /// Reads `GOOGLE_CLIENT_ID` and `OAUTH_ALLOWED_DOMAIN`. Returns
    /// `None` when no client id is configured; the login endpoint then
    /// reports a configuration error instead of guessing.
    pub fn from_env() -> Result<Option<Self>, AppError> {
        let client_id = match std::env::var("GOOGLE_CLIENT_ID") {
            Ok(id) if !id.is_empty() => id,
            _ => return Ok(None),
        };

        let allowed_domain = std::env::var("OAUTH_ALLOWED_DOMAIN")
            .map_err(|_| AppError::configuration("OAUTH_ALLOWED_DOMAIN not set"))?;

        Ok(Some(Self {
            allowed_domain,
            verifier: Arc::new(GoogleTokenVerifier::new(client_id)),
        }))
    }
}
