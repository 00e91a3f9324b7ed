//! Authentication - credential transports and identity resolution
//!
//! Two credential transports are supported, selected by configuration
//! rather than hardwired: self-contained signed JWTs ([`token`]) and
//! opaque server-side sessions ([`session`]). Both resolve to a user id;
//! [`identity`] then re-fetches the user and its live role set, so a
//! role revocation takes effect on the very next request regardless of
//! what an outstanding token claims.

pub mod identity;
pub mod session;
pub mod token;
pub mod verifier;

use std::collections::HashSet;

use sqlx::SqlitePool;
use uuid::Uuid;

pub use identity::AuthUser;
pub use token::{Claims, JwtConfig};

use crate::errors::{AppError, AppResult};

const DEFAULT_SESSION_TTL_HOURS: i64 = 24;

/// Credential transport for the deployment. The two modes are mutually
/// exclusive; a running instance issues and accepts one kind of token.
#[derive(Debug, Clone)]
pub enum AuthMode {
    /// Signed bearer tokens (JWT, HS256).
    Bearer(JwtConfig),
    /// Opaque tokens resolved against server-side session state.
    Session { ttl_hours: i64 },
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub mode: AuthMode,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let mode = match std::env::var("AUTH_MODE").unwrap_or_default().to_lowercase().as_str() {
            "session" => {
                let ttl_hours = std::env::var("SESSION_TTL_HOURS")
                    .map(|val| val.parse::<i64>())
                    .unwrap_or(Ok(DEFAULT_SESSION_TTL_HOURS))
                    .map_err(|_| AppError::configuration("SESSION_TTL_HOURS must be a valid integer"))?;
                AuthMode::Session { ttl_hours }
            }
            _ => AuthMode::Bearer(JwtConfig::from_env()?),
        };

        Ok(Self { mode })
    }

    /// Issue a credential for a freshly authenticated user. The role
    /// snapshot goes into JWT claims as issuance metadata only; it is
    /// never consulted for authorization.
    pub async fn issue(
        &self,
        pool: &SqlitePool,
        user_id: Uuid,
        roles: &HashSet<String>,
    ) -> AppResult<String> {
        match &self.mode {
            AuthMode::Bearer(jwt) => jwt.encode(user_id, roles),
            AuthMode::Session { ttl_hours } => session::create(pool, user_id, *ttl_hours).await,
        }
    }

    /// Resolve a presented credential to its subject id. Callers must
    /// still re-fetch the user and roles; see [`identity::AuthUser`].
    pub async fn resolve_subject(&self, pool: &SqlitePool, token: &str) -> AppResult<Uuid> {
        match &self.mode {
            AuthMode::Bearer(jwt) => Ok(jwt.decode(token)?.sub),
            AuthMode::Session { .. } => session::resolve(pool, token).await,
        }
    }

    /// Invalidate a credential on logout. Bearer tokens are
    /// self-contained and simply expire; sessions are deleted.
    pub async fn invalidate(&self, pool: &SqlitePool, token: &str) -> AppResult<()> {
        match &self.mode {
            AuthMode::Bearer(_) => Ok(()),
            AuthMode::Session { .. } => session::destroy(pool, token).await,
        }
    }
}
