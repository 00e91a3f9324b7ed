use std::collections::HashSet;
use std::sync::Arc;

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::errors::AppError;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Arc<Vec<u8>>,
    pub exp_hours: i64,
}

impl JwtConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let secret = std::env::var("JWT_SECRET").map_err(|_| AppError::configuration("JWT_SECRET not set"))?;
        let exp_hours = std::env::var("JWT_EXP_HOURS")
            .map(|val| val.parse::<i64>())
            .unwrap_or(Ok(24))
            .map_err(|_| AppError::configuration("JWT_EXP_HOURS must be a valid integer"))?;

        Ok(Self {
            secret: Arc::new(secret.into_bytes()),
            exp_hours,
        })
    }

    pub fn encode(&self, user_id: Uuid, roles: &HashSet<String>) -> Result<String, AppError> {
        use chrono::{Duration, Utc};

        let now = Utc::now();
        let exp = now + Duration::hours(self.exp_hours);

        let claims = Claims {
            sub: user_id,
            roles: roles.iter().cloned().collect(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(&self.secret))
            .map_err(|err| AppError::token_invalid(err.to_string()))
    }

    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::TokenExpired,
                _ => AppError::token_invalid(err.to_string()),
            })
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    /// Role snapshot at issuance time. Informational only: authorization
    /// always re-queries the role store.
    #[serde(default)]
    pub roles: Vec<String>,
    pub iat: i64,
    pub exp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(exp_hours: i64) -> JwtConfig {
        JwtConfig {
            secret: Arc::new(b"unit-test-secret".to_vec()),
            exp_hours,
        }
    }

    #[test]
    fn encode_decode_roundtrip() {
        let cfg = config(1);
        let user_id = Uuid::new_v4();
        let roles: HashSet<String> = ["admin".to_string()].into_iter().collect();

        let token = cfg.encode(user_id, &roles).unwrap();
        let claims = cfg.decode(&token).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.roles, vec!["admin".to_string()]);
    }

    #[test]
    fn expired_token_is_distinguished() {
        let cfg = config(-1);
        let token = cfg.encode(Uuid::new_v4(), &HashSet::new()).unwrap();

        assert!(matches!(cfg.decode(&token), Err(AppError::TokenExpired)));
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let token = config(1).encode(Uuid::new_v4(), &HashSet::new()).unwrap();

        let other = JwtConfig {
            secret: Arc::new(b"different-secret".to_vec()),
            exp_hours: 1,
        };

        assert!(matches!(other.decode(&token), Err(AppError::TokenInvalid(_))));
    }

    #[test]
    fn garbage_token_is_invalid() {
        assert!(matches!(
            config(1).decode("not-a-jwt"),
            Err(AppError::TokenInvalid(_))
        ));
    }
}
