//! Opaque server-side sessions.
//!
//! The raw token handed to the client is 32 random bytes, hex-encoded;
//! only its SHA-256 hash is stored, so a leaked sessions table cannot be
//! replayed.

use chrono::Duration;
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::utils::utc_now;

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn hash_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

pub async fn create(pool: &SqlitePool, user_id: Uuid, ttl_hours: i64) -> AppResult<String> {
    let raw = generate_token();
    let now = utc_now();

    sqlx::query(
        "INSERT INTO sessions (id, token_hash, user_id, created_at, expires_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4())
    .bind(hash_token(&raw))
    .bind(user_id)
    .bind(now)
    .bind(now + Duration::hours(ttl_hours))
    .execute(pool)
    .await?;

    Ok(raw)
}

pub async fn resolve(pool: &SqlitePool, raw: &str) -> AppResult<Uuid> {
    let row: Option<(Uuid, chrono::DateTime<chrono::Utc>)> =
        sqlx::query_as("SELECT user_id, expires_at FROM sessions WHERE token_hash = ?")
            .bind(hash_token(raw))
            .fetch_optional(pool)
            .await?;

    let (user_id, expires_at) = row.ok_or_else(|| AppError::token_invalid("unknown session token"))?;

    if utc_now() > expires_at {
        // Expired rows are dead weight; drop them on discovery.
        sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
            .bind(hash_token(raw))
            .execute(pool)
            .await?;
        return Err(AppError::TokenExpired);
    }

    Ok(user_id)
}

pub async fn destroy(pool: &SqlitePool, raw: &str) -> AppResult<()> {
    sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
        .bind(hash_token(raw))
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_hash_is_deterministic() {
        let raw = "deadbeef";
        assert_eq!(hash_token(raw), hash_token(raw));
    }

    #[test]
    fn different_tokens_different_hashes() {
        assert_ne!(hash_token("token-a"), hash_token("token-b"));
    }

    #[test]
    fn generated_tokens_are_unique_and_opaque() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
    }
}
