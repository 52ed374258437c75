//! API key issuance, renewal, and session exchange.
//!
//! Keys are 32 bytes of CSPRNG output, hex-encoded. Only the SHA-256 hash is
//! persisted. Rotation is delete-old-then-insert-new inside one database
//! transaction, so a crash mid-rotation leaves either the old or the new key
//! valid, never both.

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{db::DbPool, error::AppError, models::api_key::ApiKey, services::session::SessionService};

/// A freshly issued key, handed to the caller exactly once.
#[derive(Debug)]
pub struct IssuedKey {
    pub raw_key: String,
    pub expires_at: DateTime<Utc>,
}

/// SHA-256 hex digest of a raw key, the only form that touches the database.
pub fn hash_key(raw_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generate raw key material: 32 random bytes as 64 hex characters.
fn generate_raw_key() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// Issue a new API key for an establishment.
///
/// # Process
///
/// 1. Verify the establishment exists in the system of record
/// 2. Delete any prior key rows for the establishment
/// 3. Insert the new hashed record, expiring after `lifetime_days`
///
/// Steps 2-3 share one transaction, preserving the invariant of at most one
/// active key per establishment.
///
/// # Errors
///
/// - `EstablishmentNotFound`: unknown establishment code
/// - `Database`: database error occurred
pub async fn issue(
    pool: &DbPool,
    establishment_code: &str,
    lifetime_days: i64,
) -> Result<IssuedKey, AppError> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM establishments WHERE code = $1)")
            .bind(establishment_code)
            .fetch_one(pool)
            .await?;

    if !exists {
        return Err(AppError::EstablishmentNotFound);
    }

    let raw_key = generate_raw_key();
    let key_hash = hash_key(&raw_key);
    let expires_at = Utc::now() + Duration::days(lifetime_days);

    let mut tx = pool.begin().await?;

    let replaced = sqlx::query("DELETE FROM api_keys WHERE establishment_code = $1")
        .bind(establishment_code)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    if replaced > 0 {
        tracing::info!(
            "Replaced {replaced} prior API key(s) for establishment {establishment_code}"
        );
    }

    sqlx::query(
        r#"
        INSERT INTO api_keys (establishment_code, key_hash, expires_at, is_active)
        VALUES ($1, $2, $3, TRUE)
        "#,
    )
    .bind(establishment_code)
    .bind(&key_hash)
    .bind(expires_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!("API key issued for establishment {establishment_code}");
    Ok(IssuedKey { raw_key, expires_at })
}

/// Renew an API key after re-validating the currently held one.
///
/// The presented key must hash-match an active, unexpired record for the
/// establishment; anything else is `InvalidApiKey`. On success the old
/// record is rotated out and a fresh key returned.
pub async fn renew(
    pool: &DbPool,
    establishment_code: &str,
    current_raw_key: &str,
    lifetime_days: i64,
) -> Result<IssuedKey, AppError> {
    let current_hash = hash_key(current_raw_key);

    let current = sqlx::query_as::<_, ApiKey>(
        r#"
        SELECT id, establishment_code, key_hash, expires_at, is_active, created_at
        FROM api_keys
        WHERE establishment_code = $1
          AND key_hash = $2
          AND is_active = TRUE
          AND expires_at > NOW()
        "#,
    )
    .bind(establishment_code)
    .bind(&current_hash)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::InvalidApiKey)?;

    let issued = rotate(pool, current.id, establishment_code, lifetime_days).await?;
    tracing::info!("API key renewed for establishment {establishment_code}");
    Ok(issued)
}

/// Rotate a key: delete the old record and insert a fresh one atomically.
///
/// Shared by client-initiated renewal and the scheduled renewal job.
pub async fn rotate(
    pool: &DbPool,
    current_id: Uuid,
    establishment_code: &str,
    lifetime_days: i64,
) -> Result<IssuedKey, AppError> {
    let raw_key = generate_raw_key();
    let key_hash = hash_key(&raw_key);
    let expires_at = Utc::now() + Duration::days(lifetime_days);

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM api_keys WHERE id = $1")
        .bind(current_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO api_keys (establishment_code, key_hash, expires_at, is_active)
        VALUES ($1, $2, $3, TRUE)
        "#,
    )
    .bind(establishment_code)
    .bind(&key_hash)
    .bind(expires_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(IssuedKey { raw_key, expires_at })
}

/// Exchange a valid API key for a session token.
///
/// Requires an active, unexpired record whose hash matches the presented
/// key. Returns the establishment code and the minted token.
pub async fn exchange_for_session(
    pool: &DbPool,
    sessions: &SessionService,
    raw_key: &str,
) -> Result<(String, String), AppError> {
    let key_hash = hash_key(raw_key);

    let key = sqlx::query_as::<_, ApiKey>(
        r#"
        SELECT id, establishment_code, key_hash, expires_at, is_active, created_at
        FROM api_keys
        WHERE key_hash = $1
          AND is_active = TRUE
          AND expires_at > NOW()
        "#,
    )
    .bind(&key_hash)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::InvalidApiKey)?;

    let token = sessions.mint(&key.establishment_code)?;
    Ok((key.establishment_code, token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_key_matches_known_sha256_vector() {
        assert_eq!(
            hash_key("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn hash_key_is_deterministic() {
        assert_eq!(hash_key("same-input"), hash_key("same-input"));
        assert_ne!(hash_key("one"), hash_key("two"));
    }

    #[test]
    fn generated_keys_are_64_hex_chars_and_unique() {
        let a = generate_raw_key();
        let b = generate_raw_key();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
