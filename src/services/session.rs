//! Session token minting and verification.
//!
//! A session token is a short-lived HS256 JWT exchanged for a valid API key.
//! Validity is purely a function of signature and expiry; nothing is
//! persisted and a token cannot be revoked before it expires. That trust
//! boundary is accepted: a stolen token remains valid until natural expiry.

use chrono::Utc;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// JWT claims carried by a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Establishment code the token authorizes
    pub sub: String,
    /// Issued at (UTC timestamp)
    pub iat: i64,
    /// Expiration time (UTC timestamp)
    pub exp: i64,
}

/// Stateless signer/verifier for session tokens.
#[derive(Clone)]
pub struct SessionService {
    secret: String,
    ttl_secs: u64,
}

impl SessionService {
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        Self {
            secret: secret.to_string(),
            ttl_secs,
        }
    }

    /// Mint a signed token binding the establishment identity for one TTL.
    pub fn mint(&self, establishment_code: &str) -> Result<String, AppError> {
        self.mint_issued_at(establishment_code, Utc::now().timestamp())
    }

    fn mint_issued_at(&self, establishment_code: &str, iat: i64) -> Result<String, AppError> {
        let claims = SessionClaims {
            sub: establishment_code.to_string(),
            iat,
            exp: iat + self.ttl_secs as i64,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|err| {
            tracing::error!("Failed to sign session token: {err}");
            AppError::TokenCreation
        })
    }

    /// Verify signature and expiry, returning the embedded claims.
    ///
    /// Zero leeway: the TTL is exact, a token one second past `exp` is
    /// rejected with `TokenExpired`.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data = decode::<SessionClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|err| match err.kind() {
            ErrorKind::ExpiredSignature => AppError::TokenExpired,
            _ => AppError::InvalidToken,
        })?;

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> SessionService {
        SessionService::new("unit-test-secret", 3_600)
    }

    #[test]
    fn minted_token_verifies_and_carries_identity() {
        let sessions = service();
        let token = sessions.mint("001").unwrap();
        let claims = sessions.verify(&token).unwrap();
        assert_eq!(claims.sub, "001");
        assert_eq!(claims.exp - claims.iat, 3_600);
    }

    #[test]
    fn expired_token_is_rejected_even_with_valid_signature() {
        let sessions = service();
        // Backdate issuance so the token is already past its TTL.
        let iat = Utc::now().timestamp() - 7_200;
        let token = sessions.mint_issued_at("001", iat).unwrap();
        assert!(matches!(
            sessions.verify(&token),
            Err(AppError::TokenExpired)
        ));
    }

    #[test]
    fn token_signed_with_other_secret_is_invalid() {
        let token = SessionService::new("other-secret", 3_600)
            .mint("001")
            .unwrap();
        assert!(matches!(
            service().verify(&token),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn garbage_token_is_invalid() {
        assert!(matches!(
            service().verify("not.a.jwt"),
            Err(AppError::InvalidToken)
        ));
    }
}
