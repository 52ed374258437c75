//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.
//!
//! Client-facing messages on the credential and ingestion paths keep the
//! Spanish wording of the upstream establishment protocol.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Store errors**: any sqlx::Error from database operations
/// - **Credential errors**: missing, invalid, or expired API keys
/// - **Session errors**: missing, invalid, or expired bearer tokens
/// - **Payload errors**: malformed ingestion envelopes
/// - **Ingestion errors**: failed batch writes (client should retry)
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (connection error, query error).
    ///
    /// Wraps any sqlx::Error via `#[from]`. Details are logged but hidden
    /// from the client.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// No `x-api-key` header on a login request.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("API Key requerida")]
    MissingApiKey,

    /// API key failed validation: unknown hash, deactivated, or past expiry.
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("API Key inválido o expirado")]
    InvalidApiKey,

    /// Establishment code is not present in the system of record.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("El codestablecimiento no existe en la base de datos")]
    EstablishmentNotFound,

    /// No bearer token on an ingestion request.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Token requerido")]
    MissingToken,

    /// Session token has a bad signature or shape.
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("Token inválido o expirado")]
    InvalidToken,

    /// Session token is past its expiry.
    ///
    /// Returns HTTP 403 Forbidden. Same client-facing message as
    /// `InvalidToken`; the distinction only shows up in logs.
    #[error("Token inválido o expirado")]
    TokenExpired,

    /// Ingestion envelope violates the protocol shape.
    ///
    /// Returns HTTP 400 Bad Request with details.
    #[error("{0}")]
    MalformedPayload(String),

    /// A batch insert failed and was rolled back.
    ///
    /// Returns HTTP 500; the client is expected to re-send the batch.
    #[error("Error al insertar el lote {batch}")]
    InsertionFailed { batch: u32 },

    /// Session token could not be signed.
    ///
    /// Returns HTTP 500 Internal Server Error.
    #[error("Error al generar el token")]
    TokenCreation,
}

/// Convert AppError into an HTTP response.
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Map each error variant to (HTTP status, error code, message)
        let (status, code, message) = match self {
            AppError::MissingApiKey => {
                (StatusCode::UNAUTHORIZED, "missing_api_key", self.to_string())
            }
            AppError::InvalidApiKey => {
                (StatusCode::FORBIDDEN, "invalid_api_key", self.to_string())
            }
            AppError::EstablishmentNotFound => (
                StatusCode::NOT_FOUND,
                "establishment_not_found",
                self.to_string(),
            ),
            AppError::MissingToken => {
                (StatusCode::UNAUTHORIZED, "missing_token", self.to_string())
            }
            AppError::InvalidToken => (StatusCode::FORBIDDEN, "invalid_token", self.to_string()),
            AppError::TokenExpired => (StatusCode::FORBIDDEN, "token_expired", self.to_string()),
            AppError::MalformedPayload(ref msg) => {
                (StatusCode::BAD_REQUEST, "malformed_payload", msg.clone())
            }
            AppError::InsertionFailed { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "insertion_failed",
                self.to_string(),
            ),
            AppError::TokenCreation => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "token_creation_failed",
                self.to_string(),
            ),
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "An internal error occurred".to_string(),
            ),
        };

        // Build JSON response body
        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_errors_map_to_client_statuses() {
        assert_eq!(
            AppError::MissingApiKey.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::InvalidApiKey.into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::EstablishmentNotFound.into_response().status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn session_errors_distinguish_missing_from_invalid() {
        assert_eq!(
            AppError::MissingToken.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::InvalidToken.into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::TokenExpired.into_response().status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn ingestion_errors_map_to_retry_semantics() {
        // 400: the client must fix the payload, not retry it as-is.
        assert_eq!(
            AppError::MalformedPayload("x".into())
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        // 500: the batch rolled back and should be re-sent.
        assert_eq!(
            AppError::InsertionFailed { batch: 3 }.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
