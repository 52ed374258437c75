//! API key lifecycle HTTP handlers.
//!
//! This module implements the credential endpoints:
//! - POST /api/keys/request - issue a key for an establishment
//! - POST /api/keys/renew - rotate a key the establishment still holds

use axum::{Json, extract::State, http::StatusCode};

use crate::{
    error::AppError,
    models::api_key::{ApiKeyResponse, IssueKeyRequest, RenewKeyRequest},
    services::key_service,
    state::AppState,
};

/// Issue a new API key.
///
/// # Endpoint
///
/// `POST /api/keys/request`
///
/// # Request Body
///
/// ```json
/// { "codestablecimiento": "001" }
/// ```
///
/// # Response
///
/// - **201 Created**: `{ message, apiKey, expiresAt }` - the raw key is
///   returned here and never again
/// - **400**: blank establishment code
/// - **404**: establishment not in the system of record
///
/// Any key the establishment previously held is replaced.
pub async fn request_api_key(
    State(state): State<AppState>,
    Json(request): Json<IssueKeyRequest>,
) -> Result<(StatusCode, Json<ApiKeyResponse>), AppError> {
    if request.establishment_code.trim().is_empty() {
        return Err(AppError::MalformedPayload(
            "El codestablecimiento es obligatorio".to_string(),
        ));
    }

    let issued = key_service::issue(
        &state.pool,
        &request.establishment_code,
        state.config.api_key_lifetime_days,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiKeyResponse {
            message: "API Key generado".to_string(),
            api_key: issued.raw_key,
            expires_at: issued.expires_at,
        }),
    ))
}

/// Renew an API key.
///
/// # Endpoint
///
/// `POST /api/keys/renew`
///
/// # Request Body
///
/// ```json
/// { "codestablecimiento": "001", "currentApiKey": "3f1a..." }
/// ```
///
/// # Response
///
/// - **201 Created**: `{ message, apiKey, expiresAt }`
/// - **400**: missing fields
/// - **403**: presented key fails validation (wrong, inactive, or expired)
///
/// After a successful renewal the old key can no longer authenticate.
pub async fn renew_api_key(
    State(state): State<AppState>,
    Json(request): Json<RenewKeyRequest>,
) -> Result<(StatusCode, Json<ApiKeyResponse>), AppError> {
    if request.establishment_code.trim().is_empty() || request.current_api_key.trim().is_empty() {
        return Err(AppError::MalformedPayload(
            "codestablecimiento y currentApiKey son obligatorios".to_string(),
        ));
    }

    let issued = key_service::renew(
        &state.pool,
        &request.establishment_code,
        &request.current_api_key,
        state.config.api_key_lifetime_days,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiKeyResponse {
            message: "API Key renovado".to_string(),
            api_key: issued.raw_key,
            expires_at: issued.expires_at,
        }),
    ))
}
