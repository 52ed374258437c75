//! Login handler: exchanges an API key for a session token.

use axum::{Json, extract::State, http::HeaderMap};
use serde::Serialize;

use crate::{error::AppError, services::key_service, state::AppState};

/// Response body for a successful login.
///
/// # JSON Example
///
/// ```json
/// {
///   "message": "Token generado",
///   "token": "eyJhbGciOi..."
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
}

/// Exchange an API key for a short-lived session token.
///
/// # Endpoint
///
/// `POST /auth/login` with header `x-api-key: <raw key>`
///
/// # Response
///
/// - **200 OK**: `{ message, token }`
/// - **401**: missing `x-api-key` header
/// - **403**: key unknown, deactivated, or expired
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<LoginResponse>, AppError> {
    let api_key = headers
        .get("x-api-key")
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::MissingApiKey)?;

    let (establishment_code, token) =
        key_service::exchange_for_session(&state.pool, &state.sessions, api_key).await?;

    tracing::info!("Session token issued for establishment {establishment_code}");

    Ok(Json(LoginResponse {
        message: "Token generado".to_string(),
        token,
    }))
}
