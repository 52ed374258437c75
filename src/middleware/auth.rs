//! Session token authentication middleware.
//!
//! This middleware intercepts every ingestion request to:
//! 1. Extract the bearer token from the Authorization header
//! 2. Verify its signature and expiry (stateless, no database access)
//! 3. Inject the establishment identity into the request
//! 4. Reject unauthorized requests with HTTP 401/403

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::{error::AppError, state::AppState};

/// Authentication context attached to authenticated requests.
///
/// Inserted into the request's extension map; ingestion handlers extract it
/// to scope every database operation to the establishment.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Establishment the session token was minted for
    pub establishment_code: String,
}

/// Session token authentication middleware function.
///
/// # Flow
///
/// 1. Extract `Authorization: Bearer <token>` header from request
/// 2. Verify the token with the session service
/// 3. If valid: inject `AuthContext`, call next handler
/// 4. If missing: 401; if invalid or expired: 403
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::MissingToken)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AppError::MissingToken)?;

    let claims = state.sessions.verify(token)?;
    tracing::info!(
        "Session token accepted for establishment {}",
        claims.sub
    );

    request.extensions_mut().insert(AuthContext {
        establishment_code: claims.sub,
    });

    Ok(next.run(request).await)
}
