//! Dataset ingestion HTTP handlers.
//!
//! This module implements the batch upload endpoints:
//! - POST /api/medications - medication inventory batches
//! - POST /api/services - SIAF service usage batches
//!
//! Both require a bearer session token; the establishment identity comes
//! from the token, never from the payload.

use axum::{Extension, Json, extract::State};

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::{
        batch::{BatchEnvelope, IngestResponse},
        medication::MedicationRow,
        service_record::ServiceRow,
    },
    services::ingest_service::{self, BatchOutcome},
    state::AppState,
};

/// Receive one medication inventory batch.
///
/// # Endpoint
///
/// `POST /api/medications` with `Authorization: Bearer <token>`
///
/// # Response
///
/// - **200 OK**: `{ "message": "Lote N procesado con éxito." }` - also
///   returned for deduplicated retries
/// - **400**: empty `datos` or batch index outside the declared round
/// - **401/403**: session failures (middleware)
/// - **500**: batch rolled back, client should re-send it
pub async fn receive_medications(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(envelope): Json<BatchEnvelope<MedicationRow>>,
) -> Result<Json<IngestResponse>, AppError> {
    tracing::info!(
        "Medications batch {}/{} ({} row(s), {} declared total) for establishment {}",
        envelope.batch_number,
        envelope.total_batches,
        envelope.rows.len(),
        envelope.total_rows,
        auth.establishment_code
    );

    let outcome = ingest_service::apply_medications_batch(
        &state.pool,
        &auth.establishment_code,
        &envelope,
        state.config.round_staleness(),
    )
    .await?;

    if outcome == BatchOutcome::Duplicate {
        tracing::info!(
            "Medications batch {} already applied for establishment {}; acknowledged without changes",
            envelope.batch_number,
            auth.establishment_code
        );
    }

    Ok(Json(IngestResponse {
        message: format!("Lote {} procesado con éxito.", envelope.batch_number),
    }))
}

/// Receive one SIAF services batch.
///
/// Same protocol and responses as the medications endpoint.
pub async fn receive_services(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(envelope): Json<BatchEnvelope<ServiceRow>>,
) -> Result<Json<IngestResponse>, AppError> {
    tracing::info!(
        "Services batch {}/{} ({} row(s), {} declared total) for establishment {}",
        envelope.batch_number,
        envelope.total_batches,
        envelope.rows.len(),
        envelope.total_rows,
        auth.establishment_code
    );

    let outcome = ingest_service::apply_services_batch(
        &state.pool,
        &auth.establishment_code,
        &envelope,
        state.config.round_staleness(),
    )
    .await?;

    if outcome == BatchOutcome::Duplicate {
        tracing::info!(
            "Services batch {} already applied for establishment {}; acknowledged without changes",
            envelope.batch_number,
            auth.establishment_code
        );
    }

    Ok(Json(IngestResponse {
        message: format!("Lote {} procesado con éxito.", envelope.batch_number),
    }))
}
