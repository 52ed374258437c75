//! Batch ingestion controller - replace-then-insert across a multi-batch round.
//!
//! A round is the full upload sequence that replaces one establishment's
//! dataset. The first batch of a round (`loteNumero == 1`) deletes the prior
//! dataset exactly once; every batch inserts its rows within one database
//! transaction, so a failed batch rolls back completely while earlier
//! committed batches of the same round stay committed.
//!
//! # Round state
//!
//! The replace flag lives in the `upload_rounds` table, one row per
//! establishment+dataset, locked with `SELECT ... FOR UPDATE` at the start of
//! every batch. The row lock serializes concurrent batches for the same
//! establishment+dataset, and because the marker is persisted the protocol
//! survives restarts and multiple server instances.
//!
//! # Delivery semantics
//!
//! At-least-once delivery with idempotent application: retried batches are
//! deduplicated by their sequence index within the open round, so a client
//! re-sending after a network failure neither re-triggers the delete nor
//! duplicates rows. A round left incomplete longer than the staleness window
//! counts as abandoned and the next first batch starts fresh.

use chrono::{DateTime, Duration, Utc};
use sqlx::{Postgres, Transaction};

use crate::{
    db::DbPool,
    error::AppError,
    models::{batch::BatchEnvelope, medication::MedicationRow, service_record::ServiceRow},
};

/// Dataset kinds sharing the round-replace protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dataset {
    Medications,
    SiafServices,
}

impl Dataset {
    /// Marker value stored in `upload_rounds.dataset`.
    fn as_str(self) -> &'static str {
        match self {
            Dataset::Medications => "medications",
            Dataset::SiafServices => "siaf_services",
        }
    }
}

/// What happened to an accepted batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Rows were written (after a delete, if this opened the round).
    Applied,
    /// The batch index was already applied this round; nothing changed.
    Duplicate,
}

/// What to do with an arriving batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RoundAction {
    /// First batch of a new round: delete prior rows, then insert.
    Replace,
    /// Later batch of the current round: insert only.
    Append,
    /// Index already applied in the open round: acknowledge, change nothing.
    Duplicate,
}

/// Round marker row - the persisted replace flag for one establishment+dataset.
#[derive(Debug, Clone, sqlx::FromRow)]
struct RoundMarker {
    total_batches: i32,
    batches_seen: Vec<i32>,
    opened_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

/// A marker is an open round only while it is unfinished, young enough, and
/// has actually applied its first batch. A sentinel row created by the
/// lock-acquisition insert has an empty `batches_seen` and does not count.
fn is_open(marker: &RoundMarker, now: DateTime<Utc>, stale_after: Duration) -> bool {
    marker.completed_at.is_none()
        && !marker.batches_seen.is_empty()
        && now - marker.opened_at < stale_after
}

/// Decide the action for a batch given the round state.
///
/// The first-batch marker is the batch's declared position, never arrival
/// order or wall clock.
fn decide(open: bool, batches_seen: &[i32], batch_number: i32) -> RoundAction {
    if batch_number == 1 {
        if open {
            // The delete already ran this round; a retried first batch must
            // not run it again over rows inserted by later batches.
            RoundAction::Duplicate
        } else {
            RoundAction::Replace
        }
    } else if open && batches_seen.contains(&batch_number) {
        RoundAction::Duplicate
    } else {
        RoundAction::Append
    }
}

/// Compute the marker state to persist after applying a batch.
///
/// Returns `None` when the marker should be left untouched: duplicates, and
/// appends outside an open round (a client violating the protocol; rows are
/// still written, last-writer-wins).
fn advance(
    marker: &RoundMarker,
    open: bool,
    action: RoundAction,
    batch_number: i32,
    total_batches: i32,
    now: DateTime<Utc>,
) -> Option<RoundMarker> {
    match action {
        RoundAction::Duplicate => None,
        RoundAction::Replace => {
            let batches_seen = vec![1];
            let completed_at = round_complete(&batches_seen, total_batches).then_some(now);
            Some(RoundMarker {
                total_batches,
                batches_seen,
                opened_at: now,
                completed_at,
            })
        }
        RoundAction::Append if open => {
            let mut batches_seen = marker.batches_seen.clone();
            batches_seen.push(batch_number);
            let completed_at =
                round_complete(&batches_seen, marker.total_batches).then_some(now);
            Some(RoundMarker {
                total_batches: marker.total_batches,
                batches_seen,
                opened_at: marker.opened_at,
                completed_at,
            })
        }
        RoundAction::Append => None,
    }
}

/// Every index 1..=total has been applied.
fn round_complete(batches_seen: &[i32], total_batches: i32) -> bool {
    (1..=total_batches).all(|index| batches_seen.contains(&index))
}

/// Reject envelopes that violate the protocol shape before touching the store.
fn validate_header<T>(envelope: &BatchEnvelope<T>) -> Result<(), AppError> {
    if envelope.rows.is_empty() {
        return Err(AppError::MalformedPayload(
            "Formato de datos inválido. Se esperaba un arreglo no vacío.".to_string(),
        ));
    }
    if envelope.batch_number < 1 || envelope.batch_number > envelope.total_batches {
        return Err(AppError::MalformedPayload(format!(
            "loteNumero {} fuera de rango (totalLotes {})",
            envelope.batch_number, envelope.total_batches
        )));
    }
    Ok(())
}

/// Counts reported fractionally upstream are truncated, not rounded.
pub(crate) fn floor_count(value: f64) -> i64 {
    value.floor() as i64
}

/// Acquire the round row lock, creating a sentinel marker if none exists.
///
/// The `ON CONFLICT DO NOTHING` insert guarantees a row is present to lock,
/// so concurrent batches for the same establishment+dataset serialize here
/// instead of racing the check-then-set.
async fn lock_round(
    tx: &mut Transaction<'_, Postgres>,
    establishment_code: &str,
    dataset: Dataset,
    total_batches: i32,
) -> Result<RoundMarker, AppError> {
    sqlx::query(
        r#"
        INSERT INTO upload_rounds (establishment_code, dataset, total_batches)
        VALUES ($1, $2, $3)
        ON CONFLICT (establishment_code, dataset) DO NOTHING
        "#,
    )
    .bind(establishment_code)
    .bind(dataset.as_str())
    .bind(total_batches)
    .execute(&mut **tx)
    .await?;

    let marker = sqlx::query_as::<_, RoundMarker>(
        r#"
        SELECT total_batches, batches_seen, opened_at, completed_at
        FROM upload_rounds
        WHERE establishment_code = $1 AND dataset = $2
        FOR UPDATE
        "#,
    )
    .bind(establishment_code)
    .bind(dataset.as_str())
    .fetch_one(&mut **tx)
    .await?;

    Ok(marker)
}

/// Persist the advanced marker state.
async fn store_round(
    tx: &mut Transaction<'_, Postgres>,
    establishment_code: &str,
    dataset: Dataset,
    marker: &RoundMarker,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE upload_rounds
        SET total_batches = $3, batches_seen = $4, opened_at = $5, completed_at = $6
        WHERE establishment_code = $1 AND dataset = $2
        "#,
    )
    .bind(establishment_code)
    .bind(dataset.as_str())
    .bind(marker.total_batches)
    .bind(&marker.batches_seen)
    .bind(marker.opened_at)
    .bind(marker.completed_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Apply one medication batch for an establishment.
///
/// All steps - round gate, optional delete, row inserts, marker bookkeeping -
/// run in a single transaction: either the whole batch lands or none of it.
pub async fn apply_medications_batch(
    pool: &DbPool,
    establishment_code: &str,
    envelope: &BatchEnvelope<MedicationRow>,
    stale_after: Duration,
) -> Result<BatchOutcome, AppError> {
    validate_header(envelope)?;

    let batch_number = envelope.batch_number as i32;
    let total_batches = envelope.total_batches as i32;
    let now = Utc::now();

    let mut tx = pool.begin().await?;
    let marker = lock_round(&mut tx, establishment_code, Dataset::Medications, total_batches).await?;

    let open = is_open(&marker, now, stale_after);
    let action = decide(open, &marker.batches_seen, batch_number);

    if action == RoundAction::Duplicate {
        tx.commit().await?;
        return Ok(BatchOutcome::Duplicate);
    }

    if action == RoundAction::Replace {
        let purged = sqlx::query("DELETE FROM medications WHERE establishment_code = $1")
            .bind(establishment_code)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tracing::info!(
            "New medications round for establishment {establishment_code}: {purged} prior row(s) removed"
        );
    }

    insert_medications(&mut tx, establishment_code, &envelope.rows)
        .await
        .map_err(|err| {
            tracing::error!(
                "Medication batch {batch_number} failed for establishment {establishment_code}: {err}"
            );
            AppError::InsertionFailed {
                batch: envelope.batch_number,
            }
        })?;

    if let Some(next) = advance(&marker, open, action, batch_number, total_batches, now) {
        store_round(&mut tx, establishment_code, Dataset::Medications, &next).await?;
    }

    tx.commit().await?;
    Ok(BatchOutcome::Applied)
}

/// Apply one SIAF services batch for an establishment.
///
/// Same round protocol as the medication dataset; only the row shape and
/// target table differ.
pub async fn apply_services_batch(
    pool: &DbPool,
    establishment_code: &str,
    envelope: &BatchEnvelope<ServiceRow>,
    stale_after: Duration,
) -> Result<BatchOutcome, AppError> {
    validate_header(envelope)?;

    let batch_number = envelope.batch_number as i32;
    let total_batches = envelope.total_batches as i32;
    let now = Utc::now();

    let mut tx = pool.begin().await?;
    let marker =
        lock_round(&mut tx, establishment_code, Dataset::SiafServices, total_batches).await?;

    let open = is_open(&marker, now, stale_after);
    let action = decide(open, &marker.batches_seen, batch_number);

    if action == RoundAction::Duplicate {
        tx.commit().await?;
        return Ok(BatchOutcome::Duplicate);
    }

    if action == RoundAction::Replace {
        let purged = sqlx::query("DELETE FROM siaf_services WHERE establishment_code = $1")
            .bind(establishment_code)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tracing::info!(
            "New services round for establishment {establishment_code}: {purged} prior row(s) removed"
        );
    }

    insert_services(&mut tx, establishment_code, &envelope.rows)
        .await
        .map_err(|err| {
            tracing::error!(
                "Services batch {batch_number} failed for establishment {establishment_code}: {err}"
            );
            AppError::InsertionFailed {
                batch: envelope.batch_number,
            }
        })?;

    if let Some(next) = advance(&marker, open, action, batch_number, total_batches, now) {
        store_round(&mut tx, establishment_code, Dataset::SiafServices, &next).await?;
    }

    tx.commit().await?;
    Ok(BatchOutcome::Applied)
}

/// Insert medication rows inside the batch transaction.
async fn insert_medications(
    tx: &mut Transaction<'_, Postgres>,
    establishment_code: &str,
    rows: &[MedicationRow],
) -> Result<(), sqlx::Error> {
    for row in rows {
        sqlx::query(
            r#"
            INSERT INTO medications (
                establishment_code, gru_codigo, med_codigo, gru_descripcion,
                med_comercial, med_codificacion, med_unidad, med_concentracion,
                med_tipo, tipo_med, ant_entradas, ant_salidas, saldo_inicial,
                ant_entradas_costo, ant_salidas_costo, saldo_inicial_costo,
                entradas, salidas, saldo, entradas_costo, salidas_costo, costo,
                meses_activos, consumo_promedio, consumo_promedio1_5,
                consumo_promedio4_5, estado_inventario, fecha_inicial, fecha_final
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26,
                $27, $28, $29
            )
            "#,
        )
        .bind(establishment_code)
        .bind(&row.gru_codigo)
        .bind(&row.med_codigo)
        .bind(&row.gru_descripcion)
        .bind(&row.med_comercial)
        .bind(&row.med_codificacion)
        .bind(&row.med_unidad)
        .bind(&row.med_concentracion)
        .bind(&row.med_tipo)
        .bind(&row.tipo_med)
        .bind(row.ant_entradas)
        .bind(row.ant_salidas)
        .bind(row.saldo_inicial)
        .bind(row.ant_entradas_costo)
        .bind(row.ant_salidas_costo)
        .bind(row.saldo_inicial_costo)
        .bind(row.entradas)
        .bind(row.salidas)
        .bind(row.saldo)
        .bind(row.entradas_costo)
        .bind(row.salidas_costo)
        .bind(row.costo)
        .bind(row.meses_activos)
        .bind(row.consumo_promedio)
        // Averaged counts are floored to integers before storage.
        .bind(floor_count(row.consumo_promedio1_5))
        .bind(floor_count(row.consumo_promedio4_5))
        .bind(&row.estado_inventario)
        .bind(&row.fecha_inicial)
        .bind(&row.fecha_final)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Insert service rows inside the batch transaction.
async fn insert_services(
    tx: &mut Transaction<'_, Postgres>,
    establishment_code: &str,
    rows: &[ServiceRow],
) -> Result<(), sqlx::Error> {
    for row in rows {
        sqlx::query(
            r#"
            INSERT INTO siaf_services (
                establishment_code, vsersigla, cocdescri, fu_codigo, nombre,
                vrececha, id_mes, anio, cantidad, costo, vdetpreuni,
                vclihiccli, tipo, vsercodigo, vgrucodigo, vserdescri
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                $15, $16
            )
            "#,
        )
        .bind(establishment_code)
        .bind(&row.vsersigla)
        .bind(&row.cocdescri)
        .bind(row.fu_codigo)
        .bind(&row.nombre)
        .bind(row.vrececha)
        .bind(row.id_mes)
        .bind(row.anio)
        .bind(floor_count(row.cantidad))
        .bind(row.costo)
        .bind(row.vdetpreuni)
        .bind(row.vclihiccli)
        .bind(&row.tipo)
        .bind(row.vsercodigo)
        .bind(row.vgrucodigo)
        .bind(&row.vserdescri)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stale_after() -> Duration {
        Duration::seconds(3_600)
    }

    fn marker(batches_seen: Vec<i32>, total: i32, age_secs: i64) -> RoundMarker {
        RoundMarker {
            total_batches: total,
            batches_seen,
            opened_at: Utc::now() - Duration::seconds(age_secs),
            completed_at: None,
        }
    }

    #[test]
    fn sentinel_marker_is_not_an_open_round() {
        let sentinel = marker(vec![], 3, 0);
        assert!(!is_open(&sentinel, Utc::now(), stale_after()));
    }

    #[test]
    fn completed_round_is_not_open() {
        let mut done = marker(vec![1, 2, 3], 3, 60);
        done.completed_at = Some(Utc::now());
        assert!(!is_open(&done, Utc::now(), stale_after()));
    }

    #[test]
    fn abandoned_round_goes_stale() {
        let fresh = marker(vec![1], 3, 60);
        assert!(is_open(&fresh, Utc::now(), stale_after()));

        let abandoned = marker(vec![1], 3, 7_200);
        assert!(!is_open(&abandoned, Utc::now(), stale_after()));
    }

    #[test]
    fn first_batch_without_open_round_replaces() {
        assert_eq!(decide(false, &[], 1), RoundAction::Replace);
    }

    #[test]
    fn retried_first_batch_does_not_replace_again() {
        assert_eq!(decide(true, &[1], 1), RoundAction::Duplicate);
    }

    #[test]
    fn later_batches_append_without_deleting() {
        assert_eq!(decide(true, &[1], 2), RoundAction::Append);
        assert_eq!(decide(true, &[1, 2], 3), RoundAction::Append);
    }

    #[test]
    fn retried_later_batch_is_deduplicated() {
        assert_eq!(decide(true, &[1, 2], 2), RoundAction::Duplicate);
    }

    #[test]
    fn out_of_protocol_batch_still_appends() {
        // No open round but the client sends batch 2: insert, don't delete.
        assert_eq!(decide(false, &[], 2), RoundAction::Append);
    }

    #[test]
    fn replace_resets_the_round() {
        let stale = marker(vec![1, 2], 3, 7_200);
        let now = Utc::now();
        let next = advance(&stale, false, RoundAction::Replace, 1, 4, now).unwrap();
        assert_eq!(next.total_batches, 4);
        assert_eq!(next.batches_seen, vec![1]);
        assert_eq!(next.opened_at, now);
        assert!(next.completed_at.is_none());
    }

    #[test]
    fn single_batch_round_completes_immediately() {
        let sentinel = marker(vec![], 1, 0);
        let now = Utc::now();
        let next = advance(&sentinel, false, RoundAction::Replace, 1, 1, now).unwrap();
        assert_eq!(next.completed_at, Some(now));
    }

    #[test]
    fn append_records_the_index_and_final_batch_completes() {
        let current = marker(vec![1], 3, 60);
        let now = Utc::now();
        let next = advance(&current, true, RoundAction::Append, 3, 3, now).unwrap();
        assert_eq!(next.batches_seen, vec![1, 3]);
        assert!(next.completed_at.is_none());

        let next = advance(&next, true, RoundAction::Append, 2, 3, now).unwrap();
        assert_eq!(next.batches_seen, vec![1, 3, 2]);
        assert_eq!(next.completed_at, Some(now));
    }

    #[test]
    fn duplicates_and_orphan_appends_leave_the_marker_alone() {
        let current = marker(vec![1, 2], 3, 60);
        assert!(advance(&current, true, RoundAction::Duplicate, 2, 3, Utc::now()).is_none());

        let sentinel = marker(vec![], 3, 0);
        assert!(advance(&sentinel, false, RoundAction::Append, 2, 3, Utc::now()).is_none());
    }

    #[test]
    fn empty_batch_is_malformed() {
        let envelope = BatchEnvelope::<MedicationRow> {
            batch_number: 1,
            total_batches: 1,
            total_rows: 0,
            rows: vec![],
        };
        assert!(matches!(
            validate_header(&envelope),
            Err(AppError::MalformedPayload(_))
        ));
    }

    #[test]
    fn batch_number_outside_declared_round_is_malformed() {
        let envelope = BatchEnvelope {
            batch_number: 4,
            total_batches: 3,
            total_rows: 1,
            rows: vec![serde_json::json!({})],
        };
        assert!(matches!(
            validate_header(&envelope),
            Err(AppError::MalformedPayload(_))
        ));

        let envelope = BatchEnvelope {
            batch_number: 0,
            total_batches: 3,
            total_rows: 1,
            rows: vec![serde_json::json!({})],
        };
        assert!(matches!(
            validate_header(&envelope),
            Err(AppError::MalformedPayload(_))
        ));
    }

    #[test]
    fn counts_are_floored_not_rounded() {
        assert_eq!(floor_count(13.9), 13);
        assert_eq!(floor_count(7.2), 7);
        assert_eq!(floor_count(5.0), 5);
        assert_eq!(floor_count(-1.2), -2);
        assert_eq!(floor_count(0.0), 0);
    }
}
