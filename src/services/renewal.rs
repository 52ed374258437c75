//! Scheduled API key renewal.
//!
//! A singleton background task, spawned at startup, that proactively rotates
//! keys nearing expiration so establishments are never locked out by an
//! expired key. Failures are isolated per key: one establishment's rotation
//! failing never aborts the rest of the pass, and the next pass retries
//! whatever is still expiring.

use std::{sync::Arc, time::Duration};

use chrono::Utc;

use crate::{
    config::Config, db::DbPool, error::AppError, models::api_key::ApiKey, services::key_service,
};

/// Run the renewal loop forever.
///
/// Ticks on `renewal_interval_secs` (daily by default). The first tick fires
/// immediately, which doubles as a catch-up pass after downtime. Shares the
/// pool with request handlers; rotation re-checks nothing beyond the
/// selection query because `rotate` replaces by primary key.
pub async fn run(pool: DbPool, config: Arc<Config>) {
    let mut tick = tokio::time::interval(Duration::from_secs(config.renewal_interval_secs));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    tracing::info!(
        "API key renewal scheduler started (every {}s, lookahead {} day(s))",
        config.renewal_interval_secs,
        config.renewal_lookahead_days
    );

    loop {
        tick.tick().await;
        if let Err(err) = renew_expiring(&pool, &config).await {
            // A failed pass is retried on the next tick.
            tracing::error!("API key renewal pass failed: {err}");
        }
    }
}

/// One renewal pass: rotate every active key inside the lookahead window.
async fn renew_expiring(pool: &DbPool, config: &Config) -> Result<(), AppError> {
    let cutoff = Utc::now() + chrono::Duration::days(config.renewal_lookahead_days);

    let expiring = sqlx::query_as::<_, ApiKey>(
        r#"
        SELECT id, establishment_code, key_hash, expires_at, is_active, created_at
        FROM api_keys
        WHERE is_active = TRUE AND expires_at <= $1
        "#,
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await?;

    if expiring.is_empty() {
        tracing::debug!("Renewal pass: no keys nearing expiry");
        return Ok(());
    }

    tracing::info!("Renewal pass: {} key(s) nearing expiry", expiring.len());

    for key in expiring {
        match key_service::rotate(
            pool,
            key.id,
            &key.establishment_code,
            config.api_key_lifetime_days,
        )
        .await
        {
            Ok(issued) => tracing::info!(
                "API key rotated for establishment {}; new key expires {}",
                key.establishment_code,
                issued.expires_at
            ),
            // Log and continue: the remaining establishments still rotate.
            Err(err) => tracing::error!(
                "API key rotation failed for establishment {}: {err}",
                key.establishment_code
            ),
        }
    }

    Ok(())
}
