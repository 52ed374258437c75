//! Database connection pool and migration management.
//!
//! This module provides utilities for:
//! - Creating a PostgreSQL connection pool, retrying while the database
//!   comes up
//! - Running database migrations automatically

use std::time::Duration;

use sqlx::{Pool, Postgres};

/// Type alias for PostgreSQL connection pool.
pub type DbPool = Pool<Postgres>;

/// Connection attempts before giving up at startup.
const MAX_CONNECT_ATTEMPTS: u32 = 5;

/// Pause between connection attempts.
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Create a new PostgreSQL connection pool.
///
/// A connection pool maintains multiple database connections that can be
/// reused across HTTP requests. The serverless Postgres deployments this
/// service targets can take a few seconds to wake, so the initial connection
/// is retried up to [`MAX_CONNECT_ATTEMPTS`] times before failing startup.
///
/// # Errors
///
/// Returns the last connection error if:
/// - Database connection string is invalid
/// - Cannot connect to PostgreSQL server after all attempts
/// - Database authentication fails
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    let mut attempt = 1;
    loop {
        match sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
        {
            Ok(pool) => return Ok(pool),
            Err(err) if attempt < MAX_CONNECT_ATTEMPTS => {
                tracing::warn!(
                    "Database connection attempt {attempt}/{MAX_CONNECT_ATTEMPTS} failed: {err}"
                );
                attempt += 1;
                tokio::time::sleep(CONNECT_RETRY_DELAY).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Run database migrations from the `migrations/` directory.
///
/// Executes all SQL migration files in order. Migrations are tracked in a
/// `_sqlx_migrations` table, so each migration runs only once.
///
/// # Errors
///
/// Returns an error if:
/// - Migration files cannot be read
/// - SQL syntax errors in migration files
/// - Database errors during migration execution
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    // The macro reads migrations at compile time from ./migrations directory
    sqlx::migrate!("./migrations").run(pool).await
}
