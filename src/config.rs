//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables
//! into a type-safe struct.
//!
//! The token-signing secret is mandatory and validated at startup. There is
//! deliberately no built-in fallback value: a missing or blank `JWT_SECRET`
//! aborts startup instead of silently degrading security.

use serde::Deserialize;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `JWT_SECRET` (required): secret used to sign session tokens
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `SESSION_TTL_SECS` (optional): session token lifetime, defaults to 1 hour
/// - `API_KEY_LIFETIME_DAYS` (optional): API key lifetime, defaults to 30 days
/// - `RENEWAL_LOOKAHEAD_DAYS` (optional): keys expiring within this window are
///   rotated by the scheduler, defaults to 3 days
/// - `RENEWAL_INTERVAL_SECS` (optional): scheduler pass interval, defaults to daily
/// - `ROUND_STALE_SECS` (optional): an upload round left incomplete longer than
///   this is considered abandoned, defaults to the session TTL
/// - `MAX_BODY_BYTES` (optional): JSON body size cap, defaults to 10 MiB
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    pub jwt_secret: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,

    #[serde(default = "default_api_key_lifetime_days")]
    pub api_key_lifetime_days: i64,

    #[serde(default = "default_renewal_lookahead_days")]
    pub renewal_lookahead_days: i64,

    #[serde(default = "default_renewal_interval_secs")]
    pub renewal_interval_secs: u64,

    #[serde(default = "default_round_stale_secs")]
    pub round_stale_secs: i64,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

/// Session tokens live for 1 hour.
fn default_session_ttl_secs() -> u64 {
    3_600
}

/// API keys live for 30 days.
fn default_api_key_lifetime_days() -> i64 {
    30
}

/// Keys expiring within 3 days are rotated proactively.
fn default_renewal_lookahead_days() -> i64 {
    3
}

/// The renewal scheduler runs daily.
fn default_renewal_interval_secs() -> u64 {
    86_400
}

/// An upload round cannot outlive the session token that started it,
/// so the staleness window defaults to the session TTL.
fn default_round_stale_secs() -> i64 {
    3_600
}

/// Batches arrive as JSON bodies up to 10 MiB.
fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables, deserializes them into a Config
    /// struct, and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (DATABASE_URL, JWT_SECRET)
    /// - Environment variable values cannot be parsed into expected types
    /// - Validation fails (blank secret, non-positive lifetimes)
    pub fn from_env() -> anyhow::Result<Self> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Field names are automatically converted: database_url -> DATABASE_URL
        let config = envy::from_env::<Config>()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would run but misbehave.
    fn validate(&self) -> anyhow::Result<()> {
        if self.jwt_secret.trim().is_empty() {
            anyhow::bail!("JWT_SECRET must not be blank");
        }
        if self.api_key_lifetime_days <= 0 {
            anyhow::bail!("API_KEY_LIFETIME_DAYS must be positive");
        }
        if self.renewal_lookahead_days <= 0 {
            anyhow::bail!("RENEWAL_LOOKAHEAD_DAYS must be positive");
        }
        if self.round_stale_secs <= 0 {
            anyhow::bail!("ROUND_STALE_SECS must be positive");
        }
        Ok(())
    }

    /// Staleness window for upload rounds as a chrono duration.
    pub fn round_staleness(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.round_stale_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_secret(secret: &str) -> Config {
        Config {
            database_url: "postgres://localhost/ingest".to_string(),
            jwt_secret: secret.to_string(),
            server_port: default_port(),
            session_ttl_secs: default_session_ttl_secs(),
            api_key_lifetime_days: default_api_key_lifetime_days(),
            renewal_lookahead_days: default_renewal_lookahead_days(),
            renewal_interval_secs: default_renewal_interval_secs(),
            round_stale_secs: default_round_stale_secs(),
            max_body_bytes: default_max_body_bytes(),
        }
    }

    #[test]
    fn blank_secret_is_rejected() {
        assert!(config_with_secret("").validate().is_err());
        assert!(config_with_secret("   ").validate().is_err());
    }

    #[test]
    fn populated_secret_passes_validation() {
        assert!(config_with_secret("a-real-secret").validate().is_ok());
    }

    #[test]
    fn non_positive_lifetimes_are_rejected() {
        let mut config = config_with_secret("secret");
        config.api_key_lifetime_days = 0;
        assert!(config.validate().is_err());

        let mut config = config_with_secret("secret");
        config.round_stale_secs = -1;
        assert!(config.validate().is_err());
    }
}
