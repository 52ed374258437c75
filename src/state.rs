//! Shared application state.

use std::sync::Arc;

use crate::{config::Config, db::DbPool, services::session::SessionService};

/// State handed to every handler and to the session middleware.
///
/// Cloning is cheap: the pool is internally reference-counted and the
/// config is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Arc<Config>,
    pub sessions: SessionService,
}

impl AppState {
    pub fn new(pool: DbPool, config: Config) -> Self {
        let sessions = SessionService::new(&config.jwt_secret, config.session_ttl_secs);
        Self {
            pool,
            config: Arc::new(config),
            sessions,
        }
    }
}
