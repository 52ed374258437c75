//! Business logic services.

pub mod ingest_service;
pub mod key_service;
pub mod renewal;
pub mod session;
