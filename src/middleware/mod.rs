//! HTTP middleware for the application.
//!
//! Contains the session-token middleware that protects the ingestion
//! endpoints.

pub mod auth;
