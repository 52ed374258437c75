//! API key model and credential request/response types.
//!
//! API keys authenticate establishments. Only the SHA-256 hash of a key is
//! ever stored; the raw value is returned to the caller exactly once at
//! issuance and never logged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents an API key record from the database.
///
/// # Database Table
///
/// Maps to the `api_keys` table. A partial unique index guarantees at most
/// one active key per establishment; issuance and rotation replace the row
/// rather than updating it in place.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiKey {
    /// Unique identifier for this API key
    pub id: Uuid,

    /// Establishment this key belongs to (partition key for all data)
    pub establishment_code: String,

    /// SHA-256 hash of the actual API key (64 hex characters)
    ///
    /// When a login request arrives with `x-api-key: abc123`, the value is
    /// hashed and looked up here. The raw key never touches the database.
    pub key_hash: String,

    /// Keys past this instant fail validation even while still active
    pub expires_at: DateTime<Utc>,

    /// Whether this API key is currently valid
    ///
    /// Rotation deactivates or deletes the prior key so a rotated key can
    /// no longer authenticate.
    pub is_active: bool,

    /// Timestamp when this API key was created
    pub created_at: DateTime<Utc>,
}

/// Request body for `POST /api/keys/request`.
///
/// Field names follow the upstream establishment protocol.
#[derive(Debug, Deserialize)]
pub struct IssueKeyRequest {
    #[serde(rename = "codestablecimiento")]
    pub establishment_code: String,
}

/// Request body for `POST /api/keys/renew`.
#[derive(Debug, Deserialize)]
pub struct RenewKeyRequest {
    #[serde(rename = "codestablecimiento")]
    pub establishment_code: String,

    /// The currently held raw key; re-validated before rotation.
    #[serde(rename = "currentApiKey")]
    pub current_api_key: String,
}

/// Response body for key issuance and renewal.
///
/// # JSON Example
///
/// ```json
/// {
///   "message": "API Key generado",
///   "apiKey": "3f1a…64 hex chars…",
///   "expiresAt": "2026-09-05T00:00:00Z"
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ApiKeyResponse {
    pub message: String,

    /// The raw key. This is the only time the caller ever sees it.
    #[serde(rename = "apiKey")]
    pub api_key: String,

    #[serde(rename = "expiresAt")]
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_use_protocol_field_names() {
        let issue: IssueKeyRequest =
            serde_json::from_str(r#"{"codestablecimiento":"001"}"#).unwrap();
        assert_eq!(issue.establishment_code, "001");

        let renew: RenewKeyRequest = serde_json::from_str(
            r#"{"codestablecimiento":"001","currentApiKey":"deadbeef"}"#,
        )
        .unwrap();
        assert_eq!(renew.establishment_code, "001");
        assert_eq!(renew.current_api_key, "deadbeef");
    }

    #[test]
    fn response_serializes_camel_case_keys() {
        let response = ApiKeyResponse {
            message: "API Key generado".to_string(),
            api_key: "raw".to_string(),
            expires_at: Utc::now(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("apiKey").is_some());
        assert!(json.get("expiresAt").is_some());
    }
}
