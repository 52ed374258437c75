//! Batch envelope shared by every ingestion endpoint.
//!
//! A round is split into several HTTP requests, one envelope per request.
//! The envelope header carries the batch's declared position in its round;
//! `loteNumero == 1` is the first-batch marker that triggers the replace
//! step. Field names are the established upstream protocol.

use serde::{Deserialize, Serialize};

/// One batch of a multi-batch upload round.
///
/// # JSON Example
///
/// ```json
/// {
///   "loteNumero": 1,
///   "totalLotes": 3,
///   "totalDatos": 4500,
///   "datos": [ ... ]
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct BatchEnvelope<T> {
    /// 1-based position of this batch within the round
    #[serde(rename = "loteNumero")]
    pub batch_number: u32,

    /// Declared number of batches in the round
    #[serde(rename = "totalLotes")]
    pub total_batches: u32,

    /// Declared total row count across the round (informational, logged only)
    #[serde(rename = "totalDatos")]
    pub total_rows: u32,

    /// The rows carried by this batch
    #[serde(rename = "datos")]
    pub rows: Vec<T>,
}

/// Acknowledgement returned for a processed (or deduplicated) batch.
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_deserializes_protocol_field_names() {
        let envelope: BatchEnvelope<serde_json::Value> = serde_json::from_str(
            r#"{"loteNumero":2,"totalLotes":3,"totalDatos":10,"datos":[{"a":1}]}"#,
        )
        .unwrap();
        assert_eq!(envelope.batch_number, 2);
        assert_eq!(envelope.total_batches, 3);
        assert_eq!(envelope.total_rows, 10);
        assert_eq!(envelope.rows.len(), 1);
    }

    #[test]
    fn envelope_requires_every_header_field() {
        let missing_total: Result<BatchEnvelope<serde_json::Value>, _> =
            serde_json::from_str(r#"{"loteNumero":1,"totalDatos":10,"datos":[]}"#);
        assert!(missing_total.is_err());
    }
}
