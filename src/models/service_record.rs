//! SIAF service-usage row as received on the wire.
//!
//! Column names come from the upstream SIAF billing system. `cantidad` is a
//! service count that upstream sometimes reports fractionally; it is floored
//! to an integer before storage, the same policy as the medication dataset.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// One service-usage record inside a batch envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceRow {
    pub vsersigla: String,
    pub cocdescri: String,
    pub fu_codigo: i32,
    pub nombre: String,

    /// Service date, ISO-8601 on the wire.
    pub vrececha: DateTime<Utc>,

    pub id_mes: i32,
    pub anio: i32,

    /// Units of service rendered; floored before storage.
    pub cantidad: f64,

    #[serde(default)]
    pub costo: f64,
    #[serde(default)]
    pub vdetpreuni: f64,

    pub vclihiccli: i32,
    pub tipo: String,
    pub vsercodigo: i32,
    pub vgrucodigo: i32,
    pub vserdescri: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_deserializes_iso_timestamp_and_counts() {
        let row: ServiceRow = serde_json::from_str(
            r#"{
                "vsersigla": "LAB",
                "cocdescri": "LABORATORIO",
                "fu_codigo": 12,
                "nombre": "HEMOGRAMA",
                "vrececha": "2026-03-15T00:00:00.000Z",
                "id_mes": 3,
                "anio": 2026,
                "cantidad": 4.5,
                "costo": 120.75,
                "vdetpreuni": 26.83,
                "vclihiccli": 9981,
                "tipo": "A",
                "vsercodigo": 301,
                "vgrucodigo": 14,
                "vserdescri": "HEMOGRAMA COMPLETO"
            }"#,
        )
        .unwrap();
        assert_eq!(row.anio, 2026);
        assert_eq!(row.cantidad, 4.5);
        assert_eq!(row.vrececha.timestamp(), 1_773_532_800);
    }
}
