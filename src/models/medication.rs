//! Medication inventory row as received on the wire.
//!
//! Column names come from the upstream pharmacy system and are preserved
//! verbatim through to the `medications` table. Numeric stock and cost
//! fields default to 0 when absent; the two averaged-consumption fields are
//! floored to integers before storage (see the ingestion service).

use serde::Deserialize;

/// One medication inventory record inside a batch envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct MedicationRow {
    pub gru_codigo: String,
    pub med_codigo: String,
    pub gru_descripcion: String,
    pub med_comercial: String,
    pub med_codificacion: String,
    pub med_unidad: String,
    pub med_concentracion: String,
    pub med_tipo: String,
    pub tipo_med: String,

    /// Prior-period stock movements and balances; absent means zero.
    #[serde(default)]
    pub ant_entradas: f64,
    #[serde(default)]
    pub ant_salidas: f64,
    #[serde(default)]
    pub saldo_inicial: f64,
    #[serde(default)]
    pub ant_entradas_costo: f64,
    #[serde(default)]
    pub ant_salidas_costo: f64,
    #[serde(default)]
    pub saldo_inicial_costo: f64,

    /// Current-period stock movements and balances; absent means zero.
    #[serde(default)]
    pub entradas: f64,
    #[serde(default)]
    pub salidas: f64,
    #[serde(default)]
    pub saldo: f64,
    #[serde(default)]
    pub entradas_costo: f64,
    #[serde(default)]
    pub salidas_costo: f64,
    #[serde(default)]
    pub costo: f64,

    #[serde(default)]
    pub meses_activos: f64,
    #[serde(default)]
    pub consumo_promedio: f64,

    /// Averaged consumption over 1.5 periods; floored before storage.
    #[serde(default)]
    pub consumo_promedio1_5: f64,

    /// Averaged consumption over 4.5 periods; floored before storage.
    #[serde(default)]
    pub consumo_promedio4_5: f64,

    pub estado_inventario: Option<String>,

    pub fecha_inicial: String,
    pub fecha_final: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_fields_default_to_zero() {
        let row: MedicationRow = serde_json::from_str(
            r#"{
                "gru_codigo": "G01",
                "med_codigo": "M001",
                "gru_descripcion": "ANTIBIOTICOS",
                "med_comercial": "AMOXICILINA",
                "med_codificacion": "AMX-500",
                "med_unidad": "TABLETA",
                "med_concentracion": "500mg",
                "med_tipo": "GENERICO",
                "tipo_med": "ORAL",
                "fecha_inicial": "2026-01-01",
                "fecha_final": "2026-06-30"
            }"#,
        )
        .unwrap();
        assert_eq!(row.ant_entradas, 0.0);
        assert_eq!(row.consumo_promedio1_5, 0.0);
        assert!(row.estado_inventario.is_none());
    }

    #[test]
    fn fractional_consumption_survives_deserialization() {
        let row: MedicationRow = serde_json::from_str(
            r#"{
                "gru_codigo": "G01",
                "med_codigo": "M001",
                "gru_descripcion": "ANTIBIOTICOS",
                "med_comercial": "AMOXICILINA",
                "med_codificacion": "AMX-500",
                "med_unidad": "TABLETA",
                "med_concentracion": "500mg",
                "med_tipo": "GENERICO",
                "tipo_med": "ORAL",
                "consumo_promedio1_5": 13.9,
                "consumo_promedio4_5": 7.2,
                "estado_inventario": "NORMAL",
                "fecha_inicial": "2026-01-01",
                "fecha_final": "2026-06-30"
            }"#,
        )
        .unwrap();
        // The floor happens at insert time, not at parse time.
        assert_eq!(row.consumo_promedio1_5, 13.9);
        assert_eq!(row.consumo_promedio4_5, 7.2);
    }
}
