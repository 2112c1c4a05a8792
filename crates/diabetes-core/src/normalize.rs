use crate::artifacts::FeatureSchema;
use crate::schema::PatientRecord;

/// Align a record to the schema: one value per schema feature, in schema order.
/// Features the record does not carry are 0.
pub fn normalize(record: &PatientRecord, schema: &FeatureSchema) -> Vec<f64> {
    schema
        .names()
        .iter()
        .map(|k| record.get(k).unwrap_or(0.0))
        .collect()
}

/// Copy of `record` with `bmi` and `blood_glucose_level` scaled by `factor`.
/// Absent fields stay absent; no clamping.
pub fn improve(record: &PatientRecord, factor: f64) -> PatientRecord {
    PatientRecord {
        bmi: record.bmi.map(|v| v * factor),
        blood_glucose_level: record.blood_glucose_level.map(|v| v * factor),
        ..record.clone()
    }
}
