// crates/diabetes-core/src/schema.rs
use crate::error::InputError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys a [`PatientRecord`] can carry, in the order the training export lists them.
pub const PATIENT_FIELDS: [&str; 8] = [
    "age",
    "hypertension",
    "heart_disease",
    "bmi",
    "HbA1c_level",
    "blood_glucose_level",
    "gender_encoded",
    "smoking_history_encoded",
];

/// One patient's raw inputs.
///
/// Every field is optional: absent means "not supplied" and
/// normalizes to 0. Keys outside [`PATIENT_FIELDS`] are dropped on parse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct PatientRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hypertension: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heart_disease: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bmi: Option<f64>,
    #[serde(rename = "HbA1c_level", skip_serializing_if = "Option::is_none")]
    pub hba1c_level: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blood_glucose_level: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender_encoded: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smoking_history_encoded: Option<f64>,
}

impl PatientRecord {
    #[inline]
    pub fn is_known(key: &str) -> bool {
        PATIENT_FIELDS.contains(&key)
    }

    /// Value supplied for `key`, if any.
    pub fn get(&self, key: &str) -> Option<f64> {
        match key {
            "age" => self.age,
            "hypertension" => self.hypertension,
            "heart_disease" => self.heart_disease,
            "bmi" => self.bmi,
            "HbA1c_level" => self.hba1c_level,
            "blood_glucose_level" => self.blood_glucose_level,
            "gender_encoded" => self.gender_encoded,
            "smoking_history_encoded" => self.smoking_history_encoded,
            _ => None,
        }
    }

    fn slot_mut(&mut self, key: &str) -> Option<&mut Option<f64>> {
        match key {
            "age" => Some(&mut self.age),
            "hypertension" => Some(&mut self.hypertension),
            "heart_disease" => Some(&mut self.heart_disease),
            "bmi" => Some(&mut self.bmi),
            "HbA1c_level" => Some(&mut self.hba1c_level),
            "blood_glucose_level" => Some(&mut self.blood_glucose_level),
            "gender_encoded" => Some(&mut self.gender_encoded),
            "smoking_history_encoded" => Some(&mut self.smoking_history_encoded),
            _ => None,
        }
    }

    /// Build a record from a JSON object.
    ///
    /// - number: as is
    /// - bool: 1.0 / 0.0
    /// - string: trimmed, parsed as a decimal number
    /// - anything else (null included), or a result that does not fit an f32: error naming the feature
    pub fn from_json_object(obj: &Map<String, Value>) -> Result<Self, InputError> {
        let mut rec = Self::default();
        for (k, v) in obj {
            if let Some(slot) = rec.slot_mut(k) {
                *slot = coerce_value(k, v)?;
            }
        }
        Ok(rec)
    }
}

impl TryFrom<Map<String, Value>> for PatientRecord {
    type Error = InputError;

    fn try_from(obj: Map<String, Value>) -> Result<Self, Self::Error> {
        Self::from_json_object(&obj)
    }
}

fn coerce_value(key: &str, v: &Value) -> Result<Option<f64>, InputError> {
    let x = match v {
        Value::Null => return Err(InputError::new(key, "expected a number, got null")),
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| InputError::new(key, format!("number out of range: {n}")))?,
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| {
            InputError::new(key, format!("could not convert string to float: {s:?}"))
        })?,
        Value::Array(_) => return Err(InputError::new(key, "expected a number, got an array")),
        Value::Object(_) => return Err(InputError::new(key, "expected a number, got an object")),
    };
    if !x.is_finite() {
        return Err(InputError::new(key, format!("expected a finite number, got {x}")));
    }
    // trees compare in f32
    if !(x as f32).is_finite() {
        return Err(InputError::new(key, format!("value too large for float32: {x}")));
    }
    Ok(Some(x))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    /// Display name, e.g. "Glucose".
    pub feature: String,
    /// Schema key, e.g. "blood_glucose_level".
    pub key: String,
    /// Patient value, 2 decimals.
    pub value: f64,
    /// Heuristic contribution score, 2 decimals.
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImprovedValues {
    pub bmi: f64,
    pub blood_glucose_level: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    /// P(at risk) * 100, 2 decimals.
    pub current_risk: f64,
    /// Same, after the bmi / glucose reduction.
    pub improvement_risk: f64,
    /// One entry per schema feature, score descending.
    pub feature_contributions: Vec<FeatureContribution>,
    /// Reduced values, 1 decimal.
    pub improved_values: ImprovedValues,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".into(),
            message: "Diabetes Risk API is running.".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
