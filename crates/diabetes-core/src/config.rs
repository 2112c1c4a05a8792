use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Scoring configuration: hand-authored tables, not derived from the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Multiplier applied to `bmi` and `blood_glucose_level` for the "improved" what-if.
    pub improvement_factor: f64,

    /// Typical maximum per feature, used to normalize values for contribution scores.
    /// Features not listed are not normalized (divisor 1).
    pub feature_max: BTreeMap<String, f64>,

    /// Human label per feature; unlisted features fall back to their key.
    pub display_names: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        let feature_max = [
            ("age", 100.0),
            ("hypertension", 1.0),
            ("heart_disease", 1.0),
            ("bmi", 60.0),
            ("HbA1c_level", 15.0),
            ("blood_glucose_level", 300.0),
            ("gender_encoded", 1.0),
            ("smoking_history_encoded", 4.0),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let display_names = [
            ("age", "Age"),
            ("hypertension", "Hypertension"),
            ("heart_disease", "Heart Disease"),
            ("bmi", "BMI"),
            ("HbA1c_level", "HbA1c"),
            ("blood_glucose_level", "Glucose"),
            ("gender_encoded", "Gender"),
            ("smoking_history_encoded", "Smoking"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            improvement_factor: 0.90,
            feature_max,
            display_names,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.improvement_factor.is_finite(),
            "improvement_factor must be finite, got {}",
            self.improvement_factor
        );
        for (k, v) in &self.feature_max {
            ensure!(
                v.is_finite() && *v > 0.0,
                "feature_max[{k}] must be a positive finite number, got {v}"
            );
        }
        Ok(())
    }

    #[inline]
    pub fn feature_max(&self, key: &str) -> f64 {
        self.feature_max.get(key).copied().unwrap_or(1.0)
    }

    #[inline]
    pub fn display_name<'a>(&'a self, key: &'a str) -> &'a str {
        self.display_names.get(key).map(String::as_str).unwrap_or(key)
    }
}
