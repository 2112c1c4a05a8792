use crate::{
    artifacts::ModelArtifacts,
    config::Config,
    contrib::score_contributions,
    error::PredictError,
    normalize::{improve, normalize},
    predictor::risk_percent,
    schema::{ImprovedValues, PatientRecord, PredictResponse},
    util::{now_us, round_dp},
};

use anyhow::Context;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Immutable service context: built once at start, shared by every request.
#[derive(Debug, Clone)]
pub struct AppCore {
    pub cfg: Config,
    pub artifacts: Arc<ModelArtifacts>,
}

impl AppCore {
    pub fn new(cfg: Config, artifacts: ModelArtifacts) -> anyhow::Result<Self> {
        cfg.validate().context("invalid scoring config")?;
        Ok(Self {
            cfg,
            artifacts: Arc::new(artifacts),
        })
    }

    pub fn load(cfg: Config, model_dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let model_dir = model_dir.as_ref();
        let artifacts = ModelArtifacts::load_from_dir(model_dir)
            .with_context(|| format!("load model artifacts from {}", model_dir.display()))?;
        Self::new(cfg, artifacts)
    }

    /// Parse a request body into a record. The body must be a JSON object.
    pub fn parse_record(body: &[u8]) -> Result<PatientRecord, PredictError> {
        let v: Value =
            serde_json::from_slice(body).map_err(|e| PredictError::InvalidJson(e.to_string()))?;
        match v {
            Value::Object(obj) => Ok(PatientRecord::from_json_object(&obj)?),
            other => Err(PredictError::InvalidJson(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Raw body in, full prediction out.
    pub fn predict_json(&self, body: &[u8]) -> Result<PredictResponse, PredictError> {
        let record = Self::parse_record(body)?;
        self.predict(&record)
    }

    /// Current risk, improved risk, contributions and improved values for one patient.
    pub fn predict(&self, record: &PatientRecord) -> Result<PredictResponse, PredictError> {
        let t0 = Instant::now();
        let art = &self.artifacts;

        // normalize
        let t_norm = Instant::now();
        let improved = improve(record, self.cfg.improvement_factor);
        let row = normalize(record, &art.schema);
        let improved_row = normalize(&improved, &art.schema);
        metrics::histogram!("stage_normalize_us").record(now_us(t_norm) as f64);

        // predict
        let t_pred = Instant::now();
        let current_risk = risk_percent(art.model.as_ref(), &row)?;
        let improvement_risk = risk_percent(art.model.as_ref(), &improved_row)?;
        metrics::histogram!("stage_predict_us").record(now_us(t_pred) as f64);

        // contrib
        let t_contrib = Instant::now();
        let feature_contributions = score_contributions(&self.cfg, &art.importances, &row);
        metrics::histogram!("stage_contrib_us").record(now_us(t_contrib) as f64);

        let improved_values = ImprovedValues {
            bmi: round_dp(improved.bmi.unwrap_or(0.0), 1),
            blood_glucose_level: round_dp(improved.blood_glucose_level.unwrap_or(0.0), 1),
        };

        metrics::histogram!("e2e_us").record(now_us(t0) as f64);

        Ok(PredictResponse {
            current_risk,
            improvement_risk,
            feature_contributions,
            improved_values,
        })
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
