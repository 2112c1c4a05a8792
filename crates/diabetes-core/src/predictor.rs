use crate::error::PredictError;
use crate::model::ProbabilityModel;
use crate::util::{clamp01, round_dp};

/// P(at risk) for `row` as a percentage in [0, 100], 2 decimals.
pub fn risk_percent(model: &dyn ProbabilityModel, row: &[f64]) -> Result<f64, PredictError> {
    let proba = model
        .predict_proba(row)
        .map_err(|e| PredictError::Model(format!("{e:#}")))?;
    let p = proba[1];
    if !p.is_finite() {
        return Err(PredictError::Model(format!(
            "positive-class probability is not finite: {p}"
        )));
    }
    Ok(round_dp(clamp01(p) * 100.0, 2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConstantModel;

    struct NanModel;

    impl ProbabilityModel for NanModel {
        fn predict_proba(&self, _row: &[f64]) -> anyhow::Result<[f64; 2]> {
            Ok([f64::NAN, f64::NAN])
        }
    }

    struct Failing;

    impl ProbabilityModel for Failing {
        fn predict_proba(&self, _row: &[f64]) -> anyhow::Result<[f64; 2]> {
            anyhow::bail!("backend unavailable")
        }
    }

    #[test]
    fn test_scales_and_rounds() {
        let m = ConstantModel { positive: 0.123456 };
        assert_eq!(risk_percent(&m, &[]).unwrap(), 12.35);
    }

    #[test]
    fn test_bounds() {
        assert_eq!(risk_percent(&ConstantModel { positive: 0.0 }, &[]).unwrap(), 0.0);
        assert_eq!(risk_percent(&ConstantModel { positive: 1.0 }, &[]).unwrap(), 100.0);
        // float noise past 1.0 is clamped
        assert_eq!(
            risk_percent(&ConstantModel { positive: 1.0 + 1e-12 }, &[]).unwrap(),
            100.0
        );
    }

    #[test]
    fn test_model_errors_surface() {
        assert!(matches!(
            risk_percent(&NanModel, &[]),
            Err(PredictError::Model(_))
        ));
        let err = risk_percent(&Failing, &[]).unwrap_err();
        assert!(err.to_string().contains("backend unavailable"));
    }
}
