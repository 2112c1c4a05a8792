use anyhow::Result;

/// The only thing the service asks of a trained classifier.
///
/// `row` is in feature-schema order. The return value is `[P(class 0), P(class 1)]`,
/// where class 1 is "at risk". Implementations must be pure: same row, same answer.
pub trait ProbabilityModel: Send + Sync {
    fn predict_proba(&self, row: &[f64]) -> Result<[f64; 2]>;
}

/// Fixed-output model.
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub struct ConstantModel {
    pub positive: f64,
}

#[cfg(test)]
impl ProbabilityModel for ConstantModel {
    fn predict_proba(&self, _row: &[f64]) -> Result<[f64; 2]> {
        Ok([1.0 - self.positive, self.positive])
    }
}

/// Logistic model over the row. Deterministic, monotone in every weighted feature.
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct LogisticModel {
    pub bias: f64,
    pub weights: Vec<f64>,
}

#[cfg(test)]
impl ProbabilityModel for LogisticModel {
    fn predict_proba(&self, row: &[f64]) -> Result<[f64; 2]> {
        anyhow::ensure!(
            row.len() == self.weights.len(),
            "row has {} features, model expects {}",
            row.len(),
            self.weights.len()
        );
        let z = self.bias
            + self
                .weights
                .iter()
                .zip(row)
                .map(|(w, x)| w * x)
                .sum::<f64>();
        let p = 1.0 / (1.0 + (-z).exp());
        Ok([1.0 - p, p])
    }
}
