/// A feature value that could not be coerced to a finite `f64`.
#[derive(Debug, Clone, PartialEq)]
pub struct InputError {
    pub feature: String,
    pub detail: String,
}

impl InputError {
    pub fn new(feature: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            feature: feature.into(),
            detail: detail.into(),
        }
    }
}

impl std::fmt::Display for InputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid value for feature '{}': {}", self.feature, self.detail)
    }
}
impl std::error::Error for InputError {}

/// Per-request failure. Every variant maps to a 400 at the HTTP boundary.
#[derive(Debug)]
pub enum PredictError {
    /// Body is not JSON, or not a JSON object.
    InvalidJson(String),
    /// A feature value could not be coerced.
    InvalidInput(InputError),
    /// The model rejected the row or returned a non-finite probability.
    Model(String),
}

impl std::fmt::Display for PredictError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PredictError::InvalidJson(msg) => write!(f, "invalid JSON body: {msg}"),
            PredictError::InvalidInput(e) => write!(f, "{e}"),
            PredictError::Model(msg) => write!(f, "model error: {msg}"),
        }
    }
}

impl std::error::Error for PredictError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PredictError::InvalidInput(e) => Some(e),
            _ => None,
        }
    }
}

impl From<InputError> for PredictError {
    fn from(e: InputError) -> Self {
        PredictError::InvalidInput(e)
    }
}

impl PredictError {
    /// Short label used for the `kind` metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            PredictError::InvalidJson(_) => "invalid_json",
            PredictError::InvalidInput(_) => "invalid_input",
            PredictError::Model(_) => "model",
        }
    }
}
