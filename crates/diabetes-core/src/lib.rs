pub mod artifacts;
pub mod config;
pub mod contrib;
pub mod error;
pub mod forest;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod predictor;
pub mod schema;
pub mod util;

pub use artifacts::ModelArtifacts;
pub use config::Config;
pub use error::PredictError;
pub use pipeline::AppCore;
pub use schema::{PatientRecord, PredictResponse};
