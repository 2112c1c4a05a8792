use crate::forest::RandomForest;
use crate::model::ProbabilityModel;
use crate::schema::PatientRecord;
use anyhow::{anyhow, ensure, Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_MODEL_DIR: &str = "clinical_model_export";
pub const MODEL_FILE: &str = "model.json";
pub const MODEL_FILE_GZ: &str = "model.json.gz";
pub const FEATURE_LIST_FILE: &str = "feature_list.json";
pub const FEATURES_TXT_FILE: &str = "features.txt";

/// Model directory next to the running executable.
pub fn default_model_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("locate current executable")?;
    let dir = exe
        .parent()
        .ok_or_else(|| anyhow!("executable has no parent dir: {}", exe.display()))?;
    Ok(dir.join(DEFAULT_MODEL_DIR))
}

/// Ordered training columns. Non-empty, unique names.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl FeatureSchema {
    pub fn new(names: Vec<String>) -> Result<Self> {
        ensure!(!names.is_empty(), "feature schema is empty");
        let mut seen = HashSet::with_capacity(names.len());
        for n in &names {
            ensure!(!n.trim().is_empty(), "feature schema contains an empty name");
            ensure!(seen.insert(n.as_str()), "duplicate feature in schema: {n}");
        }
        Ok(Self { names })
    }

    #[inline]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

/// Importance weight per schema feature, in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportanceMap {
    weights: Vec<(String, f64)>,
}

impl ImportanceMap {
    pub fn pair(schema: &FeatureSchema, importances: &[f64]) -> Result<Self> {
        ensure!(
            importances.len() == schema.len(),
            "model has {} feature importances but the schema lists {} features",
            importances.len(),
            schema.len()
        );
        let mut weights = Vec::with_capacity(schema.len());
        for (name, w) in schema.names().iter().zip(importances) {
            ensure!(
                w.is_finite() && *w >= 0.0,
                "importance for {name} must be finite and non-negative, got {w}"
            );
            weights.push((name.clone(), *w));
        }
        Ok(Self { weights })
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.weights.iter().find(|(n, _)| n == name).map(|(_, w)| *w)
    }

    /// Weights aligned with the schema.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(n, w)| (n.as_str(), *w))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

/// Everything loaded at start: immutable for the life of the process.
pub struct ModelArtifacts {
    pub model_dir: Option<PathBuf>,
    pub model: Arc<dyn ProbabilityModel>,
    pub schema: FeatureSchema,
    pub importances: ImportanceMap,
}

impl std::fmt::Debug for ModelArtifacts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelArtifacts")
            .field("model_dir", &self.model_dir)
            .field("schema", &self.schema)
            .field("importances", &self.importances)
            .finish_non_exhaustive()
    }
}

impl ModelArtifacts {
    /// Load `feature_list.json` (or `features.txt`) and `model.json` (or `model.json.gz`).
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let names = load_feature_names(dir)?;
        let schema = FeatureSchema::new(names)
            .with_context(|| format!("invalid feature schema in {}", dir.display()))?;

        let forest = load_forest(dir)?;
        ensure!(
            forest.n_features() == schema.len(),
            "model expects {} features but the schema lists {}",
            forest.n_features(),
            schema.len()
        );
        let importances = ImportanceMap::pair(&schema, forest.feature_importances())?;

        info!(
            model_dir = %dir.display(),
            trees = forest.n_trees(),
            features = schema.len(),
            "model loaded"
        );
        info!(feature_list = ?schema.names(), "model expects {} features", schema.len());

        let mut out = Self::from_parts(Arc::new(forest), schema, importances);
        out.model_dir = Some(dir.to_path_buf());
        Ok(out)
    }

    /// Assemble from already-built parts (tests, custom model backends).
    pub fn from_parts(
        model: Arc<dyn ProbabilityModel>,
        schema: FeatureSchema,
        importances: ImportanceMap,
    ) -> Self {
        warn_on_schema_gaps(&schema);
        Self {
            model_dir: None,
            model,
            schema,
            importances,
        }
    }
}

fn warn_on_schema_gaps(schema: &FeatureSchema) {
    for name in schema.names() {
        if !PatientRecord::is_known(name) {
            warn!(feature = %name, "schema feature has no request field, it will always be 0");
        }
    }
    for name in ["bmi", "blood_glucose_level"] {
        if schema.index_of(name).is_none() {
            warn!(feature = %name, "improvement feature is not in the schema");
        }
    }
}

fn load_feature_names(dir: &Path) -> Result<Vec<String>> {
    let json_path = dir.join(FEATURE_LIST_FILE);
    if json_path.exists() {
        let s = fs::read_to_string(&json_path)
            .with_context(|| format!("read {FEATURE_LIST_FILE}: {}", json_path.display()))?;
        let names: Vec<String> = serde_json::from_str(&s)
            .with_context(|| format!("parse {FEATURE_LIST_FILE}: {}", json_path.display()))?;
        return Ok(names);
    }

    let txt_path = dir.join(FEATURES_TXT_FILE);
    if txt_path.exists() {
        let s = fs::read_to_string(&txt_path)
            .with_context(|| format!("read {FEATURES_TXT_FILE}: {}", txt_path.display()))?;
        return Ok(s
            .lines()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect());
    }

    Err(anyhow!(
        "missing feature schema in model_dir={}, expected {FEATURE_LIST_FILE} or {FEATURES_TXT_FILE}",
        dir.display()
    ))
}

fn load_forest(dir: &Path) -> Result<RandomForest> {
    let plain = dir.join(MODEL_FILE);
    if plain.exists() {
        let f = fs::File::open(&plain)
            .with_context(|| format!("open {MODEL_FILE}: {}", plain.display()))?;
        return RandomForest::from_reader(std::io::BufReader::new(f))
            .with_context(|| format!("load model: {}", plain.display()));
    }

    let gz = dir.join(MODEL_FILE_GZ);
    if gz.exists() {
        let f = fs::File::open(&gz)
            .with_context(|| format!("open {MODEL_FILE_GZ}: {}", gz.display()))?;
        let dec = flate2::read::GzDecoder::new(std::io::BufReader::new(f));
        return RandomForest::from_reader(dec)
            .with_context(|| format!("load model: {}", gz.display()));
    }

    Err(anyhow!(
        "missing model in model_dir={}, expected {MODEL_FILE} or {MODEL_FILE_GZ}",
        dir.display()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::tests::two_tree_export;
    use crate::model::ConstantModel;
    use std::io::Write;

    fn write_dir(names: &[&str], model: &crate::forest::ForestExport) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(FEATURE_LIST_FILE),
            serde_json::to_vec(names).unwrap(),
        )
        .unwrap();
        fs::write(dir.path().join(MODEL_FILE), serde_json::to_vec(model).unwrap()).unwrap();
        dir
    }

    #[test]
    fn test_load_from_dir() {
        let dir = write_dir(&["age", "bmi", "blood_glucose_level"], &two_tree_export());
        let art = ModelArtifacts::load_from_dir(dir.path()).unwrap();
        assert_eq!(art.schema.len(), 3);
        assert_eq!(art.schema.index_of("bmi"), Some(1));
        assert!((art.importances.get("age").unwrap() - 0.8).abs() < 1e-12);
        assert_eq!(art.model_dir.as_deref(), Some(dir.path()));
    }

    #[test]
    fn test_load_gzip_and_txt_schema() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(FEATURES_TXT_FILE), "age\n\nbmi\nblood_glucose_level\n").unwrap();
        let f = fs::File::create(dir.path().join(MODEL_FILE_GZ)).unwrap();
        let mut enc = flate2::write::GzEncoder::new(f, flate2::Compression::default());
        enc.write_all(&serde_json::to_vec(&two_tree_export()).unwrap())
            .unwrap();
        enc.finish().unwrap();

        let art = ModelArtifacts::load_from_dir(dir.path()).unwrap();
        assert_eq!(art.schema.names(), &["age", "bmi", "blood_glucose_level"]);
    }

    #[test]
    fn test_missing_artifacts_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = ModelArtifacts::load_from_dir(dir.path()).unwrap_err();
        assert!(err.to_string().contains("missing feature schema"));

        fs::write(dir.path().join(FEATURE_LIST_FILE), r#"["a","b","c"]"#).unwrap();
        let err = ModelArtifacts::load_from_dir(dir.path()).unwrap_err();
        assert!(err.to_string().contains("missing model"));
    }

    #[test]
    fn test_corrupt_model_is_fatal() {
        let dir = write_dir(&["a", "b", "c"], &two_tree_export());
        fs::write(dir.path().join(MODEL_FILE), b"{\"trees\": [").unwrap();
        assert!(ModelArtifacts::load_from_dir(dir.path()).is_err());
    }

    #[test]
    fn test_schema_length_mismatch_is_fatal() {
        let dir = write_dir(&["age", "bmi"], &two_tree_export());
        let err = ModelArtifacts::load_from_dir(dir.path()).unwrap_err();
        assert!(err.to_string().contains("schema lists 2"));
    }

    #[test]
    fn test_schema_validation() {
        assert!(FeatureSchema::new(vec![]).is_err());
        assert!(FeatureSchema::new(vec!["a".into(), "a".into()]).is_err());
        assert!(FeatureSchema::new(vec!["a".into(), " ".into()]).is_err());
    }

    #[test]
    fn test_importance_pairing() {
        let schema = FeatureSchema::new(vec!["a".into(), "b".into()]).unwrap();
        assert!(ImportanceMap::pair(&schema, &[0.5]).is_err());
        assert!(ImportanceMap::pair(&schema, &[0.5, f64::NAN]).is_err());

        let map = ImportanceMap::pair(&schema, &[0.7, 0.3]).unwrap();
        let pairs: Vec<_> = map.iter().collect();
        assert_eq!(pairs, vec![("a", 0.7), ("b", 0.3)]);

        let art = ModelArtifacts::from_parts(Arc::new(ConstantModel { positive: 0.1 }), schema, map);
        assert!(art.model_dir.is_none());
    }
}
