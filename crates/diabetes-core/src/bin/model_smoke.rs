use anyhow::Context;
use clap::Parser;
use diabetes_core::{AppCore, Config};
use std::path::PathBuf;

/// model_smoke: load an exported model directory and score one record.
///
/// Run this against a fresh export before deploying it.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Directory holding feature_list.json and model.json(.gz)
    #[arg(long, env = "MODEL_DIR")]
    model_dir: PathBuf,

    /// Patient record as a JSON object
    #[arg(
        long,
        default_value = r#"{"age":55,"bmi":28.5,"blood_glucose_level":140,"HbA1c_level":6.1,"hypertension":1,"heart_disease":0,"gender_encoded":1,"smoking_history_encoded":2}"#
    )]
    record: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let core = AppCore::load(Config::default(), &args.model_dir)?;
    let art = &core.artifacts;
    println!("features={} {:?}", art.schema.len(), art.schema.names());

    let resp = core
        .predict_json(args.record.as_bytes())
        .context("score record")?;

    println!("current_risk={:.2}", resp.current_risk);
    println!("improvement_risk={:.2}", resp.improvement_risk);
    println!(
        "improved bmi={:.1} blood_glucose_level={:.1}",
        resp.improved_values.bmi, resp.improved_values.blood_glucose_level
    );
    println!("contributions:");
    for c in &resp.feature_contributions {
        println!("  {:<24} {:>10.2} {:>8.2}", c.key, c.value, c.score);
    }

    Ok(())
}
