//! Inference and artifact commands

use anyhow::{bail, Context, Result};
use colored::Colorize;
use rul_lib::table::Table;
use rul_lib::{
    render_metrics, FeatureMap, InferenceService, MaintenanceAdvice, PipelineConfig, PredictionResult,
};
use serde::Serialize;
use serde_json::json;
use std::path::Path;
use tabled::Tabled;

use crate::output::{
    color_advice, color_missing, format_bytes, format_rul, format_score, print_heading, print_info,
    print_json, print_success, print_table, print_warning, OutputFormat,
};

/// Row for prediction tables
#[derive(Tabled)]
struct PredictionRow {
    #[tabled(rename = "Input")]
    input: String,
    #[tabled(rename = "Predicted RUL")]
    predicted: String,
    #[tabled(rename = "Advice")]
    advice: String,
    #[tabled(rename = "Defaulted Features")]
    missing: String,
}

/// Prediction as shown to users, rounded to two decimals
#[derive(Serialize)]
struct PredictionOutput<'a> {
    input: &'a str,
    predicted_rul: f64,
    advice: MaintenanceAdvice,
    advice_message: &'static str,
    missing_features: &'a [String],
}

/// Parse `name=value` pairs into one input record
pub fn parse_features(pairs: &[String]) -> Result<FeatureMap> {
    pairs
        .iter()
        .map(|pair| {
            let (name, value) = pair
                .split_once('=')
                .with_context(|| format!("Invalid feature '{}', expected NAME=VALUE", pair))?;
            let value: f64 = value
                .trim()
                .parse()
                .with_context(|| format!("Invalid value for feature '{}'", name.trim()))?;
            Ok((name.trim().to_string(), value))
        })
        .collect()
}

/// Predict from a CSV file and/or individual feature values
pub async fn predict(
    config: &PipelineConfig,
    artifact: Option<&Path>,
    input: Option<&Path>,
    features: &[String],
    emit_metrics: bool,
    format: OutputFormat,
) -> Result<()> {
    if input.is_none() && features.is_empty() {
        bail!("Nothing to predict: pass --input <csv> and/or --feature NAME=VALUE");
    }

    let loaded = crate::load_artifact(config, artifact).await?;
    let service = InferenceService::new(loaded.artifact)?;

    let mut results: Vec<PredictionResult> = Vec::new();
    if let Some(path) = input {
        let rows = service
            .predict_csv(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        results.extend(rows);
    }
    if !features.is_empty() {
        let record = parse_features(features)?;
        results.push(service.predict("manual", &record));
    }

    let thresholds = &config.maintenance;
    match format {
        OutputFormat::Json => {
            let outputs: Vec<PredictionOutput> = results
                .iter()
                .map(|r| {
                    let advice = r.advice(thresholds);
                    PredictionOutput {
                        input: &r.input_identifier,
                        predicted_rul: r.rounded(),
                        advice,
                        advice_message: advice.message(),
                        missing_features: &r.missing_features,
                    }
                })
                .collect();
            print_json(&outputs)?;
        }
        OutputFormat::Table => {
            let degraded = results.iter().filter(|r| !r.missing_features.is_empty()).count();
            let rows: Vec<PredictionRow> = results
                .iter()
                .map(|r| PredictionRow {
                    input: r.input_identifier.clone(),
                    predicted: format_rul(r.predicted_rul),
                    advice: color_advice(r.advice(thresholds)),
                    missing: color_missing(&r.missing_features),
                })
                .collect();
            print_table(rows, "No rows to predict");
            let urgent = results
                .iter()
                .filter(|r| r.advice(thresholds) == MaintenanceAdvice::Urgent)
                .count();
            if urgent > 0 {
                print_warning(&format!(
                    "{} of {} inputs: {}",
                    urgent,
                    results.len(),
                    MaintenanceAdvice::Urgent.message()
                ));
            }
            if degraded > 0 {
                print_warning(&format!(
                    "{} of {} inputs were missing expected features (defaulted to 0.0)",
                    degraded,
                    results.len()
                ));
            }
        }
    }

    if emit_metrics {
        let stats = service.stats();
        print!("{}", render_metrics());
        println!(
            "# inference stats: total_predictions={} degraded_predictions={} missing_features={}",
            stats.total_predictions, stats.degraded_predictions, stats.missing_features
        );
    }
    Ok(())
}

/// Show an artifact's schema and training metadata
pub async fn inspect(config: &PipelineConfig, artifact: Option<&Path>, format: OutputFormat) -> Result<()> {
    let loaded = crate::load_artifact(config, artifact).await?;
    let model = &loaded.artifact;
    let meta = model.metadata();
    let scaling = model.scaler().map(|s| s.method.to_string());

    match format {
        OutputFormat::Json => print_json(&json!({
            "path": loaded.path,
            "format_version": model.format_version(),
            "feature_order": model.feature_order(),
            "feature_importances": model.estimator().feature_importances(),
            "trees": model.estimator().trees().len(),
            "scaling": scaling,
            "training_metadata": meta,
            "checksum": loaded.checksum,
            "size_bytes": loaded.size_bytes,
            "compressed": loaded.compressed,
        }))?,
        OutputFormat::Table => {
            print_heading("Model Artifact");
            println!("Path:            {}", loaded.path.display().to_string().cyan());
            println!("Format version:  {}", model.format_version());
            println!("Trees:           {}", model.estimator().trees().len());
            println!("Scaling:         {}", scaling.as_deref().unwrap_or("none"));
            println!("Trained at:      {}", meta.trained_at.format("%Y-%m-%d %H:%M:%S UTC"));
            println!("Training rows:   {}", meta.row_count);
            println!("Test RMSE:       {}", format_score(meta.rmse));
            println!(
                "Stored:          {}{}",
                format_bytes(loaded.size_bytes),
                if loaded.compressed { " (zstd)" } else { "" }
            );
            println!("SHA256:          {}", loaded.checksum);
            println!();

            println!("{}", "Model was trained on these features, in order:".bold());
            for (i, (name, importance)) in model
                .feature_order()
                .iter()
                .zip(model.estimator().feature_importances())
                .enumerate()
            {
                println!("  {:>2}. {:<12} importance {:.4}", i + 1, name, importance);
            }
        }
    }
    Ok(())
}

/// Write a sample input file for an artifact's feature order
pub async fn sample(
    config: &PipelineConfig,
    artifact: Option<&Path>,
    output: &Path,
    rows: usize,
    format: OutputFormat,
) -> Result<()> {
    let loaded = crate::load_artifact(config, artifact).await?;
    let model = &loaded.artifact;

    let mut table = Table::new(model.feature_order().to_vec());
    for row in model.sample_rows(rows) {
        table.push_row(row)?;
    }
    table
        .write_csv(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    match format {
        OutputFormat::Json => print_json(&json!({
            "output": output,
            "rows": table.len(),
            "features": model.feature_order(),
        }))?,
        OutputFormat::Table => {
            print_success(&format!("Wrote {} sample rows to {}", table.len(), output.display()));
            print_info(&format!("Columns: {}", model.feature_order().join(", ")));
        }
    }
    Ok(())
}
