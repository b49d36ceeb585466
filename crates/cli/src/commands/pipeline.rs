//! Train/eval pipeline commands

use anyhow::{Context, Result};
use colored::Colorize;
use rul_lib::evaluator::{Evaluation, UnitEvaluation};
use rul_lib::selection::{FeatureSelection, RankedFeature};
use rul_lib::{Pipeline, PipelineConfig};
use serde_json::json;
use std::path::Path;
use tabled::Tabled;

use crate::output::{
    color_rmse, format_rul, format_score, print_heading, print_info, print_json, print_success,
    print_table, OutputFormat,
};

/// Row for ranked feature tables
#[derive(Tabled)]
struct FeatureRow {
    #[tabled(rename = "Rank")]
    rank: usize,
    #[tabled(rename = "Feature")]
    name: String,
    #[tabled(rename = "Score")]
    score: String,
}

/// Row for per-unit evaluation tables
#[derive(Tabled)]
struct UnitRow {
    #[tabled(rename = "Unit")]
    unit: u32,
    #[tabled(rename = "Last Cycle")]
    cycle: u32,
    #[tabled(rename = "True RUL")]
    truth: u32,
    #[tabled(rename = "Predicted RUL")]
    predicted: String,
    #[tabled(rename = "Error")]
    error: String,
}

fn feature_rows(ranked: &[RankedFeature]) -> Vec<FeatureRow> {
    ranked
        .iter()
        .enumerate()
        .map(|(i, f)| FeatureRow {
            rank: i + 1,
            name: f.name.clone(),
            score: format_score(f.score),
        })
        .collect()
}

fn unit_rows(units: &[UnitEvaluation]) -> Vec<UnitRow> {
    units
        .iter()
        .map(|u| UnitRow {
            unit: u.unit,
            cycle: u.cycle,
            truth: u.truth,
            predicted: format_rul(u.predicted),
            error: format!("{:+.2}", u.predicted - u.truth as f64),
        })
        .collect()
}

fn print_selection(selection: &FeatureSelection) {
    print_heading("Stage 1: correlation with RUL");
    print_table(feature_rows(&selection.correlations), "No features ranked");
    println!();
    print_heading("Stage 2: forest importance");
    print_table(feature_rows(&selection.importances), "No features ranked");
}

fn print_evaluation(evaluation: &Evaluation) {
    print_heading("Test snapshot (last cycle per unit)");
    print_table(unit_rows(&evaluation.units), "No test units");
    println!();
    println!("RMSE: {} cycles", color_rmse(evaluation.rmse));
}

/// Ingest and label the training log
pub fn prepare(config: &PipelineConfig, format: OutputFormat) -> Result<()> {
    let labeled = Pipeline::new(config.clone())
        .prepare()
        .context("Failed to prepare training data")?;

    let units = labeled
        .iter()
        .map(|r| r.unit())
        .collect::<std::collections::HashSet<_>>()
        .len();
    let path = &config.paths.train_with_rul;

    match format {
        OutputFormat::Json => print_json(&json!({
            "records": labeled.len(),
            "units": units,
            "output": path,
        }))?,
        OutputFormat::Table => {
            print_success(&format!(
                "Labeled {} records from {} units",
                labeled.len(),
                units
            ));
            print_info(&format!("Wrote {}", path.display()));
        }
    }
    Ok(())
}

/// Prepare, then run both selection stages
pub fn select(config: &PipelineConfig, format: OutputFormat) -> Result<()> {
    let (_, selection) = Pipeline::new(config.clone())
        .select()
        .context("Failed to select features")?;

    match format {
        OutputFormat::Json => print_json(&selection)?,
        OutputFormat::Table => {
            print_selection(&selection);
            println!();
            print_success(&format!(
                "Selected {}",
                selection.features().join(", ").cyan()
            ));
            print_info(&format!("Wrote {}", config.paths.train_selected.display()));
        }
    }
    Ok(())
}

/// Full train/eval run
pub fn train(config: &PipelineConfig, format: OutputFormat) -> Result<()> {
    let pipeline = Pipeline::new(config.clone());
    let outcome = pipeline.run().context("Training pipeline failed")?;

    match format {
        OutputFormat::Json => print_json(&json!({
            "run_id": pipeline.run_id(),
            "train_rows": outcome.train_rows,
            "features": outcome.artifact.feature_order(),
            "rmse": outcome.evaluation.rmse,
            "units": outcome.evaluation.units,
            "artifact": outcome.saved.path,
            "checksum": outcome.saved.checksum,
            "compressed": outcome.saved.compressed,
        }))?,
        OutputFormat::Table => {
            print_selection(&outcome.selection);
            println!();
            print_evaluation(&outcome.evaluation);
            println!();
            print_success(&format!(
                "Trained on {} rows with features {}",
                outcome.train_rows,
                outcome.artifact.feature_order().join(", ").cyan()
            ));
            print_info(&format!(
                "Saved {} (sha256 {}, run {})",
                outcome.saved.path.display(),
                &outcome.saved.checksum[..12],
                pipeline.run_id()
            ));
        }
    }
    Ok(())
}

/// Score an existing artifact on the configured test data
pub async fn evaluate(config: &PipelineConfig, artifact: Option<&Path>, format: OutputFormat) -> Result<()> {
    let loaded = crate::load_artifact(config, artifact).await?;
    let evaluation = Pipeline::new(config.clone())
        .evaluate_artifact(&loaded.artifact)
        .context("Evaluation failed")?;

    match format {
        OutputFormat::Json => print_json(&json!({
            "artifact": loaded.path,
            "rmse": evaluation.rmse,
            "units": evaluation.units,
        }))?,
        OutputFormat::Table => {
            print_info(&format!("Artifact {}", loaded.path.display()));
            print_evaluation(&evaluation);
        }
    }
    Ok(())
}
