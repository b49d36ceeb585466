//! Model training
//!
//! Fits the random forest on the selected feature columns and captures the
//! exact column order used during fit as the artifact's `feature_order`.

use crate::artifact::{ModelArtifact, TrainingMetadata};
use crate::error::{Result, RulError};
use crate::estimator::{ForestParams, RandomForest, Scaler, ScalingMethod};
use crate::models::{LabeledRecord, CYCLE_COLUMN, RUL_COLUMN, UNIT_COLUMN};
use crate::table::Table;
use chrono::Utc;
use std::time::Instant;
use tracing::info;

const STAGE: &str = "train";

#[derive(Debug, Clone, Default)]
pub struct ModelTrainer {
    params: ForestParams,
    scaling: Option<ScalingMethod>,
}

impl ModelTrainer {
    pub fn new(params: ForestParams) -> Self {
        Self { params, scaling: None }
    }

    /// Fit a scaler on the training features and store it in the artifact
    pub fn with_scaling(mut self, method: Option<ScalingMethod>) -> Self {
        self.scaling = method;
        self
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    /// Fit on a table of `unit`, `cycle`, feature columns and `RUL`
    ///
    /// Every column other than `unit`, `cycle` and `RUL` is a feature, taken
    /// in table order.
    pub fn train_table(&self, table: &Table) -> Result<ModelArtifact> {
        self.params.validate().map_err(RulError::Training)?;
        if table.is_empty() {
            return Err(RulError::Training("training table has no rows".to_string()));
        }

        let rul_idx = table.column_index(RUL_COLUMN).ok_or_else(|| RulError::MissingColumn {
            stage: STAGE.to_string(),
            column: RUL_COLUMN.to_string(),
        })?;
        let feature_cols: Vec<(usize, String)> = table
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, name)| ![UNIT_COLUMN, CYCLE_COLUMN, RUL_COLUMN].contains(&name.as_str()))
            .map(|(i, name)| (i, name.clone()))
            .collect();
        if feature_cols.is_empty() {
            return Err(RulError::Training("no feature columns selected".to_string()));
        }

        let mut x = Vec::with_capacity(table.len());
        let mut y = Vec::with_capacity(table.len());
        for (line, row) in table.rows().iter().enumerate() {
            let target = row[rul_idx];
            if !target.is_finite() {
                return Err(RulError::Training(format!("row {} has no RUL label", line + 1)));
            }
            y.push(target);
            x.push(feature_cols.iter().map(|(i, _)| row[*i]).collect::<Vec<f64>>());
        }

        let scaler = self.scaling.map(|method| Scaler::fit(method, &x));
        if let Some(scaler) = &scaler {
            x = x.iter().map(|row| scaler.transform(row)).collect();
        }

        let start = Instant::now();
        let forest = RandomForest::fit(&x, &y, &self.params);
        let feature_order: Vec<String> = feature_cols.into_iter().map(|(_, name)| name).collect();

        info!(
            rows = y.len(),
            features = ?feature_order,
            n_estimators = self.params.n_estimators,
            scaling = ?self.scaling,
            elapsed_ms = start.elapsed().as_millis(),
            "Trained RUL model"
        );

        Ok(ModelArtifact::new(
            feature_order,
            forest,
            scaler,
            TrainingMetadata {
                row_count: y.len(),
                rmse: None,
                trained_at: Utc::now(),
                forest: self.params.clone(),
            },
        ))
    }

    /// Fit on labeled records restricted to `features`, in that order
    pub fn train(&self, records: &[LabeledRecord], features: &[String]) -> Result<ModelArtifact> {
        self.train_table(&Table::from_labeled_features(records, features))
    }
}
