//! Persisted model artifacts
//!
//! An artifact bundles the fitted estimator with the exact feature order it
//! was fit on. That order is the only description of what the model expects;
//! every prediction must present features in it.

mod location;
mod store;

pub use location::ArtifactLocation;
pub use store::{compute_checksum, ArtifactEncoding, LoadedArtifact, SavedArtifact};

use crate::error::{Result, RulError};
use crate::estimator::{ForestParams, Node, RandomForest, Regressor, Scaler};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Current on-disk format version
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Facts recorded when the artifact was produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetadata {
    pub row_count: usize,
    /// Test-set RMSE, absent if evaluation did not complete
    #[serde(default)]
    pub rmse: Option<f64>,
    pub trained_at: DateTime<Utc>,
    pub forest: ForestParams,
}

/// Fitted estimator plus its feature schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    format_version: u32,
    feature_order: Vec<String>,
    estimator: RandomForest,
    #[serde(default)]
    scaler: Option<Scaler>,
    training_metadata: TrainingMetadata,
}

impl ModelArtifact {
    pub(crate) fn new(
        feature_order: Vec<String>,
        estimator: RandomForest,
        scaler: Option<Scaler>,
        training_metadata: TrainingMetadata,
    ) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            feature_order,
            estimator,
            scaler,
            training_metadata,
        }
    }

    /// Record the evaluation score before the artifact is persisted
    pub(crate) fn with_rmse(mut self, rmse: f64) -> Self {
        self.training_metadata.rmse = Some(rmse);
        self
    }

    pub fn format_version(&self) -> u32 {
        self.format_version
    }

    pub fn feature_order(&self) -> &[String] {
        &self.feature_order
    }

    pub fn estimator(&self) -> &RandomForest {
        &self.estimator
    }

    pub fn scaler(&self) -> Option<&Scaler> {
        self.scaler.as_ref()
    }

    pub fn metadata(&self) -> &TrainingMetadata {
        &self.training_metadata
    }

    /// Reject artifacts that cannot serve predictions
    pub fn validate(&self, location: Option<PathBuf>) -> Result<()> {
        if self.format_version > ARTIFACT_FORMAT_VERSION {
            return Err(RulError::incompatible(
                location,
                format!(
                    "format version {} is newer than supported version {}",
                    self.format_version, ARTIFACT_FORMAT_VERSION
                ),
            ));
        }
        if self.feature_order.is_empty() {
            return Err(RulError::incompatible(location, "feature_order is empty"));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.feature_order.iter().find(|f| !seen.insert(f.as_str())) {
            return Err(RulError::incompatible(
                location,
                format!("feature '{}' appears twice in feature_order", dup),
            ));
        }
        self.estimator
            .validate(self.feature_order.len())
            .map_err(|reason| RulError::incompatible(location.clone(), reason))?;
        if let Some(scaler) = &self.scaler {
            if scaler.width() != self.feature_order.len() {
                return Err(RulError::incompatible(
                    location,
                    format!(
                        "scaler covers {} features but feature_order has {}",
                        scaler.width(),
                        self.feature_order.len()
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Predict a row already arranged in `feature_order`
    pub fn predict_ordered(&self, row: &[f64]) -> f64 {
        match &self.scaler {
            Some(scaler) => self.estimator.predict_row(&scaler.transform(row)),
            None => self.estimator.predict_row(row),
        }
    }

    /// Example input rows in `feature_order`, in raw feature units
    ///
    /// Row `i` takes, per feature, the `(i + 1) / (rows + 1)` quantile of
    /// the split thresholds the forest learned on it. Features never split
    /// on get `0.0`.
    pub fn sample_rows(&self, rows: usize) -> Vec<Vec<f64>> {
        let width = self.feature_order.len();
        let mut thresholds: Vec<Vec<f64>> = vec![Vec::new(); width];
        for tree in self.estimator.trees() {
            for node in tree.nodes() {
                if let Node::Split {
                    feature, threshold, ..
                } = node
                {
                    if let Some(values) = thresholds.get_mut(*feature) {
                        values.push(*threshold);
                    }
                }
            }
        }
        for values in &mut thresholds {
            values.sort_by(f64::total_cmp);
        }

        (0..rows)
            .map(|i| {
                let q = (i + 1) as f64 / (rows + 1) as f64;
                let row: Vec<f64> = thresholds
                    .iter()
                    .map(|values| match values.len() {
                        0 => 0.0,
                        n => values[((n - 1) as f64 * q).round() as usize],
                    })
                    .collect();
                match &self.scaler {
                    Some(scaler) => scaler.inverse_transform(&row),
                    None => row,
                }
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// A small artifact over `features` where the target is the sum of the inputs
    pub fn artifact(features: &[&str]) -> ModelArtifact {
        let width = features.len();
        let x: Vec<Vec<f64>> = (0..30)
            .map(|i| (0..width).map(|c| ((i * (c + 1)) % 13) as f64).collect())
            .collect();
        let y: Vec<f64> = x.iter().map(|r| r.iter().sum()).collect();
        let params = ForestParams {
            n_estimators: 4,
            ..Default::default()
        };
        let forest = RandomForest::fit(&x, &y, &params);
        ModelArtifact::new(
            features.iter().map(|f| f.to_string()).collect(),
            forest,
            None,
            TrainingMetadata {
                row_count: x.len(),
                rmse: None,
                trained_at: Utc::now(),
                forest: params,
            },
        )
    }
}
