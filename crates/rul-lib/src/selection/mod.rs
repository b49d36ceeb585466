//! Two-stage feature selection
//!
//! Stage 1 keeps the `top_n` sensors with the strongest absolute Pearson
//! correlation to RUL. Stage 2 fits an auxiliary forest on those and keeps
//! the `top_k` by impurity importance. Both stages are pure functions of the
//! labeled records and the configuration.

mod correlation;
mod importance;

pub use correlation::{pearson, rank_by_correlation, RankedFeature};
pub use importance::rank_by_importance;

use crate::estimator::ForestParams;
use crate::models::LabeledRecord;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Default Stage-1 feature count
pub const DEFAULT_TOP_N: usize = 10;

/// Default Stage-2 feature count
pub const DEFAULT_TOP_K: usize = 5;

/// Feature selection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Features kept by correlation ranking
    pub top_n: usize,
    /// Features kept by importance ranking
    pub top_k: usize,
    /// Auxiliary forest used for importance ranking
    pub importance_forest: ForestParams,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            top_k: DEFAULT_TOP_K,
            importance_forest: ForestParams::default(),
        }
    }
}

/// Result of both selection stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSelection {
    /// Stage-1 features with their correlation, strongest first
    pub correlations: Vec<RankedFeature>,
    /// Stage-2 features with their importance, most important first
    pub importances: Vec<RankedFeature>,
}

impl FeatureSelection {
    /// Stage-1 feature names
    pub fn stage1(&self) -> Vec<String> {
        self.correlations.iter().map(|f| f.name.clone()).collect()
    }

    /// Final (Stage-2) feature names in ranked order
    pub fn features(&self) -> Vec<String> {
        self.importances.iter().map(|f| f.name.clone()).collect()
    }
}

/// Runs both stages with a fixed configuration
#[derive(Debug, Clone, Default)]
pub struct FeatureSelector {
    config: SelectionConfig,
}

impl FeatureSelector {
    pub fn new(config: SelectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    /// Stage 1: top `top_n` sensors by absolute correlation (all if fewer exist)
    pub fn correlation_stage(&self, records: &[LabeledRecord]) -> Vec<RankedFeature> {
        let mut ranked = rank_by_correlation(records);
        ranked.truncate(self.config.top_n);
        ranked
    }

    /// Stage 2: top `top_k` of `candidates` by importance (all if fewer exist)
    pub fn importance_stage(&self, records: &[LabeledRecord], candidates: &[String]) -> Vec<RankedFeature> {
        let mut ranked = rank_by_importance(records, candidates, &self.config.importance_forest);
        ranked.truncate(self.config.top_k);
        ranked
    }

    /// Run both stages
    pub fn select(&self, records: &[LabeledRecord]) -> FeatureSelection {
        let correlations = self.correlation_stage(records);
        let candidates: Vec<String> = correlations.iter().map(|f| f.name.clone()).collect();
        info!(top_n = self.config.top_n, features = ?candidates, "Stage 1 correlation selection");

        let importances = self.importance_stage(records, &candidates);
        info!(
            top_k = self.config.top_k,
            features = ?importances.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(),
            "Stage 2 importance selection"
        );

        FeatureSelection {
            correlations,
            importances,
        }
    }
}
