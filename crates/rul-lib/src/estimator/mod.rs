//! Regression estimators
//!
//! A seeded random forest of CART regression trees with impurity-based
//! feature importances, plus the optional feature scalers.

mod forest;
mod scaling;
mod tree;

pub use forest::RandomForest;
pub use scaling::{Scaler, ScalingMethod};
pub use tree::{Node, RegressionTree};

use serde::{Deserialize, Serialize};

/// Trait for fitted regression estimators
pub trait Regressor: Send + Sync {
    /// Predict a single row whose columns follow the fit order
    fn predict_row(&self, row: &[f64]) -> f64;

    /// Number of input columns the estimator was fit on
    fn n_features(&self) -> usize;

    /// Predict many rows independently
    fn predict(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|r| self.predict_row(r)).collect()
    }
}

/// Random forest hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum tree depth (unlimited when `None`)
    pub max_depth: Option<usize>,
    /// Minimum samples required to split a node
    pub min_samples_split: usize,
    /// Minimum samples in each leaf
    pub min_samples_leaf: usize,
    /// Seed for bootstrap sampling
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: 42,
        }
    }
}

impl ForestParams {
    /// Check parameter ranges, returning a description of the first problem
    pub fn validate(&self) -> Result<(), String> {
        if self.n_estimators == 0 {
            return Err("n_estimators must be at least 1".to_string());
        }
        if self.min_samples_split < 2 {
            return Err("min_samples_split must be at least 2".to_string());
        }
        if self.min_samples_leaf == 0 {
            return Err("min_samples_leaf must be at least 1".to_string());
        }
        if self.max_depth == Some(0) {
            return Err("max_depth must be at least 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forest_params_default() {
        let params = ForestParams::default();
        assert_eq!(params.n_estimators, 100);
        assert_eq!(params.max_depth, None);
        assert_eq!(params.seed, 42);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_forest_params_validation() {
        let params = ForestParams {
            n_estimators: 0,
            ..Default::default()
        };
        assert!(params.validate().is_err());

        let params = ForestParams {
            min_samples_split: 1,
            ..Default::default()
        };
        assert!(params.validate().is_err());

        let params = ForestParams {
            max_depth: Some(0),
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }
}
