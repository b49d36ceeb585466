//! Random forest regressor
//!
//! Bagged CART trees over bootstrap samples. Each tree's bootstrap is drawn
//! from its own seed, which is taken in order from an RNG seeded with
//! [`ForestParams::seed`], so a fixed seed reproduces the same forest.

use super::tree::RegressionTree;
use super::{ForestParams, Regressor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

/// A fitted random forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
    n_features: usize,
    /// Mean decrease in impurity per input column, normalized to sum to 1
    feature_importances: Vec<f64>,
}

impl RandomForest {
    /// Fit on row-major `x` against `y`
    ///
    /// Callers must pass at least one row and one column with `x.len() == y.len()`.
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: &ForestParams) -> Self {
        let start = Instant::now();
        let n_rows = y.len();
        let n_features = x.first().map_or(0, Vec::len);

        let mut seeder = StdRng::seed_from_u64(params.seed);
        let mut trees = Vec::with_capacity(params.n_estimators);
        let mut totals = vec![0.0; n_features];

        for _ in 0..params.n_estimators {
            let mut rng = StdRng::seed_from_u64(seeder.gen());
            let sample: Vec<usize> = (0..n_rows).map(|_| rng.gen_range(0..n_rows)).collect();

            let mut importances = vec![0.0; n_features];
            let tree = RegressionTree::fit(x, y, &sample, params, &mut importances);

            normalize(&mut importances);
            for (total, imp) in totals.iter_mut().zip(&importances) {
                *total += imp;
            }
            trees.push(tree);
        }
        normalize(&mut totals);

        debug!(
            trees = trees.len(),
            rows = n_rows,
            features = n_features,
            elapsed_ms = start.elapsed().as_millis(),
            "Fitted random forest"
        );

        Self {
            trees,
            n_features,
            feature_importances: totals,
        }
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    /// Structural check of a deserialized forest against the expected width
    pub fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.trees.is_empty() {
            return Err("estimator has no fitted trees".to_string());
        }
        if self.n_features != n_features {
            return Err(format!(
                "estimator was fit on {} features but feature_order has {}",
                self.n_features, n_features
            ));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(n_features).map_err(|e| format!("tree {}: {}", i, e))?;
        }
        Ok(())
    }
}

impl Regressor for RandomForest {
    fn predict_row(&self, row: &[f64]) -> f64 {
        let sum: f64 = self.trees.iter().map(|t| t.predict_row(row)).sum();
        sum / self.trees.len() as f64
    }

    fn n_features(&self) -> usize {
        self.n_features
    }
}

fn normalize(values: &mut [f64]) {
    let sum: f64 = values.iter().sum();
    if sum > 0.0 {
        values.iter_mut().for_each(|v| *v /= sum);
    }
}
