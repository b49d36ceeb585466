//! Model-importance ranking with an auxiliary random forest

use super::correlation::RankedFeature;
use crate::estimator::{ForestParams, RandomForest};
use crate::models::{sensor_index, LabeledRecord};

/// Rank `candidates` by the impurity importance of a forest fit on them
///
/// Scores are the normalized importances; equal scores keep candidate order.
/// Names outside the sensor vocabulary are ignored.
pub fn rank_by_importance(
    records: &[LabeledRecord],
    candidates: &[String],
    params: &ForestParams,
) -> Vec<RankedFeature> {
    let known: Vec<(&String, usize)> = candidates
        .iter()
        .filter_map(|name| sensor_index(name).map(|i| (name, i)))
        .collect();
    if known.is_empty() || records.is_empty() {
        return Vec::new();
    }

    let indices: Vec<usize> = known.iter().map(|(_, i)| *i).collect();
    let x: Vec<Vec<f64>> = records.iter().map(|r| r.record.project(&indices)).collect();
    let y: Vec<f64> = records.iter().map(|r| r.rul as f64).collect();

    let forest = RandomForest::fit(&x, &y, params);

    let mut ranked: Vec<RankedFeature> = known
        .iter()
        .zip(forest.feature_importances())
        .map(|((name, _), &imp)| RankedFeature {
            name: (*name).clone(),
            score: Some(imp),
        })
        .collect();
    ranked.sort_by(|a, b| {
        let (x, y) = (a.score.unwrap_or(0.0), b.score.unwrap_or(0.0));
        y.total_cmp(&x)
    });
    ranked
}
