//! Pearson correlation ranking against the RUL label

use crate::models::{sensor_name, LabeledRecord, SENSOR_COUNT};

/// A feature with its ranking score
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RankedFeature {
    pub name: String,
    /// Signed score; `None` when undefined (constant column or too few pairs)
    pub score: Option<f64>,
}

/// Pearson correlation over pairwise-complete observations
///
/// Returns `None` for fewer than two complete pairs or zero variance.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter(|(a, b)| !a.is_nan() && !b.is_nan())
        .map(|(&a, &b)| (a, b))
        .collect();
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (a, b) in &pairs {
        let (dx, dy) = (a - mean_x, b - mean_y);
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x <= 0.0 || var_y <= 0.0 {
        return None;
    }
    Some((cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0))
}

/// Rank every sensor by absolute correlation with RUL, strongest first
///
/// The sort is stable: equal scores keep sensor order, and undefined
/// correlations rank after all defined ones.
pub fn rank_by_correlation(records: &[LabeledRecord]) -> Vec<RankedFeature> {
    let rul: Vec<f64> = records.iter().map(|r| r.rul as f64).collect();

    let mut ranked: Vec<RankedFeature> = (0..SENSOR_COUNT)
        .map(|s| {
            let values: Vec<f64> = records.iter().map(|r| r.record.sensors[s]).collect();
            RankedFeature {
                name: sensor_name(s),
                score: pearson(&values, &rul),
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        let key = |f: &RankedFeature| f.score.map(f64::abs);
        match (key(a), key(b)) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }
    });
    ranked
}
