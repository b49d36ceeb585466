//! CART regression tree
//!
//! Splits minimize the summed squared error of the children. Rows whose
//! split feature is `NaN` always take the right branch, both while fitting
//! and while predicting.

use super::{ForestParams, Regressor};
use serde::{Deserialize, Serialize};

/// Tree node; children always have a larger index than their parent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A fitted regression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
    n_features: usize,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl RegressionTree {
    /// Fit on the rows selected by `sample` (indices may repeat)
    ///
    /// The squared-error reduction of every split is added to
    /// `importances[feature]`.
    pub fn fit(
        x: &[Vec<f64>],
        y: &[f64],
        sample: &[usize],
        params: &ForestParams,
        importances: &mut [f64],
    ) -> Self {
        let n_features = importances.len();
        let mut nodes = vec![Node::Leaf { value: 0.0 }];
        let mut stack: Vec<(usize, Vec<usize>, usize)> = vec![(0, sample.to_vec(), 0)];

        while let Some((slot, indices, depth)) = stack.pop() {
            let n = indices.len();
            let mean = if n == 0 {
                0.0
            } else {
                indices.iter().map(|&i| y[i]).sum::<f64>() / n as f64
            };

            let splittable = n >= params.min_samples_split
                && n >= 2 * params.min_samples_leaf
                && params.max_depth.map_or(true, |max| depth < max)
                && indices.iter().any(|&i| y[i] != y[indices[0]]);

            let best = if splittable {
                best_split(x, y, &indices, n_features, params.min_samples_leaf)
            } else {
                None
            };

            match best {
                Some(split) => {
                    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = indices
                        .iter()
                        .partition(|&&i| goes_left(x[i][split.feature], split.threshold));

                    let left = nodes.len();
                    let right = left + 1;
                    nodes.push(Node::Leaf { value: 0.0 });
                    nodes.push(Node::Leaf { value: 0.0 });
                    nodes[slot] = Node::Split {
                        feature: split.feature,
                        threshold: split.threshold,
                        left,
                        right,
                    };
                    importances[split.feature] += split.gain;

                    stack.push((right, right_rows, depth + 1));
                    stack.push((left, left_rows, depth + 1));
                }
                None => nodes[slot] = Node::Leaf { value: mean },
            }
        }

        Self { nodes, n_features }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Structural check of a deserialized tree against the expected width
    pub fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        if self.n_features != n_features {
            return Err(format!(
                "tree was fit on {} features but the artifact declares {}",
                self.n_features, n_features
            ));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if let Node::Split {
                feature,
                left,
                right,
                ..
            } = *node
            {
                if feature >= n_features {
                    return Err(format!("node {} splits on unknown feature index {}", i, feature));
                }
                if left <= i || right <= i || left >= self.nodes.len() || right >= self.nodes.len() {
                    return Err(format!("node {} has invalid children", i));
                }
            }
        }
        Ok(())
    }
}

impl Regressor for RegressionTree {
    fn predict_row(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let value = row.get(feature).copied().unwrap_or(f64::NAN);
                    idx = if goes_left(value, threshold) { left } else { right };
                }
            }
        }
    }

    fn n_features(&self) -> usize {
        self.n_features
    }
}

fn goes_left(value: f64, threshold: f64) -> bool {
    value <= threshold
}

/// Best split over all features, or `None` if nothing reduces the error
fn best_split(
    x: &[Vec<f64>],
    y: &[f64],
    indices: &[usize],
    n_features: usize,
    min_leaf: usize,
) -> Option<SplitCandidate> {
    let n = indices.len() as f64;
    let total: f64 = indices.iter().map(|&i| y[i]).sum();
    let parent_proxy = total * total / n;

    let mut best: Option<SplitCandidate> = None;
    let mut pairs: Vec<(f64, f64)> = Vec::with_capacity(indices.len());

    for feature in 0..n_features {
        pairs.clear();
        let mut nan_count = 0usize;
        for &i in indices {
            let v = x[i][feature];
            if v.is_nan() {
                nan_count += 1;
            } else {
                pairs.push((v, y[i]));
            }
        }
        if pairs.len() < 2 {
            continue;
        }
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut left_sum = 0.0;
        for pos in 0..pairs.len() - 1 {
            left_sum += pairs[pos].1;
            let (v, next) = (pairs[pos].0, pairs[pos + 1].0);
            if v == next {
                continue;
            }
            let n_left = pos + 1;
            let n_right = pairs.len() - n_left + nan_count;
            if n_left < min_leaf || n_right < min_leaf {
                continue;
            }
            // Right side holds the remaining finite rows plus every NaN row
            let right_sum = total - left_sum;

            let proxy = left_sum * left_sum / n_left as f64 + right_sum * right_sum / n_right as f64;
            let gain = proxy - parent_proxy;
            if gain <= 0.0 || best.as_ref().is_some_and(|b| gain <= b.gain) {
                continue;
            }

            let mut threshold = (v + next) / 2.0;
            if threshold >= next || !threshold.is_finite() {
                threshold = v;
            }
            best = Some(SplitCandidate {
                feature,
                threshold,
                gain,
            });
        }
    }
    best
}
