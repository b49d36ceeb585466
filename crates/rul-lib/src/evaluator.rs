//! Test-set evaluation
//!
//! Each test unit is represented by its last observed cycle. Snapshots are
//! joined to the ground truth by position and scored with RMSE.

use crate::artifact::ModelArtifact;
use crate::error::{Result, RulError};
use crate::labeler::{attach_truth, GroundTruthTable};
use crate::models::{sensor_index, LabeledRecord, SensorRecord};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

/// Last-cycle record of every unit
///
/// Units appear in the order they are first seen. On a tie at the maximum
/// cycle the first record wins.
pub fn last_cycle_snapshot(records: &[SensorRecord]) -> Vec<SensorRecord> {
    let mut slot: HashMap<u32, usize> = HashMap::new();
    let mut snapshot: Vec<SensorRecord> = Vec::new();

    for record in records {
        match slot.get(&record.unit) {
            Some(&i) => {
                if record.cycle > snapshot[i].cycle {
                    snapshot[i] = record.clone();
                }
            }
            None => {
                slot.insert(record.unit, snapshot.len());
                snapshot.push(record.clone());
            }
        }
    }

    debug!(records = records.len(), units = snapshot.len(), "Built last-cycle snapshot");
    snapshot
}

/// Root mean squared error, `None` for empty or mismatched inputs
pub fn rmse(y_true: &[f64], y_pred: &[f64]) -> Option<f64> {
    if y_true.is_empty() || y_true.len() != y_pred.len() {
        return None;
    }
    let sum: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (p - t).powi(2))
        .sum();
    Some((sum / y_true.len() as f64).sqrt())
}

/// One scored test unit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitEvaluation {
    pub unit: u32,
    pub cycle: u32,
    pub truth: u32,
    pub predicted: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub rmse: f64,
    pub units: Vec<UnitEvaluation>,
    /// Snapshot records with their attached truth
    pub snapshot: Vec<LabeledRecord>,
}

/// Score `artifact` on the last cycle of every test unit
pub fn evaluate(
    artifact: &ModelArtifact,
    test_records: &[SensorRecord],
    truth: &GroundTruthTable,
) -> Result<Evaluation> {
    let indices = feature_indices(artifact)?;
    let snapshot = attach_truth(&last_cycle_snapshot(test_records), truth)?;
    if snapshot.is_empty() {
        return Err(RulError::Evaluation("test log has no units".to_string()));
    }

    let units: Vec<UnitEvaluation> = snapshot
        .iter()
        .map(|labeled| UnitEvaluation {
            unit: labeled.unit(),
            cycle: labeled.cycle(),
            truth: labeled.rul,
            predicted: artifact.predict_ordered(&labeled.record.project(&indices)),
        })
        .collect();

    let y_true: Vec<f64> = units.iter().map(|u| u.truth as f64).collect();
    let y_pred: Vec<f64> = units.iter().map(|u| u.predicted).collect();
    let score = rmse(&y_true, &y_pred)
        .ok_or_else(|| RulError::Evaluation("no predictions to score".to_string()))?;

    info!(units = units.len(), rmse = score, "Evaluated model on test snapshot");
    Ok(Evaluation {
        rmse: score,
        units,
        snapshot,
    })
}

/// Sensor channel of every artifact feature, in `feature_order`
fn feature_indices(artifact: &ModelArtifact) -> Result<Vec<usize>> {
    artifact
        .feature_order()
        .iter()
        .map(|name| {
            sensor_index(name).ok_or_else(|| {
                RulError::incompatible(None, format!("feature '{}' is not a sensor column", name))
            })
        })
        .collect()
}
