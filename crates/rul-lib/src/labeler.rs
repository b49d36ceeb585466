//! Remaining Useful Life labeling
//!
//! Training records are labeled with `RUL = max_cycle(unit) - cycle`. Test
//! snapshots receive externally supplied ground truth by position: the i-th
//! truth value belongs to the i-th test unit of the snapshot. There is no
//! key join on unit ids.

use crate::error::{Result, RulError};
use crate::models::{LabeledRecord, SensorRecord};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

/// Label every training record with its Remaining Useful Life
///
/// Record order is preserved. The last cycle of each unit gets `RUL = 0`.
pub fn label_training(records: &[SensorRecord]) -> Vec<LabeledRecord> {
    let mut max_cycle: HashMap<u32, u32> = HashMap::new();
    for r in records {
        let entry = max_cycle.entry(r.unit).or_insert(r.cycle);
        *entry = (*entry).max(r.cycle);
    }

    debug!(units = max_cycle.len(), records = records.len(), "Computed failure cycles");

    records
        .iter()
        .map(|r| LabeledRecord {
            record: r.clone(),
            rul: max_cycle[&r.unit] - r.cycle,
        })
        .collect()
}

/// Attach ground truth to a one-row-per-unit test snapshot by position
pub fn attach_truth(snapshot: &[SensorRecord], truth: &GroundTruthTable) -> Result<Vec<LabeledRecord>> {
    if snapshot.len() != truth.len() {
        return Err(RulError::Alignment {
            truth_rows: truth.len(),
            test_units: snapshot.len(),
        });
    }
    Ok(snapshot
        .iter()
        .zip(truth.values())
        .map(|(record, &rul)| LabeledRecord {
            record: record.clone(),
            rul,
        })
        .collect())
}

/// Ground-truth RUL values, one per test unit, in the test units' canonical order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundTruthTable {
    values: Vec<u32>,
}

impl GroundTruthTable {
    pub fn new(values: Vec<u32>) -> Self {
        Self { values }
    }

    /// Load a truth file with one value per line
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| RulError::InputUnreadable {
            path: path.to_path_buf(),
            source: e,
        })?;
        let table = Self::parse(&path.display().to_string(), file)?;
        info!(path = %path.display(), units = table.len(), "Loaded ground truth");
        Ok(table)
    }

    /// Parse truth values; only the first space-separated token of a line is used
    pub fn parse<R: Read>(source_name: &str, reader: R) -> Result<Self> {
        let mut values = Vec::new();
        for (idx, line) in BufReader::new(reader).lines().enumerate() {
            let line = line.map_err(|e| RulError::InputUnreadable {
                path: source_name.into(),
                source: e,
            })?;
            let Some(token) = line.split_whitespace().next() else {
                continue;
            };
            let invalid = |message: String| RulError::InvalidInput {
                source_name: source_name.to_string(),
                line: idx + 1,
                column: "RUL".to_string(),
                message,
            };
            let value: f64 = token
                .parse()
                .map_err(|_| invalid(format!("'{}' is not a number", token)))?;
            if value < 0.0 || value.fract() != 0.0 || value > u32::MAX as f64 {
                return Err(invalid(format!("{} is not a non-negative cycle count", value)));
            }
            values.push(value as u32);
        }
        Ok(Self { values })
    }

    pub fn values(&self) -> &[u32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SENSOR_COUNT;
    use proptest::prelude::*;

    fn record(unit: u32, cycle: u32) -> SensorRecord {
        SensorRecord {
            unit,
            cycle,
            sensors: [cycle as f64; SENSOR_COUNT],
        }
    }

    #[test]
    fn test_two_units_labels() {
        let records = vec![
            record(1, 1),
            record(1, 2),
            record(1, 3),
            record(2, 1),
            record(2, 2),
        ];
        let labeled = label_training(&records);
        let ruls: Vec<u32> = labeled.iter().map(|l| l.rul).collect();
        assert_eq!(ruls, vec![2, 1, 0, 1, 0]);
    }

    #[test]
    fn test_interleaved_units_keep_order() {
        let records = vec![record(2, 1), record(1, 1), record(2, 2), record(1, 2), record(1, 3)];
        let labeled = label_training(&records);
        let pairs: Vec<(u32, u32)> = labeled.iter().map(|l| (l.unit(), l.rul)).collect();
        assert_eq!(pairs, vec![(2, 1), (1, 2), (2, 0), (1, 1), (1, 0)]);
    }

    #[test]
    fn test_truth_attached_by_position_not_unit_id() {
        let snapshot = vec![record(7, 30), record(3, 12)];
        let truth = GroundTruthTable::new(vec![5, 12]);
        let labeled = attach_truth(&snapshot, &truth).unwrap();
        assert_eq!(labeled[0].unit(), 7);
        assert_eq!(labeled[0].rul, 5);
        assert_eq!(labeled[1].unit(), 3);
        assert_eq!(labeled[1].rul, 12);
    }

    #[test]
    fn test_truth_count_mismatch() {
        let snapshot = vec![record(1, 30)];
        let truth = GroundTruthTable::new(vec![5, 12]);
        let err = attach_truth(&snapshot, &truth).unwrap_err();
        assert!(matches!(
            err,
            RulError::Alignment {
                truth_rows: 2,
                test_units: 1
            }
        ));
    }

    #[test]
    fn test_parse_truth_file() {
        let text = "112 \n98\n\n69  \n";
        let truth = GroundTruthTable::parse("PM_truth.txt", text.as_bytes()).unwrap();
        assert_eq!(truth.values(), &[112, 98, 69]);
    }

    #[test]
    fn test_parse_truth_rejects_negative() {
        let err = GroundTruthTable::parse("PM_truth.txt", "12\n-3\n".as_bytes()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("PM_truth.txt"));
        assert!(msg.contains("line 2"));
    }

    proptest! {
        #[test]
        fn prop_rul_strictly_decreases_to_zero(lengths in prop::collection::vec(1u32..40, 1..8)) {
            let records: Vec<SensorRecord> = lengths
                .iter()
                .enumerate()
                .flat_map(|(u, &len)| (1..=len).map(move |c| record(u as u32 + 1, c)))
                .collect();
            let labeled = label_training(&records);

            for (u, &len) in lengths.iter().enumerate() {
                let unit = u as u32 + 1;
                let ruls: Vec<(u32, u32)> = labeled
                    .iter()
                    .filter(|l| l.unit() == unit)
                    .map(|l| (l.cycle(), l.rul))
                    .collect();
                prop_assert_eq!(ruls.len() as u32, len);
                for pair in ruls.windows(2) {
                    prop_assert!(pair[1].0 > pair[0].0);
                    prop_assert!(pair[1].1 < pair[0].1);
                }
                let last = ruls.last().unwrap();
                prop_assert_eq!(last.0, len);
                prop_assert_eq!(last.1, 0);
            }
        }
    }
}
