//! Core data models for the RUL pipeline

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of sensor channels in a raw log record
pub const SENSOR_COUNT: usize = 24;

/// Width of the raw schema: unit, cycle and every sensor channel
pub const SCHEMA_WIDTH: usize = SENSOR_COUNT + 2;

pub const UNIT_COLUMN: &str = "unit";
pub const CYCLE_COLUMN: &str = "cycle";
pub const RUL_COLUMN: &str = "RUL";

/// Column name of a sensor channel (`index` is zero-based)
pub fn sensor_name(index: usize) -> String {
    format!("sensor_{}", index + 1)
}

/// Zero-based channel index for a `sensor_<k>` name
pub fn sensor_index(name: &str) -> Option<usize> {
    let k: usize = name.strip_prefix("sensor_")?.parse().ok()?;
    (1..=SENSOR_COUNT).contains(&k).then(|| k - 1)
}

/// Every sensor column name in channel order
pub fn sensor_vocabulary() -> Vec<String> {
    (0..SENSOR_COUNT).map(sensor_name).collect()
}

/// Full raw schema: `unit, cycle, sensor_1 .. sensor_24`
pub fn raw_schema() -> Vec<String> {
    let mut columns = vec![UNIT_COLUMN.to_string(), CYCLE_COLUMN.to_string()];
    columns.extend(sensor_vocabulary());
    columns
}

/// One cycle of one unit as read from a raw log
///
/// Missing sensor readings are `NaN`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorRecord {
    pub unit: u32,
    pub cycle: u32,
    pub sensors: [f64; SENSOR_COUNT],
}

impl SensorRecord {
    /// Reading of a named sensor, `None` for names outside the vocabulary
    pub fn sensor(&self, name: &str) -> Option<f64> {
        sensor_index(name).map(|i| self.sensors[i])
    }

    /// Readings of the named features in the given order
    pub fn project(&self, feature_indices: &[usize]) -> Vec<f64> {
        feature_indices.iter().map(|&i| self.sensors[i]).collect()
    }
}

/// A sensor record with its Remaining Useful Life label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledRecord {
    pub record: SensorRecord,
    pub rul: u32,
}

impl LabeledRecord {
    pub fn unit(&self) -> u32 {
        self.record.unit
    }

    pub fn cycle(&self) -> u32 {
        self.record.cycle
    }
}

/// A single inference output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Caller-provided identifier (row number for file input)
    pub input_identifier: String,
    pub predicted_rul: f64,
    /// Expected features that were absent in the input and defaulted to 0.0
    pub missing_features: Vec<String>,
}

impl PredictionResult {
    /// Prediction rounded to two decimals for display
    pub fn rounded(&self) -> f64 {
        (self.predicted_rul * 100.0).round() / 100.0
    }

    /// Maintenance advice for the displayed (rounded) prediction
    pub fn advice(&self, thresholds: &MaintenanceThresholds) -> MaintenanceAdvice {
        MaintenanceAdvice::classify(self.rounded(), thresholds)
    }
}

/// RUL cutoffs for maintenance advice, in cycles
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceThresholds {
    pub urgent_below: f64,
    pub moderate_below: f64,
}

impl Default for MaintenanceThresholds {
    fn default() -> Self {
        Self {
            urgent_below: 30.0,
            moderate_below: 80.0,
        }
    }
}

/// How soon a component needs attention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaintenanceAdvice {
    Urgent,
    Moderate,
    Healthy,
}

impl MaintenanceAdvice {
    pub fn classify(rul: f64, thresholds: &MaintenanceThresholds) -> Self {
        if rul < thresholds.urgent_below {
            Self::Urgent
        } else if rul < thresholds.moderate_below {
            Self::Moderate
        } else {
            Self::Healthy
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::Urgent => "Component is nearing failure, schedule maintenance immediately",
            Self::Moderate => "Moderate wear, plan preventive maintenance soon",
            Self::Healthy => "Healthy range, no immediate action required",
        }
    }
}

impl fmt::Display for MaintenanceAdvice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Urgent => write!(f, "urgent"),
            Self::Moderate => write!(f, "moderate"),
            Self::Healthy => write!(f, "healthy"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_names_round_trip() {
        assert_eq!(sensor_name(0), "sensor_1");
        assert_eq!(sensor_name(23), "sensor_24");
        assert_eq!(sensor_index("sensor_1"), Some(0));
        assert_eq!(sensor_index("sensor_24"), Some(23));
        assert_eq!(sensor_index("sensor_0"), None);
        assert_eq!(sensor_index("sensor_25"), None);
        assert_eq!(sensor_index("cycle"), None);
    }

    #[test]
    fn test_raw_schema_width() {
        let schema = raw_schema();
        assert_eq!(schema.len(), SCHEMA_WIDTH);
        assert_eq!(schema[0], "unit");
        assert_eq!(schema[1], "cycle");
        assert_eq!(schema[25], "sensor_24");
    }

    #[test]
    fn test_rounded_prediction() {
        let result = PredictionResult {
            input_identifier: "row-1".to_string(),
            predicted_rul: 43.5678,
            missing_features: vec![],
        };
        assert_eq!(result.rounded(), 43.57);
    }

    #[test]
    fn test_maintenance_advice_boundaries() {
        let thresholds = MaintenanceThresholds::default();
        assert_eq!(MaintenanceAdvice::classify(29.99, &thresholds), MaintenanceAdvice::Urgent);
        assert_eq!(MaintenanceAdvice::classify(30.0, &thresholds), MaintenanceAdvice::Moderate);
        assert_eq!(MaintenanceAdvice::classify(79.99, &thresholds), MaintenanceAdvice::Moderate);
        assert_eq!(MaintenanceAdvice::classify(80.0, &thresholds), MaintenanceAdvice::Healthy);
        assert_eq!(MaintenanceAdvice::classify(0.0, &thresholds), MaintenanceAdvice::Urgent);
    }

    #[test]
    fn test_advice_uses_rounded_prediction() {
        let thresholds = MaintenanceThresholds::default();
        let result = PredictionResult {
            input_identifier: "row-1".to_string(),
            predicted_rul: 29.996,
            missing_features: vec![],
        };
        // Displayed as 30.00, so it reads as moderate
        assert_eq!(result.advice(&thresholds), MaintenanceAdvice::Moderate);

        let custom = MaintenanceThresholds {
            urgent_below: 10.0,
            moderate_below: 20.0,
        };
        assert_eq!(result.advice(&custom), MaintenanceAdvice::Healthy);
    }

    #[test]
    fn test_advice_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&MaintenanceAdvice::Urgent).unwrap(), "\"urgent\"");
        assert_eq!(MaintenanceAdvice::Healthy.to_string(), "healthy");
    }
}
