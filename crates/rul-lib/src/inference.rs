//! Inference service
//!
//! Serves predictions from a loaded artifact. Every input row goes through
//! schema reconciliation: columns outside `feature_order` are discarded,
//! absent expected columns default to `0.0`, and the row is arranged in
//! `feature_order` before the optional scaler and the estimator see it.
//! A feature gap never fails a prediction; it is logged and counted.

use crate::artifact::{ArtifactEncoding, ArtifactLocation, ModelArtifact};
use crate::error::Result;
use crate::models::PredictionResult;
use crate::observability::{PipelineMetrics, StructuredLogger};
use crate::table::Table;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, warn};

/// Value used for expected features absent from the input
pub const MISSING_FEATURE_DEFAULT: f64 = 0.0;

/// One input record: feature name to value
pub type FeatureMap = HashMap<String, f64>;

/// What reconciliation changed about an input record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaReport {
    /// Expected features that were absent (or empty) and defaulted
    pub missing: Vec<String>,
    /// Input columns that are not part of `feature_order`, sorted
    pub discarded: Vec<String>,
}

impl SchemaReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Inference statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InferenceStats {
    pub total_predictions: u64,
    pub degraded_predictions: u64,
    pub missing_features: u64,
}

/// Predicts RUL from a validated artifact
///
/// Holds the artifact immutably; counters are atomic, so a shared reference
/// serves concurrent callers.
pub struct InferenceService {
    artifact: ModelArtifact,
    metrics: PipelineMetrics,
    logger: StructuredLogger,
    prediction_count: AtomicU64,
    degraded_count: AtomicU64,
    missing_count: AtomicU64,
}

impl InferenceService {
    pub fn new(artifact: ModelArtifact) -> Result<Self> {
        artifact.validate(None)?;
        Ok(Self {
            artifact,
            metrics: PipelineMetrics::new(),
            logger: StructuredLogger::new("inference"),
            prediction_count: AtomicU64::new(0),
            degraded_count: AtomicU64::new(0),
            missing_count: AtomicU64::new(0),
        })
    }

    pub fn from_path(path: &Path, encoding: ArtifactEncoding) -> Result<Self> {
        let loaded = ModelArtifact::load(path, encoding)?;
        Self::new(loaded.artifact)
    }

    /// Resolve the location (downloading if needed) and load the artifact
    pub async fn from_location(location: &ArtifactLocation, encoding: ArtifactEncoding) -> Result<Self> {
        let path = location.resolve().await?;
        Self::from_path(&path, encoding)
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    pub fn feature_order(&self) -> &[String] {
        self.artifact.feature_order()
    }

    /// Project `input` onto `feature_order`
    pub fn reconcile(&self, input: &FeatureMap) -> (Vec<f64>, SchemaReport) {
        let order = self.artifact.feature_order();
        let mut report = SchemaReport::default();

        let row: Vec<f64> = order
            .iter()
            .map(|name| match input.get(name) {
                Some(v) if !v.is_nan() => *v,
                _ => {
                    report.missing.push(name.clone());
                    MISSING_FEATURE_DEFAULT
                }
            })
            .collect();

        let expected: HashSet<&str> = order.iter().map(String::as_str).collect();
        report.discarded = input
            .keys()
            .filter(|k| !expected.contains(k.as_str()))
            .cloned()
            .collect();
        report.discarded.sort();

        (row, report)
    }

    /// Predict one record
    pub fn predict(&self, input_identifier: &str, input: &FeatureMap) -> PredictionResult {
        self.metrics.inc_requests();
        self.predict_one(input_identifier, input)
    }

    /// Predict many records, each reconciled independently
    pub fn predict_batch<'a, I>(&self, inputs: I) -> Vec<PredictionResult>
    where
        I: IntoIterator<Item = (&'a str, &'a FeatureMap)>,
    {
        self.metrics.inc_requests();
        inputs
            .into_iter()
            .map(|(id, input)| self.predict_one(id, input))
            .collect()
    }

    /// Predict every row of a table, identified as `row-1`, `row-2`, ...
    pub fn predict_table(&self, table: &Table) -> Vec<PredictionResult> {
        let inputs: Vec<(String, FeatureMap)> = table
            .rows()
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let map = table
                    .columns()
                    .iter()
                    .cloned()
                    .zip(row.iter().copied())
                    .collect();
                (format!("row-{}", i + 1), map)
            })
            .collect();
        self.predict_batch(inputs.iter().map(|(id, map)| (id.as_str(), map)))
    }

    /// Predict every row of a CSV file
    ///
    /// Only the columns named in `feature_order` are parsed; any other
    /// column (ids, timestamps, free text) is ignored. Empty feature fields
    /// are missing and default like absent ones.
    pub fn predict_csv(&self, path: &Path) -> Result<Vec<PredictionResult>> {
        let table = Table::read_csv_projected(path, self.feature_order())?;
        Ok(self.predict_table(&table))
    }

    pub fn stats(&self) -> InferenceStats {
        InferenceStats {
            total_predictions: self.prediction_count.load(Ordering::Relaxed),
            degraded_predictions: self.degraded_count.load(Ordering::Relaxed),
            missing_features: self.missing_count.load(Ordering::Relaxed),
        }
    }

    fn predict_one(&self, input_identifier: &str, input: &FeatureMap) -> PredictionResult {
        let start = Instant::now();
        let (row, report) = self.reconcile(input);
        let predicted_rul = self.artifact.predict_ordered(&row);
        let elapsed = start.elapsed().as_secs_f64();

        self.prediction_count.fetch_add(1, Ordering::Relaxed);
        self.metrics.record_row(report.missing.len(), elapsed);
        if !report.is_complete() {
            self.degraded_count.fetch_add(1, Ordering::Relaxed);
            self.missing_count
                .fetch_add(report.missing.len() as u64, Ordering::Relaxed);
            warn!(
                input = %input_identifier,
                missing_count = report.missing.len(),
                missing = ?report.missing,
                "Input missing expected features, defaulted to 0.0"
            );
        }
        if !report.discarded.is_empty() {
            debug!(input = %input_identifier, discarded = ?report.discarded, "Discarded extra input columns");
        }

        self.logger
            .log_prediction(input_identifier, predicted_rul, &report.missing);

        PredictionResult {
            input_identifier: input_identifier.to_string(),
            predicted_rul,
            missing_features: report.missing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::test_support::artifact;

    fn map(pairs: &[(&str, f64)]) -> FeatureMap {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn service() -> InferenceService {
        InferenceService::new(artifact(&["a", "b", "c"])).unwrap()
    }

    #[test]
    fn test_missing_features_default_to_zero() {
        let service = service();
        let (row, report) = service.reconcile(&map(&[("a", 1.0)]));
        assert_eq!(row, vec![1.0, 0.0, 0.0]);
        assert_eq!(report.missing, vec!["b", "c"]);
        assert!(report.discarded.is_empty());
    }

    #[test]
    fn test_extra_columns_discarded_and_order_enforced() {
        let service = service();
        let (row, report) = service.reconcile(&map(&[
            ("c", 3.0),
            ("zeta", 9.0),
            ("a", 1.0),
            ("b", 2.0),
            ("unit", 4.0),
        ]));
        assert_eq!(row, vec![1.0, 2.0, 3.0]);
        assert!(report.is_complete());
        assert_eq!(report.discarded, vec!["unit", "zeta"]);
    }

    #[test]
    fn test_nan_counts_as_missing() {
        let service = service();
        let (row, report) = service.reconcile(&map(&[("a", f64::NAN), ("b", 2.0), ("c", 3.0)]));
        assert_eq!(row, vec![0.0, 2.0, 3.0]);
        assert_eq!(report.missing, vec!["a"]);
    }

    #[test]
    fn test_prediction_matches_artifact() {
        let service = service();
        let result = service.predict("r1", &map(&[("a", 1.0)]));
        assert_eq!(result.predicted_rul, service.artifact().predict_ordered(&[1.0, 0.0, 0.0]));
        assert_eq!(result.missing_features, vec!["b", "c"]);

        let stats = service.stats();
        assert_eq!(stats.total_predictions, 1);
        assert_eq!(stats.degraded_predictions, 1);
        assert_eq!(stats.missing_features, 2);
    }

    #[test]
    fn test_batch_equals_single() {
        let service = service();
        let inputs = [
            map(&[("a", 1.0), ("b", 5.0), ("c", 2.0)]),
            map(&[("b", 7.0)]),
            map(&[("a", 12.0), ("extra", 1.0)]),
        ];
        let ids = ["x", "y", "z"];

        let batch = service.predict_batch(ids.iter().copied().zip(inputs.iter()));
        for ((id, input), result) in ids.iter().zip(&inputs).zip(&batch) {
            assert_eq!(&service.predict(id, input), result);
        }
    }

    #[test]
    fn test_predict_table_ids() {
        let service = service();
        let mut table = Table::new(vec!["unit".to_string(), "a".to_string(), "b".to_string()]);
        table.push_row(vec![1.0, 2.0, 3.0]).unwrap();
        table.push_row(vec![1.0, 4.0, 5.0]).unwrap();

        let results = service.predict_table(&table);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].input_identifier, "row-1");
        assert_eq!(results[1].input_identifier, "row-2");
        assert_eq!(results[1].missing_features, vec!["c"]);
    }

    #[test]
    fn test_predict_csv_ignores_text_columns() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("upload.csv");
        std::fs::write(
            &path,
            "engine_id,b,recorded_at,a,c\nE-17,2.0,2024-05-01T10:00,1.0,3.0\nE-18,5.0,late,,\n",
        )
        .unwrap();

        let service = service();
        let results = service.predict_csv(&path).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].missing_features.is_empty());
        assert_eq!(results[0].predicted_rul, service.artifact().predict_ordered(&[1.0, 2.0, 3.0]));
        assert_eq!(results[1].input_identifier, "row-2");
        assert_eq!(results[1].missing_features, vec!["a", "c"]);
        assert_eq!(results[1].predicted_rul, service.artifact().predict_ordered(&[0.0, 5.0, 0.0]));
    }

    #[test]
    fn test_predict_csv_rejects_non_numeric_feature() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("upload.csv");
        std::fs::write(&path, "a,b,c\n1.0,broken,3.0\n").unwrap();
        assert!(service().predict_csv(&path).is_err());
    }

    #[test]
    fn test_invalid_artifact_rejected() {
        // Forest fit on two columns, three names in feature_order
        let broken = artifact(&["a", "b"]);
        let mut json = serde_json::to_value(&broken).unwrap();
        json["feature_order"] = serde_json::json!(["a", "b", "c"]);
        let bytes = serde_json::to_vec(&json).unwrap();
        assert!(ModelArtifact::from_bytes(&bytes, ArtifactEncoding::Plain, None).is_err());
    }

    #[test]
    fn test_from_local_location() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        artifact(&["a", "b"]).save(&path, ArtifactEncoding::Auto).unwrap();

        let location = ArtifactLocation::local(&path);
        let service =
            tokio_test::block_on(InferenceService::from_location(&location, ArtifactEncoding::Auto))
                .unwrap();
        assert_eq!(service.feature_order(), &["a", "b"]);
    }

    #[test]
    fn test_service_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<InferenceService>();
    }
}
