//! Observability infrastructure for the RUL pipeline
//!
//! Provides:
//! - Prometheus metrics (stage latency, prediction latency, feature gaps, training score)
//! - Structured logging of the pipeline's named events with tracing

use prometheus::{
    register_gauge, register_histogram, register_histogram_vec, register_int_counter,
    register_int_gauge, Encoder, Gauge, Histogram, HistogramVec, IntCounter, IntGauge,
    TextEncoder,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Latency buckets for single predictions (in seconds)
const PREDICTION_BUCKETS: &[f64] = &[
    0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1,
];

/// Latency buckets for whole pipeline stages (in seconds)
const STAGE_BUCKETS: &[f64] = &[0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<PipelineMetricsInner> = OnceLock::new();

struct PipelineMetricsInner {
    inference_requests: IntCounter,
    rows_predicted: IntCounter,
    missing_features: IntCounter,
    degraded_rows: IntCounter,
    prediction_latency_seconds: Histogram,
    stage_latency_seconds: HistogramVec,
    training_rmse: Gauge,
    training_rows: IntGauge,
}

impl PipelineMetricsInner {
    fn new() -> Self {
        Self {
            inference_requests: register_int_counter!(
                "rul_inference_requests_total",
                "Total number of prediction requests (single or batch)"
            )
            .expect("Failed to register inference_requests"),

            rows_predicted: register_int_counter!(
                "rul_rows_predicted_total",
                "Total number of rows scored by the inference service"
            )
            .expect("Failed to register rows_predicted"),

            missing_features: register_int_counter!(
                "rul_missing_features_total",
                "Expected features absent from inference input and defaulted to 0.0"
            )
            .expect("Failed to register missing_features"),

            degraded_rows: register_int_counter!(
                "rul_degraded_rows_total",
                "Rows predicted with at least one defaulted feature"
            )
            .expect("Failed to register degraded_rows"),

            prediction_latency_seconds: register_histogram!(
                "rul_prediction_latency_seconds",
                "Time spent reconciling and scoring a single row",
                PREDICTION_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            stage_latency_seconds: register_histogram_vec!(
                "rul_stage_latency_seconds",
                "Time spent in each pipeline stage",
                &["stage"],
                STAGE_BUCKETS.to_vec()
            )
            .expect("Failed to register stage_latency_seconds"),

            training_rmse: register_gauge!(
                "rul_training_rmse",
                "Test-set RMSE of the most recently trained model"
            )
            .expect("Failed to register training_rmse"),

            training_rows: register_int_gauge!(
                "rul_training_rows",
                "Number of labeled rows the most recent model was fit on"
            )
            .expect("Failed to register training_rows"),
        }
    }
}

/// Pipeline metrics for Prometheus exposition
///
/// A lightweight handle to the global metrics instance. Clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct PipelineMetrics {
    inner: &'static PipelineMetricsInner,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PipelineMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineMetrics").finish_non_exhaustive()
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            inner: GLOBAL_METRICS.get_or_init(PipelineMetricsInner::new),
        }
    }

    pub fn inc_requests(&self) {
        self.inner.inference_requests.inc();
    }

    /// Record one scored row and how many features it was missing
    pub fn record_row(&self, missing: usize, duration_secs: f64) {
        self.inner.rows_predicted.inc();
        self.inner.prediction_latency_seconds.observe(duration_secs);
        if missing > 0 {
            self.inner.missing_features.inc_by(missing as u64);
            self.inner.degraded_rows.inc();
        }
    }

    pub fn observe_stage(&self, stage: &str, duration_secs: f64) {
        self.inner
            .stage_latency_seconds
            .with_label_values(&[stage])
            .observe(duration_secs);
    }

    pub fn set_training(&self, rows: usize, rmse: Option<f64>) {
        self.inner.training_rows.set(rows as i64);
        if let Some(rmse) = rmse {
            self.inner.training_rmse.set(rmse);
        }
    }

    pub fn rows_predicted(&self) -> u64 {
        self.inner.rows_predicted.get()
    }

    pub fn missing_features(&self) -> u64 {
        self.inner.missing_features.get()
    }
}

/// Render every registered metric in the Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Structured logger for pipeline events
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    run_id: String,
}

impl StructuredLogger {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self { run_id: run_id.into() }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn log_pipeline_started(&self, raw_train: &str, raw_test: &str, truth: &str) {
        info!(
            event = "pipeline_started",
            run_id = %self.run_id,
            raw_train = %raw_train,
            raw_test = %raw_test,
            truth = %truth,
            "RUL pipeline started"
        );
    }

    pub fn log_features_selected(&self, stage1: &[String], stage2: &[String]) {
        info!(
            event = "features_selected",
            run_id = %self.run_id,
            stage1_count = stage1.len(),
            stage2_count = stage2.len(),
            features = ?stage2,
            "Features selected"
        );
    }

    pub fn log_model_trained(&self, rows: usize, features: usize, n_estimators: usize, seed: u64) {
        info!(
            event = "model_trained",
            run_id = %self.run_id,
            rows = rows,
            features = features,
            n_estimators = n_estimators,
            seed = seed,
            "Model trained"
        );
    }

    pub fn log_model_evaluated(&self, units: usize, rmse: f64) {
        info!(
            event = "model_evaluated",
            run_id = %self.run_id,
            units = units,
            rmse = rmse,
            "Model evaluated on test snapshot"
        );
    }

    pub fn log_artifact_saved(&self, path: &str, checksum: &str, compressed: bool) {
        info!(
            event = "artifact_saved",
            run_id = %self.run_id,
            path = %path,
            checksum = %checksum,
            compressed = compressed,
            "Model artifact saved"
        );
    }

    pub fn log_prediction(&self, input_identifier: &str, predicted_rul: f64, missing: &[String]) {
        if missing.is_empty() {
            info!(
                event = "prediction_generated",
                run_id = %self.run_id,
                input = %input_identifier,
                predicted_rul = predicted_rul,
                "Generated RUL prediction"
            );
        } else {
            warn!(
                event = "prediction_generated",
                run_id = %self.run_id,
                input = %input_identifier,
                predicted_rul = predicted_rul,
                missing_count = missing.len(),
                missing = ?missing,
                "Generated RUL prediction with defaulted features"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_record_and_render() {
        let metrics = PipelineMetrics::new();
        let before_rows = metrics.rows_predicted();
        let before_missing = metrics.missing_features();

        metrics.inc_requests();
        metrics.record_row(2, 0.0001);
        metrics.record_row(0, 0.0002);
        metrics.observe_stage("ingest", 0.01);
        metrics.set_training(120, Some(3.5));

        // Counters are process-global, other tests may bump them concurrently
        assert!(metrics.rows_predicted() >= before_rows + 2);
        assert!(metrics.missing_features() >= before_missing + 2);

        let text = render_metrics();
        assert!(text.contains("rul_rows_predicted_total"));
        assert!(text.contains("rul_stage_latency_seconds"));
    }

    #[test]
    fn test_handles_share_state() {
        let a = PipelineMetrics::new();
        let b = a.clone();
        let before = b.rows_predicted();
        a.record_row(0, 0.0);
        assert!(b.rows_predicted() > before);
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("run-1");
        assert_eq!(logger.run_id(), "run-1");
        logger.log_prediction("row-1", 12.5, &["sensor_4".to_string()]);
    }
}
