//! Train/eval batch pipeline
//!
//! Stages run in data-dependency order: ingest, label, select, train,
//! evaluate, persist. All raw inputs are read and validated before anything
//! is written, so a fatal input error leaves no partial output behind.

use crate::artifact::{ModelArtifact, SavedArtifact};
use crate::config::PipelineConfig;
use crate::error::{Result, RulError};
use crate::evaluator::{evaluate, Evaluation};
use crate::ingest::IngestNormalizer;
use crate::labeler::{label_training, GroundTruthTable};
use crate::models::{LabeledRecord, SensorRecord};
use crate::observability::{PipelineMetrics, StructuredLogger};
use crate::selection::{FeatureSelection, FeatureSelector};
use crate::table::Table;
use crate::trainer::ModelTrainer;
use chrono::Utc;
use std::time::Instant;
use tracing::{info, warn};

/// Everything a completed training run produced
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub train_rows: usize,
    pub selection: FeatureSelection,
    pub evaluation: Evaluation,
    pub artifact: ModelArtifact,
    pub saved: SavedArtifact,
}

/// Raw inputs after ingestion
struct RawInputs {
    train: Vec<SensorRecord>,
    test: Vec<SensorRecord>,
    truth: GroundTruthTable,
}

pub struct Pipeline {
    config: PipelineConfig,
    normalizer: IngestNormalizer,
    metrics: PipelineMetrics,
    logger: StructuredLogger,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let run_id = Utc::now().format("run-%Y%m%dT%H%M%S").to_string();
        Self {
            config,
            normalizer: IngestNormalizer::new(),
            metrics: PipelineMetrics::new(),
            logger: StructuredLogger::new(run_id),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Identifier attached to every structured event of this run
    pub fn run_id(&self) -> &str {
        self.logger.run_id()
    }

    /// Ingest and label the training log, writing `train_with_rul`
    pub fn prepare(&self) -> Result<Vec<LabeledRecord>> {
        let paths = &self.config.paths;
        let train = self.timed("ingest", || self.normalizer.normalize_file(&paths.raw_train))?;
        let labeled = self.timed("label", || Ok(label_training(&train)))?;
        Table::from_labeled(&labeled).write_csv(&paths.train_with_rul)?;
        info!(path = %paths.train_with_rul.display(), rows = labeled.len(), "Wrote labeled training table");
        Ok(labeled)
    }

    /// Prepare, then run both selection stages, writing `train_selected`
    pub fn select(&self) -> Result<(Vec<LabeledRecord>, FeatureSelection)> {
        let labeled = self.prepare()?;
        let selection = self.select_features(&labeled)?;
        Ok((labeled, selection))
    }

    /// Full train/eval run
    ///
    /// If evaluation fails (for example on a ground-truth count mismatch) the
    /// trained artifact is still saved, without an RMSE, before the error is
    /// returned.
    pub fn run(&self) -> Result<PipelineOutcome> {
        let paths = &self.config.paths;
        self.logger.log_pipeline_started(
            &paths.raw_train.display().to_string(),
            &paths.raw_test.display().to_string(),
            &paths.truth.display().to_string(),
        );

        let raw = self.ingest_all()?;
        let labeled = self.timed("label", || Ok(label_training(&raw.train)))?;
        Table::from_labeled(&labeled).write_csv(&paths.train_with_rul)?;

        let selection = self.select_features(&labeled)?;
        let features = selection.features();

        let trainer = ModelTrainer::new(self.config.forest.clone())
            .with_scaling(self.config.scaling_method());
        let artifact = self.timed("train", || trainer.train(&labeled, &features))?;
        self.logger.log_model_trained(
            labeled.len(),
            features.len(),
            self.config.forest.n_estimators,
            self.config.forest.seed,
        );

        let evaluation = match self.timed("evaluate", || evaluate(&artifact, &raw.test, &raw.truth)) {
            Ok(evaluation) => evaluation,
            Err(e) => {
                warn!(error = %e, "Evaluation failed, saving artifact without RMSE");
                self.persist(&artifact)?;
                self.metrics.set_training(labeled.len(), None);
                return Err(e);
            }
        };
        self.logger.log_model_evaluated(evaluation.units.len(), evaluation.rmse);

        Table::from_labeled_features(&evaluation.snapshot, &features).write_csv(&paths.test_selected)?;

        let artifact = artifact.with_rmse(evaluation.rmse);
        let saved = self.persist(&artifact)?;
        self.metrics.set_training(labeled.len(), Some(evaluation.rmse));

        Ok(PipelineOutcome {
            train_rows: labeled.len(),
            selection,
            evaluation,
            artifact,
            saved,
        })
    }

    /// Score an existing artifact against the configured test log and truth file
    pub fn evaluate_artifact(&self, artifact: &ModelArtifact) -> Result<Evaluation> {
        let paths = &self.config.paths;
        let test = self.timed("ingest", || self.normalizer.normalize_file(&paths.raw_test))?;
        let truth = GroundTruthTable::load(&paths.truth)?;
        self.timed("evaluate", || evaluate(artifact, &test, &truth))
    }

    fn ingest_all(&self) -> Result<RawInputs> {
        let paths = &self.config.paths;
        self.timed("ingest", || {
            Ok(RawInputs {
                train: self.normalizer.normalize_file(&paths.raw_train)?,
                test: self.normalizer.normalize_file(&paths.raw_test)?,
                truth: GroundTruthTable::load(&paths.truth)?,
            })
        })
    }

    fn select_features(&self, labeled: &[LabeledRecord]) -> Result<FeatureSelection> {
        if labeled.is_empty() {
            return Err(RulError::Training("training log has no records".to_string()));
        }
        let selector = FeatureSelector::new(self.config.selection.clone());
        let selection = self.timed("select", || Ok(selector.select(labeled)))?;
        let features = selection.features();
        self.logger.log_features_selected(&selection.stage1(), &features);

        Table::from_labeled_features(labeled, &features).write_csv(&self.config.paths.train_selected)?;
        Ok(selection)
    }

    fn persist(&self, artifact: &ModelArtifact) -> Result<SavedArtifact> {
        let saved = self.timed("persist", || {
            artifact.save(&self.config.paths.model_output, self.config.artifact.encoding)
        })?;
        self.logger.log_artifact_saved(
            &saved.path.display().to_string(),
            &saved.checksum,
            saved.compressed,
        );
        Ok(saved)
    }

    fn timed<T>(&self, stage: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let start = Instant::now();
        let result = f();
        self.metrics.observe_stage(stage, start.elapsed().as_secs_f64());
        result
    }
}
