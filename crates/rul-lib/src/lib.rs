//! Remaining Useful Life prediction library
//!
//! This crate provides the core functionality for:
//! - Raw sensor log ingestion and schema normalization
//! - RUL labeling of run-to-failure histories
//! - Two-stage feature selection (correlation, then forest importance)
//! - Random forest training, evaluation and artifact persistence
//! - Schema-reconciling inference and observability

pub mod artifact;
pub mod config;
pub mod error;
pub mod estimator;
pub mod evaluator;
pub mod inference;
pub mod ingest;
pub mod labeler;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod selection;
pub mod table;
pub mod trainer;

pub use artifact::{ArtifactEncoding, ArtifactLocation, ModelArtifact};
pub use self::config::PipelineConfig;
pub use error::{Result, RulError};
pub use inference::{FeatureMap, InferenceService, InferenceStats, SchemaReport};
pub use models::*;
pub use observability::{render_metrics, PipelineMetrics, StructuredLogger};
pub use pipeline::{Pipeline, PipelineOutcome};
