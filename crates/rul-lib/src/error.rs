//! Error types for the RUL pipeline
//!
//! Train/eval stage errors are fatal and halt the pipeline. Inference-time
//! feature gaps are not errors at all; see [`crate::inference::SchemaReport`].

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, RulError>;

/// RUL pipeline error types
#[derive(Error, Debug)]
pub enum RulError {
    /// Raw input file missing or unreadable
    #[error("failed to read {path}: {source}")]
    InputUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A token in a raw or delimited file could not be interpreted
    #[error("{source_name}: line {line}, column {column}: {message}")]
    InvalidInput {
        source_name: String,
        line: usize,
        column: String,
        message: String,
    },

    /// Post-drop column count differs from the expected schema width
    #[error(
        "{source_name}: schema mismatch, found {found} non-empty columns but expected {expected} ({schema})"
    )]
    SchemaMismatch {
        source_name: String,
        found: usize,
        expected: usize,
        schema: String,
    },

    /// A delimited table lacks a column required by the current stage
    #[error("{stage}: missing column '{column}'")]
    MissingColumn { stage: String, column: String },

    /// Ground-truth count does not match the number of test units
    #[error("ground truth has {truth_rows} rows but the test log has {test_units} units")]
    Alignment { truth_rows: usize, test_units: usize },

    /// Artifact is missing required fields or is internally inconsistent
    #[error("incompatible model artifact{}: {reason}", display_location(.location))]
    IncompatibleArtifact {
        location: Option<PathBuf>,
        reason: String,
    },

    /// Estimator could not be fit on the given input
    #[error("training failed: {0}")]
    Training(String),

    /// Evaluation could not produce a score
    #[error("evaluation failed: {0}")]
    Evaluation(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Remote artifact could not be fetched
    #[error("failed to download artifact from {url}: {message}")]
    Download { url: String, message: String },

    /// IO error while writing outputs
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RulError {
    pub(crate) fn incompatible(location: Option<PathBuf>, reason: impl Into<String>) -> Self {
        Self::IncompatibleArtifact {
            location,
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error aborts the whole run (as opposed to evaluation or inference only)
    pub fn is_fatal_input(&self) -> bool {
        matches!(
            self,
            Self::InputUnreadable { .. }
                | Self::InvalidInput { .. }
                | Self::SchemaMismatch { .. }
                | Self::MissingColumn { .. }
        )
    }
}

fn display_location(location: &Option<PathBuf>) -> String {
    location
        .as_ref()
        .map(|p| format!(" {}", p.display()))
        .unwrap_or_default()
}

impl From<config::ConfigError> for RulError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
