//! Pipeline configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! config file, then `RUL_*` environment variables (`__` separates nested
//! keys, e.g. `RUL_SELECTION__TOP_N=12`).

use crate::artifact::{ArtifactEncoding, ArtifactLocation};
use crate::error::{Result, RulError};
use crate::estimator::{ForestParams, ScalingMethod};
use crate::models::MaintenanceThresholds;
use crate::selection::SelectionConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_NAME: &str = "rul";

const ENV_PREFIX: &str = "RUL";

/// Input and output file locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub raw_train: PathBuf,
    pub raw_test: PathBuf,
    pub truth: PathBuf,
    pub train_with_rul: PathBuf,
    pub train_selected: PathBuf,
    pub test_selected: PathBuf,
    pub model_output: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_train: PathBuf::from("dataset/PM_train.txt"),
            raw_test: PathBuf::from("dataset/PM_test.txt"),
            truth: PathBuf::from("dataset/PM_truth.txt"),
            train_with_rul: PathBuf::from("dataset/train_with_rul.csv"),
            train_selected: PathBuf::from("dataset/train_selected.csv"),
            test_selected: PathBuf::from("dataset/test_selected.csv"),
            model_output: PathBuf::from("outputs/rf_rul_model.json"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalingConfig {
    pub enabled: bool,
    pub method: ScalingMethod,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationKind {
    #[default]
    Local,
    Remote,
}

/// Where inference loads the artifact from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    pub location: LocationKind,
    /// Remote artifact URL, required when `location = "remote"`
    pub url: Option<String>,
    /// Local copy of a remote artifact
    pub cache_path: PathBuf,
    pub encoding: ArtifactEncoding,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            location: LocationKind::Local,
            url: None,
            cache_path: PathBuf::from("outputs/cache/rf_rul_model.json"),
            encoding: ArtifactEncoding::Auto,
        }
    }
}

/// Full pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub selection: SelectionConfig,
    pub forest: ForestParams,
    pub scaling: ScalingConfig,
    pub artifact: ArtifactConfig,
    pub maintenance: MaintenanceThresholds,
}

impl PipelineConfig {
    /// Load from defaults, a config file and the environment
    ///
    /// With no explicit `path`, `rul.*` in the working directory is used if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, config::Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with_env(path: Option<&Path>, env: config::Environment) -> Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };

        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                env.prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: PipelineConfig = settings.try_deserialize()?;
        config.validate()?;
        debug!(config = ?config, "Loaded pipeline configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.selection.top_n == 0 {
            return Err(RulError::Config("selection.top_n must be at least 1".to_string()));
        }
        if self.selection.top_k == 0 {
            return Err(RulError::Config("selection.top_k must be at least 1".to_string()));
        }
        self.forest
            .validate()
            .map_err(|e| RulError::Config(format!("forest: {}", e)))?;
        self.selection
            .importance_forest
            .validate()
            .map_err(|e| RulError::Config(format!("selection.importance_forest: {}", e)))?;
        let m = &self.maintenance;
        if !(m.urgent_below.is_finite() && m.moderate_below.is_finite()) || m.urgent_below >= m.moderate_below {
            return Err(RulError::Config(format!(
                "maintenance.urgent_below ({}) must be finite and below maintenance.moderate_below ({})",
                m.urgent_below, m.moderate_below
            )));
        }
        if self.artifact.location == LocationKind::Remote {
            self.artifact_location()?;
        }
        Ok(())
    }

    /// Scaling method to fit at training time, if enabled
    pub fn scaling_method(&self) -> Option<ScalingMethod> {
        self.scaling.enabled.then_some(self.scaling.method)
    }

    /// Location inference loads the artifact from
    pub fn artifact_location(&self) -> Result<ArtifactLocation> {
        match self.artifact.location {
            LocationKind::Local => Ok(ArtifactLocation::local(&self.paths.model_output)),
            LocationKind::Remote => {
                let url = self.artifact.url.as_deref().ok_or_else(|| {
                    RulError::Config("artifact.url is required for a remote artifact".to_string())
                })?;
                ArtifactLocation::remote(url, &self.artifact.cache_path)
            }
        }
    }
}
