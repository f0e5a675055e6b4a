/// Model configuration — RON files describing corpora and training parameters.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::tokenizer::Granularity;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("JSON deserialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn default_order() -> usize {
    3
}

fn default_train_percent() -> f64 {
    90.0
}

fn default_chunk_size() -> usize {
    500
}

/// How to build one language model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlmConfig {
    /// Corpus file read by [`Slm::from_config`](crate::core::markov::Slm::from_config).
    /// Left empty when the caller supplies corpus text directly.
    #[serde(default)]
    pub corpus: PathBuf,
    #[serde(default)]
    pub granularity: Granularity,
    #[serde(default = "default_order")]
    pub order: usize,
    /// Leading share of the corpus used for training; the rest is held out
    /// for the z-score estimator.
    #[serde(default = "default_train_percent")]
    pub train_percent: f64,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default)]
    pub mark_line_starts: bool,
}

impl SlmConfig {
    pub fn new(corpus: impl Into<PathBuf>) -> SlmConfig {
        SlmConfig {
            corpus: corpus.into(),
            granularity: Granularity::default(),
            order: default_order(),
            train_percent: default_train_percent(),
            chunk_size: default_chunk_size(),
            mark_line_starts: false,
        }
    }

    pub fn load_from_ron(path: &Path) -> Result<SlmConfig, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn parse_ron(input: &str) -> Result<SlmConfig, ConfigError> {
        let config: SlmConfig = ron::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse training parameters from a JSON object; missing fields take
    /// their defaults.
    pub fn parse_json(input: &str) -> Result<SlmConfig, ConfigError> {
        let config: SlmConfig = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.order == 0 {
            return Err(ConfigError::Invalid("order must be at least 1".to_string()));
        }
        if !(self.train_percent > 0.0 && self.train_percent <= 100.0) {
            return Err(ConfigError::Invalid(format!(
                "train_percent {} must be in (0, 100]",
                self.train_percent
            )));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid(
                "chunk_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// A set of models compared against each other's held-out text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionConfig {
    pub models: Vec<SlmConfig>,
    /// Chunk size used when scoring text under every model.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl AttributionConfig {
    pub fn load_from_ron(path: &Path) -> Result<AttributionConfig, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AttributionConfig = ron::from_str(&contents)?;
        for model in &config.models {
            model.validate()?;
        }
        if config.chunk_size == 0 {
            return Err(ConfigError::Invalid(
                "chunk_size must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }
}
