/// Authorship attribution — scoring text under several models at once.

use log::info;

use crate::core::config::SlmConfig;
use crate::core::estimator::chunk_bounds;
use crate::core::markov::{Slm, SlmError};

/// Train one model per configuration.
pub fn train_models(configs: &[SlmConfig]) -> Result<Vec<Slm>, SlmError> {
    configs
        .iter()
        .map(|config| {
            info!("training model on '{}'", config.corpus.display());
            Slm::from_config(config)
        })
        .collect()
}

/// Chunk `tokens` and return, per model, the mean z-score of the chunks.
///
/// Chunks are rejoined and re-tokenized by each model, so models of
/// different granularity can score the same text.
pub fn mean_z_scores(
    tokens: &[String],
    models: &[Slm],
    chunk_size: usize,
) -> Result<Vec<f64>, SlmError> {
    if chunk_size == 0 {
        return Err(SlmError::InvalidChunkSize);
    }
    if tokens.is_empty() {
        return Err(SlmError::EmptyInput);
    }
    let chunks: Vec<String> = chunk_bounds(0, tokens.len(), chunk_size)
        .into_iter()
        .map(|(lo, hi)| tokens[lo..hi].join(" "))
        .collect();

    models
        .iter()
        .map(|model| {
            let total = chunks
                .iter()
                .map(|chunk| model.estimate(chunk))
                .sum::<Result<f64, SlmError>>()?;
            Ok(total / chunks.len() as f64)
        })
        .collect()
}

/// Score each model's held-out text under every model.
///
/// Row `i` holds the mean z-scores of model `i`'s held-out portion, one
/// column per model. Text is expected to score highest on its own model.
pub fn attribution_matrix(
    models: &[Slm],
    test_percent: f64,
    chunk_size: usize,
) -> Result<Vec<Vec<f64>>, SlmError> {
    if !(0.0..=100.0).contains(&test_percent) {
        return Err(SlmError::InvalidPercent(test_percent));
    }
    models
        .iter()
        .map(|model| {
            let tokens = model.tokens();
            let start = (tokens.len() as f64 * (100.0 - test_percent) / 100.0) as usize;
            mean_z_scores(&tokens[start..], models, chunk_size)
        })
        .collect()
}
