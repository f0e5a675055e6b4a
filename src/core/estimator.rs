/// Likelihood scoring and the held-out z-score estimator.

use log::info;
use serde::Serialize;

use crate::core::markov::{Slm, SlmError};
use crate::core::tokenizer::tokenize;

/// Mean and sample standard deviation of per-chunk normalized likelihoods.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ZScoreStats {
    pub mean: f64,
    pub standard_deviation: f64,
    pub chunks: usize,
}

impl ZScoreStats {
    pub fn from_scores(scores: &[f64]) -> Result<ZScoreStats, SlmError> {
        let n = scores.len();
        if n < 2 {
            return Err(SlmError::TooFewChunks(n));
        }
        let mean = scores.iter().sum::<f64>() / n as f64;
        let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        Ok(ZScoreStats {
            mean,
            standard_deviation: variance.sqrt(),
            chunks: n,
        })
    }

    pub fn z_score(&self, score: f64) -> Result<f64, SlmError> {
        if self.standard_deviation == 0.0 {
            return Err(SlmError::DegenerateDistribution);
        }
        Ok((score - self.mean) / self.standard_deviation)
    }
}

/// Split `start..len` into consecutive `(start, end)` ranges of `chunk_size`.
/// A range that would leave less than a full chunk behind runs to `len`.
pub fn chunk_bounds(start: usize, len: usize, chunk_size: usize) -> Vec<(usize, usize)> {
    let chunk_size = chunk_size.max(1);
    let mut bounds = Vec::new();
    let mut lo = start;
    while lo < len {
        let mut hi = lo.saturating_add(chunk_size);
        if hi > len.saturating_sub(chunk_size) {
            hi = len;
        }
        bounds.push((lo, hi));
        lo = hi;
    }
    bounds
}

impl Slm {
    /// Sum of interval widths of every observed transition in `tokens`.
    /// Unknown contexts and continuations contribute nothing.
    pub fn likelihood(&self, tokens: &[String]) -> f64 {
        let order = self.order();
        if tokens.len() <= order {
            return 0.0;
        }
        let table = self.transitions();
        (order..tokens.len())
            .filter_map(|i| {
                let options = table.get(&tokens[i - order..i])?;
                options
                    .iter()
                    .find(|c| c.tokens.first() == Some(&tokens[i]))
                    .map(|c| c.interval.width())
            })
            .sum()
    }

    /// Likelihood divided by the number of tokens.
    pub fn normalized_likelihood(&self, tokens: &[String]) -> Result<f64, SlmError> {
        if tokens.is_empty() {
            return Err(SlmError::EmptyInput);
        }
        Ok(self.likelihood(tokens) / tokens.len() as f64)
    }

    /// The last `test_percent`% of the corpus, cut into scoring chunks.
    pub fn held_out_chunks(
        &self,
        chunk_size: usize,
        test_percent: f64,
    ) -> Result<Vec<&[String]>, SlmError> {
        if chunk_size == 0 {
            return Err(SlmError::InvalidChunkSize);
        }
        if !(0.0..=100.0).contains(&test_percent) {
            return Err(SlmError::InvalidPercent(test_percent));
        }
        let tokens = self.tokens();
        let len = tokens.len();
        let start = (len as f64 * (100.0 - test_percent) / 100.0) as usize;
        if start + self.order() > len {
            return Err(SlmError::HeldOutTooSmall {
                held_out: len.saturating_sub(start),
                order: self.order(),
            });
        }
        Ok(chunk_bounds(start, len, chunk_size)
            .into_iter()
            .map(|(lo, hi)| &tokens[lo..hi])
            .collect())
    }

    /// Fit the z-score distribution on the held-out tail of the corpus.
    pub fn estimate_distribution(
        &mut self,
        chunk_size: usize,
        test_percent: f64,
    ) -> Result<ZScoreStats, SlmError> {
        let scores = self
            .held_out_chunks(chunk_size, test_percent)?
            .into_iter()
            .map(|chunk| self.normalized_likelihood(chunk))
            .collect::<Result<Vec<_>, _>>()?;
        let stats = ZScoreStats::from_scores(&scores)?;
        info!(
            "estimated distribution over {} chunks: mean {:.4}, sd {:.4}",
            stats.chunks, stats.mean, stats.standard_deviation
        );
        self.stats = Some(stats);
        Ok(stats)
    }

    /// Z-score of `text` against the held-out distribution.
    pub fn estimate(&self, text: &str) -> Result<f64, SlmError> {
        self.estimate_tokens(&tokenize(text, self.granularity()))
    }

    pub fn estimate_tokens(&self, tokens: &[String]) -> Result<f64, SlmError> {
        let stats = self.stats().ok_or(SlmError::NotEstimated)?;
        stats.z_score(self.normalized_likelihood(tokens)?)
    }
}
