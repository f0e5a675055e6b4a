/// Statistical language model — training and text generation.

use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::core::config::SlmConfig;
use crate::core::corpus::Corpus;
use crate::core::estimator::ZScoreStats;
use crate::core::tokenizer::{reassemble, tokenize, Granularity};
use crate::core::transitions::{TransitionTable, LINE_START};

#[derive(Debug, Error)]
pub enum SlmError {
    #[error("model order must be at least 1")]
    InvalidOrder,
    #[error("percentage {0} is outside 0..=100")]
    InvalidPercent(f64),
    #[error("corpus has {len} tokens, fewer than the model order {order}")]
    CorpusTooSmall { len: usize, order: usize },
    #[error("model has no line-start context to begin generation from")]
    NoLineStart,
    #[error("context \"{0}\" does not occur in the corpus")]
    UnknownContext(String),
    #[error("held-out portion has {held_out} tokens, fewer than the model order {order}")]
    HeldOutTooSmall { held_out: usize, order: usize },
    #[error("chunk size must be at least 1")]
    InvalidChunkSize,
    #[error("held-out portion yields {0} chunk(s); at least 2 are needed")]
    TooFewChunks(usize),
    #[error("score distribution has not been estimated")]
    NotEstimated,
    #[error("held-out chunk scores have zero standard deviation")]
    DegenerateDistribution,
    #[error("input contains no tokens")]
    EmptyInput,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// RNG for sampling: reproducible when `seed` is given, OS-seeded otherwise.
pub fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// An n-gram model trained on a tokenized corpus.
#[derive(Debug, Clone)]
pub struct Slm {
    granularity: Granularity,
    order: usize,
    tokens: Vec<String>,
    table: TransitionTable,
    pub(crate) stats: Option<ZScoreStats>,
}

impl Slm {
    /// Train on the first `train_percent`% of the corpus.
    pub fn train(corpus: Corpus, order: usize, train_percent: f64) -> Result<Slm, SlmError> {
        let table = TransitionTable::build(&corpus.tokens, order, train_percent)?;
        info!(
            "trained {}-gram {:?} model: {} contexts, {} transitions from {} tokens",
            order,
            corpus.granularity,
            table.len(),
            table.transition_count(),
            corpus.len()
        );
        Ok(Slm {
            granularity: corpus.granularity,
            order,
            tokens: corpus.tokens,
            table,
            stats: None,
        })
    }

    /// Load the configured corpus and train on it. When part of the corpus
    /// is held out, the z-score distribution is estimated from it as well.
    pub fn from_config(config: &SlmConfig) -> Result<Slm, SlmError> {
        let corpus = Corpus::load(&config.corpus, config.granularity, config.mark_line_starts)?;
        Self::from_corpus(corpus, config)
    }

    /// Train on an already-loaded corpus with the configured parameters.
    pub fn from_corpus(corpus: Corpus, config: &SlmConfig) -> Result<Slm, SlmError> {
        let mut model = Self::train(corpus, config.order, config.train_percent)?;
        if config.train_percent < 100.0 {
            model.estimate_distribution(config.chunk_size, 100.0 - config.train_percent)?;
        }
        Ok(model)
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// The full corpus token sequence, training and held-out parts.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn transitions(&self) -> &TransitionTable {
        &self.table
    }

    pub fn stats(&self) -> Option<&ZScoreStats> {
        self.stats.as_ref()
    }

    /// Generate text of `length` tokens.
    ///
    /// With a prompt of at least `order` tokens, generation continues from
    /// its last `order` tokens. Otherwise it starts at a line boundary.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        length: usize,
        prompt: Option<&str>,
        rng: &mut R,
    ) -> Result<String, SlmError> {
        let tokens = self.generate_tokens(length, prompt, rng)?;
        Ok(reassemble(&tokens))
    }

    /// Like [`Slm::generate`], returning the raw tokens. The starting
    /// context counts toward `length`.
    pub fn generate_tokens<R: Rng + ?Sized>(
        &self,
        length: usize,
        prompt: Option<&str>,
        rng: &mut R,
    ) -> Result<Vec<String>, SlmError> {
        let prompt_tokens = tokenize(prompt.unwrap_or(LINE_START), self.granularity);

        let mut context: Vec<String> = if prompt_tokens.len() < self.order {
            let start = [LINE_START.to_string()];
            if self.table.get(&start).is_none() {
                return Err(SlmError::NoLineStart);
            }
            self.table.sample(&start, rng)?.to_vec()
        } else {
            prompt_tokens[prompt_tokens.len() - self.order..].to_vec()
        };

        let mut output = context.clone();
        while output.len() < length {
            let next = self.table.sample(&context, rng).map_err(|e| {
                warn!("generation stopped after {} tokens: {}", output.len(), e);
                e
            })?;
            output.extend(next.iter().cloned());
            context.extend(next.iter().cloned());
            let excess = context.len().saturating_sub(self.order);
            context.drain(..excess);
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOUR: &str = "Welcome to the museum. The museum has a garden. \
        The garden has a fountain. The fountain is old. \
        Welcome to the garden. The museum is old, but the garden is new. \
        Welcome to the museum.";

    fn tour_model(order: usize) -> Slm {
        Slm::train(Corpus::from_text(TOUR, Granularity::Word), order, 100.0).unwrap()
    }

    #[test]
    fn generate_deterministic() {
        let model = tour_model(2);
        let mut rng1 = StdRng::seed_from_u64(42);
        let mut rng2 = StdRng::seed_from_u64(42);
        assert_eq!(
            model.generate(20, None, &mut rng1).unwrap(),
            model.generate(20, None, &mut rng2).unwrap()
        );
    }

    #[test]
    fn generate_emits_requested_length() {
        let model = tour_model(2);
        let mut rng = StdRng::seed_from_u64(5);
        let tokens = model.generate_tokens(25, None, &mut rng).unwrap();
        assert_eq!(tokens.len(), 25);
    }

    #[test]
    fn short_length_still_emits_starting_context() {
        let model = tour_model(3);
        let mut rng = StdRng::seed_from_u64(5);
        let tokens = model.generate_tokens(1, None, &mut rng).unwrap();
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn unprompted_generation_starts_at_corpus_start() {
        // The corpus has a single line start, so the opening is fixed.
        let model = tour_model(2);
        let mut rng = StdRng::seed_from_u64(11);
        let out = model.generate(10, None, &mut rng).unwrap();
        assert!(out.starts_with("welcome to"), "got: {}", out);
    }

    #[test]
    fn prompt_sets_starting_context() {
        let model = tour_model(2);
        let mut rng = StdRng::seed_from_u64(3);
        let tokens = model
            .generate_tokens(6, Some("I love the fountain"), &mut rng)
            .unwrap();
        assert_eq!(&tokens[..2], &["the".to_string(), "fountain".to_string()]);
        assert_eq!(tokens[2], "is");
    }

    #[test]
    fn unknown_prompt_context_is_error() {
        let model = tour_model(2);
        let mut rng = StdRng::seed_from_u64(0);
        let err = model
            .generate(10, Some("purple elephants"), &mut rng)
            .unwrap_err();
        assert!(matches!(err, SlmError::UnknownContext(ctx) if ctx == "purple elephants"));
    }

    #[test]
    fn output_has_no_space_before_punctuation() {
        let model = tour_model(2);
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let out = model.generate(30, None, &mut rng).unwrap();
            assert!(!out.contains(" ."), "space before '.' in {}", out);
            assert!(!out.contains(" ,"), "space before ',' in {}", out);
        }
    }

    #[test]
    fn empty_table_has_no_line_start() {
        let model = Slm::train(
            Corpus::from_tokens(vec!["a".to_string()], Granularity::Word),
            1,
            0.0,
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            model.generate(5, None, &mut rng).unwrap_err(),
            SlmError::NoLineStart
        ));
    }

    #[test]
    fn character_model_generates() {
        let model = Slm::train(Corpus::from_text(TOUR, Granularity::Character), 3, 100.0)
            .unwrap();
        let mut rng = StdRng::seed_from_u64(8);
        let tokens = model.generate_tokens(15, None, &mut rng).unwrap();
        assert_eq!(tokens.len(), 15);
        assert!(tokens.iter().all(|t| t.chars().count() == 1));
    }

    #[test]
    fn seeded_rng_is_reproducible() {
        let model = tour_model(2);
        let a = model.generate(25, None, &mut rng_from_seed(Some(11))).unwrap();
        let b = model.generate(25, None, &mut rng_from_seed(Some(11))).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn unseeded_rng_varies() {
        let draws: Vec<u64> = (0..4).map(|_| rng_from_seed(None).gen()).collect();
        assert!(draws.windows(2).any(|w| w[0] != w[1]), "draws: {:?}", draws);
    }

    #[test]
    fn from_corpus_fits_distribution_when_holding_out() {
        let mut config = SlmConfig::new("inline");
        config.order = 2;
        config.train_percent = 75.0;
        config.chunk_size = 10;
        let corpus = Corpus::from_text(&TOUR.repeat(4), Granularity::Word);
        let model = Slm::from_corpus(corpus, &config).unwrap();
        assert!(model.stats().is_some());

        config.train_percent = 100.0;
        let corpus = Corpus::from_text(TOUR, Granularity::Word);
        assert!(Slm::from_corpus(corpus, &config).unwrap().stats().is_none());
    }
}
