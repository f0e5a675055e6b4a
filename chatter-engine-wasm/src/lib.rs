//! WASM bindings for chatter-engine — powers the in-browser tour guide demo.

use rand::rngs::StdRng;
use rand::SeedableRng;
use wasm_bindgen::prelude::*;

use chatter_engine::core::config::SlmConfig;
use chatter_engine::core::corpus::Corpus;
use chatter_engine::core::grammar::{Bindings, Grammar};
use chatter_engine::core::markov::Slm;

// ---------------------------------------------------------------------------
// JSON helper types for communication across the WASM boundary
// ---------------------------------------------------------------------------
#[derive(serde::Serialize)]
struct ModelInfo {
    order: usize,
    tokens: usize,
    contexts: usize,
    transitions: usize,
    mean: Option<f64>,
    standard_deviation: Option<f64>,
}

// ---------------------------------------------------------------------------
// GrammarDemo — template grammar expansion
// ---------------------------------------------------------------------------
#[wasm_bindgen]
pub struct GrammarDemo {
    grammar: Grammar,
    bindings: Bindings,
    rng: StdRng,
}

#[wasm_bindgen]
impl GrammarDemo {
    /// Parse a JSON rule file (name → list of rule strings).
    #[wasm_bindgen(constructor)]
    pub fn new(rules_json: &str, seed: u64) -> Result<GrammarDemo, JsError> {
        let grammar = Grammar::parse_json(rules_json)
            .map_err(|e| JsError::new(&format!("Grammar parse error: {e}")))?;
        Ok(GrammarDemo {
            grammar,
            bindings: Bindings::new(),
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Expand `start` with a fresh variable environment.
    pub fn generate(&mut self, start: &str) -> Result<String, JsError> {
        self.grammar
            .generate(start, &mut self.rng)
            .map_err(|e| JsError::new(&format!("Generation error: {e}")))
    }

    /// Expand `start`, keeping variables bound by earlier session calls.
    pub fn generate_in_session(&mut self, start: &str) -> Result<String, JsError> {
        self.grammar
            .generate_with_bindings(start, &mut self.bindings, &mut self.rng)
            .map_err(|e| JsError::new(&format!("Generation error: {e}")))
    }

    /// Forget session variables.
    pub fn clear_session(&mut self) {
        self.bindings.clear();
    }

    /// Nonterminal names as a JSON array.
    pub fn symbols(&self) -> String {
        let mut names: Vec<&String> = self.grammar.symbols.keys().collect();
        names.sort();
        serde_json::to_string(&names).unwrap_or_else(|_| "[]".to_string())
    }
}

// ---------------------------------------------------------------------------
// SlmDemo — n-gram sampling and scoring
// ---------------------------------------------------------------------------
#[wasm_bindgen]
pub struct SlmDemo {
    model: Slm,
    rng: StdRng,
}

#[wasm_bindgen]
impl SlmDemo {
    /// Train on `corpus` text. `options_json` takes the model config fields
    /// (`granularity`, `order`, `train_percent`, `chunk_size`,
    /// `mark_line_starts`); omitted fields use their defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(corpus: &str, options_json: &str, seed: u64) -> Result<SlmDemo, JsError> {
        let config = SlmConfig::parse_json(options_json)
            .map_err(|e| JsError::new(&format!("Invalid options: {e}")))?;

        let corpus = if config.mark_line_starts {
            Corpus::from_lines(corpus, config.granularity)
        } else {
            Corpus::from_text(corpus, config.granularity)
        };
        let model = Slm::from_corpus(corpus, &config)
            .map_err(|e| JsError::new(&format!("Training error: {e}")))?;

        Ok(SlmDemo {
            model,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Generate `length` tokens, optionally continuing `prompt`.
    pub fn generate(&mut self, length: usize, prompt: Option<String>) -> Result<String, JsError> {
        self.model
            .generate(length, prompt.as_deref(), &mut self.rng)
            .map_err(|e| JsError::new(&format!("Generation error: {e}")))
    }

    /// Z-score of `text` against the held-out distribution.
    pub fn estimate(&self, text: &str) -> Result<f64, JsError> {
        self.model
            .estimate(text)
            .map_err(|e| JsError::new(&format!("Estimation error: {e}")))
    }

    /// Model statistics as JSON.
    pub fn info(&self) -> Result<String, JsError> {
        let stats = self.model.stats();
        let info = ModelInfo {
            order: self.model.order(),
            tokens: self.model.tokens().len(),
            contexts: self.model.transitions().len(),
            transitions: self.model.transitions().transition_count(),
            mean: stats.map(|s| s.mean),
            standard_deviation: stats.map(|s| s.standard_deviation),
        };
        serde_json::to_string(&info).map_err(|e| JsError::new(&format!("Serialization error: {e}")))
    }

    /// Reseed the generator.
    pub fn reset(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }
}
