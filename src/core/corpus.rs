/// Training corpora — reading text files into token sequences.

use log::debug;
use std::path::Path;

use crate::core::markov::SlmError;
use crate::core::tokenizer::{tokenize, Granularity};
use crate::core::transitions::LINE_START;

/// An ordered, tokenized corpus.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Corpus {
    pub granularity: Granularity,
    pub tokens: Vec<String>,
}

impl Corpus {
    /// Tokenize `text` as one stream, lines joined with spaces.
    pub fn from_text(text: &str, granularity: Granularity) -> Corpus {
        let joined = text.lines().collect::<Vec<_>>().join(" ");
        Corpus {
            granularity,
            tokens: tokenize(&joined, granularity),
        }
    }

    /// Tokenize `text` line by line, separating non-empty lines with a
    /// [`LINE_START`] token so every line boundary can seed generation.
    pub fn from_lines(text: &str, granularity: Granularity) -> Corpus {
        let mut tokens = Vec::new();
        for line in text.lines() {
            let line_tokens = tokenize(line, granularity);
            if line_tokens.is_empty() {
                continue;
            }
            if !tokens.is_empty() {
                tokens.push(LINE_START.to_string());
            }
            tokens.extend(line_tokens);
        }
        Corpus {
            granularity,
            tokens,
        }
    }

    pub fn from_tokens(tokens: Vec<String>, granularity: Granularity) -> Corpus {
        Corpus {
            granularity,
            tokens,
        }
    }

    /// Read and tokenize a corpus file.
    pub fn load(
        path: &Path,
        granularity: Granularity,
        mark_line_starts: bool,
    ) -> Result<Corpus, SlmError> {
        let text = std::fs::read_to_string(path)?;
        let corpus = if mark_line_starts {
            Self::from_lines(&text, granularity)
        } else {
            Self::from_text(&text, granularity)
        };
        debug!(
            "loaded corpus '{}': {} {:?} tokens",
            path.display(),
            corpus.len(),
            granularity
        );
        Ok(corpus)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
