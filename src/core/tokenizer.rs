/// Tokenizer — splits raw text into word or character tokens.

use serde::{Deserialize, Serialize};

/// Token granularity a model is trained at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Granularity {
    #[default]
    #[serde(alias = "word")]
    Word,
    #[serde(alias = "character", alias = "char")]
    Character,
}

impl std::str::FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "word" => Ok(Granularity::Word),
            "character" | "char" => Ok(Granularity::Character),
            other => Err(format!(
                "invalid granularity '{}': expected \"word\" or \"character\"",
                other
            )),
        }
    }
}

/// Tokenize `text` at the given granularity.
///
/// Input is lowercased first. A backslash and the character after it form a
/// single escape token (`\n`, `\t`, ...).
pub fn tokenize(text: &str, granularity: Granularity) -> Vec<String> {
    match granularity {
        Granularity::Word => split_words(text),
        Granularity::Character => split_characters(text),
    }
}

/// Word tokens: alphanumeric runs, one token per punctuation character.
fn split_words(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut tokens = Vec::new();
    let mut word = String::new();
    let mut chars = lowered.chars();

    while let Some(c) = chars.next() {
        if c.is_alphanumeric() {
            word.push(c);
            continue;
        }

        if !word.is_empty() {
            tokens.push(std::mem::take(&mut word));
        }

        if c == '\\' {
            tokens.push(escape_token(c, chars.next()));
        } else if !c.is_whitespace() {
            tokens.push(c.to_string());
        }
    }

    if !word.is_empty() {
        tokens.push(word);
    }
    tokens
}

/// Character tokens: every non-whitespace character, whitespace dropped.
fn split_characters(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut tokens = Vec::new();
    let mut chars = lowered.chars();

    while let Some(c) = chars.next() {
        if c == '\\' {
            tokens.push(escape_token(c, chars.next()));
        } else if !c.is_whitespace() {
            tokens.push(c.to_string());
        }
    }
    tokens
}

fn escape_token(backslash: char, next: Option<char>) -> String {
    let mut token = String::from(backslash);
    if let Some(c) = next {
        token.push(c);
    }
    token
}

/// Whether a token should attach to the previous one without a space.
///
/// Anything not starting with a word character counts, which covers
/// punctuation and escape tokens.
pub fn is_attaching(token: &str) -> bool {
    match token.chars().next() {
        Some(c) => !(c.is_alphanumeric() || c == '_'),
        None => false,
    }
}

/// Join tokens with spaces, dropping the space before punctuation and
/// after a line break.
pub fn reassemble<S: AsRef<str>>(tokens: &[S]) -> String {
    let mut result = String::new();
    for (i, tok) in tokens.iter().enumerate() {
        let tok = tok.as_ref();
        if i > 0 && !is_attaching(tok) && !result.ends_with('\n') {
            result.push(' ');
        }
        result.push_str(tok);
    }
    result
}
