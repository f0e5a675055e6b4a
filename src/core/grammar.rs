/// Template grammar runtime — rule parsing, loading, and expansion.

use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Nested nonterminal expansions allowed before generation gives up.
pub const MAX_EXPANSION_DEPTH: usize = 256;

#[derive(Debug, Error)]
pub enum GrammarError {
    #[error("unterminated symbol reference in '{0}': missing closing '#'")]
    UnterminatedSymbol(String),
    #[error("empty symbol reference '##' in '{0}'")]
    EmptySymbol(String),
    #[error("unterminated variable binding in '{0}': missing ']'")]
    UnterminatedBinding(String),
    #[error("variable binding '[{0}]' has no ':'")]
    MissingColon(String),
    #[error("binding value '{0}' mixes literal text with a symbol reference")]
    MixedBindingValue(String),
    #[error("nonterminal '{0}' has no alternatives")]
    NoAlternatives(String),
    #[error("unknown start symbol '{0}'")]
    UnknownStartSymbol(String),
    #[error("symbol '{0}' is neither a bound variable nor a nonterminal")]
    UnresolvedSymbol(String),
    #[error("expansion of '{0}' exceeded the nesting limit")]
    RecursionLimit(String),
    #[error("unsupported grammar file format: {0}")]
    UnsupportedFormat(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON deserialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// The value side of a `[key:value]` binding.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Literal(String),
    SymbolRef(String),
}

/// One element of a production rule body.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyElement {
    /// Text emitted as-is.
    Literal(String),
    /// `#name#` — a bound variable, or else a nonterminal to expand.
    SymbolRef(String),
    /// `[key:value]` — resolves `value` and binds it to `key`. Emits nothing.
    VarBind { key: String, value: BindValue },
}

/// One alternative expansion of a nonterminal.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductionRule {
    pub head: String,
    pub body: Vec<BodyElement>,
}

impl ProductionRule {
    /// Parse a raw rule string for the nonterminal `head`.
    pub fn parse(head: &str, input: &str) -> Result<ProductionRule, GrammarError> {
        let mut body = Vec::new();
        let mut rest = input;
        while !rest.is_empty() {
            let (element, remaining) = parse_element(rest)?;
            body.push(element);
            rest = remaining;
        }
        Ok(ProductionRule {
            head: head.to_string(),
            body,
        })
    }
}

/// Consume one element from the front of `input`, returning it together with
/// the unparsed suffix.
///
/// Syntax:
/// - `#name#` → `SymbolRef`
/// - `[key:value]` → `VarBind`, where `value` is literal text or one `#name#`
/// - anything up to the next `#` or `[` → `Literal`
fn parse_element(input: &str) -> Result<(BodyElement, &str), GrammarError> {
    if let Some(after) = input.strip_prefix('#') {
        let end = after
            .find('#')
            .ok_or_else(|| GrammarError::UnterminatedSymbol(input.to_string()))?;
        let name = &after[..end];
        if name.is_empty() {
            return Err(GrammarError::EmptySymbol(input.to_string()));
        }
        return Ok((BodyElement::SymbolRef(name.to_string()), &after[end + 1..]));
    }

    if let Some(after) = input.strip_prefix('[') {
        let end = after
            .find(']')
            .ok_or_else(|| GrammarError::UnterminatedBinding(input.to_string()))?;
        let content = &after[..end];
        let (key, value) = content
            .split_once(':')
            .ok_or_else(|| GrammarError::MissingColon(content.to_string()))?;
        let element = BodyElement::VarBind {
            key: key.to_string(),
            value: parse_bind_value(value)?,
        };
        return Ok((element, &after[end + 1..]));
    }

    let end = input.find(|c: char| c == '#' || c == '[').unwrap_or(input.len());
    Ok((
        BodyElement::Literal(input[..end].to_string()),
        &input[end..],
    ))
}

fn parse_bind_value(value: &str) -> Result<BindValue, GrammarError> {
    if !value.contains('#') {
        return Ok(BindValue::Literal(value.to_string()));
    }
    match value
        .strip_prefix('#')
        .and_then(|inner| inner.strip_suffix('#'))
    {
        Some(name) if !name.is_empty() && !name.contains('#') => {
            Ok(BindValue::SymbolRef(name.to_string()))
        }
        _ => Err(GrammarError::MixedBindingValue(value.to_string())),
    }
}

/// A named symbol with its alternative production rules.
#[derive(Debug, Clone, PartialEq)]
pub struct NonterminalSymbol {
    pub name: String,
    pub rules: Vec<ProductionRule>,
}

/// Variables bound during a derivation.
pub type Bindings = HashMap<String, String>;

/// An immutable set of nonterminals parsed from rule strings.
#[derive(Debug, Clone, Default)]
pub struct Grammar {
    pub symbols: HashMap<String, NonterminalSymbol>,
}

impl Grammar {
    /// Build a grammar from nonterminal names and their raw rule strings.
    pub fn from_rules<I, R, S>(raw: I) -> Result<Grammar, GrammarError>
    where
        I: IntoIterator<Item = (S, R)>,
        R: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut symbols = HashMap::new();
        for (name, rule_strings) in raw {
            let name = name.as_ref();
            let rules = rule_strings
                .into_iter()
                .map(|s| ProductionRule::parse(name, s.as_ref()))
                .collect::<Result<Vec<_>, _>>()?;
            if rules.is_empty() {
                return Err(GrammarError::NoAlternatives(name.to_string()));
            }
            symbols.insert(
                name.to_string(),
                NonterminalSymbol {
                    name: name.to_string(),
                    rules,
                },
            );
        }
        debug!("parsed grammar with {} nonterminals", symbols.len());
        Ok(Grammar { symbols })
    }

    /// Load a grammar file, picking the format from its extension.
    pub fn load(path: &Path) -> Result<Grammar, GrammarError> {
        match path.extension().and_then(|s| s.to_str()) {
            Some("json") => Self::load_from_json(path),
            Some("ron") => Self::load_from_ron(path),
            _ => Err(GrammarError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Load a grammar from a JSON object of name → list of rule strings.
    pub fn load_from_json(path: &Path) -> Result<Grammar, GrammarError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_json(&contents)
    }

    pub fn parse_json(input: &str) -> Result<Grammar, GrammarError> {
        let raw: HashMap<String, Vec<String>> = serde_json::from_str(input)?;
        Self::from_rules(raw)
    }

    /// Load a grammar from a RON map of name → list of rule strings.
    pub fn load_from_ron(path: &Path) -> Result<Grammar, GrammarError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn parse_ron(input: &str) -> Result<Grammar, GrammarError> {
        let raw: HashMap<String, Vec<String>> = ron::from_str(input)?;
        Self::from_rules(raw)
    }

    /// Merge another grammar into this one. Nonterminals from `other`
    /// replace those in `self` with the same name.
    pub fn merge(&mut self, other: Grammar) {
        for (name, symbol) in other.symbols {
            self.symbols.insert(name, symbol);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    /// Expand `start` into a string.
    ///
    /// Bindings made during the derivation are visible for the rest of this
    /// call only.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        start: &str,
        rng: &mut R,
    ) -> Result<String, GrammarError> {
        let mut bindings = Bindings::new();
        self.generate_with_bindings(start, &mut bindings, rng)
    }

    /// Expand `start` against a caller-owned variable environment, so a
    /// sequence of generations can share bindings.
    pub fn generate_with_bindings<R: Rng + ?Sized>(
        &self,
        start: &str,
        bindings: &mut Bindings,
        rng: &mut R,
    ) -> Result<String, GrammarError> {
        let symbol = self
            .symbols
            .get(start)
            .ok_or_else(|| GrammarError::UnknownStartSymbol(start.to_string()))?;
        Expansion {
            grammar: self,
            bindings,
            rng,
        }
        .expand_symbol(symbol, 0)
    }
}

/// State threaded through one derivation.
struct Expansion<'a, R: Rng + ?Sized> {
    grammar: &'a Grammar,
    bindings: &'a mut Bindings,
    rng: &'a mut R,
}

impl<R: Rng + ?Sized> Expansion<'_, R> {
    fn expand_symbol(
        &mut self,
        symbol: &NonterminalSymbol,
        depth: usize,
    ) -> Result<String, GrammarError> {
        if depth >= MAX_EXPANSION_DEPTH {
            return Err(GrammarError::RecursionLimit(symbol.name.clone()));
        }
        let rule = symbol
            .rules
            .choose(&mut *self.rng)
            .ok_or_else(|| GrammarError::NoAlternatives(symbol.name.clone()))?;

        let mut out = String::new();
        for element in &rule.body {
            out.push_str(&self.expand_element(element, depth)?);
        }
        Ok(out)
    }

    fn expand_element(
        &mut self,
        element: &BodyElement,
        depth: usize,
    ) -> Result<String, GrammarError> {
        match element {
            BodyElement::Literal(text) => Ok(text.clone()),
            BodyElement::SymbolRef(name) => self.resolve(name, depth),
            BodyElement::VarBind { key, value } => {
                let resolved = match value {
                    BindValue::Literal(text) => text.clone(),
                    BindValue::SymbolRef(name) => self.resolve(name, depth)?,
                };
                self.bindings.insert(key.clone(), resolved);
                Ok(String::new())
            }
        }
    }

    /// Variables shadow nonterminals of the same name.
    fn resolve(&mut self, name: &str, depth: usize) -> Result<String, GrammarError> {
        if let Some(value) = self.bindings.get(name) {
            return Ok(value.clone());
        }
        let grammar = self.grammar;
        match grammar.symbols.get(name) {
            Some(symbol) => self.expand_symbol(symbol, depth + 1),
            None => Err(GrammarError::UnresolvedSymbol(name.to_string())),
        }
    }
}
