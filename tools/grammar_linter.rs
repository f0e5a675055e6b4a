/// Grammar Linter — checks rule files for broken references and dead rules.
///
/// Usage: grammar_linter <path>... [--start <symbol>]

use chatter_engine::core::grammar::{BindValue, BodyElement, Grammar};
use clap::{ArgAction, Parser};
use env_logger::Env;
use log::{debug, error};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser, Debug)]
#[command(author, version, about = "Lint template grammar files", long_about = None)]
struct Cli {
    /// Grammar files (.json, .ron) or directories to scan
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Start symbol used for the reachability check
    #[arg(short, long, default_value = "origin")]
    start: String,

    /// Warn about nonterminals with fewer alternatives than this
    #[arg(long, value_name = "COUNT", default_value_t = 1)]
    min_alternatives: usize,

    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (-q, -qq)
    #[arg(short = 'q', long, action = ArgAction::Count)]
    quiet: u8,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let mut grammar = Grammar::default();
    let mut load_failures = 0;
    for path in &cli.paths {
        if path.is_dir() {
            load_failures += load_grammars_recursive(path, &mut grammar);
        } else if path.is_file() {
            load_failures += load_one(path, &mut grammar);
        } else {
            error!("path '{}' does not exist", path.display());
            process::exit(1);
        }
    }

    println!("Loaded {} nonterminals", grammar.symbols.len());

    let (errors, warnings) = lint(&grammar, &cli.start, cli.min_alternatives);

    println!("\n=== Grammar Lint Report ===\n");
    if errors.is_empty() && warnings.is_empty() && load_failures == 0 {
        println!("All checks passed!");
    }
    for warning in &warnings {
        println!("WARNING: {}", warning);
    }
    for error in &errors {
        println!("ERROR: {}", error);
    }
    println!(
        "\nSummary: {} errors, {} warnings, {} files failed to load",
        errors.len(),
        warnings.len(),
        load_failures
    );

    if errors.is_empty() && load_failures == 0 {
        process::exit(0);
    } else {
        process::exit(1);
    }
}

fn init_logging(verbose: u8, quiet: u8) {
    use log::LevelFilter;

    let level = match (quiet, verbose) {
        (0, 0) => LevelFilter::Info,
        (0, 1) => LevelFilter::Debug,
        (0, _) => LevelFilter::Trace,
        (1, _) => LevelFilter::Warn,
        _ => LevelFilter::Error,
    };

    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();
    builder.filter_level(level);
    let _ = builder.try_init();
}

fn is_grammar_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|s| s.to_str()),
        Some("json") | Some("ron")
    )
}

fn load_one(path: &Path, grammar: &mut Grammar) -> usize {
    match Grammar::load(path) {
        Ok(loaded) => {
            println!("  Loaded: {}", path.display());
            grammar.merge(loaded);
            0
        }
        Err(e) => {
            error!("failed to load {}: {}", path.display(), e);
            1
        }
    }
}

fn load_grammars_recursive(dir: &Path, grammar: &mut Grammar) -> usize {
    let mut failures = 0;
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            error!("cannot read {}: {}", dir.display(), e);
            return 1;
        }
    };
    let mut paths: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
    paths.sort();
    for path in paths {
        if path.is_dir() {
            failures += load_grammars_recursive(&path, grammar);
        } else if is_grammar_file(&path) {
            failures += load_one(&path, grammar);
        } else {
            debug!("skipping {}", path.display());
        }
    }
    failures
}

/// Names a body element reads: bare references and symbol-valued bindings.
fn referenced_names(element: &BodyElement) -> Option<&str> {
    match element {
        BodyElement::SymbolRef(name) => Some(name.as_str()),
        BodyElement::VarBind {
            value: BindValue::SymbolRef(name),
            ..
        } => Some(name.as_str()),
        _ => None,
    }
}

fn lint(grammar: &Grammar, start: &str, min_alternatives: usize) -> (Vec<String>, Vec<String>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let bound_keys: HashSet<&str> = grammar
        .symbols
        .values()
        .flat_map(|s| &s.rules)
        .flat_map(|r| &r.body)
        .filter_map(|e| match e {
            BodyElement::VarBind { key, .. } => Some(key.as_str()),
            _ => None,
        })
        .collect();

    let mut names: Vec<&String> = grammar.symbols.keys().collect();
    names.sort();

    // References that nothing can ever resolve
    for name in &names {
        let symbol = &grammar.symbols[*name];
        if symbol.rules.len() < min_alternatives {
            warnings.push(format!(
                "Nonterminal '{}' has only {} alternative(s)",
                name,
                symbol.rules.len()
            ));
        }
        let mut reported = BTreeSet::new();
        for rule in &symbol.rules {
            for target in rule.body.iter().filter_map(referenced_names) {
                if !grammar.contains(target) && !bound_keys.contains(target) {
                    reported.insert(target);
                }
            }
        }
        for target in reported {
            errors.push(format!(
                "Nonterminal '{}' references '{}', which is neither defined nor bound",
                name, target
            ));
        }
    }

    // Reachability from the start symbol
    if !grammar.contains(start) {
        errors.push(format!("Start symbol '{}' is not defined", start));
        return (errors, warnings);
    }
    let mut reached: HashSet<&str> = HashSet::new();
    let mut pending = vec![start];
    while let Some(current) = pending.pop() {
        if !reached.insert(current) {
            continue;
        }
        if let Some(symbol) = grammar.symbols.get(current) {
            for rule in &symbol.rules {
                pending.extend(
                    rule.body
                        .iter()
                        .filter_map(referenced_names)
                        .filter(|t| grammar.contains(t)),
                );
            }
        }
    }
    for name in &names {
        if !reached.contains(name.as_str()) {
            warnings.push(format!(
                "Nonterminal '{}' is unreachable from '{}'",
                name, start
            ));
        }
    }

    (errors, warnings)
}
