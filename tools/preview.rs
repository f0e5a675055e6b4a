/// Preview — interactive shell for trying grammars and language models.
///
/// Usage: preview [--grammar <path>]... [--model <model.ron>] [--seed <n>]
///
/// Commands:
///   gen <symbol> [n]      — expand a symbol n times (fresh variables each time)
///   session <symbol>      — expand, keeping variables across session calls
///   vars                  — show session variables
///   clear                 — forget session variables
///   slm <len> [prompt]    — sample from the language model
///   score <text>          — z-score text against the language model
///   seed <n>              — set RNG seed
///   help                  — list commands
///   quit                  — exit

use chatter_engine::core::config::SlmConfig;
use chatter_engine::core::grammar::{Bindings, Grammar};
use chatter_engine::core::markov::{rng_from_seed, Slm};
use clap::{ArgAction, Parser};
use env_logger::Env;
use log::error;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;

#[derive(Parser, Debug)]
#[command(author, version, about = "Interactive generation shell", long_about = None)]
struct Cli {
    /// Grammar file (.json or .ron); repeat to merge several
    #[arg(short, long = "grammar", value_name = "PATH")]
    grammars: Vec<PathBuf>,

    /// RON model configuration for the language model
    #[arg(short, long, value_name = "PATH")]
    model: Option<PathBuf>,

    /// Initial RNG seed (random when omitted)
    #[arg(long)]
    seed: Option<u64>,

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
    for path in &cli.grammars {
        match Grammar::load(path) {
            Ok(loaded) => grammar.merge(loaded),
            Err(e) => {
                error!("failed to load {}: {}", path.display(), e);
                process::exit(1);
            }
        }
    }

    let model = match cli.model {
        Some(ref path) => match SlmConfig::load_from_ron(path)
            .map_err(|e| e.to_string())
            .and_then(|config| Slm::from_config(&config).map_err(|e| e.to_string()))
        {
            Ok(model) => Some(model),
            Err(e) => {
                error!("failed to build model from {}: {}", path.display(), e);
                process::exit(1);
            }
        },
        None => None,
    };

    println!("Loaded {} nonterminals", grammar.symbols.len());
    if let Some(ref m) = model {
        println!(
            "Loaded order-{} model over {} tokens",
            m.order(),
            m.tokens().len()
        );
    }
    match cli.seed {
        Some(seed) => println!("Seed: {}", seed),
        None => println!("Seed: random"),
    }
    println!("Type 'help' for commands.\n");

    let mut rng = rng_from_seed(cli.seed);
    let mut session = Bindings::new();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("preview> ");
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (cmd, rest) = match line.split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd.to_lowercase(), rest.trim()),
            None => (line.to_lowercase(), ""),
        };

        match cmd.as_str() {
            "quit" | "exit" | "q" => {
                println!("Goodbye.");
                break;
            }
            "help" | "h" | "?" => print_help(),
            "gen" => {
                let mut parts = rest.split_whitespace();
                let Some(symbol) = parts.next() else {
                    println!("Usage: gen <symbol> [n]");
                    continue;
                };
                let count: usize = parts.next().and_then(|n| n.parse().ok()).unwrap_or(1);
                for _ in 0..count {
                    match grammar.generate(symbol, &mut rng) {
                        Ok(text) => println!("{}", text),
                        Err(e) => {
                            println!("Error: {}", e);
                            break;
                        }
                    }
                }
            }
            "session" => {
                if rest.is_empty() {
                    println!("Usage: session <symbol>");
                    continue;
                }
                match grammar.generate_with_bindings(rest, &mut session, &mut rng) {
                    Ok(text) => println!("{}", text),
                    Err(e) => println!("Error: {}", e),
                }
            }
            "vars" => {
                if session.is_empty() {
                    println!("(no session variables)");
                }
                let mut keys: Vec<&String> = session.keys().collect();
                keys.sort();
                for key in keys {
                    println!("  {} = {}", key, session[key]);
                }
            }
            "clear" => {
                session.clear();
                println!("Session variables cleared.");
            }
            "slm" => {
                let Some(ref m) = model else {
                    println!("No model loaded (use --model).");
                    continue;
                };
                let (len, prompt) = match rest.split_once(char::is_whitespace) {
                    Some((len, prompt)) => (len, Some(prompt.trim())),
                    None => (rest, None),
                };
                let Ok(length) = len.parse::<usize>() else {
                    println!("Usage: slm <len> [prompt]");
                    continue;
                };
                match m.generate(length, prompt, &mut rng) {
                    Ok(text) => println!("{}", text),
                    Err(e) => println!("Error: {}", e),
                }
            }
            "score" => {
                let Some(ref m) = model else {
                    println!("No model loaded (use --model).");
                    continue;
                };
                match m.estimate(rest) {
                    Ok(z) => println!("z = {:.4}", z),
                    Err(e) => println!("Error: {}", e),
                }
            }
            "seed" => match rest.parse::<u64>() {
                Ok(seed) => {
                    rng = rng_from_seed(Some(seed));
                    println!("Seed set to {}", seed);
                }
                Err(_) => println!("Usage: seed <n>"),
            },
            other => println!("Unknown command '{}'. Type 'help' for commands.", other),
        }
    }
}

fn init_logging(verbose: u8, quiet: u8) {
    use log::LevelFilter;

    let level = if quiet > 0 {
        match quiet {
            1 => LevelFilter::Warn,
            _ => LevelFilter::Error,
        }
    } else {
        match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            _ => LevelFilter::Debug,
        }
    };

    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("warn"));
    builder.format_timestamp_millis();
    builder.filter_level(level);
    let _ = builder.try_init();
}

fn print_help() {
    println!("Commands:");
    println!("  gen <symbol> [n]    expand a symbol n times (fresh variables each time)");
    println!("  session <symbol>    expand, keeping variables across session calls");
    println!("  vars                show session variables");
    println!("  clear               forget session variables");
    println!("  slm <len> [prompt]  sample from the language model");
    println!("  score <text>        z-score text against the language model");
    println!("  seed <n>            set RNG seed");
    println!("  help                list commands");
    println!("  quit                exit");
}
