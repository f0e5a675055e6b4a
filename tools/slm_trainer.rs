/// SLM Trainer — trains n-gram models, samples from them, and scores text.
///
/// Usage:
///   slm_trainer train --config <model.ron> [--sample <n>] [--seed <n>]
///   slm_trainer train --corpus <file.txt> --order <n> [--train-percent <p>]
///   slm_trainer score --config <model.ron> <text>...
///   slm_trainer attribute --config <attribution.ron> [--test-percent <p>]

use chatter_engine::core::attribution::{attribution_matrix, train_models};
use chatter_engine::core::config::{AttributionConfig, SlmConfig};
use chatter_engine::core::markov::{rng_from_seed, Slm};
use chatter_engine::core::tokenizer::Granularity;
use clap::{ArgAction, Args, Parser, Subcommand};
use env_logger::Env;
use log::{error, info};
use serde_json::json;
use std::path::PathBuf;
use std::process;

#[derive(Parser, Debug)]
#[command(author, version, about = "Train and query n-gram language models", long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (-q, -qq)
    #[arg(short = 'q', long, global = true, action = ArgAction::Count)]
    quiet: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train a model and report its statistics
    Train(TrainArgs),
    /// Z-score text against a trained model
    Score(ScoreArgs),
    /// Cross-score held-out text across several models
    Attribute(AttributeArgs),
}

#[derive(Args, Debug)]
struct ModelArgs {
    /// RON model configuration; overrides the flags below
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Corpus text file
    #[arg(long, value_name = "PATH", required_unless_present = "config")]
    corpus: Option<PathBuf>,

    /// Tokenizer granularity (word or character)
    #[arg(long, default_value = "word")]
    granularity: Granularity,

    /// Context length in tokens
    #[arg(long, default_value_t = 3)]
    order: usize,

    /// Leading share of the corpus used for training
    #[arg(long, default_value_t = 90.0)]
    train_percent: f64,

    /// Held-out chunk size in tokens
    #[arg(long, default_value_t = 500)]
    chunk_size: usize,

    /// Insert a line-start marker at every corpus line
    #[arg(long)]
    mark_line_starts: bool,
}

#[derive(Args, Debug)]
struct TrainArgs {
    #[command(flatten)]
    model: ModelArgs,

    /// Print a sample of this many tokens after training
    #[arg(long, value_name = "TOKENS")]
    sample: Option<usize>,

    /// Prompt the sample continues from
    #[arg(long)]
    prompt: Option<String>,

    /// RNG seed for sampling (random when omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Emit the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct ScoreArgs {
    #[command(flatten)]
    model: ModelArgs,

    /// Text to score
    #[arg(required = true)]
    text: Vec<String>,
}

#[derive(Args, Debug)]
struct AttributeArgs {
    /// RON attribution configuration
    #[arg(short, long, value_name = "PATH")]
    config: PathBuf,

    /// Trailing share of each corpus scored against every model
    #[arg(long, default_value_t = 10.0)]
    test_percent: f64,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Train(args) => run_train(args),
        Commands::Score(args) => run_score(args),
        Commands::Attribute(args) => run_attribute(args),
    };

    if let Err(message) = result {
        error!("{}", message);
        process::exit(1);
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
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();
    builder.filter_level(level);
    let _ = builder.try_init();
}

fn resolve_config(args: &ModelArgs) -> Result<SlmConfig, String> {
    if let Some(ref path) = args.config {
        return SlmConfig::load_from_ron(path)
            .map_err(|e| format!("failed to load {}: {}", path.display(), e));
    }
    let corpus = args
        .corpus
        .clone()
        .ok_or_else(|| "either --config or --corpus is required".to_string())?;
    let config = SlmConfig {
        granularity: args.granularity,
        order: args.order,
        train_percent: args.train_percent,
        chunk_size: args.chunk_size,
        mark_line_starts: args.mark_line_starts,
        ..SlmConfig::new(corpus)
    };
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn build_model(args: &ModelArgs) -> Result<Slm, String> {
    let config = resolve_config(args)?;
    info!(
        "training order-{} {:?} model on '{}'",
        config.order,
        config.granularity,
        config.corpus.display()
    );
    Slm::from_config(&config).map_err(|e| format!("training failed: {}", e))
}

fn run_train(args: TrainArgs) -> Result<(), String> {
    let model = build_model(&args.model)?;

    let sample = match args.sample {
        Some(length) => {
            let mut rng = rng_from_seed(args.seed);
            Some(
                model
                    .generate(length, args.prompt.as_deref(), &mut rng)
                    .map_err(|e| format!("sampling failed: {}", e))?,
            )
        }
        None => None,
    };

    let table = model.transitions();
    if args.json {
        let report = json!({
            "order": model.order(),
            "granularity": model.granularity(),
            "tokens": model.tokens().len(),
            "contexts": table.len(),
            "transitions": table.transition_count(),
            "stats": model.stats(),
            "sample": sample,
        });
        println!("{}", report);
        return Ok(());
    }

    println!("=== Model Report ===");
    println!("Order:        {}", model.order());
    println!("Granularity:  {:?}", model.granularity());
    println!("Tokens:       {}", model.tokens().len());
    println!("Contexts:     {}", table.len());
    println!("Transitions:  {}", table.transition_count());
    match model.stats() {
        Some(stats) => {
            println!("Held-out chunks: {}", stats.chunks);
            println!("Mean score:      {:.6}", stats.mean);
            println!("Std deviation:   {:.6}", stats.standard_deviation);
        }
        None => println!("No held-out distribution (trained on the full corpus)"),
    }
    if let Some(text) = sample {
        println!("\n--- Sample ---\n{}", text);
    }
    Ok(())
}

fn run_score(args: ScoreArgs) -> Result<(), String> {
    let model = build_model(&args.model)?;
    let text = args.text.join(" ");
    let z = model
        .estimate(&text)
        .map_err(|e| format!("scoring failed: {}", e))?;
    println!("{:.4}", z);
    Ok(())
}

fn run_attribute(args: AttributeArgs) -> Result<(), String> {
    let config = AttributionConfig::load_from_ron(&args.config)
        .map_err(|e| format!("failed to load {}: {}", args.config.display(), e))?;
    let models = train_models(&config.models).map_err(|e| format!("training failed: {}", e))?;
    let matrix = attribution_matrix(&models, args.test_percent, config.chunk_size)
        .map_err(|e| format!("attribution failed: {}", e))?;

    let labels: Vec<String> = config
        .models
        .iter()
        .map(|m| {
            m.corpus
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| m.corpus.display().to_string())
        })
        .collect();

    print!("{:>16}", "text \\ model");
    for label in &labels {
        print!(" {:>12}", label);
    }
    println!();
    for (label, row) in labels.iter().zip(&matrix) {
        print!("{:>16}", label);
        for z in row {
            print!(" {:>12.3}", z);
        }
        println!();
    }
    Ok(())
}
