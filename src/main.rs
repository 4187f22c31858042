use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use pwmfit::config::RunConfig;
use pwmfit::io::TableColumns;
use pwmfit::logging::{LogLevel, LoggingSystem};
use pwmfit::pipeline::{MutantJob, RunReport, ScoringPipeline, TabularJob};
use pwmfit::weights::WeightMode;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::process::ExitCode;

/// Score sequences and mutants with higher-order position weight matrices.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    scoring: ScoringArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Score the sequences of a test table against a training table
    Score(ScoreArgs),
    /// Score the mutants of a mutation file against an A2M alignment
    Mutants(MutantArgs),
}

/// Options shared by both run modes
#[derive(Args, Debug)]
struct ScoringArgs {
    /// TOML or JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Highest PWM order (1-4)
    #[arg(short, long, global = true)]
    order: Option<usize>,

    /// Pseudocount exponent N, pseudocount = 10^-N
    #[arg(short, long = "pseudo-count", global = true)]
    pseudocount: Option<f64>,

    /// Normalize by global symbol frequency
    #[arg(long, global = true)]
    bias: bool,

    /// Orders at which bias applies, comma separated
    #[arg(long, value_delimiter = ',', global = true)]
    bias_orders: Option<Vec<usize>>,

    /// Build PWMs and score in parallel
    #[arg(short, long, global = true)]
    threads: bool,

    /// Size of the worker pool (implies --threads)
    #[arg(long, global = true)]
    num_threads: Option<usize>,

    /// Print a summary of the training ensemble
    #[arg(short, long, global = true)]
    summarize: bool,

    /// Output file prefix
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit JSON log records
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Args, Debug)]
struct ScoreArgs {
    /// Training table
    #[arg(long)]
    training_file: PathBuf,

    /// Sequence column of the training table
    #[arg(long)]
    train_sequence_column: String,

    /// Label column of the training table
    #[arg(long)]
    train_label_column: Option<String>,

    /// Keep only training rows with this label
    #[arg(long)]
    train_label_value: Option<String>,

    /// Weight column of the training table
    #[arg(long)]
    weight_column: Option<String>,

    /// Test table
    #[arg(long)]
    testing_file: PathBuf,

    /// Sequence column of the test table
    #[arg(long)]
    test_sequence_column: String,

    /// Label column of the test table
    #[arg(long)]
    test_label_column: Option<String>,

    /// Percentage of training sequences to keep
    #[arg(long, default_value_t = 100)]
    fraction: u32,

    /// Seed of the training sub-sample
    #[arg(long, default_value_t = 1)]
    replicate: u64,

    /// Field delimiter of both tables
    #[arg(long, default_value_t = ',')]
    delimiter: char,
}

#[derive(Args, Debug)]
struct MutantArgs {
    /// A2M alignment whose first record is the reference
    #[arg(long)]
    training_file: PathBuf,

    /// Mutation file, one descriptor per line
    #[arg(long)]
    testing_file: PathBuf,

    /// Sequence weighting scheme
    #[arg(long, value_enum)]
    adjust_weights: Option<WeightMode>,

    /// Identity threshold (percent) for similarity weighting
    #[arg(long)]
    similarity: Option<u32>,

    /// Score incrementally relative to the reference
    #[arg(long)]
    wild_type_relative: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    panic::set_hook(Box::new(|info| {
        tracing::error!(panic = %info, "Internal bug");
    }));

    match panic::catch_unwind(AssertUnwindSafe(|| run(cli))) {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(e)) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
        Err(_) => {
            eprintln!("Internal bug: pwmfit stopped unexpectedly");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.scoring.config {
        Some(path) => RunConfig::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => RunConfig::default(),
    };
    config.load_from_env()?;
    apply_cli(&mut config, &cli)?;

    let _logging = LoggingSystem::init(config.logging.clone())?;
    let pipeline = ScoringPipeline::new(config)?;

    let report = match cli.command {
        Command::Score(args) => {
            let delimiter = u8::try_from(args.delimiter)
                .with_context(|| format!("Delimiter '{}' is not a single byte", args.delimiter))?;
            let job = TabularJob {
                training_file: args.training_file,
                train_columns: TableColumns::new(args.train_sequence_column)
                    .with_label(args.train_label_column)
                    .with_weight(args.weight_column),
                train_label_value: args.train_label_value,
                testing_file: args.testing_file,
                test_columns: TableColumns::new(args.test_sequence_column).with_label(args.test_label_column),
                fraction: args.fraction,
                replicate: args.replicate,
                delimiter,
                output: cli.scoring.output,
            };
            pipeline.run_tabular(&job)?
        }
        Command::Mutants(args) => {
            let job = MutantJob {
                alignment_file: args.training_file,
                mutations_file: args.testing_file,
                output: cli.scoring.output,
            };
            pipeline.run_mutants(&job)?
        }
    };

    if cli.scoring.summarize {
        print!("{}", report.summary);
    }
    print_report(&report);
    Ok(())
}

/// Command-line flags take precedence over file and environment values
fn apply_cli(config: &mut RunConfig, cli: &Cli) -> anyhow::Result<()> {
    let args = &cli.scoring;
    let scoring = &mut config.scoring;

    if let Some(order) = args.order {
        scoring.order = order;
    }
    if let Some(exponent) = args.pseudocount {
        scoring.pseudocount_exponent = exponent;
    }
    scoring.bias |= args.bias;
    if let Some(orders) = &args.bias_orders {
        scoring.bias_orders = orders.clone();
    }
    scoring.threads |= args.threads;
    if let Some(n) = args.num_threads {
        scoring.num_threads = n;
        scoring.threads = true;
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.parse::<LogLevel>()?;
    }
    config.logging.json_format |= args.json_logs;

    if let Command::Mutants(mutant_args) = &cli.command {
        config.scoring.wild_type_relative |= mutant_args.wild_type_relative;
        if let Some(mode) = mutant_args.adjust_weights {
            config.weighting.mode = mode;
        }
        if let Some(similarity) = mutant_args.similarity {
            config.weighting.similarity = similarity;
        }
    }

    config.validate()?;
    Ok(())
}

fn print_report(report: &RunReport) {
    println!(
        "Scored {} items ({} skipped), written to {}",
        report.scored,
        report.skipped,
        report.scores_path.display()
    );
    if let Some(fails) = &report.fails_path {
        println!("Failures written to {}", fails.display());
    }
}
