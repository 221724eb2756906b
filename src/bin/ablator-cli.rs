//! Ablator CLI - drive the variant/evaluation/analysis pipeline
//!
//! Three stages, run to completion in order:
//! 1. `build`    - corpus JSONL → variant dataset JSONL
//! 2. `evaluate` - variant dataset + oracle → append-only evaluation log
//! 3. `analyze`  - evaluation log → summary JSON
//!
//! Exit code 0 on completion; non-zero when the dataset builder cannot meet
//! its target under the strict policy, or on any other fatal error.

use ablator::core::{
    self, aggregate, BuildConfig, CompletenessPolicy, CorpusError, TransformKind,
};
use ablator::eval::{self, EvalConfig, ResultLog};
use ablator::events::{EventBus, LoggingObserver};
use ablator::oracle::{HttpReviewOracle, RetryConfig};
use clap::{Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::info;

/// Ablator CLI - paper ablation experiments against an external reviewer
#[derive(Parser)]
#[command(name = "ablator-cli")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Completeness policy names accepted on the command line.
#[derive(Clone, Copy, ValueEnum, Default)]
enum PolicyArg {
    /// Discard-and-resample on any failure
    #[default]
    Strict,
    /// Keep whatever succeeded, never resample
    Lenient,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a variant dataset from a corpus
    Build {
        /// Corpus file (line-delimited JSON, one document per line)
        #[arg(short, long)]
        corpus: PathBuf,

        /// Output dataset file (line-delimited JSON, one variant per line)
        #[arg(short, long)]
        output: PathBuf,

        /// Fraction of the corpus to target (0.0-1.0)
        #[arg(short = 'f', long, default_value = "1.0")]
        sample_fraction: f64,

        /// Completeness policy
        #[arg(long, value_enum, default_value = "strict")]
        policy: PolicyArg,

        /// Under strict policy, treat a missing section as a discard too
        #[arg(long)]
        require_full_coverage: bool,

        /// Comma-separated transform kinds (default: the ablation set)
        #[arg(long)]
        kinds: Option<String>,

        /// Use the adversarial-injection kind set instead of the default
        #[arg(long, conflicts_with = "kinds")]
        attack: bool,

        /// Random seed for reproducible sampling
        #[arg(short, long, default_value = "12345")]
        seed: u64,

        /// Maximum replacement draws under strict policy
        #[arg(long, default_value = "100")]
        max_retries: usize,
    },

    /// Run batch evaluation of a variant dataset against the oracle
    Evaluate {
        /// Variant dataset file produced by `build`
        #[arg(short, long)]
        dataset: PathBuf,

        /// Append-only evaluation log (created if absent, resumed if present)
        #[arg(short, long)]
        log: PathBuf,

        /// Number of variants to evaluate (default: all)
        #[arg(short = 'n', long)]
        sample_size: Option<usize>,

        /// Reviewer service base URL
        #[arg(long, default_value = ablator::oracle::http::DEFAULT_ORACLE_URL)]
        oracle_url: String,

        /// Model selector passed to the reviewer service
        #[arg(short, long, default_value = "reviewer-8b")]
        model: String,

        /// Random seed for variant sampling
        #[arg(short, long, default_value = "12345")]
        seed: u64,

        /// Per-call timeout in seconds
        #[arg(long, default_value = "300")]
        timeout: u64,
    },

    /// Aggregate an evaluation log into a summary JSON
    Analyze {
        /// Evaluation log file produced by `evaluate`
        #[arg(short, long)]
        log: PathBuf,

        /// Output summary JSON file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(io::stderr)
        .init();

    let verbose = cli.verbose;
    let result = match cli.command {
        Commands::Build {
            corpus,
            output,
            sample_fraction,
            policy,
            require_full_coverage,
            kinds,
            attack,
            seed,
            max_retries,
        } => execute_build(
            &corpus,
            &output,
            sample_fraction,
            policy,
            require_full_coverage,
            kinds,
            attack,
            seed,
            max_retries,
        ),

        Commands::Evaluate {
            dataset,
            log,
            sample_size,
            oracle_url,
            model,
            seed,
            timeout,
        } => execute_evaluate(
            &dataset,
            &log,
            sample_size,
            &oracle_url,
            &model,
            seed,
            timeout,
            verbose,
        ),

        Commands::Analyze { log, output } => execute_analyze(&log, output.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

fn parse_kind_list(spec: &str) -> Result<Vec<TransformKind>, Box<dyn std::error::Error>> {
    let mut kinds = Vec::new();
    for part in spec.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        kinds.push(part.parse::<TransformKind>()?);
    }
    if kinds.is_empty() {
        return Err("no transform kinds given".into());
    }
    if !kinds.iter().any(TransformKind::is_original) {
        kinds.insert(0, TransformKind::Original);
        info!("added required 'original' kind to the set");
    }
    Ok(kinds)
}

#[allow(clippy::too_many_arguments)]
fn execute_build(
    corpus_path: &std::path::Path,
    output: &std::path::Path,
    sample_fraction: f64,
    policy: PolicyArg,
    require_full_coverage: bool,
    kinds: Option<String>,
    attack: bool,
    seed: u64,
    max_retries: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let corpus = core::load_corpus(corpus_path)?;
    let fraction = sample_fraction.clamp(0.0, 1.0);
    let target = ((corpus.len() as f64 * fraction) as usize).max(1);

    let kind_set = if attack {
        core::attack_kinds()
    } else {
        match kinds {
            Some(spec) => parse_kind_list(&spec)?,
            None => core::default_kinds(),
        }
    };

    let policy = match policy {
        PolicyArg::Strict => CompletenessPolicy::Strict {
            require_full_coverage,
        },
        PolicyArg::Lenient => CompletenessPolicy::Lenient,
    };

    let config = BuildConfig {
        kinds: kind_set,
        target_size: target,
        seed,
        policy,
        max_retries,
    };

    let report = core::build(&corpus, &config, None)?;

    println!("Built {} variant families", report.families.len());
    println!(
        "  discarded: {}  resampled: {}",
        report.discarded, report.resampled
    );
    for (kind, stats) in &report.kind_stats {
        println!(
            "  {:<28} success {:>4}  skip {:>4}  failure {:>4}  ({:.0}%)",
            kind,
            stats.success,
            stats.skip,
            stats.failure,
            stats.success_rate() * 100.0
        );
    }

    let variants = report.into_variants();
    core::save_variants(output, &variants)?;
    println!("Wrote {} variants to {}", variants.len(), output.display());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn execute_evaluate(
    dataset: &std::path::Path,
    log_path: &std::path::Path,
    sample_size: Option<usize>,
    oracle_url: &str,
    model: &str,
    seed: u64,
    timeout: u64,
    verbose: u8,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut variants = core::load_variants(dataset)?;

    if let Some(n) = sample_size {
        if n < variants.len() {
            let mut rng = StdRng::seed_from_u64(seed);
            variants.shuffle(&mut rng);
            variants.truncate(n);
        }
    }

    let oracle = HttpReviewOracle::with_url(model, oracle_url)
        .with_timeout(Duration::from_secs(timeout));
    let config = EvalConfig {
        call_timeout: Duration::from_secs(timeout),
        retry: RetryConfig::default(),
        ..EvalConfig::default()
    };

    let runtime = tokio::runtime::Runtime::new()?;
    let report = runtime.block_on(async {
        let bus = EventBus::with_default_capacity();
        if verbose > 0 {
            tokio::spawn(LoggingObserver::new(&bus).run());
        }
        let mut log = ResultLog::open(log_path)?;
        eval::evaluate_all(&variants, &oracle, &mut log, &config, Some(&bus)).await
    })?;

    println!("Evaluation finished: {}", report.summary_line());
    if !report.failed.is_empty() {
        println!("Failed variants:");
        for id in &report.failed {
            println!("  {}", id);
        }
    }
    println!("Log: {}", log_path.display());
    Ok(())
}

fn execute_analyze(
    log_path: &std::path::Path,
    output: Option<&std::path::Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let records = eval::load_records(log_path)?;
    if records.is_empty() {
        return Err(CorpusError::Empty {
            path: log_path.display().to_string(),
        }
        .into());
    }

    let summary = aggregate(&records);
    let json = serde_json::to_string_pretty(&summary)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(path, &json)?;
            println!("Wrote summary to {}", path.display());
        }
        None => println!("{}", json),
    }

    println!("Records: {}", summary.total);
    println!("Baseline missing: {}", summary.baseline_missing);
    println!("Anomalies: {}", summary.anomalies.len());
    for (kind, ks) in &summary.by_kind {
        if kind == "original" {
            println!(
                "  {:<28} n={:<4} rating {:.2} ± {:.2}  accept {:.0}%",
                kind,
                ks.count,
                ks.rating_mean,
                ks.rating_std,
                ks.accept_rate * 100.0
            );
        } else {
            println!(
                "  {:<28} n={:<4} delta {:+.2}  raised {:.0}%  reject→accept {:.0}%",
                kind,
                ks.count,
                ks.delta_mean,
                ks.raised_rate * 100.0,
                ks.reject_to_accept_rate * 100.0
            );
        }
    }
    Ok(())
}
