//! infrascore - cloud infrastructure posture scoring CLI
//!
//! ## Commands
//!
//! - `run`: Score the selected metrics and write a run report
//! - `plan`: Show the dependency waves a selection would execute in
//! - `metrics`: List the builtin metric catalog

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use infrascore_core::{
    builtin_registry, default_report_path, init_tracing, DependencyResolver, EngineConfig,
    Evaluator, ExecutionEngine, FsSampleStore, JsonFileSink, MetricSelection, MetricStatus,
    ReportSink, RubricEvaluator, RunConfig, RunContext, RunId, RunReport, WeightingScheme,
    DEFAULT_SAVE_DIR,
};
use infrascore_llm::{LlmConfig, LlmEvaluator, OpenAiChatClient};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "infrascore")]
#[command(author = "Infrascore Maintainers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Cloud infrastructure posture scoring", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score metrics and write a run report
    Run(RunArgs),

    /// Show execution waves for a selection without running it
    Plan {
        /// Comma-separated metric ids (default: every metric)
        #[arg(long, value_delimiter = ',')]
        metrics: Vec<String>,
    },

    /// List the builtin metrics
    Metrics,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// Deterministic rubric rules (offline)
    Rules,
    /// OpenAI-compatible chat model
    Llm,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Comma-separated metric ids (default: every metric)
    #[arg(long, value_delimiter = ',')]
    metrics: Vec<String>,

    /// Root directory holding sample sets
    #[arg(long, env = "INFRASCORE_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Sample set used when a metric has no override
    #[arg(long, env = "INFRASCORE_SAMPLE", default_value = "Sample2")]
    sample: String,

    /// Maximum metrics evaluated at once
    #[arg(long, env = "INFRASCORE_MAX_WORKERS")]
    max_workers: Option<usize>,

    /// Per-metric evaluation timeout in seconds
    #[arg(long, env = "INFRASCORE_TIMEOUT_SECS", default_value_t = 60)]
    timeout_secs: u64,

    /// Scoring backend
    #[arg(long, env = "INFRASCORE_BACKEND", value_enum, default_value_t = Backend::Rules)]
    backend: Backend,

    /// API key for the llm backend
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model name for the llm backend
    #[arg(long, env = "OPENAI_MODEL")]
    model: Option<String>,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL")]
    base_url: Option<String>,

    /// JSON file mapping metric ids to {params, sample_name} overrides
    #[arg(long)]
    context: Option<PathBuf>,

    /// JSON run configuration; command-line flags take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run identifier (default: generated)
    #[arg(long)]
    run_id: Option<String>,

    /// Report path (default: <save-dir>/<run-id>.json)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory for reports when no output path is given
    #[arg(long, default_value = DEFAULT_SAVE_DIR)]
    save_dir: PathBuf,

    /// Roll categories up with the default category weights
    #[arg(long)]
    category_weighted: bool,

    /// Print the report instead of writing it
    #[arg(long)]
    no_save: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    match cli.command {
        Commands::Run(args) => cmd_run(args).await,
        Commands::Plan { metrics } => cmd_plan(&metrics),
        Commands::Metrics => cmd_metrics(),
    }
}

fn selection(metrics: &[String]) -> MetricSelection {
    if metrics.is_empty() {
        MetricSelection::All
    } else {
        MetricSelection::only(metrics.iter().map(|m| m.trim()))
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {what} {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid {what} {}", path.display()))
}

/// File config first, then command-line overrides.
fn build_run_config(args: &RunArgs) -> Result<RunConfig> {
    let mut run = match &args.config {
        Some(path) => read_json::<RunConfig>(path, "run config")?,
        None => RunConfig::default(),
    };
    if !args.metrics.is_empty() {
        run.metrics = selection(&args.metrics);
    }
    if let Some(id) = &args.run_id {
        run.run_id = RunId::new(id.clone());
    }
    if args.max_workers.is_some() {
        run.max_workers = args.max_workers;
    }
    if let Some(output) = &args.output {
        run.output_path = Some(output.clone());
    }
    Ok(run)
}

fn build_engine_config(args: &RunArgs) -> EngineConfig {
    let mut config = EngineConfig::default()
        .with_default_sample_set(args.sample.clone())
        .with_evaluation_timeout(Duration::from_secs(args.timeout_secs.max(1)));
    if let Some(n) = args.max_workers {
        config = config.with_max_concurrency(n);
    }
    if args.category_weighted {
        config = config.with_weighting(WeightingScheme::category_weighted());
    }
    config
}

fn build_evaluator(args: &RunArgs) -> Result<Arc<dyn Evaluator>> {
    match args.backend {
        Backend::Rules => Ok(Arc::new(RubricEvaluator::new())),
        Backend::Llm => {
            let mut config = LlmConfig::default();
            if let Some(key) = &args.api_key {
                config = config.with_api_key(key.clone());
            }
            if let Some(model) = &args.model {
                config = config.with_model(model.clone());
            }
            if let Some(url) = &args.base_url {
                config = config.with_base_url(url.clone());
            }
            let client = OpenAiChatClient::new(config)
                .context("Failed to configure the llm backend (is OPENAI_API_KEY set?)")?;
            Ok(Arc::new(LlmEvaluator::new(Arc::new(client))))
        }
    }
}

/// Score the selection and persist the report
async fn cmd_run(args: RunArgs) -> Result<()> {
    let run = build_run_config(&args)?;
    let context = match &args.context {
        Some(path) => read_json::<RunContext>(path, "run context")?,
        None => RunContext::new(),
    };

    let registry = builtin_registry().context("Builtin metric catalog is invalid")?;
    let engine = ExecutionEngine::new(
        Arc::new(registry),
        Arc::new(FsSampleStore::new(&args.data_dir)),
        build_evaluator(&args)?,
        build_engine_config(&args),
    );

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling run");
            let _ = cancel_tx.send(true);
        }
    });

    let report = engine
        .run_with_cancel(&run, &context, cancel_rx)
        .await
        .context("Run aborted")?;

    if args.no_save {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let destination = run
        .output_path
        .clone()
        .unwrap_or_else(|| default_report_path(&args.save_dir, &report.run_id));
    let written = JsonFileSink
        .write(&report, &destination)
        .await
        .context("Failed to save run report")?;

    print_summary(&report);
    println!("\nReport: {}", written.display());
    info!(run_id = %report.run_id, "done");
    Ok(())
}

fn print_summary(report: &RunReport) {
    println!("Run {}", report.run_id);
    println!();
    for (id, result) in &report.metrics {
        match result.status {
            MetricStatus::Scored => println!(
                "  {:<36} {}  {}",
                id,
                result.score.map(|s| s.to_string()).unwrap_or_default(),
                result.rationale
            ),
            MetricStatus::Failed => println!(
                "  {:<36} -  failed: {}",
                id,
                result.error.as_deref().unwrap_or("unknown error")
            ),
            MetricStatus::Skipped => println!("  {:<36} -  skipped", id),
        }
    }

    let summary = &report.summary;
    println!();
    for (category, score) in &summary.category_scores {
        println!("  {:<14} {:.2}", category, score);
    }
    match summary.overall_score {
        Some(score) => println!(
            "\nOverall: {:.2} ({}/{} metrics scored)",
            score, summary.scored_metrics, summary.total_metrics
        ),
        None => println!(
            "\nOverall: n/a ({}/{} metrics scored)",
            summary.scored_metrics, summary.total_metrics
        ),
    }
    for warning in &summary.warnings {
        println!("  warning: {}", warning);
    }
}

/// Print the dependency waves for a selection
fn cmd_plan(metrics: &[String]) -> Result<()> {
    let registry = builtin_registry().context("Builtin metric catalog is invalid")?;
    let plan = DependencyResolver::new(&registry)
        .resolve(&selection(metrics))
        .context("Failed to resolve execution plan")?;

    println!("{} metrics in execution plan", plan.len());
    for (n, wave) in plan.levels().iter().enumerate() {
        println!("\nWave {}:", n);
        for id in wave {
            let deps = plan.dependencies_of(id);
            if deps.is_empty() {
                println!("  {}", id);
            } else {
                let deps: Vec<&str> = deps.iter().map(|d| d.as_str()).collect();
                println!("  {} (after {})", id, deps.join(", "));
            }
        }
    }
    Ok(())
}

/// List the builtin catalog
fn cmd_metrics() -> Result<()> {
    let registry = builtin_registry().context("Builtin metric catalog is invalid")?;
    println!(
        "{:<36} {:<12} {:>6}  {:<26} {}",
        "METRIC", "CATEGORY", "WEIGHT", "INPUT", "DEPENDS ON"
    );
    for def in registry.definitions() {
        let deps: Vec<&str> = def.depends_on.iter().map(|d| d.as_str()).collect();
        println!(
            "{:<36} {:<12} {:>6.2}  {:<26} {}",
            def.id,
            def.category,
            def.weight,
            def.input.sample_file,
            deps.join(", ")
        );
    }
    Ok(())
}
