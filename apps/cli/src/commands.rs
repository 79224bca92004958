//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use tracing::{info, warn};

use taskflow_core::llm::{LanguageModel, model_from_config};
use taskflow_core::memory::FileMemoryBank;
use taskflow_core::pipeline::{PipelineConfig, PipelineReport, recent_runs, run_pipeline};
use taskflow_core::runner::{RunObserver, RunPhase, SilentObserver};
use taskflow_core::steps::format_study_plan;
use taskflow_shared::{AppConfig, TaskflowError, init_config, load_config, memory_dir};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// TaskFlow: turn course documents into tasks, flashcards and a study plan.
#[derive(Parser)]
#[command(
    name = "taskflow",
    version,
    about = "Turn a syllabus or lecture notes into tasks, a summary, flashcards and a study plan.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the study pipeline on a document (.pdf, .txt or .md).
    Run {
        /// Document to process.
        document: PathBuf,

        /// Print all artifacts, history and degradations as JSON.
        #[arg(long)]
        json: bool,

        /// Skip the language model and use the deterministic fallbacks.
        #[arg(long)]
        offline: bool,

        /// First day of the study plan, YYYY-MM-DD (defaults to today).
        #[arg(long)]
        start_date: Option<NaiveDate>,
    },

    /// List past pipeline runs, newest first.
    History {
        /// Maximum number of runs to show.
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
///
/// Logs go to stderr so `run --json` output on stdout stays parseable.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "taskflow=info",
        1 => "taskflow=debug",
        _ => "taskflow=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            document,
            json,
            offline,
            start_date,
        } => cmd_run(document, json, offline, start_date).await,
        Command::History { limit } => cmd_history(limit).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(
    document: PathBuf,
    json_output: bool,
    offline: bool,
    start_date: Option<NaiveDate>,
) -> Result<()> {
    let config = load_config()?;
    let memory = FileMemoryBank::open(memory_dir(&config)?)?;

    info!(
        document = %document.display(),
        offline,
        memory = %memory.dir().display(),
        "running study pipeline"
    );

    // The model client blocks on HTTP, so it is built, used and dropped on
    // the blocking pool along with the rest of the pipeline.
    let report = tokio::task::spawn_blocking(move || {
        let pipeline_config = PipelineConfig {
            document,
            llm: resolve_model(&config, offline),
            schedule: config.schedule.clone(),
            start_date,
        };

        if json_output {
            run_pipeline(&pipeline_config, &memory, &SilentObserver)
        } else {
            run_pipeline(&pipeline_config, &memory, &CliProgress::new())
        }
    })
    .await
    .map_err(|e| eyre!("pipeline task failed: {e}"))?;

    if json_output {
        print_json(&report)?;
    } else {
        print_report(&report);
    }

    match report.result {
        Ok(_) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// The configured model, or `None` when offline or unavailable.
fn resolve_model(
    config: &AppConfig,
    offline: bool,
) -> Option<std::sync::Arc<dyn LanguageModel>> {
    if offline {
        return None;
    }

    match model_from_config(config) {
        Ok(model) => Some(model),
        Err(TaskflowError::Unavailable { reason, .. }) => {
            warn!(%reason, "language model unavailable, using offline fallbacks");
            None
        }
        Err(e) => {
            warn!(error = %e, "failed to set up language model, using offline fallbacks");
            None
        }
    }
}

fn print_report(report: &PipelineReport) {
    let state = &report.state;
    let artifacts = state.artifacts();

    println!();
    if let Some(summary) = &artifacts.summary {
        println!("  Summary");
        println!("  {}", summary.summary.replace('\n', "\n  "));
        for point in &summary.key_points {
            println!("    • {point}");
        }
        println!();
    }

    if let Some(tasks) = &artifacts.parsed_tasks {
        println!("  Tasks ({})", tasks.len());
        for task in tasks {
            match task.deadline {
                Some(deadline) => println!(
                    "    [{}] {} (due {deadline}, ~{}h)",
                    task.priority, task.description, task.estimated_hours
                ),
                None => println!(
                    "    [{}] {} (~{}h)",
                    task.priority, task.description, task.estimated_hours
                ),
            }
        }
        println!();
    }

    if let Some(schedule) = &artifacts.schedule {
        for line in format_study_plan(schedule).lines() {
            println!("  {line}");
        }
        println!();
    }

    if let Some(cards) = &artifacts.flashcards {
        println!("  Flashcards: {}", cards.len());
    }

    if let Some(validation) = &artifacts.validation_report {
        if validation.is_valid() {
            println!("  Validation: all artifacts present");
        } else {
            println!("  Validation: {}", validation.errors.join(" "));
        }
    }

    for degradation in state.degradations() {
        println!(
            "  Note: {} ran without the {} ({})",
            degradation.step, degradation.collaborator, degradation.reason
        );
    }

    println!("  Session: {}", state.session_id());
    println!("  Time:    {:.1}s", report.elapsed.as_secs_f64());
    if let Err(e) = &report.result {
        println!("  Status:  failed: {e}");
    }
    println!();
}

fn print_json(report: &PipelineReport) -> Result<()> {
    let state = &report.state;
    let output = json!({
        "session_id": state.session_id(),
        "completed": report.result.is_ok(),
        "error": report.result.as_ref().err().map(ToString::to_string),
        "artifacts": state.artifacts(),
        "history": state.history(),
        "degradations": state.degradations(),
        "elapsed_ms": report.elapsed.as_millis() as u64,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn cmd_history(limit: usize) -> Result<()> {
    let config = load_config()?;
    let memory = FileMemoryBank::open(memory_dir(&config)?)?;
    let runs = recent_runs(&memory, limit)?;

    if runs.is_empty() {
        println!("No runs recorded yet.");
        return Ok(());
    }

    for run in runs {
        let status = match &run.failed_step {
            None => "ok".to_string(),
            Some(step) => format!("failed at {step}"),
        };
        println!(
            "{}  {:<18} {}  tasks={} cards={} sessions={}",
            run.started_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
            status,
            run.document,
            run.task_count,
            run.flashcard_count,
            run.schedule_len
        );
    }

    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Run observer driving an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl RunObserver for CliProgress {
    fn step_started(&self, index: usize, total: usize, name: &str) {
        self.spinner
            .set_message(format!("[{}/{total}] {name}", index + 1));
    }

    fn step_completed(&self, _index: usize, _total: usize, name: &str, elapsed: Duration) {
        self.spinner
            .println(format!("  ✓ {name} ({:.1}s)", elapsed.as_secs_f64()));
    }

    fn step_failed(&self, _index: usize, name: &str, error: &TaskflowError) {
        self.spinner.println(format!("  ✗ {name}: {error}"));
    }

    fn finished(&self, _phase: &RunPhase) {
        self.spinner.finish_and_clear();
    }
}
