//! End-to-end study pipeline: document → text → tasks → summary →
//! flashcards → schedule → validation report.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDate, Utc};
use serde_json::json;
use tracing::{info, instrument, warn};

use taskflow_shared::{Result, RunRecord, ScheduleConfig};

use crate::llm::LanguageModel;
use crate::memory::MemoryBank;
use crate::runner::{RunObserver, SequentialRunner};
use crate::state::SessionState;
use crate::steps::{
    ExtractionStep, FlashcardStep, Payload, SchedulerStep, SummarizationStep, TaskParsingStep,
    ValidationStep,
};

/// Long-term memory collection holding one [`RunRecord`] per run.
pub const RUNS_COLLECTION: &str = "runs";

/// Characters of the summary kept in a run record.
const SUMMARY_EXCERPT_CHARS: usize = 120;

/// Configuration for one pipeline run.
#[derive(Clone)]
pub struct PipelineConfig {
    /// Document to process.
    pub document: PathBuf,
    /// Language model for the model-backed steps; `None` runs them offline.
    pub llm: Option<Arc<dyn LanguageModel>>,
    pub schedule: ScheduleConfig,
    /// First day of the study schedule (defaults to today, local time).
    pub start_date: Option<NaiveDate>,
}

impl PipelineConfig {
    pub fn new(document: impl Into<PathBuf>) -> Self {
        Self {
            document: document.into(),
            llm: None,
            schedule: ScheduleConfig::default(),
            start_date: None,
        }
    }
}

/// Outcome of [`run_pipeline`].
///
/// `state` is returned whether or not the run succeeded, so callers can report
/// whatever artifacts were produced before a failure.
pub struct PipelineReport {
    pub state: SessionState,
    pub result: Result<Payload>,
    pub record: RunRecord,
    pub elapsed: Duration,
}

impl PipelineReport {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Assemble the six study steps in execution order.
pub fn build_pipeline(config: &PipelineConfig) -> SequentialRunner<Payload> {
    let start_date = config
        .start_date
        .unwrap_or_else(|| Local::now().date_naive());

    SequentialRunner::new(
        "study-pipeline",
        "Turns an academic document into tasks, a summary, flashcards and a schedule.",
    )
    .with_step(ExtractionStep)
    .with_step(TaskParsingStep::new(config.llm.clone(), start_date))
    .with_step(SummarizationStep::new(config.llm.clone()))
    .with_step(FlashcardStep::new(config.llm.clone()))
    .with_step(SchedulerStep::new(
        config.llm.clone(),
        config.schedule.clone(),
        start_date,
    ))
    .with_step(ValidationStep)
}

/// Run the study pipeline once and record the run in `memory`.
///
/// Failing to write the run record is logged, not returned: the pipeline
/// result is what the caller asked for.
#[instrument(skip_all, fields(document = %config.document.display()))]
pub fn run_pipeline(
    config: &PipelineConfig,
    memory: &dyn MemoryBank,
    observer: &dyn RunObserver,
) -> PipelineReport {
    let start = Instant::now();
    let started_at = Utc::now();
    let runner = build_pipeline(config);

    let mut state = SessionState::new();
    state.artifacts_mut().document_path = Some(config.document.clone());
    memory.store_session("document_path", json!(config.document.display().to_string()));
    memory.store_session("session_id", json!(state.session_id().to_string()));

    info!(
        session = %state.session_id(),
        offline = config.llm.is_none(),
        steps = runner.len(),
        "starting study pipeline"
    );

    let result = runner.run_observed(
        &mut state,
        Payload::Document(config.document.clone()),
        observer,
    );

    let record = run_record(&state, config, started_at, &result);
    match serde_json::to_value(&record) {
        Ok(item) => {
            if let Err(e) = memory.store_long_term(RUNS_COLLECTION, item) {
                warn!(error = %e, "failed to record run in memory");
            }
        }
        Err(e) => warn!(error = %e, "failed to encode run record"),
    }

    let elapsed = start.elapsed();
    info!(
        session = %state.session_id(),
        completed = record.completed,
        degradations = state.degradations().len(),
        elapsed_ms = elapsed.as_millis(),
        "study pipeline finished"
    );

    PipelineReport {
        state,
        result,
        record,
        elapsed,
    }
}

fn run_record(
    state: &SessionState,
    config: &PipelineConfig,
    started_at: chrono::DateTime<Utc>,
    result: &Result<Payload>,
) -> RunRecord {
    let artifacts = state.artifacts();
    let summary_excerpt = artifacts
        .summary
        .as_ref()
        .map(|s| s.summary.chars().take(SUMMARY_EXCERPT_CHARS).collect())
        .unwrap_or_default();

    RunRecord {
        session_id: state.session_id().clone(),
        document: config.document.display().to_string(),
        started_at,
        completed: result.is_ok(),
        failed_step: result
            .as_ref()
            .err()
            .and_then(|e| e.failed_step())
            .map(|(step, _)| step.to_string()),
        task_count: artifacts.tasks().len(),
        flashcard_count: artifacts.flashcards.as_ref().map_or(0, Vec::len),
        schedule_len: artifacts.schedule.as_ref().map_or(0, Vec::len),
        summary_excerpt,
    }
}

/// Past runs from `memory`, newest first.
///
/// Items that no longer decode as a [`RunRecord`] are skipped.
pub fn recent_runs(memory: &dyn MemoryBank, limit: usize) -> Result<Vec<RunRecord>> {
    let items = memory.retrieve_long_term(RUNS_COLLECTION)?;

    Ok(items
        .into_iter()
        .rev()
        .filter_map(|item| match serde_json::from_value::<RunRecord>(item) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(error = %e, "skipping unreadable run record");
                None
            }
        })
        .take(limit)
        .collect())
}
