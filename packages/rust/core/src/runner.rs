//! Sequential runner: executes an ordered list of steps, threading each
//! step's output into the next step's input.
//!
//! The run is modelled as a small state machine
//! (`NotStarted → Running(i) → Completed | Failed`). Steps run strictly one at
//! a time; the first failure halts the run and is returned to the caller
//! wrapped in [`TaskflowError::StepFailed`]. State written before the failure
//! (including partial writes by the failing step) is left in place.

use std::time::{Duration, Instant};

use tracing::{debug, error, info, instrument};

use taskflow_shared::{Result, TaskflowError};

use crate::state::{HistoryRecord, SessionState};
use crate::step::{Describe, Step};

/// Lifecycle of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunPhase {
    NotStarted,
    /// Executing the step at this index.
    Running(usize),
    Completed,
    /// Halted at `index`; later steps were not attempted.
    Failed { index: usize, step: String },
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotStarted => f.write_str("not started"),
            Self::Running(i) => write!(f, "running step #{i}"),
            Self::Completed => f.write_str("completed"),
            Self::Failed { index, step } => write!(f, "failed at step #{index} ({step})"),
        }
    }
}

/// Callback for reporting run progress.
pub trait RunObserver: Send + Sync {
    /// Called before a step is invoked.
    fn step_started(&self, index: usize, total: usize, name: &str);
    /// Called after a step returned successfully.
    fn step_completed(&self, index: usize, total: usize, name: &str, elapsed: Duration);
    /// Called when a step returned an error.
    fn step_failed(&self, index: usize, name: &str, error: &TaskflowError);
    /// Called once the run reaches a terminal phase.
    fn finished(&self, phase: &RunPhase);
}

/// No-op observer for headless/test usage.
pub struct SilentObserver;

impl RunObserver for SilentObserver {
    fn step_started(&self, _index: usize, _total: usize, _name: &str) {}
    fn step_completed(&self, _index: usize, _total: usize, _name: &str, _elapsed: Duration) {}
    fn step_failed(&self, _index: usize, _name: &str, _error: &TaskflowError) {}
    fn finished(&self, _phase: &RunPhase) {}
}

/// Runs an ordered list of steps against one shared [`SessionState`].
pub struct SequentialRunner<V> {
    name: String,
    description: String,
    steps: Vec<Box<dyn Step<V>>>,
}

impl<V: Describe> SequentialRunner<V> {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            steps: Vec::new(),
        }
    }

    /// Append a step (builder style).
    pub fn with_step(mut self, step: impl Step<V> + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Append an already boxed step.
    pub fn push_step(&mut self, step: Box<dyn Step<V>>) {
        self.steps.push(step);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step names in execution order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step in order and return the last step's output.
    pub fn run(&self, state: &mut SessionState, input: V) -> Result<V> {
        self.run_observed(state, input, &SilentObserver)
    }

    /// Like [`run`](Self::run), reporting progress to `observer`.
    #[instrument(skip_all, fields(runner = %self.name, session = %state.session_id()))]
    pub fn run_observed(
        &self,
        state: &mut SessionState,
        input: V,
        observer: &dyn RunObserver,
    ) -> Result<V> {
        let total = self.steps.len();
        let mut current = input;
        let mut phase = RunPhase::NotStarted;

        info!(steps = total, %phase, "starting sequential run");
        phase = if total == 0 {
            RunPhase::Completed
        } else {
            RunPhase::Running(0)
        };

        while let RunPhase::Running(index) = phase {
            let step = &self.steps[index];
            let name = step.name();
            let input_description = current.describe();

            debug!(index, step = name, "running step");
            observer.step_started(index, total, name);
            let started = Instant::now();

            match step.run(state, current) {
                Ok(output) => {
                    let elapsed = started.elapsed();
                    state.record_history(HistoryRecord::new(
                        name,
                        input_description,
                        output.describe(),
                    ));
                    observer.step_completed(index, total, name, elapsed);
                    debug!(
                        index,
                        step = name,
                        elapsed_ms = elapsed.as_millis(),
                        "step completed"
                    );

                    current = output;
                    phase = if index + 1 == total {
                        RunPhase::Completed
                    } else {
                        RunPhase::Running(index + 1)
                    };
                }
                Err(cause) => {
                    error!(index, step = name, error = %cause, "step failed, halting run");
                    observer.step_failed(index, name, &cause);
                    observer.finished(&RunPhase::Failed {
                        index,
                        step: name.to_string(),
                    });
                    return Err(TaskflowError::step_failed(name, index, cause));
                }
            }
        }

        info!(steps = total, %phase, "sequential run finished");
        observer.finished(&phase);
        Ok(current)
    }
}
