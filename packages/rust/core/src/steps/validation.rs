use tracing::{info, instrument, warn};

use taskflow_shared::{Result, ValidationReport};

use super::Payload;
use crate::state::{Artifacts, SessionState};
use crate::step::Step;

/// Checks that the pipeline produced usable artifacts.
///
/// An invalid report is still a successful step; the report says what is
/// missing.
pub struct ValidationStep;

fn non_empty<T>(slot: &Option<Vec<T>>) -> bool {
    slot.as_ref().is_some_and(|items| !items.is_empty())
}

/// Build a report for the artifacts currently in state.
pub fn validate_artifacts(artifacts: &Artifacts) -> ValidationReport {
    let mut report = ValidationReport {
        tasks_valid: non_empty(&artifacts.parsed_tasks),
        flashcards_valid: non_empty(&artifacts.flashcards),
        schedule_valid: non_empty(&artifacts.schedule),
        errors: Vec::new(),
    };

    if !report.tasks_valid {
        report.errors.push("No tasks parsed or invalid format.".into());
    }
    if !report.flashcards_valid {
        report.errors.push("No flashcards generated.".into());
    }
    if !report.schedule_valid {
        report.errors.push("No schedule generated.".into());
    }
    report
}

impl Step<Payload> for ValidationStep {
    fn name(&self) -> &str {
        "validation"
    }

    fn description(&self) -> &str {
        "Validates tasks, flashcards and schedule."
    }

    #[instrument(skip_all, fields(step = "validation"))]
    fn run(&self, state: &mut SessionState, _input: Payload) -> Result<Payload> {
        let report = validate_artifacts(state.artifacts());

        if report.is_valid() {
            info!("all artifacts valid");
        } else {
            warn!(errors = ?report.errors, "artifacts incomplete");
        }

        state.artifacts_mut().validation_report = Some(report.clone());
        Ok(Payload::Report(report))
    }
}
