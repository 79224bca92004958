//! The six study-pipeline stages and the value they pass along.
//!
//! Order: extraction → task parsing → summarization → flashcards →
//! scheduling → validation. Each stage stores its artifact in
//! [`SessionState::artifacts_mut`] as well as returning it, so stages that
//! need an older artifact (the summarizer needs the text, not the tasks) read
//! it from state.

mod extraction;
mod flashcards;
mod scheduler;
mod summarizer;
mod task_parser;
mod validation;

use std::path::PathBuf;
use std::sync::Arc;

use taskflow_shared::{
    ExtractedContent, Flashcard, Result, ScheduleEntry, Summary, Task, ValidationReport,
};

use crate::llm::{LANGUAGE_MODEL, LanguageModel};
use crate::state::SessionState;
use crate::step::{Describe, truncate_description};

pub use extraction::ExtractionStep;
pub use flashcards::{FlashcardStep, format_flashcards};
pub use scheduler::{SchedulerStep, format_study_plan};
pub use summarizer::SummarizationStep;
pub use task_parser::{TaskParsingStep, find_deadline};
pub use validation::{ValidationStep, validate_artifacts};

/// Value threaded between pipeline stages.
#[derive(Debug, Clone)]
pub enum Payload {
    Document(PathBuf),
    Extracted(ExtractedContent),
    Tasks(Vec<Task>),
    Summary(Summary),
    Flashcards(Vec<Flashcard>),
    Schedule(Vec<ScheduleEntry>),
    Report(ValidationReport),
}

impl Payload {
    /// Variant name, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Document(_) => "document",
            Self::Extracted(_) => "extracted content",
            Self::Tasks(_) => "tasks",
            Self::Summary(_) => "summary",
            Self::Flashcards(_) => "flashcards",
            Self::Schedule(_) => "schedule",
            Self::Report(_) => "validation report",
        }
    }
}

impl Describe for Payload {
    fn describe(&self) -> String {
        match self {
            Self::Document(path) => path.describe(),
            Self::Extracted(content) => format!(
                "{}: {} pages, {} chars",
                content.metadata.file_name,
                content.page_count,
                content.full_text.chars().count()
            ),
            Self::Tasks(tasks) => format!("{} tasks", tasks.len()),
            Self::Summary(summary) => truncate_description(&summary.summary),
            Self::Flashcards(cards) => format!("{} flashcards", cards.len()),
            Self::Schedule(entries) => format!("{} schedule entries", entries.len()),
            Self::Report(report) if report.is_valid() => "valid".to_string(),
            Self::Report(report) => format!("{} validation errors", report.errors.len()),
        }
    }
}

/// Ask the model and parse its answer.
///
/// Returns `None` (after recording a degradation on `state`) when no model is
/// configured, the call fails, or the answer does not parse. The caller then
/// runs its deterministic fallback.
pub(crate) fn consult_model<T>(
    state: &mut SessionState,
    step: &str,
    model: Option<&Arc<dyn LanguageModel>>,
    prompt: impl FnOnce() -> String,
    parse: impl FnOnce(&str) -> Result<T>,
) -> Option<T> {
    let Some(model) = model else {
        state.note_degradation(step, LANGUAGE_MODEL, "not configured");
        return None;
    };

    tracing::debug!(step, model = model.model(), "consulting language model");
    match model.generate(&prompt()).and_then(|answer| parse(&answer)) {
        Ok(value) => Some(value),
        Err(e) => {
            state.note_degradation(step, LANGUAGE_MODEL, e.to_string());
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Mutex;

    use taskflow_shared::{Result, TaskflowError};

    use crate::llm::LanguageModel;

    /// Model returning canned answers (or an error) and recording prompts.
    pub struct ScriptedModel {
        answer: std::result::Result<String, String>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        pub fn answering(answer: &str) -> Self {
            Self {
                answer: Ok(answer.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                answer: Err(message.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    impl LanguageModel for ScriptedModel {
        fn model(&self) -> &str {
            "scripted"
        }

        fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.answer.clone().map_err(TaskflowError::Llm)
        }
    }
}
