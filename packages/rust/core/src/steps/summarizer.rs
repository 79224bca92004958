use std::sync::Arc;

use tracing::{info, instrument};

use taskflow_shared::{Result, Summary, TaskflowError};

use super::{Payload, consult_model};
use crate::llm::{LanguageModel, prompt_excerpt};
use crate::state::SessionState;
use crate::step::Step;

const STEP_NAME: &str = "summarization";

const MAX_PROMPT_CHARS: usize = 10_000;
const SUMMARY_SENTENCES: usize = 3;
const MAX_KEY_POINTS: usize = 5;
const EMPTY_SUMMARY: &str = "No content extracted.";

/// Condenses the extracted text into a short summary and key points.
pub struct SummarizationStep {
    model: Option<Arc<dyn LanguageModel>>,
}

impl SummarizationStep {
    pub fn new(model: Option<Arc<dyn LanguageModel>>) -> Self {
        Self { model }
    }
}

impl Step<Payload> for SummarizationStep {
    fn name(&self) -> &str {
        STEP_NAME
    }

    fn description(&self) -> &str {
        "Summarizes the document and lists its key points."
    }

    #[instrument(skip_all, fields(step = STEP_NAME))]
    fn run(&self, state: &mut SessionState, _input: Payload) -> Result<Payload> {
        // The chained input is the task list; the text comes from state.
        let text = state.artifacts().full_text().to_string();

        let summary = if text.trim().is_empty() {
            Summary {
                summary: EMPTY_SUMMARY.to_string(),
                key_points: Vec::new(),
            }
        } else {
            consult_model(
                state,
                STEP_NAME,
                self.model.as_ref(),
                || summary_prompt(&text),
                parse_model_summary,
            )
            .unwrap_or_else(|| heuristic_summary(&text))
        };

        info!(key_points = summary.key_points.len(), "summarized document");
        state.artifacts_mut().summary = Some(summary.clone());
        Ok(Payload::Summary(summary))
    }
}

fn summary_prompt(text: &str) -> String {
    format!(
        "Summarize the following academic material for a student in one short \
         paragraph, then list up to {MAX_KEY_POINTS} key points as lines starting \
         with \"- \".\n\nText:\n{}",
        prompt_excerpt(text, MAX_PROMPT_CHARS)
    )
}

fn parse_model_summary(answer: &str) -> Result<Summary> {
    let summary = answer.trim();
    if summary.is_empty() {
        return Err(TaskflowError::parse("model returned an empty summary"));
    }

    let key_points = summary
        .lines()
        .filter_map(bullet_text)
        .take(MAX_KEY_POINTS)
        .map(str::to_string)
        .collect();

    Ok(Summary {
        summary: summary.to_string(),
        key_points,
    })
}

/// Text of a bullet (`-`, `*`, `•`) or numbered (`1.`) line.
fn bullet_text(line: &str) -> Option<&str> {
    let line = line.trim_start();
    let rest = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .or_else(|| line.strip_prefix("• "))
        .or_else(|| {
            let digits = line.find(|c: char| !c.is_ascii_digit())?;
            (digits > 0)
                .then(|| line[digits..].strip_prefix(". "))
                .flatten()
        })?;

    let rest = rest.trim();
    (!rest.is_empty()).then_some(rest)
}

fn heuristic_summary(text: &str) -> Summary {
    let sentences = split_sentences(text);
    let summary = sentences
        .iter()
        .take(SUMMARY_SENTENCES)
        .cloned()
        .collect::<Vec<_>>()
        .join(" ");

    Summary {
        summary,
        key_points: sentences
            .into_iter()
            .skip(SUMMARY_SENTENCES)
            .take(MAX_KEY_POINTS)
            .collect(),
    }
}

/// Split on sentence terminators followed by whitespace, and on line breaks.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();

    for line in text.lines() {
        let mut current = String::new();
        let mut chars = line.chars().peekable();

        while let Some(c) = chars.next() {
            current.push(c);
            let at_boundary = chars.peek().is_none_or(|next| next.is_whitespace());
            if matches!(c, '.' | '!' | '?') && at_boundary {
                push_sentence(&mut sentences, &current);
                current.clear();
            }
        }
        push_sentence(&mut sentences, &current);
    }

    sentences
}

fn push_sentence(sentences: &mut Vec<String>, candidate: &str) {
    let normalized = candidate.split_whitespace().collect::<Vec<_>>().join(" ");
    if !normalized.is_empty() {
        sentences.push(normalized);
    }
}
