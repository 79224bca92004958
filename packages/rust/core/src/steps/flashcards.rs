use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Deserialize;
use tracing::{info, instrument};

use taskflow_shared::{Flashcard, Result};

use super::{Payload, consult_model};
use crate::llm::{LanguageModel, parse_json_response, prompt_excerpt};
use crate::state::SessionState;
use crate::step::Step;

const STEP_NAME: &str = "flashcards";

const MAX_PROMPT_CHARS: usize = 10_000;
const MAX_FLASHCARDS: usize = 10;
const CARD_TAG: &str = "academic";

/// `Term: definition` or `Term - definition`, optionally bulleted.
static DEFINITION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*•]\s+)?([^:]{1,60}?)\s*(?::\s+|\s+-\s+)(\S.{2,})$")
        .expect("valid regex")
});

/// Builds question/answer study cards from the extracted text.
pub struct FlashcardStep {
    model: Option<Arc<dyn LanguageModel>>,
}

impl FlashcardStep {
    pub fn new(model: Option<Arc<dyn LanguageModel>>) -> Self {
        Self { model }
    }
}

impl Step<Payload> for FlashcardStep {
    fn name(&self) -> &str {
        STEP_NAME
    }

    fn description(&self) -> &str {
        "Generates question/answer flashcards."
    }

    #[instrument(skip_all, fields(step = STEP_NAME))]
    fn run(&self, state: &mut SessionState, _input: Payload) -> Result<Payload> {
        let text = state.artifacts().full_text().to_string();

        let pairs = consult_model(
            state,
            STEP_NAME,
            self.model.as_ref(),
            || flashcard_prompt(&text),
            parse_model_pairs,
        )
        .unwrap_or_else(|| definition_pairs(&text));

        let cards = format_flashcards(pairs);
        info!(cards = cards.len(), "generated flashcards");
        state.artifacts_mut().flashcards = Some(cards.clone());
        Ok(Payload::Flashcards(cards))
    }
}

#[derive(Debug, Deserialize)]
struct QaPair {
    #[serde(alias = "front")]
    question: String,
    #[serde(alias = "back")]
    answer: String,
}

fn flashcard_prompt(text: &str) -> String {
    format!(
        "Write 5 to 10 study flashcards covering the most important concepts in \
         the text below. Answer with a JSON array only, each element shaped like \
         {{\"question\": \"...\", \"answer\": \"...\"}}.\n\nText:\n{}",
        prompt_excerpt(text, MAX_PROMPT_CHARS)
    )
}

fn parse_model_pairs(answer: &str) -> Result<Vec<(String, String)>> {
    let pairs: Vec<QaPair> = parse_json_response(answer)?;
    Ok(pairs.into_iter().map(|p| (p.question, p.answer)).collect())
}

fn definition_pairs(text: &str) -> Vec<(String, String)> {
    text.lines()
        .filter_map(|line| {
            let caps = DEFINITION_LINE.captures(line)?;
            Some((caps[1].to_string(), caps[2].to_string()))
        })
        .collect()
}

/// Trim question/answer pairs into tagged cards, dropping blank ones.
pub fn format_flashcards(pairs: impl IntoIterator<Item = (String, String)>) -> Vec<Flashcard> {
    pairs
        .into_iter()
        .filter_map(|(front, back)| {
            let (front, back) = (front.trim(), back.trim());
            (!front.is_empty() && !back.is_empty()).then(|| Flashcard {
                front: front.to_string(),
                back: back.to_string(),
                tags: vec![CARD_TAG.to_string()],
            })
        })
        .take(MAX_FLASHCARDS)
        .collect()
}
