use std::sync::{Arc, LazyLock};

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::Deserialize;
use tracing::{info, instrument};

use taskflow_shared::{Priority, Result, Task};

use super::{Payload, consult_model};
use crate::llm::{LanguageModel, parse_json_response, prompt_excerpt};
use crate::state::SessionState;
use crate::step::Step;

const STEP_NAME: &str = "task_parsing";

/// Characters of document text sent to the model.
const MAX_PROMPT_CHARS: usize = 15_000;

/// A line mentioning any of these is treated as a task by the heuristic.
const TASK_KEYWORDS: [&str; 3] = ["assignment", "due", "exam"];

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").expect("valid regex"));

static US_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b").expect("valid regex"));

static MONTH_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\.?\s+(\d{1,2})(?:st|nd|rd|th)?\b(?:,?\s+(\d{4})\b)?",
    )
    .expect("valid regex")
});

/// Pulls actionable items and deadlines out of the document text.
pub struct TaskParsingStep {
    model: Option<Arc<dyn LanguageModel>>,
    /// Supplies the year for dates written without one.
    reference_date: NaiveDate,
}

impl TaskParsingStep {
    pub fn new(model: Option<Arc<dyn LanguageModel>>, reference_date: NaiveDate) -> Self {
        Self {
            model,
            reference_date,
        }
    }
}

impl Step<Payload> for TaskParsingStep {
    fn name(&self) -> &str {
        STEP_NAME
    }

    fn description(&self) -> &str {
        "Parses tasks, assignments and deadlines from the extracted text."
    }

    #[instrument(skip_all, fields(step = STEP_NAME))]
    fn run(&self, state: &mut SessionState, input: Payload) -> Result<Payload> {
        let text = match input {
            Payload::Extracted(content) => content.full_text,
            _ => state.artifacts().full_text().to_string(),
        };

        let tasks = consult_model(
            state,
            STEP_NAME,
            self.model.as_ref(),
            || task_prompt(&text),
            |answer| self.parse_model_tasks(answer),
        )
        .unwrap_or_else(|| heuristic_tasks(&text, self.reference_date));

        info!(tasks = tasks.len(), "parsed tasks");
        state.artifacts_mut().parsed_tasks = Some(tasks.clone());
        Ok(Payload::Tasks(tasks))
    }
}

// ---------------------------------------------------------------------------
// Model path
// ---------------------------------------------------------------------------

/// Task as the model writes it. Kept loose; normalized into [`Task`].
#[derive(Debug, Deserialize)]
struct ModelTask {
    description: String,
    #[serde(default)]
    deadline: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    estimated_hours: Option<f64>,
}

impl TaskParsingStep {
    fn parse_model_tasks(&self, answer: &str) -> Result<Vec<Task>> {
        let raw: Vec<ModelTask> = parse_json_response(answer)?;

        Ok(raw
            .into_iter()
            .filter(|t| !t.description.trim().is_empty())
            .map(|t| Task {
                description: t.description.trim().to_string(),
                deadline: t
                    .deadline
                    .as_deref()
                    .and_then(|d| find_deadline(d, self.reference_date)),
                priority: parse_priority(t.priority.as_deref()),
                estimated_hours: t
                    .estimated_hours
                    .map(|h| h.round().max(1.0) as u32)
                    .unwrap_or(2),
            })
            .collect())
    }
}

fn task_prompt(text: &str) -> String {
    format!(
        "You are an academic planner. Extract every actionable task, assignment, exam \
         and study goal from the text below.\n\
         Answer with a JSON array only. Each element must have:\n\
         - \"description\": what has to be done\n\
         - \"deadline\": due date as YYYY-MM-DD, or null\n\
         - \"priority\": \"High\", \"Medium\" or \"Low\"\n\
         - \"estimated_hours\": whole hours of work\n\n\
         Text:\n{}",
        prompt_excerpt(text, MAX_PROMPT_CHARS)
    )
}

fn parse_priority(priority: Option<&str>) -> Priority {
    match priority.map(|p| p.trim().to_ascii_lowercase()).as_deref() {
        Some("high") => Priority::High,
        Some("low") => Priority::Low,
        _ => Priority::Medium,
    }
}

// ---------------------------------------------------------------------------
// Heuristic path
// ---------------------------------------------------------------------------

fn heuristic_tasks(text: &str, reference_date: NaiveDate) -> Vec<Task> {
    text.lines()
        .filter(|line| {
            let lower = line.to_lowercase();
            TASK_KEYWORDS.iter().any(|k| lower.contains(k))
        })
        .map(|line| Task {
            description: line.trim().to_string(),
            deadline: find_deadline(line, reference_date),
            priority: Priority::Medium,
            estimated_hours: 2,
        })
        .collect()
}

/// First valid date in `text`.
///
/// Recognizes `2026-03-15`, `03/15/2026` and `March 15[, 2026]`. A month-day
/// date without a year takes the year of `reference_date`.
pub fn find_deadline(text: &str, reference_date: NaiveDate) -> Option<NaiveDate> {
    let iso = ISO_DATE.captures_iter(text).find_map(|c| {
        let date = NaiveDate::from_ymd_opt(
            c[1].parse().ok()?,
            c[2].parse().ok()?,
            c[3].parse().ok()?,
        )?;
        Some((c.get(0)?.start(), date))
    });

    let us = US_DATE.captures_iter(text).find_map(|c| {
        let date = NaiveDate::from_ymd_opt(
            c[3].parse().ok()?,
            c[1].parse().ok()?,
            c[2].parse().ok()?,
        )?;
        Some((c.get(0)?.start(), date))
    });

    let named = MONTH_DATE.captures_iter(text).find_map(|c| {
        let month = month_number(&c[1])?;
        let day = c[2].parse().ok()?;
        let year = match c.get(3) {
            Some(y) => y.as_str().parse().ok()?,
            None => reference_date.year(),
        };
        Some((c.get(0)?.start(), NaiveDate::from_ymd_opt(year, month, day)?))
    });

    [iso, us, named]
        .into_iter()
        .flatten()
        .min_by_key(|(start, _)| *start)
        .map(|(_, date)| date)
}

fn month_number(name: &str) -> Option<u32> {
    let prefix: String = name.chars().take(3).collect::<String>().to_ascii_lowercase();
    let month = match prefix.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::test_support::ScriptedModel;

    const SYLLABUS: &str = "\
CS 340 Databases
Week 1: Relational model
Assignment 1 due 2026-03-15
Midterm exam on March 30
Final Exam: 05/12/2026
Office hours Tuesdays
";

    fn reference() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    fn ymd(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn find_deadline_formats() {
        assert_eq!(find_deadline("due 2026-03-15", reference()), ymd(2026, 3, 15));
        assert_eq!(find_deadline("due 04/02/2026", reference()), ymd(2026, 4, 2));
        assert_eq!(find_deadline("on Sept. 9th, 2027", reference()), ymd(2027, 9, 9));
        assert_eq!(find_deadline("by Dec 1", reference()), ymd(2026, 12, 1));
        assert_eq!(find_deadline("no date here", reference()), None);
        assert_eq!(find_deadline("bad 2026-02-31", reference()), None);
    }

    #[test]
    fn find_deadline_takes_earliest_in_line() {
        assert_eq!(
            find_deadline("March 3 or 2026-04-01", reference()),
            ymd(2026, 3, 3)
        );
    }

    #[test]
    fn heuristic_picks_keyword_lines() {
        let tasks = heuristic_tasks(SYLLABUS, reference());
        let descriptions: Vec<_> = tasks.iter().map(|t| t.description.as_str()).collect();

        assert_eq!(
            descriptions,
            [
                "Assignment 1 due 2026-03-15",
                "Midterm exam on March 30",
                "Final Exam: 05/12/2026",
            ]
        );
        assert_eq!(tasks[0].deadline, ymd(2026, 3, 15));
        assert_eq!(tasks[1].deadline, ymd(2026, 3, 30));
        assert_eq!(tasks[2].deadline, ymd(2026, 5, 12));
        assert!(tasks.iter().all(|t| t.priority == Priority::Medium && t.estimated_hours == 2));
    }

    #[test]
    fn offline_run_uses_heuristic_and_reads_state() {
        let mut state = SessionState::new();
        let step = TaskParsingStep::new(None, reference());

        // No extracted content anywhere: empty text, no tasks, still success.
        let output = step.run(&mut state, Payload::Tasks(vec![])).expect("run");
        assert!(matches!(output, Payload::Tasks(ref t) if t.is_empty()));
        assert_eq!(state.artifacts().parsed_tasks.as_deref(), Some(&[][..]));
        assert_eq!(state.degradations().len(), 1);
        assert_eq!(state.degradations()[0].step, STEP_NAME);
    }

    #[test]
    fn model_answer_is_normalized() {
        let model = ScriptedModel::answering(
            r#"```json
[
  {"description": " Lab report ", "deadline": "2026-04-10", "priority": "high", "estimated_hours": 3.6},
  {"description": "Read chapter 4", "deadline": null},
  {"description": "   "}
]
```"#,
        );
        let model: Arc<dyn LanguageModel> = Arc::new(model);
        let step = TaskParsingStep::new(Some(model), reference());

        let mut state = SessionState::new();
        let Payload::Tasks(tasks) = step.run(&mut state, Payload::Tasks(vec![])).expect("run")
        else {
            panic!("expected tasks");
        };

        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].description, "Lab report");
        assert_eq!(tasks[0].deadline, ymd(2026, 4, 10));
        assert_eq!(tasks[0].priority, Priority::High);
        assert_eq!(tasks[0].estimated_hours, 4);
        assert_eq!(tasks[1].priority, Priority::Medium);
        assert_eq!(tasks[1].estimated_hours, 2);
        assert!(state.degradations().is_empty());
    }

    #[test]
    fn garbage_answer_falls_back_to_heuristic() {
        let model: Arc<dyn LanguageModel> =
            Arc::new(ScriptedModel::answering("Sure! Here are the tasks you asked for."));
        let step = TaskParsingStep::new(Some(model), reference());

        let mut state = SessionState::new();
        let content = taskflow_extract::extract_from_bytes(
            SYLLABUS.as_bytes(),
            "syllabus.txt",
            taskflow_shared::DocumentFormat::PlainText,
        )
        .expect("extract");

        let Payload::Tasks(tasks) = step
            .run(&mut state, Payload::Extracted(content))
            .expect("run")
        else {
            panic!("expected tasks");
        };

        assert_eq!(tasks.len(), 3);
        assert_eq!(state.degradations().len(), 1);
        assert!(state.degradations()[0].reason.contains("malformed JSON"));
    }
}
