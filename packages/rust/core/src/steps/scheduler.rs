use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{Days, NaiveDate};
use tracing::{info, instrument};

use taskflow_shared::{Result, ScheduleConfig, ScheduleEntry, Task, TaskflowError};

use super::{Payload, consult_model};
use crate::llm::{LanguageModel, parse_json_response};
use crate::state::SessionState;
use crate::step::Step;

const STEP_NAME: &str = "scheduling";
const FALLBACK_TASK: &str = "Review extracted material";

/// Lays the parsed tasks out as a day-wise study schedule.
pub struct SchedulerStep {
    model: Option<Arc<dyn LanguageModel>>,
    config: ScheduleConfig,
    start_date: NaiveDate,
}

impl SchedulerStep {
    pub fn new(
        model: Option<Arc<dyn LanguageModel>>,
        config: ScheduleConfig,
        start_date: NaiveDate,
    ) -> Self {
        Self {
            model,
            config,
            start_date,
        }
    }

    fn day(&self, offset: u32) -> NaiveDate {
        self.start_date
            .checked_add_days(Days::new(u64::from(offset)))
            .unwrap_or(self.start_date)
    }

    fn heuristic_schedule(&self, tasks: &[Task]) -> Vec<ScheduleEntry> {
        if tasks.is_empty() {
            let sessions = self.config.fallback_sessions.max(1);
            return (0..sessions)
                .map(|i| ScheduleEntry {
                    date: self.day(i),
                    task: FALLBACK_TASK.to_string(),
                    duration_minutes: self.config.fallback_minutes,
                })
                .collect();
        }

        let spread = self.config.spread_days.max(1);
        tasks
            .iter()
            .zip(0u32..)
            .map(|(task, i)| ScheduleEntry {
                date: self.day(i % spread),
                task: task.description.clone(),
                duration_minutes: self.config.session_minutes,
            })
            .collect()
    }

    fn schedule_prompt(&self, tasks: &[Task]) -> String {
        let tasks_json = serde_json::to_string_pretty(tasks).unwrap_or_default();
        format!(
            "Create a realistic day-wise study schedule for the next {} days, \
             starting {}, for the tasks below. Spread the work evenly, put High \
             priority tasks first, split tasks with many estimated hours across \
             several days and include review sessions.\n\
             Answer with a JSON array only. Each element must have \"date\" \
             (YYYY-MM-DD), \"task\" and \"duration_minutes\" (integer).\n\n\
             Tasks:\n{tasks_json}",
            self.config.plan_days, self.start_date
        )
    }
}

fn parse_model_schedule(answer: &str) -> Result<Vec<ScheduleEntry>> {
    let entries: Vec<ScheduleEntry> = parse_json_response(answer)?;
    if entries.is_empty() {
        return Err(TaskflowError::parse("model returned an empty schedule"));
    }
    Ok(entries)
}

impl Step<Payload> for SchedulerStep {
    fn name(&self) -> &str {
        STEP_NAME
    }

    fn description(&self) -> &str {
        "Creates a day-wise study schedule from the parsed tasks."
    }

    #[instrument(skip_all, fields(step = STEP_NAME, start = %self.start_date))]
    fn run(&self, state: &mut SessionState, _input: Payload) -> Result<Payload> {
        let tasks = state.artifacts().tasks().to_vec();

        let planned = if tasks.is_empty() {
            None
        } else {
            consult_model(
                state,
                STEP_NAME,
                self.model.as_ref(),
                || self.schedule_prompt(&tasks),
                parse_model_schedule,
            )
        };
        let schedule = planned.unwrap_or_else(|| self.heuristic_schedule(&tasks));

        info!(entries = schedule.len(), "built schedule");
        state.artifacts_mut().schedule = Some(schedule.clone());
        Ok(Payload::Schedule(schedule))
    }
}

/// Render a schedule as a plain-text study plan.
pub fn format_study_plan(schedule: &[ScheduleEntry]) -> String {
    let mut out = String::from("Study Plan:\n");
    for entry in schedule {
        let _ = writeln!(
            out,
            "- {}: {} ({} mins)",
            entry.date, entry.task, entry.duration_minutes
        );
    }
    out
}
