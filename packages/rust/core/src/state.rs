//! Per-run session state: typed artifacts, an open side map, and the
//! append-only execution history.
//!
//! One [`SessionState`] lives for exactly one pipeline invocation. Steps get
//! it by `&mut` from the runner, so there is only ever one writer.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use taskflow_shared::{
    ExtractedContent, Flashcard, ScheduleEntry, SessionId, Summary, Task, ValidationReport,
};

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

/// Well-known artifact slots, used for reporting and JSON keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    DocumentPath,
    ExtractedContent,
    ParsedTasks,
    Summary,
    Flashcards,
    Schedule,
    ValidationReport,
}

impl ArtifactKind {
    /// Every kind, in pipeline order.
    pub const ALL: [ArtifactKind; 7] = [
        Self::DocumentPath,
        Self::ExtractedContent,
        Self::ParsedTasks,
        Self::Summary,
        Self::Flashcards,
        Self::Schedule,
        Self::ValidationReport,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DocumentPath => "document_path",
            Self::ExtractedContent => "extracted_content",
            Self::ParsedTasks => "parsed_tasks",
            Self::Summary => "summary",
            Self::Flashcards => "flashcards",
            Self::Schedule => "schedule",
            Self::ValidationReport => "validation_report",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed artifact store shared by all steps of a run.
///
/// Each slot is `None` until the producing step has run. Writes are
/// last-write-wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Artifacts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_content: Option<ExtractedContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed_tasks: Option<Vec<Task>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flashcards: Option<Vec<Flashcard>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Vec<ScheduleEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_report: Option<ValidationReport>,
}

impl Artifacts {
    /// Whether the slot for `kind` has been written.
    pub fn contains(&self, kind: ArtifactKind) -> bool {
        match kind {
            ArtifactKind::DocumentPath => self.document_path.is_some(),
            ArtifactKind::ExtractedContent => self.extracted_content.is_some(),
            ArtifactKind::ParsedTasks => self.parsed_tasks.is_some(),
            ArtifactKind::Summary => self.summary.is_some(),
            ArtifactKind::Flashcards => self.flashcards.is_some(),
            ArtifactKind::Schedule => self.schedule.is_some(),
            ArtifactKind::ValidationReport => self.validation_report.is_some(),
        }
    }

    /// Kinds produced so far, in pipeline order.
    pub fn present(&self) -> Vec<ArtifactKind> {
        ArtifactKind::ALL
            .into_iter()
            .filter(|kind| self.contains(*kind))
            .collect()
    }

    /// Extracted full text, or `""` when extraction has not run.
    pub fn full_text(&self) -> &str {
        self.extracted_content
            .as_ref()
            .map(|c| c.full_text.as_str())
            .unwrap_or("")
    }

    /// Parsed tasks, or an empty slice when task parsing has not run.
    pub fn tasks(&self) -> &[Task] {
        self.parsed_tasks.as_deref().unwrap_or(&[])
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// Record of one completed step. Appended by the runner, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub step: String,
    pub input: String,
    pub output: String,
    pub timestamp: DateTime<Utc>,
}

/// A history record before it is stamped.
#[derive(Debug, Clone)]
pub struct HistoryRecord {
    pub step: String,
    pub input: String,
    pub output: String,
}

impl HistoryRecord {
    pub fn new(
        step: impl Into<String>,
        input: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            step: step.into(),
            input: input.into(),
            output: output.into(),
        }
    }
}

/// A step fell back to its deterministic behavior because a collaborator
/// was missing or failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Degradation {
    pub step: String,
    pub collaborator: String,
    pub reason: String,
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Mutable state shared by every step of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct SessionState {
    session_id: SessionId,
    artifacts: Artifacts,
    /// Ad hoc values outside the artifact schema (debug data, caller notes).
    extras: BTreeMap<String, Value>,
    history: Vec<HistoryEntry>,
    degradations: Vec<Degradation>,
}

impl SessionState {
    /// Create an empty state with a fresh session id.
    pub fn new() -> Self {
        Self {
            session_id: SessionId::new(),
            artifacts: Artifacts::default(),
            extras: BTreeMap::new(),
            history: Vec::new(),
            degradations: Vec::new(),
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn artifacts(&self) -> &Artifacts {
        &self.artifacts
    }

    pub fn artifacts_mut(&mut self) -> &mut Artifacts {
        &mut self.artifacts
    }

    /// Read an ad hoc value, falling back to `default` when the key is absent.
    pub fn get(&self, key: &str, default: Value) -> Value {
        self.extras.get(key).cloned().unwrap_or(default)
    }

    /// Overwrite an ad hoc value.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.extras.insert(key.into(), value);
    }

    /// Stamp `record` with the current time and append it to the history.
    ///
    /// Timestamps never go backwards: if the wall clock stepped back since the
    /// previous record, the previous timestamp is reused.
    pub fn record_history(&mut self, record: HistoryRecord) {
        let now = Utc::now();
        let timestamp = match self.history.last() {
            Some(prev) if prev.timestamp > now => prev.timestamp,
            _ => now,
        };

        self.history.push(HistoryEntry {
            step: record.step,
            input: record.input,
            output: record.output,
            timestamp,
        });
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Record that `step` ran without `collaborator`.
    pub fn note_degradation(
        &mut self,
        step: impl Into<String>,
        collaborator: impl Into<String>,
        reason: impl Into<String>,
    ) {
        let degradation = Degradation {
            step: step.into(),
            collaborator: collaborator.into(),
            reason: reason.into(),
        };
        tracing::warn!(
            step = %degradation.step,
            collaborator = %degradation.collaborator,
            reason = %degradation.reason,
            "falling back to deterministic behavior"
        );
        self.degradations.push(degradation);
    }

    pub fn degradations(&self) -> &[Degradation] {
        &self.degradations
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_absent_key_returns_default() {
        let state = SessionState::new();
        assert_eq!(state.get("rag_error", json!(null)), json!(null));
        assert_eq!(state.get("anything", json!([1, 2])), json!([1, 2]));
    }

    #[test]
    fn get_is_idempotent_and_set_overwrites() {
        let mut state = SessionState::new();
        state.set("note", json!("first"));

        let a = state.get("note", json!(""));
        let b = state.get("note", json!(""));
        assert_eq!(a, b);

        state.set("note", json!({"shape": "different"}));
        assert_eq!(state.get("note", json!("")), json!({"shape": "different"}));
    }

    #[test]
    fn history_appends_in_order_with_non_decreasing_timestamps() {
        let mut state = SessionState::new();
        for name in ["a", "b", "c"] {
            state.record_history(HistoryRecord::new(name, "in", "out"));
        }

        let names: Vec<_> = state.history().iter().map(|h| h.step.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
        assert!(
            state
                .history()
                .windows(2)
                .all(|w| w[0].timestamp <= w[1].timestamp)
        );
    }

    #[test]
    fn history_does_not_deduplicate() {
        let mut state = SessionState::new();
        state.record_history(HistoryRecord::new("same", "x", "y"));
        state.record_history(HistoryRecord::new("same", "x", "y"));
        assert_eq!(state.history().len(), 2);
    }

    #[test]
    fn artifacts_report_what_is_present() {
        let mut state = SessionState::new();
        assert!(state.artifacts().present().is_empty());
        assert_eq!(state.artifacts().full_text(), "");
        assert!(state.artifacts().tasks().is_empty());

        state.artifacts_mut().document_path = Some(PathBuf::from("syllabus.pdf"));
        state.artifacts_mut().flashcards = Some(vec![]);

        assert_eq!(
            state.artifacts().present(),
            vec![ArtifactKind::DocumentPath, ArtifactKind::Flashcards]
        );
    }

    #[test]
    fn degradations_are_recorded() {
        let mut state = SessionState::new();
        state.note_degradation("summarization", "language-model", "not configured");
        assert_eq!(state.degradations().len(), 1);
        assert_eq!(state.degradations()[0].step, "summarization");
    }

    #[test]
    fn fresh_states_get_distinct_session_ids() {
        assert_ne!(SessionState::new().session_id(), SessionState::new().session_id());
    }
}
