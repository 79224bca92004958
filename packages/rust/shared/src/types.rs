//! Core domain types for TaskFlow study artifacts.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for pipeline session identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Generate a new time-sortable session identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Extracted document
// ---------------------------------------------------------------------------

/// Source format of an extracted document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Pdf,
    PlainText,
    Markdown,
}

/// Text of a single page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageText {
    /// 1-based page number.
    pub page_number: usize,
    pub text: String,
    /// True when the page carries (almost) no text layer, i.e. likely a scan.
    pub is_scanned: bool,
}

/// File-level metadata gathered during extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub file_name: String,
    pub format: DocumentFormat,
    /// Size of the source file in bytes.
    pub byte_len: u64,
}

/// Output of the extraction stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedContent {
    pub metadata: DocumentMetadata,
    pub pages: Vec<PageText>,
    /// All pages joined and cleaned.
    pub full_text: String,
    pub page_count: usize,
    /// SHA-256 hex digest of `full_text`.
    pub content_hash: String,
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// Urgency of a parsed task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    #[serde(alias = "high", alias = "HIGH")]
    High,
    #[default]
    #[serde(alias = "medium", alias = "MEDIUM")]
    Medium,
    #[serde(alias = "low", alias = "LOW")]
    Low,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        };
        f.write_str(s)
    }
}

/// An actionable item (assignment, exam, study goal) found in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub description: String,
    /// Due date, when one could be found.
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default = "default_estimated_hours")]
    pub estimated_hours: u32,
}

fn default_estimated_hours() -> u32 {
    2
}

// ---------------------------------------------------------------------------
// Summary / flashcards / schedule
// ---------------------------------------------------------------------------

/// Condensed view of the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub summary: String,
    #[serde(default)]
    pub key_points: Vec<String>,
}

/// A question/answer study card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
    pub front: String,
    pub back: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// One study block in the day-wise schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub date: NaiveDate,
    pub task: String,
    pub duration_minutes: u32,
}

/// Result of the final validation stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub tasks_valid: bool,
    pub flashcards_valid: bool,
    pub schedule_valid: bool,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl ValidationReport {
    /// True when every artifact passed.
    pub fn is_valid(&self) -> bool {
        self.tasks_valid && self.flashcards_valid && self.schedule_valid
    }
}

// ---------------------------------------------------------------------------
// RunRecord
// ---------------------------------------------------------------------------

/// Durable summary of one pipeline run, kept in the `runs` memory collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub session_id: SessionId,
    /// Path of the processed document, as given by the caller.
    pub document: String,
    pub started_at: DateTime<Utc>,
    pub completed: bool,
    /// Name of the step that halted the run, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<String>,
    pub task_count: usize,
    pub flashcard_count: usize,
    pub schedule_len: usize,
    #[serde(default)]
    pub summary_excerpt: String,
}
