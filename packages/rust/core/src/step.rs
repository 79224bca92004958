//! The step contract shared by every pipeline stage.

use std::path::PathBuf;

use taskflow_shared::Result;

use crate::state::SessionState;

/// Longest description kept in a history record.
const MAX_DESCRIPTION_CHARS: usize = 200;

/// One stage of a sequential pipeline.
///
/// A step receives the previous step's output (or the runner's initial input)
/// and may read and write the shared [`SessionState`]. It should also store
/// its primary artifact in state so non-adjacent steps and the caller can
/// reach it. Returning `Err` halts the run; a step must not report success
/// with a half-built artifact.
pub trait Step<V>: Send + Sync {
    /// Stable identifier used in logs and history records.
    fn name(&self) -> &str;

    /// Human-readable summary of what the step does.
    fn description(&self) -> &str {
        ""
    }

    /// Execute the step.
    fn run(&self, state: &mut SessionState, input: V) -> Result<V>;
}

/// Short human-readable rendering of a value for history records.
pub trait Describe {
    fn describe(&self) -> String;
}

/// Truncate `text` to the history description limit on a char boundary.
pub(crate) fn truncate_description(text: &str) -> String {
    match text.char_indices().nth(MAX_DESCRIPTION_CHARS) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

impl Describe for String {
    fn describe(&self) -> String {
        truncate_description(self)
    }
}

impl Describe for PathBuf {
    fn describe(&self) -> String {
        truncate_description(&self.display().to_string())
    }
}

impl Describe for i64 {
    fn describe(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_kept() {
        assert_eq!(String::from("syllabus.pdf").describe(), "syllabus.pdf");
        assert_eq!(PathBuf::from("notes/week1.md").describe(), "notes/week1.md");
        assert_eq!(42_i64.describe(), "42");
    }

    #[test]
    fn long_text_is_truncated_on_char_boundary() {
        let text = "é".repeat(500);
        let described = text.describe();
        assert_eq!(described.chars().count(), MAX_DESCRIPTION_CHARS + 1);
        assert!(described.ends_with('…'));
    }
}
