use tracing::{info, instrument};

use taskflow_shared::{Result, TaskflowError};

use super::Payload;
use crate::state::SessionState;
use crate::step::{Describe, Step};

/// Reads the document and produces its cleaned text.
///
/// The only stage without a soft fallback: an unreadable document halts the
/// run.
pub struct ExtractionStep;

impl Step<Payload> for ExtractionStep {
    fn name(&self) -> &str {
        "extraction"
    }

    fn description(&self) -> &str {
        "Extracts text from a PDF, Markdown or plain-text document."
    }

    #[instrument(skip_all, fields(step = "extraction"))]
    fn run(&self, state: &mut SessionState, input: Payload) -> Result<Payload> {
        let Payload::Document(path) = input else {
            return Err(TaskflowError::validation(format!(
                "extraction expects a document path, got {} ({})",
                input.kind(),
                input.describe()
            )));
        };

        let content = taskflow_extract::extract(&path)?;
        info!(
            file = %content.metadata.file_name,
            pages = content.page_count,
            scanned = content.pages.iter().filter(|p| p.is_scanned).count(),
            "extracted document"
        );

        let artifacts = state.artifacts_mut();
        artifacts.document_path = Some(path);
        artifacts.extracted_content = Some(content.clone());
        Ok(Payload::Extracted(content))
    }
}
