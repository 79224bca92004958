//! Error types for TaskFlow.
//!
//! Library crates use [`TaskflowError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all TaskFlow operations.
#[derive(Debug, thiserror::Error)]
pub enum TaskflowError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Document text extraction failed (unsupported format, unreadable PDF).
    #[error("extraction error: {message}")]
    Extraction { message: String },

    /// Structured output (JSON, dates) could not be parsed.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Data validation error (unexpected input shape, invalid value).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Language model request or response error.
    #[error("language model error: {0}")]
    Llm(String),

    /// An optional collaborator is not configured or not reachable.
    #[error("{collaborator} unavailable: {reason}")]
    Unavailable {
        collaborator: String,
        reason: String,
    },

    /// Memory bank read/write error.
    #[error("memory error: {0}")]
    Memory(String),

    /// A pipeline step returned an error; the run halted at `index`.
    #[error("step '{step}' (#{index}) failed: {source}")]
    StepFailed {
        step: String,
        index: usize,
        source: Box<TaskflowError>,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, TaskflowError>;

impl TaskflowError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an extraction error from any displayable message.
    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::Extraction {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Mark a collaborator as unavailable.
    pub fn unavailable(collaborator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            collaborator: collaborator.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap the cause of a failed pipeline step.
    pub fn step_failed(step: impl Into<String>, index: usize, source: TaskflowError) -> Self {
        Self::StepFailed {
            step: step.into(),
            index,
            source: Box::new(source),
        }
    }

    /// Name and index of the failed step, if this is a step failure.
    pub fn failed_step(&self) -> Option<(&str, usize)> {
        match self {
            Self::StepFailed { step, index, .. } => Some((step.as_str(), *index)),
            _ => None,
        }
    }
}
