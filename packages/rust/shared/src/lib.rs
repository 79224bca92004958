//! Shared types, error model, and configuration for TaskFlow.
//!
//! This crate is the foundation depended on by all other TaskFlow crates.
//! It provides:
//! - [`TaskflowError`]: the unified error type
//! - Domain types ([`ExtractedContent`], [`Task`], [`Summary`], [`Flashcard`],
//!   [`ScheduleEntry`], [`ValidationReport`], [`SessionId`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, LlmConfig, MemoryConfig, ScheduleConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from, memory_dir, resolve_api_key,
};
pub use error::{Result, TaskflowError};
pub use types::{
    DocumentFormat, DocumentMetadata, ExtractedContent, Flashcard, PageText, Priority, RunRecord,
    ScheduleEntry, SessionId, Summary, Task, ValidationReport,
};
