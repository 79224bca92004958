//! Core orchestration for TaskFlow.
//!
//! This crate provides the sequential-agent runtime ([`state`], [`step`],
//! [`runner`]), the [`memory`] bank, the [`llm`] boundary, the six study
//! [`steps`], and the end-to-end [`pipeline`] that wires them together.

pub mod llm;
pub mod memory;
pub mod pipeline;
pub mod runner;
pub mod state;
pub mod step;
pub mod steps;
