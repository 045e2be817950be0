// crates/core/src/lib.rs
//! Core orchestration for the docsight backend.
//!
//! This crate owns everything below the HTTP surface: running external
//! analysis programs with hard deadlines, validating their untrusted
//! output, staging uploaded documents with guaranteed cleanup, and the
//! best-effort AI refinement step.

pub mod job;
pub mod parse;
pub mod refine;
pub mod staging;
pub mod types;

pub use job::{run_job, AnalysisJob, JobError, JobOutput};
pub use parse::{parse_output, OutputParseError};
pub use refine::{refine_sections, AiClient, AiError, GeminiClient};
pub use staging::{StagedFile, StagingArea};
pub use types::Section;
