// crates/core/src/types.rs
//! Shared data types for analysis output.

use serde::{Deserialize, Serialize};

/// One extracted document section, in the wire shape the section
/// extractor emits and the frontend consumes.
///
/// The list order is relevance order and is preserved through refinement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(rename = "section_title")]
    pub title: String,
    pub page_number: i64,
    /// Condensed excerpt of the section body.
    #[serde(rename = "refined_text")]
    pub excerpt: String,
    /// Original name of the uploaded file this section came from.
    #[serde(rename = "file_name")]
    pub source_file: String,
}
