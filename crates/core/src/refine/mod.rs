// crates/core/src/refine/mod.rs
//! AI-assisted filtering of candidate sections.
//!
//! Refinement selects a subset of already-computed sections; it never
//! generates or mutates content. The contract with callers is strict:
//! [`refine_sections`] always returns a section list. Every failure mode
//! of the AI call, including a missing client, falls back to the
//! unfiltered input so refinement can never erase results.

mod gemini;

pub use gemini::{AiError, GeminiClient};

use thiserror::Error;

use crate::types::Section;

/// Refinement returns at most this many sections.
pub const MAX_REFINED_SECTIONS: usize = 5;

/// Injectable AI capability. Constructed once at startup; absence of
/// credentials yields `Unconfigured`, which makes "always falls back when
/// unconfigured" a property of the type rather than a runtime check on
/// ambient state.
#[derive(Debug, Clone)]
pub enum AiClient {
    Configured(GeminiClient),
    Unconfigured,
}

impl AiClient {
    /// Build from an optional API key.
    pub fn from_key(api_key: Option<String>) -> Self {
        match api_key.filter(|k| !k.trim().is_empty()) {
            Some(key) => AiClient::Configured(GeminiClient::new(key)),
            None => AiClient::Unconfigured,
        }
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, AiClient::Configured(_))
    }
}

#[derive(Debug, Error)]
enum RefineError {
    #[error(transparent)]
    Ai(#[from] AiError),

    #[error("failed to encode candidate sections: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("no parseable JSON object in model response")]
    NoJsonObject,

    #[error("model response has no \"sections\" array")]
    MissingSections,

    #[error("model returned sections that are not drawn from the input")]
    NotSubsequence,
}

/// Filter `sections` down to the most relevant subset for the given
/// persona and task.
///
/// Never fails: any error in the AI call or its response handling is
/// logged and masked by returning the original list unchanged. A
/// successful result is always a subsequence of the input, in input
/// order, capped at [`MAX_REFINED_SECTIONS`].
pub async fn refine_sections(
    ai: &AiClient,
    sections: &[Section],
    persona: &str,
    task: &str,
) -> Vec<Section> {
    let client = match ai {
        AiClient::Configured(client) => client,
        AiClient::Unconfigured => {
            tracing::debug!("AI client unconfigured, skipping refinement");
            return sections.to_vec();
        }
    };

    if sections.is_empty() {
        return Vec::new();
    }

    match try_refine(client, sections, persona, task).await {
        Ok(refined) => {
            tracing::info!(
                candidates = sections.len(),
                selected = refined.len(),
                "refinement selected a subset"
            );
            refined
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                candidates = sections.len(),
                "refinement failed, returning unfiltered sections"
            );
            sections.to_vec()
        }
    }
}

async fn try_refine(
    client: &GeminiClient,
    sections: &[Section],
    persona: &str,
    task: &str,
) -> Result<Vec<Section>, RefineError> {
    let prompt = build_refinement_prompt(sections, persona, task)?;
    let text = client.generate(&prompt).await?;

    let value = extract_json_object(&text).ok_or(RefineError::NoJsonObject)?;
    let chosen: Vec<Section> = value
        .get("sections")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .ok_or(RefineError::MissingSections)?;

    let mut refined =
        filter_to_input_order(sections, &chosen).ok_or(RefineError::NotSubsequence)?;
    refined.truncate(MAX_REFINED_SECTIONS);
    Ok(refined)
}

fn build_refinement_prompt(
    sections: &[Section],
    persona: &str,
    task: &str,
) -> Result<String, serde_json::Error> {
    let candidates = serde_json::to_string_pretty(sections)?;
    Ok(format!(
        r#"You are given {count} sections of text that were retrieved as relevant to a user's query.
- User Persona: "{persona}"
- User Job/Task: "{task}"

Analyze these sections and keep only the ones most relevant to the query. Eliminate sections that are not relevant.
Return up to {max} sections with the most context and relevance to the query.

IMPORTANT REQUIREMENTS:
- Do not generate any new content
- Only select from the provided sections
- Preserve the original text and all fields of each chosen section
- The output must be a single valid JSON object with a single key "sections" holding an array of up to {max} chosen section objects, exactly matching the input format
- Do not output any other text or markdown

Here are the {count} sections:
{candidates}
"#,
        count = sections.len(),
        max = MAX_REFINED_SECTIONS,
    ))
}

/// Lenient extraction of a JSON object from free-text model output.
///
/// The model is permitted to wrap the payload in commentary or markdown
/// fences; only the span from the first `{` to the last `}` is parsed.
/// Returns `None` when no such span exists or it is not valid JSON. This
/// is deliberately looser than [`crate::parse`], which validates trusted
/// subprocess output and never guesses.
fn extract_json_object(text: &str) -> Option<serde_json::Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

/// Validate that `chosen` is drawn entirely from `input` (deep equality
/// on every field) and re-emit the selection in input order. Returns
/// `None` if any chosen section has no remaining match in the input.
fn filter_to_input_order(input: &[Section], chosen: &[Section]) -> Option<Vec<Section>> {
    let mut picked = vec![false; input.len()];
    for section in chosen {
        let index = input
            .iter()
            .enumerate()
            .position(|(i, candidate)| !picked[i] && candidate == section)?;
        picked[index] = true;
    }
    Some(
        input
            .iter()
            .zip(&picked)
            .filter(|(_, picked)| **picked)
            .map(|(section, _)| section.clone())
            .collect(),
    )
}
