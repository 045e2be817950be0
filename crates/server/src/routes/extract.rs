// crates/server/src/routes/extract.rs
//! Upload-and-analyze endpoints backed by external extractor programs.
//!
//! - POST /extract-headings - single `pdf` upload, heading outline back
//! - POST /extract-sections - `pdfs` batch + persona/job, relevant sections back
//!
//! Both stage uploads into the scratch directory, run a bounded
//! subprocess against the staged input, and strict-parse its stdout.
//! Staged files and the batch descriptor clean themselves up on every
//! exit path when the handler's `StagedFile` guards drop.

use std::path::Path;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::routing::post;
use axum::{Json, Router};
use bytes::Bytes;
use serde_json::json;

use docsight_core::{parse_output, refine_sections, run_job, AnalysisJob, Section};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Generous ceiling for PDF batches.
const MAX_UPLOAD_BYTES: usize = 200 * 1024 * 1024;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/extract-headings", post(extract_headings))
        .route("/extract-sections", post(extract_sections))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

/// One uploaded file pulled out of a multipart body.
struct Upload {
    name: String,
    data: Bytes,
}

/// POST /api/extract-headings - run the heading extractor over one PDF.
///
/// Responds with the extractor's JSON document plus the storage name the
/// upload was assigned, as `pdfFilename`.
async fn extract_headings(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<Json<serde_json::Value>> {
    let mut upload: Option<Upload> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {e}")))?
    {
        if field.name() == Some("pdf") {
            let name = field.file_name().unwrap_or("upload.pdf").to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("failed to read upload: {e}")))?;
            upload = Some(Upload { name, data });
        }
    }

    let upload = upload.ok_or_else(|| ApiError::BadRequest("No file uploaded".to_string()))?;

    let staged = state
        .staging
        .stage(&upload.name, &upload.data)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to stage upload: {e}")))?;

    // Kick off chat pre-processing in the background; its outcome never
    // affects this response and it owns its bytes, not the staged file.
    spawn_preprocess(Arc::clone(&state), upload.name.clone(), upload.data.clone());

    let mut value = run_and_parse(
        &state,
        &state.config.headings_extractor,
        staged.path(),
        "extract-headings",
    )
    .await?;

    if let Some(object) = value.as_object_mut() {
        object.insert(
            "pdfFilename".to_string(),
            json!(staged.storage_name()),
        );
    }

    Ok(Json(value))
}

/// POST /api/extract-sections - run the section extractor over a batch.
///
/// Multipart fields: `pdfs` (repeated), `persona`, `job`, `deepSearch`.
/// With `deepSearch=true` and a configured AI client, the extracted
/// sections pass through the refinement step before the response; any
/// refinement failure silently returns the unfiltered list.
async fn extract_sections(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<Json<serde_json::Value>> {
    let mut uploads: Vec<Upload> = Vec::new();
    let mut persona: Option<String> = None;
    let mut job: Option<String> = None;
    let mut deep_search = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {e}")))?
    {
        match field.name() {
            Some("pdfs") => {
                let name = field.file_name().unwrap_or("upload.pdf").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("failed to read upload: {e}")))?;
                uploads.push(Upload { name, data });
            }
            Some("persona") => persona = Some(read_text_field(field).await?),
            Some("job") => job = Some(read_text_field(field).await?),
            Some("deepSearch") => deep_search = read_text_field(field).await? == "true",
            _ => {}
        }
    }

    // Input validation happens before anything is staged or spawned.
    if uploads.is_empty() {
        return Err(ApiError::BadRequest("No files uploaded".to_string()));
    }
    let persona = persona
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Persona and job are required".to_string()))?;
    let job = job
        .filter(|j| !j.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Persona and job are required".to_string()))?;

    let mut staged = Vec::with_capacity(uploads.len());
    for upload in &uploads {
        staged.push(
            state
                .staging
                .stage(&upload.name, &upload.data)
                .await
                .map_err(|e| ApiError::Internal(format!("failed to stage upload: {e}")))?,
        );
    }

    let documents: Vec<serde_json::Value> = uploads
        .iter()
        .zip(&staged)
        .map(|(upload, file)| {
            json!({
                "file_name": upload.name,
                "document_path": file.path().display().to_string(),
            })
        })
        .collect();
    let descriptor = json!({
        "documents": documents,
        "persona": persona,
        "job_to_be_done": job,
        "deep_search": deep_search,
    });
    let descriptor_file = state
        .staging
        .stage_descriptor(&descriptor)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to write batch descriptor: {e}")))?;

    let value = run_and_parse(
        &state,
        &state.config.sections_extractor,
        descriptor_file.path(),
        "extract-sections",
    )
    .await?;

    if deep_search {
        let sections = value
            .get("sections")
            .and_then(|v| serde_json::from_value::<Vec<Section>>(v.clone()).ok());
        if let Some(sections) = sections.filter(|s| !s.is_empty()) {
            let refined = refine_sections(&state.ai, &sections, &persona, &job).await;
            return Ok(Json(json!({ "sections": refined })));
        }
    }

    Ok(Json(value))
}

async fn read_text_field(field: axum::extract::multipart::Field<'_>) -> ApiResult<String> {
    field
        .text()
        .await
        .map_err(|e| ApiError::BadRequest(format!("failed to read form field: {e}")))
}

/// Run one extractor over a staged input path and strict-parse stdout.
///
/// The extractor contract is `<program> <inputPath>`, one JSON document
/// on stdout, exit 0 on success. The child runs with its working
/// directory set next to the program so relative assets resolve.
async fn run_and_parse(
    state: &AppState,
    program: &Path,
    input: &Path,
    label: &str,
) -> ApiResult<serde_json::Value> {
    let job = AnalysisJob {
        program: program.to_path_buf(),
        args: vec![input.display().to_string()],
        working_dir: program
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf),
        timeout: state.config.job_timeout,
        label: label.to_string(),
    };

    let output = run_job(&job).await?;
    parse_output(&output.stdout).map_err(|source| ApiError::Output {
        source,
        stderr: output.stderr,
    })
}

/// Fire-and-forget notification to the chat service so it can index the
/// document while the user is still reading the outline. Detached task;
/// outcome is logged and ignored.
fn spawn_preprocess(state: Arc<AppState>, file_name: String, data: Bytes) {
    let url = format!("{}/process-pdf/", state.config.upstream_url);
    tokio::spawn(async move {
        let part = reqwest::multipart::Part::bytes(data.to_vec()).file_name(file_name.clone());
        let form = reqwest::multipart::Form::new().part("file", part);
        match state.http.post(&url).multipart(form).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(file = %file_name, "pre-processing request accepted");
            }
            Ok(response) => {
                tracing::warn!(
                    file = %file_name,
                    status = %response.status(),
                    "pre-processing request rejected"
                );
            }
            Err(e) => {
                tracing::warn!(file = %file_name, error = %e, "pre-processing request failed");
            }
        }
    });
}
