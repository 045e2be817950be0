// crates/core/src/staging.rs
//! Transient on-disk staging for uploaded documents.
//!
//! Every staged file gets a collision-resistant storage name inside a
//! dedicated scratch directory, and removes itself from disk when
//! dropped. Handlers hold the [`StagedFile`] for the duration of one job;
//! the RAII cleanup fires on every exit path, success or failure, so a
//! panic-free handler can never leak disk space.

use std::path::{Path, PathBuf};

use uuid::Uuid;

/// A dedicated scratch directory for uploaded files, created lazily on
/// first use. Safe under concurrent requests because every storage name
/// is unique per request.
#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write uploaded bytes to the scratch directory under a unique name.
    pub async fn stage(&self, original_name: &str, bytes: &[u8]) -> std::io::Result<StagedFile> {
        tokio::fs::create_dir_all(&self.root).await?;
        let storage_name = format!(
            "{}-{}",
            Uuid::new_v4().simple(),
            sanitize_name(original_name)
        );
        let path = self.root.join(&storage_name);
        tokio::fs::write(&path, bytes).await?;
        tracing::debug!(
            original = original_name,
            path = %path.display(),
            size_bytes = bytes.len(),
            "staged uploaded file"
        );
        Ok(StagedFile {
            original_name: original_name.to_string(),
            storage_name,
            path,
            size_bytes: bytes.len() as u64,
        })
    }

    /// Write a scratch JSON descriptor summarizing a batch request.
    ///
    /// Follows the same create-then-guaranteed-delete discipline as
    /// staged uploads.
    pub async fn stage_descriptor(
        &self,
        descriptor: &serde_json::Value,
    ) -> std::io::Result<StagedFile> {
        tokio::fs::create_dir_all(&self.root).await?;
        let storage_name = format!("input-{}.json", Uuid::new_v4().simple());
        let path = self.root.join(&storage_name);
        let bytes = serde_json::to_vec_pretty(descriptor).map_err(std::io::Error::other)?;
        tokio::fs::write(&path, &bytes).await?;
        Ok(StagedFile {
            original_name: storage_name.clone(),
            storage_name,
            path,
            size_bytes: bytes.len() as u64,
        })
    }
}

/// An uploaded file copied into transient server-side storage for the
/// duration of one job. Removes its on-disk file when dropped.
#[derive(Debug)]
pub struct StagedFile {
    original_name: String,
    storage_name: String,
    path: PathBuf,
    size_bytes: u64,
}

impl StagedFile {
    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    /// The unique on-disk name assigned at staging time.
    pub fn storage_name(&self) -> &str {
        &self.storage_name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Explicitly delete the staged file. Dropping has the same effect;
    /// this form just makes the release point visible at call sites.
    pub fn release(self) {}
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "failed to remove staged file"
                );
            }
        }
    }
}

/// Replace whitespace and path separators so an uploaded name can never
/// escape the scratch directory or break shell-adjacent tooling.
fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_whitespace() || c == '/' || c == '\\' {
                '_'
            } else {
                c
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches('.').to_string();
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed
    }
}
