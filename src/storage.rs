//! Local persistence and object-storage mirroring of result artifacts.
//!
//! A completed job yields exactly one local file, named from a truncated
//! slug of the instruction plus a timestamp. Mirroring to object storage is
//! best-effort: a failed upload degrades the result to local-only and is
//! recorded on the [`StoredArtifact`], never failing the operation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{Result, ResultExt};
use crate::gateway::Artifact;

/// Error from an object-storage backend. Absorbed by [`ArtifactSink`].
#[derive(Debug, Clone, Error)]
#[error("storage error: {0}")]
pub struct StoreError(pub String);

/// Async client abstraction over the object-storage service.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Upload a local file under `object_name`, returning its storage URL.
    async fn store(
        &self,
        local_path: &Path,
        object_name: &str,
    ) -> std::result::Result<String, StoreError>;
}

/// A persisted artifact, always local, optionally mirrored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredArtifact {
    pub local_path: PathBuf,
    pub mime_type: String,
    /// URL in object storage, when the mirror upload succeeded.
    pub storage_url: Option<String>,
    /// Reason the mirror upload failed, when it did.
    pub storage_error: Option<String>,
}

impl StoredArtifact {
    pub fn is_mirrored(&self) -> bool {
        self.storage_url.is_some()
    }
}

/// Writes artifacts to a local output directory and mirrors them to an
/// optional [`ArtifactStore`].
#[derive(Clone)]
pub struct ArtifactSink {
    output_dir: PathBuf,
    store: Option<Arc<dyn ArtifactStore>>,
}

impl ArtifactSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            store: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Persist an artifact locally, then mirror it.
    ///
    /// Local write failures are real errors; mirror failures are recorded on
    /// the returned [`StoredArtifact`] and otherwise ignored.
    pub async fn persist(&self, artifact: &Artifact, label: &str) -> Result<StoredArtifact> {
        fs::create_dir_all(&self.output_dir)
            .await
            .with_context("creating output directory")?;

        let file_name = artifact_file_name(label, &artifact.mime_type);
        let local_path = self.output_dir.join(&file_name);
        fs::write(&local_path, &artifact.bytes)
            .await
            .with_context("writing artifact")?;
        debug!(path = %local_path.display(), "artifact written locally");

        let mut stored = StoredArtifact {
            local_path,
            mime_type: artifact.mime_type.clone(),
            storage_url: None,
            storage_error: None,
        };

        if let Some(store) = &self.store {
            match store.store(&stored.local_path, &file_name).await {
                Ok(url) => {
                    debug!(url = %url, "artifact mirrored to object storage");
                    stored.storage_url = Some(url);
                }
                Err(err) => {
                    warn!(error = %err, "mirror upload failed; keeping local copy only");
                    stored.storage_error = Some(err.to_string());
                }
            }
        }

        Ok(stored)
    }
}

/// Deterministic file name: truncated slug of the label plus a timestamp.
fn artifact_file_name(label: &str, mime_type: &str) -> String {
    let timestamp = Utc::now().format("%Y%m%d%H%M%S");
    format!(
        "{}_{}.{}",
        slug(label),
        timestamp,
        extension_for(mime_type)
    )
}

/// First ten characters of the label, made filesystem-safe.
fn slug(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .take(10)
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "artifact".to_string()
    } else {
        cleaned
    }
}

fn extension_for(mime_type: &str) -> &str {
    // Common cases first; mime_guess returns multiple candidates in
    // unspecified preference order.
    match mime_type {
        "video/mp4" => "mp4",
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        other => mime_guess::get_mime_extensions_str(other)
            .and_then(|exts| exts.first())
            .copied()
            .unwrap_or("bin"),
    }
}
