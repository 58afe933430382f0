//! Artifact staging against the engine's file cache.
//!
//! [`ArtifactStager`] fetches a manifest and every named artifact from an
//! [`ArtifactSource`], persists them into a fresh per-run staging
//! directory, and registers each file with a [`CachedFileRegistry`] so the
//! engine can resolve them on its workers.
//!
//! Failure policy is asymmetric and order matters:
//!
//! - a source-reported transfer failure or a local write failure aborts
//!   the whole staging operation; artifacts after the failing one are
//!   never attempted;
//! - a transfer channel that closes without a terminal event (the sender
//!   went away mid-transfer) is logged and skipped: the artifact is not
//!   registered, and staging continues with the next entry.
//!
//! Artifacts are staged one at a time with no timeout. Staged files
//! persist beyond the call; nothing here deletes the staging directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use uuid::Uuid;

use runnel_core::artifact::{artifact_handle, MANIFEST_FILE_NAME, MANIFEST_HANDLE};
use runnel_core::ArtifactManifest;

use crate::error::StagingError;

/// One event on an artifact transfer channel.
///
/// A transfer ends with exactly one terminal event ([`Failed`] or
/// [`Completed`]); a channel that closes without one is treated as an
/// interrupted transfer.
///
/// [`Failed`]: TransferEvent::Failed
/// [`Completed`]: TransferEvent::Completed
#[derive(Debug)]
pub enum TransferEvent {
    /// A chunk of artifact bytes.
    Chunk(Vec<u8>),
    /// The source failed to produce the artifact. Terminal.
    Failed(String),
    /// The artifact was transferred completely. Terminal.
    Completed,
}

/// Capability: where artifacts come from.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Fetch the staging manifest for the job.
    async fn manifest(&self) -> Result<ArtifactManifest, StagingError>;

    /// Begin transferring one artifact, returning the channel its events
    /// arrive on.
    async fn get_artifact(
        &self,
        name: &str,
    ) -> Result<mpsc::Receiver<TransferEvent>, StagingError>;
}

/// Capability: the engine-side file cache that makes a staged local file
/// resolvable on workers under a handle.
///
/// Registration is infallible, mirroring the engine API this fronts.
pub trait CachedFileRegistry: Send + Sync {
    fn register_cached_file(&self, local_uri: &str, handle: &str);
}

/// Result of a completed staging run.
#[derive(Debug)]
pub struct StagedArtifacts {
    /// The per-run staging directory. Owned exclusively by this run; never
    /// cleaned up by the stager.
    pub staging_dir: PathBuf,
    /// `(handle, uri)` pairs in registration order, manifest first.
    /// Interrupted artifacts are absent. URIs are unencoded local paths
    /// behind a `file://` prefix.
    pub registered: Vec<(String, String)>,
}

/// How one artifact transfer ended.
#[derive(Debug)]
enum TransferOutcome {
    Completed,
    Interrupted,
}

/// Stages a job's artifacts into a local directory and registers them
/// with the engine's file cache.
#[derive(Debug, Clone)]
pub struct ArtifactStager {
    root: PathBuf,
}

impl ArtifactStager {
    /// Stager allocating staging directories under the system temp dir.
    pub fn new() -> Self {
        Self { root: std::env::temp_dir() }
    }

    /// Stager allocating staging directories under a specific root.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Stage every artifact in the source's manifest.
    ///
    /// Registers the manifest under [`MANIFEST_HANDLE`], then each artifact
    /// under its derived handle, in manifest order.
    pub async fn stage(
        &self,
        job_id: Uuid,
        source: &dyn ArtifactSource,
        registry: &dyn CachedFileRegistry,
    ) -> Result<StagedArtifacts, StagingError> {
        let staging_dir = self
            .root
            .join(format!("runnel-{job_id}-{}", Uuid::new_v4().simple()));
        tokio::fs::create_dir_all(&staging_dir).await.map_err(|e| {
            StagingError::StagingDir {
                path: staging_dir.display().to_string(),
                source: e,
            }
        })?;

        let manifest = source.manifest().await?;
        tracing::info!(
            job_id = %job_id,
            artifacts = manifest.len(),
            staging_dir = %staging_dir.display(),
            "Staging job artifacts"
        );

        let mut registered = Vec::with_capacity(manifest.len() + 1);

        // Persist and register the manifest itself.
        let manifest_path = staging_dir.join(MANIFEST_FILE_NAME);
        let bytes = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| StagingError::Manifest(e.to_string()))?;
        tokio::fs::write(&manifest_path, bytes).await.map_err(|e| {
            StagingError::Io { name: MANIFEST_FILE_NAME.to_string(), source: e }
        })?;
        let manifest_uri = file_uri(&manifest_path);
        registry.register_cached_file(&manifest_uri, MANIFEST_HANDLE);
        registered.push((MANIFEST_HANDLE.to_string(), manifest_uri));

        // Stage artifacts sequentially, in manifest order.
        for meta in &manifest.artifacts {
            let handle = artifact_handle(&meta.name);
            let path = staging_dir.join(&handle);
            match self.receive_artifact(&meta.name, &path, source).await? {
                TransferOutcome::Completed => {
                    let uri = file_uri(&path);
                    registry.register_cached_file(&uri, &handle);
                    registered.push((handle, uri));
                }
                TransferOutcome::Interrupted => {
                    tracing::warn!(
                        job_id = %job_id,
                        artifact = %meta.name,
                        "Artifact transfer interrupted, skipping registration"
                    );
                }
            }
        }

        Ok(StagedArtifacts { staging_dir, registered })
    }

    /// Receive one artifact's transfer events into `path`.
    ///
    /// Returns `Ok(Interrupted)` when the channel closes without a
    /// terminal event; a `Failed` event or a local write failure is an
    /// error that aborts the whole staging operation.
    async fn receive_artifact(
        &self,
        name: &str,
        path: &Path,
        source: &dyn ArtifactSource,
    ) -> Result<TransferOutcome, StagingError> {
        let mut events = source.get_artifact(name).await?;
        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|e| StagingError::Io { name: name.to_string(), source: e })?;

        loop {
            match events.recv().await {
                Some(TransferEvent::Chunk(bytes)) => {
                    file.write_all(&bytes).await.map_err(|e| {
                        StagingError::Io { name: name.to_string(), source: e }
                    })?;
                }
                Some(TransferEvent::Failed(reason)) => {
                    return Err(StagingError::Transfer { name: name.to_string(), reason });
                }
                Some(TransferEvent::Completed) => {
                    file.flush().await.map_err(|e| {
                        StagingError::Io { name: name.to_string(), source: e }
                    })?;
                    return Ok(TransferOutcome::Completed);
                }
                None => return Ok(TransferOutcome::Interrupted),
            }
        }
    }
}

impl Default for ArtifactStager {
    fn default() -> Self {
        Self::new()
    }
}

/// Renders a local path with a `file://` scheme prefix. The path is not
/// percent-encoded; registries must treat the tail as a literal local
/// path, not a parsed URI.
fn file_uri(path: &Path) -> String {
    format!("file://{}", path.display())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
