//! Artifact manifest types and cache handle derivation.
//!
//! Before a job is submitted, every artifact it needs on the workers is
//! staged locally and registered with the engine's file cache under a
//! *handle*. Handles are derived deterministically from artifact names and
//! must be pairwise distinct across the manifest handle and every artifact
//! handle, for any manifest content, including an artifact whose name
//! collides with the manifest's reserved file name.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// File name the manifest is persisted under inside the staging directory.
pub const MANIFEST_FILE_NAME: &str = "MANIFEST";

/// Reserved cache handle for the manifest itself.
///
/// Artifact handles carry an `artifact-` prefix, so no derived handle can
/// collide with this one.
pub const MANIFEST_HANDLE: &str = "runnel-manifest";

/// Metadata describing one artifact to stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub name: String,
}

impl ArtifactMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Ordered list of artifacts required by a job.
///
/// Order is significant only for the staging sequence, not for semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    #[serde(default)]
    pub artifacts: Vec<ArtifactMetadata>,
}

impl ArtifactManifest {
    pub fn new(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            artifacts: names.into_iter().map(ArtifactMetadata::new).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }
}

/// Derive the cache handle for an artifact name.
///
/// Deterministic in the name alone. The sha256 digest keeps distinct names
/// distinct and makes the handle safe to use as a file name regardless of
/// what characters the artifact name contains.
pub fn artifact_handle(name: &str) -> String {
    let digest = Sha256::digest(name.as_bytes());
    format!("artifact-{digest:x}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn handle_is_deterministic() {
        assert_eq!(artifact_handle("dep.jar"), artifact_handle("dep.jar"));
    }

    #[test]
    fn distinct_names_get_distinct_handles() {
        let names = ["a", "b", "dep.jar", "dep.jar2", "nested/path.bin"];
        let handles: HashSet<String> = names.iter().map(|n| artifact_handle(n)).collect();
        assert_eq!(handles.len(), names.len());
    }

    #[test]
    fn no_artifact_handle_collides_with_the_manifest_handle() {
        // Even an artifact literally named like the manifest file or the
        // manifest handle maps into the artifact- namespace.
        for name in [MANIFEST_FILE_NAME, MANIFEST_HANDLE, "manifest"] {
            let handle = artifact_handle(name);
            assert_ne!(handle, MANIFEST_HANDLE);
            assert_ne!(handle, MANIFEST_FILE_NAME);
            assert!(handle.starts_with("artifact-"));
        }
    }

    #[test]
    fn handle_is_a_safe_file_name() {
        let handle = artifact_handle("../../etc/passwd");
        assert!(!handle.contains('/'));
        assert!(!handle.contains(".."));
    }

    #[test]
    fn manifest_preserves_order() {
        let manifest = ArtifactManifest::new(["z", "a", "m"]);
        let names: Vec<&str> = manifest.artifacts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["z", "a", "m"]);
    }

    #[test]
    fn manifest_round_trips_through_json() {
        let manifest = ArtifactManifest::new(["dep.jar", "model.bin"]);
        let json = serde_json::to_string(&manifest).expect("serialize");
        let back: ArtifactManifest = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, manifest);
    }
}
