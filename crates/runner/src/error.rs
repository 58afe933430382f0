//! Runner error taxonomy.
//!
//! Each phase of a job run has its own error type; [`RunnerError`]
//! aggregates them at the dispatch boundary. Every escalated error
//! surfaces through the async task's failure path and results in a single
//! FAILED transition; no structured payload reaches state listeners.

use runnel_core::JobState;

/// Errors raised while staging artifacts.
#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    /// The staging directory could not be allocated. Fatal for the whole
    /// staging operation.
    #[error("failed to allocate staging directory {path}: {source}")]
    StagingDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The artifact source could not produce the manifest.
    #[error("failed to fetch artifact manifest: {0}")]
    Manifest(String),

    /// The source reported a transfer failure for one artifact. Aborts the
    /// whole staging operation; later artifacts are never attempted.
    #[error("transfer of artifact \"{name}\" failed: {reason}")]
    Transfer { name: String, reason: String },

    /// Local I/O failed while persisting an artifact or the manifest.
    #[error("i/o error while staging \"{name}\": {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// The external translator (or fuser) rejected the pipeline.
#[derive(Debug, thiserror::Error)]
#[error("pipeline translation failed: {0}")]
pub struct TranslationError(pub String);

/// The execution engine reported a submission or runtime failure.
#[derive(Debug, thiserror::Error)]
#[error("execution engine error: {0}")]
pub struct EngineError(pub String);

/// Any failure of a job run, as observed by the invocation's completion
/// path.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// `start()` was called in a state other than STOPPED.
    #[error("job cannot be started from state {0}")]
    NotStartable(JobState),

    #[error(transparent)]
    Translation(#[from] TranslationError),

    #[error("artifact staging failed: {0}")]
    Staging(#[from] StagingError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The run was cancelled cooperatively before the engine finished.
    #[error("job execution was cancelled")]
    Cancelled,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
