//! Runnel domain types.
//!
//! Pure data model shared by the runner and by engine adapters:
//!
//! - [`JobState`] — the job lifecycle state machine.
//! - [`Pipeline`] — the transform/collection graph a job executes.
//! - [`JobConfig`] / [`JobInfo`] — execution configuration and the job
//!   metadata handed to a pipeline translator.
//! - [`artifact`] — the staging manifest and deterministic handle
//!   derivation for the engine's file cache.
//!
//! This crate is deliberately free of async code and internal
//! dependencies; everything concurrent lives in `runnel-runner`.

pub mod artifact;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod state;

pub use artifact::{ArtifactManifest, ArtifactMetadata};
pub use error::CoreError;
pub use job::{JobConfig, JobInfo, JobMessage, MessageSeverity};
pub use pipeline::{Boundedness, Collection, ExecutionMode, Pipeline, Transform};
pub use state::JobState;
