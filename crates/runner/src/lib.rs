//! Runnel job runner.
//!
//! Manages the lifecycle of one submitted pipeline job against a remote
//! execution engine:
//!
//! - [`JobInvocation`] — job identity, state machine, and observer
//!   notification; runs the dispatcher as one asynchronous task.
//! - [`ExecutionDispatcher`] — fuses and translates the pipeline, stages
//!   artifacts, and submits the plan to the engine.
//! - [`ArtifactStager`] — persists manifest and artifacts locally and
//!   registers them with the engine's file cache.
//!
//! Graph fusion, translation, the engine, and the artifact source are
//! external capabilities expressed as traits ([`GraphFuser`],
//! [`PipelineTranslator`], [`ExecutionEngine`], [`ArtifactSource`]).

pub mod dispatch;
pub mod error;
pub mod invocation;
pub mod staging;

pub use dispatch::{
    EngineOutcome, EnginePlan, ExecutionDispatcher, ExecutionEngine, GraphFuser, IdentityFuser,
    PipelineResult, PipelineTranslator, Translation,
};
pub use error::{EngineError, RunnerError, StagingError, TranslationError};
pub use invocation::{JobInvocation, StateObserver};
pub use staging::{
    ArtifactSource, ArtifactStager, CachedFileRegistry, StagedArtifacts, TransferEvent,
};
