//! Execution dispatch: fuse, translate, stage, execute.
//!
//! [`ExecutionDispatcher`] turns a pipeline and its configuration into an
//! engine run. Fusion, translation, and execution are external
//! capabilities behind narrow traits so the runner has no dependency on
//! any particular engine's API surface. Artifact staging always completes
//! before the plan is submitted to the engine.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use runnel_core::{ExecutionMode, JobConfig, JobInfo, Pipeline};

use crate::error::{EngineError, RunnerError, TranslationError};
use crate::staging::{ArtifactSource, ArtifactStager, CachedFileRegistry};

/// An engine-executable program produced by a translator.
///
/// The `plan` payload is opaque to the runner; only the translator and the
/// engine agree on its contents.
#[derive(Debug, Clone)]
pub struct EnginePlan {
    pub job_name: String,
    pub mode: ExecutionMode,
    pub plan: serde_json::Value,
}

/// Translator output: the plan plus the execution context's file cache,
/// which staged artifacts are registered against.
pub struct Translation {
    pub plan: EnginePlan,
    pub registry: Arc<dyn CachedFileRegistry>,
}

/// Capability: merges compatible transforms before translation.
///
/// Fusion itself is external; the dispatcher only requires that the fused
/// graph is again a [`Pipeline`].
pub trait GraphFuser: Send + Sync {
    fn fuse(&self, pipeline: &Pipeline) -> Result<Pipeline, TranslationError>;
}

/// Fuser that performs no fusion at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityFuser;

impl GraphFuser for IdentityFuser {
    fn fuse(&self, pipeline: &Pipeline) -> Result<Pipeline, TranslationError> {
        Ok(pipeline.clone())
    }
}

/// Capability: translates a fused graph into an engine plan.
pub trait PipelineTranslator: Send + Sync {
    fn translate(
        &self,
        fused: &Pipeline,
        job: &JobInfo,
        mode: ExecutionMode,
    ) -> Result<Translation, TranslationError>;
}

/// Capability: the execution engine a plan is submitted to.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    async fn execute(&self, plan: EnginePlan) -> Result<EngineOutcome, EngineError>;
}

/// The engine-native result of a finished run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineOutcome {
    /// Net wall-clock runtime reported by the engine, in milliseconds.
    pub runtime_ms: u64,
    /// Engine accumulator values keyed by name.
    #[serde(default)]
    pub accumulators: BTreeMap<String, serde_json::Value>,
}

/// Domain-level execution result wrapping the engine-native outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub job_id: Uuid,
    pub mode: ExecutionMode,
    pub outcome: EngineOutcome,
}

/// Runs one job end to end against the configured capabilities.
pub struct ExecutionDispatcher {
    fuser: Arc<dyn GraphFuser>,
    translator: Arc<dyn PipelineTranslator>,
    engine: Arc<dyn ExecutionEngine>,
    stager: ArtifactStager,
}

impl ExecutionDispatcher {
    pub fn new(
        fuser: Arc<dyn GraphFuser>,
        translator: Arc<dyn PipelineTranslator>,
        engine: Arc<dyn ExecutionEngine>,
    ) -> Self {
        Self { fuser, translator, engine, stager: ArtifactStager::new() }
    }

    /// Replace the default stager (system temp dir) with a custom one.
    pub fn with_stager(mut self, stager: ArtifactStager) -> Self {
        self.stager = stager;
        self
    }

    /// Execute a job: fuse the graph, pick the execution mode, translate,
    /// stage artifacts, and submit the plan to the engine.
    pub async fn dispatch(
        &self,
        job_id: Uuid,
        pipeline: &Pipeline,
        config: &JobConfig,
        source: &dyn ArtifactSource,
    ) -> Result<PipelineResult, RunnerError> {
        let fused = self.fuser.fuse(pipeline)?;
        let mode = ExecutionMode::select(config, &fused);
        let job = JobInfo::new(job_id, config);

        tracing::info!(job_id = %job_id, mode = %mode, "Translating pipeline to engine plan");
        let translation = self.translator.translate(&fused, &job, mode)?;

        tracing::info!(job_id = %job_id, "Registering pipeline artifacts");
        let staged = self
            .stager
            .stage(job_id, source, translation.registry.as_ref())
            .await?;
        tracing::debug!(
            job_id = %job_id,
            registered = staged.registered.len(),
            "Artifact staging complete"
        );

        let outcome = self.engine.execute(translation.plan).await?;
        Ok(PipelineResult { job_id, mode, outcome })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
