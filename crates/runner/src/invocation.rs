//! Job invocation lifecycle.
//!
//! [`JobInvocation`] owns one submitted job's identity and state, runs the
//! [`ExecutionDispatcher`] as a single asynchronous task, and mediates
//! state-change notification to observers.
//!
//! One `std::sync::Mutex` guards the state, the observer list, the task
//! handle, and the outcome. Every transition notifies observers while the
//! lock is held, so all observers see transitions in one global order; the
//! cost is that a slow observer delays later transitions from being
//! observed. Observers must be cheap and must never block.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use runnel_core::{JobConfig, JobMessage, JobState, Pipeline};

use crate::dispatch::{ExecutionDispatcher, PipelineResult};
use crate::error::RunnerError;
use crate::staging::ArtifactSource;

/// Callback invoked with every job state change.
pub type StateObserver = Box<dyn FnMut(JobState) + Send>;

/// State shared between the caller and the execution task, guarded by one
/// exclusive lock.
struct Shared {
    state: JobState,
    observers: Vec<StateObserver>,
    outcome: Option<PipelineResult>,
    task: Option<JoinHandle<()>>,
}

/// Everything a running job's task needs, shared behind one `Arc`.
struct Inner {
    id: Uuid,
    pipeline: Pipeline,
    config: JobConfig,
    source: Arc<dyn ArtifactSource>,
    dispatcher: Arc<ExecutionDispatcher>,
    cancel: CancellationToken,
    shared: Mutex<Shared>,
}

/// One submitted job: identity, pipeline, configuration, and lifecycle.
///
/// Cheap to clone; clones share the same underlying invocation.
#[derive(Clone)]
pub struct JobInvocation {
    inner: Arc<Inner>,
}

impl JobInvocation {
    pub fn new(
        id: Uuid,
        pipeline: Pipeline,
        config: JobConfig,
        source: Arc<dyn ArtifactSource>,
        dispatcher: Arc<ExecutionDispatcher>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                id,
                pipeline,
                config,
                source,
                dispatcher,
                cancel: CancellationToken::new(),
                shared: Mutex::new(Shared {
                    state: JobState::Stopped,
                    observers: Vec::new(),
                    outcome: None,
                    task: None,
                }),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Start the job. Requires the `Stopped` state and a tokio runtime
    /// context; returns without blocking on the execution task.
    ///
    /// Transitions `Stopped → Starting`, spawns the dispatch task, then
    /// transitions `Starting → Running`, all under one guard, so no
    /// terminal state can be observed before `Running`.
    pub fn start(&self) -> Result<(), RunnerError> {
        tracing::trace!(job_id = %self.inner.id, "Starting job invocation");
        let mut shared = self.inner.lock_shared();
        if shared.state != JobState::Stopped {
            return Err(RunnerError::NotStartable(shared.state));
        }
        self.inner.transition(&mut shared, JobState::Starting);

        let inner = Arc::clone(&self.inner);
        let cancel = self.inner.cancel.clone();
        let task = tokio::spawn(async move {
            let result = tokio::select! {
                _ = cancel.cancelled() => Err(RunnerError::Cancelled),
                result = inner.dispatcher.dispatch(
                    inner.id,
                    &inner.pipeline,
                    &inner.config,
                    inner.source.as_ref(),
                ) => result,
            };
            inner.complete(result);
        });

        self.inner.transition(&mut shared, JobState::Running);
        shared.task = Some(task);
        Ok(())
    }

    /// Request cooperative interruption of the in-flight execution task.
    ///
    /// Does not itself change job state; a `Failed` transition, if any,
    /// comes from the task observing the cancellation. No-op when no task
    /// is in flight. Work already handed to the engine is not forcibly
    /// stopped.
    pub fn cancel(&self) {
        tracing::trace!(job_id = %self.inner.id, "Cancelling job invocation");
        let shared = self.inner.lock_shared();
        if shared.task.is_some() {
            self.inner.cancel.cancel();
        }
    }

    /// Current job state.
    pub fn state(&self) -> JobState {
        self.inner.lock_shared().state
    }

    /// The execution result; `Some` only once the job is `Done`.
    pub fn outcome(&self) -> Option<PipelineResult> {
        self.inner.lock_shared().outcome.clone()
    }

    /// Register an observer for state changes.
    ///
    /// Delivers the state current at call time exactly once, then
    /// subscribes the observer for all future transitions, under a single
    /// guard: a racing transition is either seen as the replayed current
    /// state or as that transition's notification, never both or neither.
    /// No history beyond the current state is replayed.
    pub fn add_state_listener(&self, observer: impl FnMut(JobState) + Send + 'static) {
        let mut shared = self.inner.lock_shared();
        let mut observer: StateObserver = Box::new(observer);
        observer(shared.state);
        shared.observers.push(observer);
    }

    /// Register an observer for job diagnostic messages.
    ///
    /// Message delivery is not implemented yet: the observer is accepted
    /// and dropped, and no message is ever delivered.
    pub fn add_message_listener(&self, _observer: impl FnMut(JobMessage) + Send + 'static) {
        tracing::warn!(
            job_id = %self.inner.id,
            "Message listeners are not supported yet; no messages will be delivered"
        );
    }

    /// Wait until the job reaches a terminal state and return it.
    ///
    /// Subscribes for state changes, so a job that already finished
    /// resolves immediately via the replayed current state.
    pub async fn wait_until_finish(&self) -> JobState {
        let (tx, mut rx) = mpsc::unbounded_channel();
        self.add_state_listener(move |state| {
            let _ = tx.send(state);
        });
        while let Some(state) = rx.recv().await {
            if state.is_terminal() {
                return state;
            }
        }
        // The invocation was dropped while we were waiting.
        self.state()
    }
}

impl Inner {
    /// Completion handler for the execution task.
    fn complete(&self, result: Result<PipelineResult, RunnerError>) {
        let mut shared = self.lock_shared();
        match result {
            Ok(outcome) => {
                shared.outcome = Some(outcome);
                self.transition(&mut shared, JobState::Done);
            }
            Err(error) => {
                tracing::error!(
                    job_id = %self.id,
                    error = %error,
                    "Error during job invocation"
                );
                self.transition(&mut shared, JobState::Failed);
            }
        }
        shared.task = None;
    }

    /// Apply a transition and notify observers, all under the caller's
    /// guard. Illegal transitions (a terminal state was already reached)
    /// are ignored with a warning.
    fn transition(&self, shared: &mut Shared, next: JobState) {
        if !shared.state.can_transition_to(next) {
            tracing::warn!(
                job_id = %self.id,
                from = %shared.state,
                to = %next,
                "Ignoring illegal job state transition"
            );
            return;
        }
        shared.state = next;
        for observer in shared.observers.iter_mut() {
            observer(next);
        }
    }

    /// A panicking observer must not wedge every later transition, so
    /// poisoning is recovered rather than propagated.
    fn lock_shared(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    use runnel_core::ArtifactManifest;

    use crate::dispatch::{
        EngineOutcome, EnginePlan, ExecutionEngine, IdentityFuser, PipelineTranslator,
        Translation,
    };
    use crate::error::{EngineError, StagingError, TranslationError};
    use crate::staging::{ArtifactStager, CachedFileRegistry, TransferEvent};

    struct EmptySource;

    #[async_trait]
    impl ArtifactSource for EmptySource {
        async fn manifest(&self) -> Result<ArtifactManifest, StagingError> {
            Ok(ArtifactManifest::default())
        }

        async fn get_artifact(
            &self,
            _name: &str,
        ) -> Result<mpsc::Receiver<TransferEvent>, StagingError> {
            unreachable!("empty manifest has no artifacts")
        }
    }

    struct NullRegistry;

    impl CachedFileRegistry for NullRegistry {
        fn register_cached_file(&self, _local_uri: &str, _handle: &str) {}
    }

    struct PassthroughTranslator;

    impl PipelineTranslator for PassthroughTranslator {
        fn translate(
            &self,
            _fused: &Pipeline,
            job: &runnel_core::JobInfo,
            mode: runnel_core::ExecutionMode,
        ) -> Result<Translation, TranslationError> {
            Ok(Translation {
                plan: EnginePlan {
                    job_name: job.job_name.clone(),
                    mode,
                    plan: serde_json::Value::Null,
                },
                registry: Arc::new(NullRegistry),
            })
        }
    }

    enum EngineBehavior {
        Succeed,
        Fail,
        Hang,
    }

    struct ScriptedEngine(EngineBehavior);

    #[async_trait]
    impl ExecutionEngine for ScriptedEngine {
        async fn execute(&self, _plan: EnginePlan) -> Result<EngineOutcome, EngineError> {
            match self.0 {
                EngineBehavior::Succeed => Ok(EngineOutcome {
                    runtime_ms: 7,
                    accumulators: BTreeMap::new(),
                }),
                EngineBehavior::Fail => Err(EngineError("worker lost".to_string())),
                EngineBehavior::Hang => std::future::pending().await,
            }
        }
    }

    /// Invocation against an empty manifest and a scripted engine. The
    /// returned tempdir keeps the staging root alive for the test.
    fn invocation(behavior: EngineBehavior) -> (JobInvocation, tempfile::TempDir) {
        let root = tempfile::tempdir().expect("tempdir");
        let dispatcher = Arc::new(
            ExecutionDispatcher::new(
                Arc::new(IdentityFuser),
                Arc::new(PassthroughTranslator),
                Arc::new(ScriptedEngine(behavior)),
            )
            .with_stager(ArtifactStager::with_root(root.path())),
        );
        let job = JobInvocation::new(
            Uuid::new_v4(),
            Pipeline::default(),
            JobConfig::new("test-job"),
            Arc::new(EmptySource),
            dispatcher,
        );
        (job, root)
    }

    fn recording_listener(job: &JobInvocation) -> Arc<Mutex<Vec<JobState>>> {
        let seen: Arc<Mutex<Vec<JobState>>> = Arc::default();
        let sink = Arc::clone(&seen);
        job.add_state_listener(move |state| {
            sink.lock().expect("listener lock").push(state);
        });
        seen
    }

    #[tokio::test]
    async fn successful_run_passes_through_every_state_in_order() {
        let (job, _root) = invocation(EngineBehavior::Succeed);
        let seen = recording_listener(&job);

        job.start().expect("start from STOPPED");
        assert_eq!(job.wait_until_finish().await, JobState::Done);

        assert_eq!(
            *seen.lock().expect("listener lock"),
            vec![
                JobState::Stopped,
                JobState::Starting,
                JobState::Running,
                JobState::Done,
            ]
        );
    }

    #[tokio::test]
    async fn engine_failure_ends_in_failed() {
        let (job, _root) = invocation(EngineBehavior::Fail);

        job.start().expect("start from STOPPED");
        assert_eq!(job.wait_until_finish().await, JobState::Failed);
        assert!(job.outcome().is_none());
    }

    #[tokio::test]
    async fn listener_gets_current_state_exactly_once_at_registration() {
        let (job, _root) = invocation(EngineBehavior::Succeed);

        let before = recording_listener(&job);
        assert_eq!(*before.lock().expect("listener lock"), vec![JobState::Stopped]);

        job.start().expect("start from STOPPED");
        job.wait_until_finish().await;

        // A listener registered after completion sees only the terminal
        // state; no history is replayed.
        let after = recording_listener(&job);
        assert_eq!(*after.lock().expect("listener lock"), vec![JobState::Done]);
    }

    #[tokio::test]
    async fn start_is_rejected_outside_stopped() {
        let (job, _root) = invocation(EngineBehavior::Succeed);

        job.start().expect("first start");
        let err = job.start().expect_err("second start must fail");
        assert!(matches!(err, RunnerError::NotStartable(_)));

        assert_eq!(job.wait_until_finish().await, JobState::Done);
    }

    #[tokio::test]
    async fn cancel_with_no_task_in_flight_is_a_noop() {
        let (job, _root) = invocation(EngineBehavior::Succeed);
        job.cancel();
        assert_eq!(job.state(), JobState::Stopped);
        // The job is still startable afterwards.
        job.start().expect("start after no-op cancel");
        assert_eq!(job.wait_until_finish().await, JobState::Done);
    }

    #[tokio::test]
    async fn cancelling_an_inflight_job_fails_it_via_the_completion_path() {
        let (job, _root) = invocation(EngineBehavior::Hang);
        let seen = recording_listener(&job);

        job.start().expect("start from STOPPED");
        assert_eq!(job.state(), JobState::Running);

        job.cancel();
        assert_eq!(job.wait_until_finish().await, JobState::Failed);

        assert_eq!(
            *seen.lock().expect("listener lock"),
            vec![
                JobState::Stopped,
                JobState::Starting,
                JobState::Running,
                JobState::Failed,
            ]
        );
    }

    #[tokio::test]
    async fn outcome_is_available_only_after_done() {
        let (job, _root) = invocation(EngineBehavior::Succeed);
        assert!(job.outcome().is_none());

        job.start().expect("start from STOPPED");
        assert_eq!(job.wait_until_finish().await, JobState::Done);

        let outcome = job.outcome().expect("outcome after DONE");
        assert_eq!(outcome.outcome.runtime_ms, 7);
        assert_eq!(outcome.job_id, job.id());
    }

    #[tokio::test]
    async fn message_listener_is_accepted_but_never_invoked() {
        let (job, _root) = invocation(EngineBehavior::Succeed);
        let delivered: Arc<Mutex<Vec<JobMessage>>> = Arc::default();
        let sink = Arc::clone(&delivered);
        job.add_message_listener(move |msg| {
            sink.lock().expect("message lock").push(msg);
        });

        job.start().expect("start from STOPPED");
        job.wait_until_finish().await;
        assert!(delivered.lock().expect("message lock").is_empty());
    }
}
