//! Job configuration, translator-facing metadata, and diagnostic messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Execution configuration for one job submission.
///
/// `engine_options` is an opaque JSON object of engine-specific settings;
/// the runner forwards it to the translator untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub job_name: String,
    #[serde(default)]
    pub streaming: bool,
    #[serde(default)]
    pub engine_options: serde_json::Value,
}

impl JobConfig {
    /// Create a configuration with the given job name and defaults
    /// (batch, no engine options).
    pub fn new(job_name: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            streaming: false,
            engine_options: serde_json::Value::Object(Default::default()),
        }
    }

    /// Request streaming execution regardless of graph boundedness.
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Set the opaque engine-specific options object.
    pub fn with_engine_options(mut self, options: serde_json::Value) -> Self {
        self.engine_options = options;
        self
    }
}

/// Job metadata handed to the pipeline translator alongside the fused
/// graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInfo {
    pub id: Uuid,
    pub job_name: String,
    pub engine_options: serde_json::Value,
}

impl JobInfo {
    pub fn new(id: Uuid, config: &JobConfig) -> Self {
        Self {
            id,
            job_name: config.job_name.clone(),
            engine_options: config.engine_options.clone(),
        }
    }
}

/// Severity of a job diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSeverity {
    Info,
    Warning,
    Error,
}

/// A diagnostic message emitted during job execution.
///
/// Message delivery is not implemented yet; see
/// `JobInvocation::add_message_listener` in `runnel-runner`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMessage {
    pub text: String,
    pub severity: MessageSeverity,
    pub timestamp: DateTime<Utc>,
}

impl JobMessage {
    pub fn new(severity: MessageSeverity, text: impl Into<String>) -> Self {
        Self { text: text.into(), severity, timestamp: Utc::now() }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
