//! Pipeline graph model and execution-mode selection.
//!
//! A [`Pipeline`] is a graph of named [`Transform`]s wired together through
//! named, typed [`Collection`]s. The runner never interprets the graph
//! beyond one question: does any collection anywhere carry unbounded data?
//! A single unbounded collection forces streaming execution regardless of
//! where it is consumed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::job::JobConfig;

/// Whether a collection holds a finite or a potentially infinite stream
/// of elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Boundedness {
    Bounded,
    Unbounded,
}

/// A named, typed data collection produced and consumed by transforms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub boundedness: Boundedness,
    /// Element type name, opaque to the runner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_type: Option<String>,
}

impl Collection {
    pub fn bounded() -> Self {
        Self { boundedness: Boundedness::Bounded, element_type: None }
    }

    pub fn unbounded() -> Self {
        Self { boundedness: Boundedness::Unbounded, element_type: None }
    }
}

/// A single node in the pipeline graph, referencing its input and output
/// collections by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transform {
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    /// Engine-opaque payload describing what the transform does.
    #[serde(default)]
    pub spec: serde_json::Value,
}

/// The component set of a pipeline: transforms and collections keyed by id.
///
/// `BTreeMap` keeps iteration deterministic, but nothing below depends on
/// iteration order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pipeline {
    #[serde(default)]
    pub transforms: BTreeMap<String, Transform>,
    #[serde(default)]
    pub collections: BTreeMap<String, Collection>,
}

impl Pipeline {
    /// Whether any collection in the component set is unbounded.
    ///
    /// Every collection is assumed to be consumed somewhere in the
    /// pipeline, so consumption is not checked.
    pub fn has_unbounded_collections(&self) -> bool {
        self.collections
            .values()
            .any(|c| c.boundedness == Boundedness::Unbounded)
    }
}

/// How a translated pipeline executes on the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Batch,
    Streaming,
}

impl ExecutionMode {
    /// Select the execution mode for a job.
    ///
    /// Streaming when the configuration requests it or when the (fused)
    /// graph contains any unbounded collection; batch otherwise. Pure:
    /// no side effects, no dependence on traversal order.
    pub fn select(config: &JobConfig, pipeline: &Pipeline) -> Self {
        if config.streaming || pipeline.has_unbounded_collections() {
            Self::Streaming
        } else {
            Self::Batch
        }
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Batch => f.write_str("batch"),
            Self::Streaming => f.write_str("streaming"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
