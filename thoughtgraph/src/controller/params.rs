//! Inputs and results of the generator-backed controller operations.

use serde::{Deserialize, Serialize};

use crate::graph::Vertex;
use crate::score::AssessMode;

/// Upper bound on continuations requested per source in one Generate call.
pub const MAX_K: usize = 10;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateParams {
    /// Vertices to expand; empty means the current active set.
    #[serde(default)]
    pub source_vertex_ids: Vec<String>,
    pub k: usize,
    #[serde(default)]
    pub problem: String,
}

impl GenerateParams {
    pub fn new(k: usize, problem: impl Into<String>) -> Self {
        Self {
            source_vertex_ids: Vec::new(),
            k,
            problem: problem.into(),
        }
    }

    pub fn from_sources(mut self, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.source_vertex_ids = ids.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone)]
pub struct GenerateOutcome {
    /// Committed vertices, in commit order.
    pub new_vertices: Vec<Vertex>,
    /// Size of the active set after the call.
    pub active_count: usize,
    /// Sources not expanded because they already sit at `max_depth`.
    pub skipped_sources: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateParams {
    pub vertex_ids: Vec<String>,
    #[serde(default)]
    pub problem: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefineParams {
    pub vertex_id: String,
    #[serde(default)]
    pub problem: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreParams {
    pub vertex_id: String,
    #[serde(default)]
    pub problem: String,
    #[serde(default)]
    pub mode: AssessMode,
}
