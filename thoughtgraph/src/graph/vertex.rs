//! Thought vertices: the nodes of a reasoning graph.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a vertex came into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VertexKind {
    /// Starting thought inserted by Initialize.
    Root,
    /// One of k continuations of a source vertex.
    Generated,
    /// Synthesis of two or more vertices.
    Aggregated,
    /// Critiqued-and-improved version of another vertex.
    Refined,
}

impl VertexKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Generated => "generated",
            Self::Aggregated => "aggregated",
            Self::Refined => "refined",
        }
    }

    /// Confidence assigned to a fresh vertex of this kind when no better estimate exists.
    ///
    /// Aggregated vertices normally take the merged confidence of their sources instead
    /// (see [`ScoreEngine::merge_confidence`](crate::ScoreEngine::merge_confidence)).
    pub fn default_confidence(self) -> f64 {
        match self {
            Self::Root => 0.8,
            Self::Generated => 0.7,
            Self::Aggregated => 0.85,
            Self::Refined => 0.8,
        }
    }
}

impl fmt::Display for VertexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One thought in the graph.
///
/// `parent_ids` and `child_ids` mirror the edge list of the owning
/// [`GraphState`](super::GraphState) and are only mutated through it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub id: String,
    pub content: String,
    pub kind: VertexKind,
    /// 0 for roots; max(parent depth) + 1 for generated/aggregated; parent depth for refined.
    pub depth: u32,
    /// In [0, 1].
    pub confidence: f64,
    /// Overall quality in [0, 1]; `None` until the vertex has been scored.
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub refinement_count: u32,
    #[serde(default)]
    pub parent_ids: Vec<String>,
    #[serde(default)]
    pub child_ids: Vec<String>,
    /// Controller-wide creation sequence; orders vertices for display and tie-breaks.
    pub seq: u64,
    pub created_at: DateTime<Utc>,
}

impl Vertex {
    pub(crate) fn new(
        id: String,
        seq: u64,
        content: String,
        kind: VertexKind,
        confidence: f64,
        depth: u32,
    ) -> Self {
        Self {
            id,
            content,
            kind,
            depth,
            confidence: confidence.clamp(0.0, 1.0),
            score: None,
            refinement_count: 0,
            parent_ids: Vec::new(),
            child_ids: Vec::new(),
            seq,
            created_at: Utc::now(),
        }
    }

    pub fn is_scored(&self) -> bool {
        self.score.is_some()
    }

    /// True when the vertex scores strictly below `threshold`. Unscored vertices count as below.
    pub fn below(&self, threshold: f64) -> bool {
        self.score.map_or(true, |s| s < threshold)
    }

    pub fn summary(&self) -> VertexSummary {
        VertexSummary::from(self)
    }
}

/// The compact vertex view carried by every protocol response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexSummary {
    pub id: String,
    pub content: String,
    pub kind: VertexKind,
    pub depth: u32,
    pub confidence: f64,
    pub score: Option<f64>,
}

impl From<&Vertex> for VertexSummary {
    fn from(v: &Vertex) -> Self {
        Self {
            id: v.id.clone(),
            content: v.content.clone(),
            kind: v.kind,
            depth: v.depth,
            confidence: v.confidence,
            score: v.score,
        }
    }
}
