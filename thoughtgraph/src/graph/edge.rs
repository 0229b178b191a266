//! Directed edges recording how one vertex produced another.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mirrors how `to` was produced from `from`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Generation,
    Aggregation,
    Refinement,
}

impl EdgeKind {
    /// Relationship strength recorded on new edges of this kind.
    pub fn weight(self) -> f64 {
        match self {
            Self::Generation => 0.9,
            Self::Aggregation => 0.8,
            Self::Refinement => 0.9,
        }
    }

    /// Whether the target must sit strictly deeper than the source.
    ///
    /// Refinement keeps the original's depth, so it is the one exception.
    pub fn descends(self) -> bool {
        !matches!(self, Self::Refinement)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
    pub weight: f64,
    pub created_at: DateTime<Utc>,
}

impl Edge {
    pub(crate) fn new(from: &str, to: &str, kind: EdgeKind) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            kind,
            weight: kind.weight(),
            created_at: Utc::now(),
        }
    }

    pub fn touches(&self, id: &str) -> bool {
        self.from == id || self.to == id
    }
}
