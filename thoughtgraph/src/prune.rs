//! Quality-based pruning.
//!
//! Removal set: every vertex scoring below the threshold (unscored counts as below)
//! that is neither a root nor a terminal. Lineage rule: a retained non-root vertex
//! must keep at least one parent, so when all of a retained vertex's parents are
//! doomed the best-scoring of them is spared. Sparing can in turn rescue that
//! parent's own ancestors; planning runs to a fixpoint. The result therefore never
//! leaves a parent-less derived vertex behind, and nothing protected or retained is
//! ever removed transitively.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::graph::{GraphState, Vertex};

/// Which vertices a prune will remove, and which low scorers it keeps for lineage.
#[derive(Debug, Clone, PartialEq)]
pub struct PrunePlan {
    pub threshold: f64,
    /// Creation order.
    pub remove: Vec<String>,
    /// Below threshold but kept as the last parent of a retained vertex; creation order.
    pub spared: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PruneOutcome {
    pub threshold: f64,
    pub removed_ids: Vec<String>,
    pub spared_ids: Vec<String>,
    pub remaining_count: usize,
}

impl PruneOutcome {
    pub fn removed_count(&self) -> usize {
        self.removed_ids.len()
    }
}

pub struct PruningEngine;

impl PruningEngine {
    /// Computes the removal set without touching the graph.
    pub fn plan(state: &GraphState, threshold: f64) -> PrunePlan {
        let ordered = state.vertices_in_order();
        let mut doomed: HashSet<&str> = ordered
            .iter()
            .filter(|v| !state.is_protected(&v.id) && v.below(threshold))
            .map(|v| v.id.as_str())
            .collect();
        let mut spared: HashSet<&str> = HashSet::new();

        loop {
            let mut changed = false;
            for v in &ordered {
                if doomed.contains(v.id.as_str()) || v.parent_ids.is_empty() {
                    continue;
                }
                if v.parent_ids.iter().all(|p| doomed.contains(p.as_str())) {
                    if let Some(keep) = best_parent(state, v) {
                        doomed.remove(keep);
                        spared.insert(keep);
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }

        let in_order = |set: &HashSet<&str>| -> Vec<String> {
            ordered
                .iter()
                .filter(|v| set.contains(v.id.as_str()))
                .map(|v| v.id.clone())
                .collect()
        };
        PrunePlan {
            threshold,
            remove: in_order(&doomed),
            spared: in_order(&spared),
        }
    }

    /// Plans and applies a prune, returning what happened.
    pub fn apply(state: &mut GraphState, threshold: f64) -> PruneOutcome {
        let plan = Self::plan(state, threshold);
        for id in &plan.remove {
            state.remove_vertex(id);
        }
        PruneOutcome {
            threshold,
            removed_ids: plan.remove,
            spared_ids: plan.spared,
            remaining_count: state.vertex_count(),
        }
    }
}

/// Highest-scoring parent of `v` (unscored ranks lowest); ties go to the older one.
fn best_parent<'a>(state: &'a GraphState, v: &Vertex) -> Option<&'a str> {
    v.parent_ids
        .iter()
        .filter_map(|p| state.vertex(p))
        .max_by(|a, b| {
            let (sa, sb) = (a.score.unwrap_or(-1.0), b.score.unwrap_or(-1.0));
            sa.total_cmp(&sb).then(b.seq.cmp(&a.seq))
        })
        .map(|p| p.id.as_str())
}
