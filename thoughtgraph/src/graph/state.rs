//! GraphState: one graph's vertex table, edge list and root/active/terminal id sets.
//!
//! All structural mutation goes through the `pub(crate)` methods here so that the
//! parent/child mirrors on [`Vertex`] always agree with `edges`. The controller
//! holds a `GraphState` behind a per-graph lock; callers only ever see clones.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GraphError;

use super::config::GraphConfig;
use super::edge::{Edge, EdgeKind};
use super::vertex::Vertex;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphState {
    pub id: String,
    pub vertices: HashMap<String, Vertex>,
    /// Insertion order is creation order.
    pub edges: Vec<Edge>,
    pub root_ids: Vec<String>,
    pub active_ids: Vec<String>,
    pub terminal_ids: Vec<String>,
    pub config: GraphConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GraphState {
    /// New graph holding a single root vertex, which is also the whole active set.
    pub(crate) fn new(id: &str, root: Vertex, config: GraphConfig) -> Self {
        let now = Utc::now();
        let root_id = root.id.clone();
        Self {
            id: id.to_string(),
            vertices: HashMap::from([(root_id.clone(), root)]),
            edges: Vec::new(),
            root_ids: vec![root_id.clone()],
            active_ids: vec![root_id],
            terminal_ids: Vec::new(),
            config,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn vertex(&self, id: &str) -> Option<&Vertex> {
        self.vertices.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.vertices.contains_key(id)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Vertices in creation order.
    pub fn vertices_in_order(&self) -> Vec<&Vertex> {
        let mut out: Vec<&Vertex> = self.vertices.values().collect();
        out.sort_by_key(|v| v.seq);
        out
    }

    /// Root and terminal vertices are never pruned.
    pub fn is_protected(&self, id: &str) -> bool {
        self.root_ids.iter().any(|r| r == id) || self.terminal_ids.iter().any(|t| t == id)
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active_ids.iter().any(|a| a == id)
    }

    pub fn is_terminal(&self, id: &str) -> bool {
        self.terminal_ids.iter().any(|t| t == id)
    }

    /// Other vertices sharing at least one parent with `id`.
    pub fn siblings_of(&self, id: &str) -> Vec<&Vertex> {
        let Some(v) = self.vertex(id) else {
            return Vec::new();
        };
        let mut seen: HashSet<&str> = HashSet::new();
        let mut out = Vec::new();
        for parent in v.parent_ids.iter().filter_map(|p| self.vertex(p)) {
            for child in parent.child_ids.iter().filter_map(|c| self.vertex(c)) {
                if child.id != id && seen.insert(child.id.as_str()) {
                    out.push(child);
                }
            }
        }
        out.sort_by_key(|v| v.seq);
        out
    }

    /// Scored vertices, best first; ties go to the older vertex.
    pub fn top_scored(&self, n: usize) -> Vec<&Vertex> {
        let mut scored: Vec<&Vertex> = self.vertices.values().filter(|v| v.is_scored()).collect();
        scored.sort_by(|a, b| {
            let (sa, sb) = (a.score.unwrap_or(0.0), b.score.unwrap_or(0.0));
            sb.total_cmp(&sa).then(a.seq.cmp(&b.seq))
        });
        scored.truncate(n);
        scored
    }

    /// Inserts `vertex` with one `kind` edge from each parent, all or nothing.
    ///
    /// Checks capacity and parent existence before touching anything, so a failure
    /// leaves the graph unchanged.
    pub(crate) fn commit_derived(
        &mut self,
        mut vertex: Vertex,
        parents: &[String],
        kind: EdgeKind,
    ) -> Result<&Vertex, GraphError> {
        if self.vertices.len() >= self.config.max_vertices {
            return Err(GraphError::LimitReached(format!(
                "max vertices reached ({})",
                self.config.max_vertices
            )));
        }
        if parents.is_empty() {
            return Err(GraphError::invalid("derived vertex needs at least one parent"));
        }
        if let Some(missing) = parents.iter().find(|p| !self.contains(p)) {
            return Err(GraphError::vertex_not_found(missing));
        }
        if self.contains(&vertex.id) {
            return Err(GraphError::invalid(format!("duplicate vertex id: {}", vertex.id)));
        }

        let id = vertex.id.clone();
        vertex.parent_ids.clear();
        vertex.child_ids.clear();
        for parent in parents {
            if !vertex.parent_ids.contains(parent) {
                vertex.parent_ids.push(parent.clone());
            }
        }
        for parent in &vertex.parent_ids {
            if let Some(p) = self.vertices.get_mut(parent) {
                p.child_ids.push(id.clone());
            }
            self.edges.push(Edge::new(parent, &id, kind));
        }
        self.vertices.insert(id.clone(), vertex);
        self.touch();
        self.vertices
            .get(&id)
            .ok_or_else(|| GraphError::vertex_not_found(&id))
    }

    /// Removes a vertex, every edge touching it, and its id from all id sets and
    /// from its neighbours' parent/child lists.
    pub(crate) fn remove_vertex(&mut self, id: &str) -> Option<Vertex> {
        let removed = self.vertices.remove(id)?;
        self.edges.retain(|e| !e.touches(id));
        for parent in &removed.parent_ids {
            if let Some(p) = self.vertices.get_mut(parent) {
                p.child_ids.retain(|c| c != id);
            }
        }
        for child in &removed.child_ids {
            if let Some(c) = self.vertices.get_mut(child) {
                c.parent_ids.retain(|p| p != id);
            }
        }
        self.root_ids.retain(|r| r != id);
        self.active_ids.retain(|a| a != id);
        self.terminal_ids.retain(|t| t != id);
        self.touch();
        Some(removed)
    }

    pub(crate) fn activate(&mut self, id: &str) {
        if !self.is_active(id) {
            self.active_ids.push(id.to_string());
        }
    }

    pub(crate) fn deactivate(&mut self, id: &str) {
        self.active_ids.retain(|a| a != id);
    }

    /// Moves `id` out of the active set into the terminal set. Idempotent.
    pub(crate) fn mark_terminal(&mut self, id: &str) {
        self.deactivate(id);
        if !self.is_terminal(id) {
            self.terminal_ids.push(id.to_string());
        }
        self.touch();
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Verifies the structural invariants; returns a description of the first violation.
    ///
    /// Edge endpoints and id-set members must exist, non-roots must have parents
    /// backed by edges, and descending edges must go deeper.
    pub fn check_invariants(&self) -> Result<(), String> {
        for e in &self.edges {
            if !self.contains(&e.from) || !self.contains(&e.to) {
                return Err(format!("dangling edge {} -> {}", e.from, e.to));
            }
        }
        for (name, ids) in [
            ("root_ids", &self.root_ids),
            ("active_ids", &self.active_ids),
            ("terminal_ids", &self.terminal_ids),
        ] {
            if let Some(missing) = ids.iter().find(|id| !self.contains(id)) {
                return Err(format!("{name} holds unknown vertex {missing}"));
            }
        }
        for v in self.vertices.values() {
            let is_root = self.root_ids.contains(&v.id);
            if !is_root && v.parent_ids.is_empty() {
                return Err(format!("non-root vertex {} has no parent", v.id));
            }
            for parent in &v.parent_ids {
                let Some(edge) = self.edges.iter().find(|e| &e.from == parent && e.to == v.id)
                else {
                    return Err(format!("parent {parent} of {} has no edge", v.id));
                };
                let Some(p) = self.vertex(parent) else {
                    return Err(format!("parent {parent} of {} is missing", v.id));
                };
                if edge.kind.descends() && v.depth < p.depth + 1 {
                    return Err(format!(
                        "vertex {} at depth {} is not below parent {parent} at depth {}",
                        v.id, v.depth, p.depth
                    ));
                }
                if !p.child_ids.contains(&v.id) {
                    return Err(format!("parent {parent} does not list child {}", v.id));
                }
            }
        }
        Ok(())
    }
}
