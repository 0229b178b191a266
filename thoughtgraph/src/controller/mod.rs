//! GraphController: the registry of graphs and the operations on them.
//!
//! Locking discipline:
//! - the registry is a [`DashMap`] keyed by graph id; its shard locks are held only
//!   for a lookup or an insert, never across an `.await`;
//! - each graph sits behind its own [`tokio::sync::RwLock`]. Operations without
//!   external calls (prune, terminal/active updates) hold the write lock
//!   throughout. Generator-backed operations (see `ops.rs`) snapshot under a read
//!   lock, call the generator with no lock held, then re-validate and commit under
//!   the write lock.
//!
//! Vertex ids are `<graph_id>-v<seq>` with `seq` drawn from one controller-wide
//! counter, and removed graph ids are retired, so no id is ever handed out twice.

mod ops;
mod params;

pub use params::{
    AggregateParams, GenerateOutcome, GenerateParams, RefineParams, ScoreParams, MAX_K,
};

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::GraphError;
use crate::graph::{env_override, unit_interval, GraphConfig, GraphState, Vertex, VertexKind};
use crate::prune::{PruneOutcome, PruningEngine};

/// Registry-wide settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// When set, Initialize evicts the least recently used graph to stay within bound.
    /// The bound is at least one: `Some(0)` behaves as `Some(1)`.
    pub max_graphs: Option<usize>,
    /// When set, [`GraphController::evict_idle`] removes graphs untouched for this long.
    pub idle_ttl: Option<Duration>,
    /// Per-call limit for generator calls; exceeding it fails with `GenerationFailed`.
    pub generator_timeout: Option<Duration>,
}

impl ControllerConfig {
    /// Overlays `THOUGHTGRAPH_MAX_GRAPHS`, `THOUGHTGRAPH_IDLE_TTL_SECS` and
    /// `THOUGHTGRAPH_GENERATOR_TIMEOUT_MS`.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(n) = env_override::<usize>("MAX_GRAPHS") {
            self.max_graphs = Some(n.max(1));
        }
        if let Some(secs) = env_override::<u64>("IDLE_TTL_SECS") {
            self.idle_ttl = Some(Duration::from_secs(secs));
        }
        if let Some(ms) = env_override::<u64>("GENERATOR_TIMEOUT_MS") {
            self.generator_timeout = Some(Duration::from_millis(ms));
        }
        self
    }
}

struct GraphEntry {
    state: RwLock<GraphState>,
    /// Milliseconds since the controller's epoch.
    last_access_ms: AtomicU64,
}

impl GraphEntry {
    fn new(state: GraphState, now_ms: u64) -> Self {
        Self {
            state: RwLock::new(state),
            last_access_ms: AtomicU64::new(now_ms),
        }
    }

    fn touch(&self, now_ms: u64) {
        self.last_access_ms.fetch_max(now_ms, Ordering::Relaxed);
    }

    fn last_access(&self) -> u64 {
        self.last_access_ms.load(Ordering::Relaxed)
    }
}

/// Owns every graph and serialises operations per graph.
///
/// Constructed once by the embedding application and shared as
/// `Arc<GraphController>`; there is no global instance.
pub struct GraphController {
    graphs: DashMap<String, Arc<GraphEntry>>,
    retired: DashSet<String>,
    next_seq: AtomicU64,
    config: ControllerConfig,
    epoch: Instant,
}

impl Default for GraphController {
    fn default() -> Self {
        Self::new(ControllerConfig::default())
    }
}

impl GraphController {
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            graphs: DashMap::new(),
            retired: DashSet::new(),
            next_seq: AtomicU64::new(0),
            config,
            epoch: Instant::now(),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Number of registered graphs.
    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }

    /// Registered graph ids, sorted.
    pub fn graph_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.graphs.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    fn next_vertex_id(&self, graph_id: &str) -> (String, u64) {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        (format!("{graph_id}-v{seq}"), seq)
    }

    /// Looks up a graph and marks it as recently used. The registry guard is
    /// released before this returns.
    fn entry(&self, graph_id: &str) -> Result<Arc<GraphEntry>, GraphError> {
        let entry = self
            .graphs
            .get(graph_id)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| GraphError::graph_not_found(graph_id))?;
        entry.touch(self.now_ms());
        Ok(entry)
    }

    /// Creates a graph holding one root vertex with `initial_thought`.
    ///
    /// Fails with `InvalidArgument` for an empty id or thought or an invalid config,
    /// and with `AlreadyExists` when `graph_id` is registered or was removed earlier.
    pub fn initialize(
        &self,
        graph_id: &str,
        initial_thought: &str,
        config: Option<GraphConfig>,
    ) -> Result<GraphState, GraphError> {
        if graph_id.trim().is_empty() {
            return Err(GraphError::invalid("graph_id is required"));
        }
        if initial_thought.trim().is_empty() {
            return Err(GraphError::invalid("initial_thought is required"));
        }
        let config = config.unwrap_or_default();
        config.validate()?;
        if self.retired.contains(graph_id) || self.graphs.contains_key(graph_id) {
            return Err(GraphError::AlreadyExists(graph_id.to_string()));
        }
        self.make_room();

        let (root_id, seq) = self.next_vertex_id(graph_id);
        let root = Vertex::new(
            root_id.clone(),
            seq,
            initial_thought.to_string(),
            VertexKind::Root,
            VertexKind::Root.default_confidence(),
            0,
        );
        let state = GraphState::new(graph_id, root, config);
        let snapshot = state.clone();
        match self.graphs.entry(graph_id.to_string()) {
            Entry::Occupied(_) => return Err(GraphError::AlreadyExists(graph_id.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(GraphEntry::new(state, self.now_ms())));
            }
        }
        tracing::info!(graph_id, root_id = %root_id, "graph initialized");
        Ok(snapshot)
    }

    /// Owned snapshot of a graph. Pure read.
    pub async fn get_state(&self, graph_id: &str) -> Result<GraphState, GraphError> {
        let entry = self.entry(graph_id)?;
        let state = entry.state.read().await;
        Ok(state.clone())
    }

    /// Removes low-scoring, unprotected vertices. `None` or `0.0` means the graph's
    /// configured `prune_threshold`.
    pub async fn prune(
        &self,
        graph_id: &str,
        threshold: Option<f64>,
    ) -> Result<PruneOutcome, GraphError> {
        let explicit = threshold.filter(|t| *t != 0.0);
        if let Some(t) = explicit {
            if !unit_interval(t) {
                return Err(GraphError::invalid(format!(
                    "threshold must be within [0, 1], got {t}"
                )));
            }
        }
        let entry = self.entry(graph_id)?;
        let mut state = entry.state.write().await;
        let threshold = explicit.unwrap_or(state.config.prune_threshold);
        let outcome = PruningEngine::apply(&mut state, threshold);
        tracing::info!(
            graph_id,
            threshold,
            removed = outcome.removed_count(),
            spared = outcome.spared_ids.len(),
            remaining = outcome.remaining_count,
            "graph pruned"
        );
        Ok(outcome)
    }

    /// Moves each id into the terminal set (out of the active set), making it immune
    /// to pruning. Returns the conclusions in request order, duplicates dropped.
    ///
    /// Every id is checked before anything changes. A root may be finalized; it then
    /// stays in both `root_ids` and `terminal_ids` for the life of the graph, since
    /// nothing ever leaves the terminal set and roots are never removed.
    pub async fn set_terminal_vertices(
        &self,
        graph_id: &str,
        ids: &[String],
    ) -> Result<Vec<Vertex>, GraphError> {
        if ids.is_empty() {
            return Err(GraphError::invalid("terminal_ids cannot be empty"));
        }
        let entry = self.entry(graph_id)?;
        let mut state = entry.state.write().await;
        if let Some(missing) = ids.iter().find(|id| !state.contains(id)) {
            return Err(GraphError::vertex_not_found(missing));
        }
        let mut seen = HashSet::new();
        let mut conclusions = Vec::with_capacity(ids.len());
        for id in ids {
            if !seen.insert(id.as_str()) {
                continue;
            }
            state.mark_terminal(id);
            if let Some(v) = state.vertex(id) {
                conclusions.push(v.clone());
            }
        }
        tracing::info!(graph_id, terminals = state.terminal_ids.len(), "terminal vertices set");
        Ok(conclusions)
    }

    /// Replaces the active set. Ids must exist, must not be terminal, and must fit
    /// within `max_active_vertices`.
    pub async fn set_active_vertices(
        &self,
        graph_id: &str,
        ids: &[String],
    ) -> Result<(), GraphError> {
        let entry = self.entry(graph_id)?;
        let mut state = entry.state.write().await;
        if let Some(missing) = ids.iter().find(|id| !state.contains(id)) {
            return Err(GraphError::vertex_not_found(missing));
        }
        if let Some(terminal) = ids.iter().find(|id| state.is_terminal(id)) {
            return Err(GraphError::invalid(format!(
                "vertex {terminal} is terminal and cannot be active"
            )));
        }
        let mut deduped: Vec<String> = Vec::with_capacity(ids.len());
        for id in ids {
            if !deduped.contains(id) {
                deduped.push(id.clone());
            }
        }
        if deduped.len() > state.config.max_active_vertices {
            return Err(GraphError::LimitReached(format!(
                "too many active vertices (limit: {})",
                state.config.max_active_vertices
            )));
        }
        state.active_ids = deduped;
        state.touch();
        Ok(())
    }

    pub async fn vertices_at_depth(
        &self,
        graph_id: &str,
        depth: u32,
    ) -> Result<Vec<Vertex>, GraphError> {
        let entry = self.entry(graph_id)?;
        let state = entry.state.read().await;
        Ok(state
            .vertices_in_order()
            .into_iter()
            .filter(|v| v.depth == depth)
            .cloned()
            .collect())
    }

    pub async fn children(&self, graph_id: &str, vertex_id: &str) -> Result<Vec<Vertex>, GraphError> {
        let entry = self.entry(graph_id)?;
        let state = entry.state.read().await;
        let v = state
            .vertex(vertex_id)
            .ok_or_else(|| GraphError::vertex_not_found(vertex_id))?;
        Ok(v.child_ids
            .iter()
            .filter_map(|c| state.vertex(c))
            .cloned()
            .collect())
    }

    /// The `n` best scored vertices, best first.
    pub async fn top_scored(&self, graph_id: &str, n: usize) -> Result<Vec<Vertex>, GraphError> {
        let entry = self.entry(graph_id)?;
        let state = entry.state.read().await;
        Ok(state.top_scored(n).into_iter().cloned().collect())
    }

    /// Drops a graph from the registry and returns its final state. The id is retired.
    pub async fn remove(&self, graph_id: &str) -> Result<GraphState, GraphError> {
        let entry = self
            .retire(graph_id)
            .ok_or_else(|| GraphError::graph_not_found(graph_id))?;
        let state = entry.state.read().await.clone();
        tracing::info!(graph_id, "graph removed");
        Ok(state)
    }

    /// Removes graphs idle for longer than `idle_ttl`. Returns their ids, sorted.
    /// No-op when no TTL is configured.
    pub fn evict_idle(&self) -> Vec<String> {
        let Some(ttl) = self.config.idle_ttl else {
            return Vec::new();
        };
        let now = self.now_ms();
        let ttl_ms = ttl.as_millis() as u64;
        let mut stale: Vec<String> = self
            .graphs
            .iter()
            .filter(|e| now.saturating_sub(e.value().last_access()) > ttl_ms)
            .map(|e| e.key().clone())
            .collect();
        stale.sort();
        for id in &stale {
            self.retire(id);
            tracing::info!(graph_id = %id, "evicted idle graph");
        }
        stale
    }

    /// Evicts least recently used graphs until there is room for one more.
    fn make_room(&self) {
        let Some(max) = self.config.max_graphs.map(|n| n.max(1)) else {
            return;
        };
        while self.graphs.len() >= max {
            let oldest = self
                .graphs
                .iter()
                .min_by_key(|e| e.value().last_access())
                .map(|e| e.key().clone());
            let Some(id) = oldest else {
                break;
            };
            self.retire(&id);
            tracing::info!(graph_id = %id, "evicted least recently used graph");
        }
    }

    /// Marks the id as never reusable, then unregisters it. In that order, a racing
    /// Initialize sees either the retired mark or the still-registered entry.
    fn retire(&self, graph_id: &str) -> Option<Arc<GraphEntry>> {
        if !self.graphs.contains_key(graph_id) {
            return None;
        }
        self.retired.insert(graph_id.to_string());
        self.graphs.remove(graph_id).map(|(_, e)| e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_rejects_empty_inputs() {
        let c = GraphController::default();
        assert!(matches!(
            c.initialize("", "thought", None),
            Err(GraphError::InvalidArgument(_))
        ));
        assert!(matches!(
            c.initialize("g", "   ", None),
            Err(GraphError::InvalidArgument(_))
        ));
        assert!(c.is_empty());
    }

    #[test]
    fn initialize_twice_is_already_exists() {
        let c = GraphController::default();
        c.initialize("g", "t", None).unwrap();
        assert!(matches!(
            c.initialize("g", "t2", None),
            Err(GraphError::AlreadyExists(_))
        ));
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn initialize_rejects_invalid_config() {
        let c = GraphController::default();
        let cfg = GraphConfig {
            max_vertices: 0,
            ..GraphConfig::default()
        };
        assert!(matches!(
            c.initialize("g", "t", Some(cfg)),
            Err(GraphError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn removed_graph_id_is_never_reused() {
        let c = GraphController::default();
        c.initialize("g", "t", None).unwrap();
        let removed = c.remove("g").await.unwrap();
        assert_eq!(removed.id, "g");
        assert!(matches!(c.get_state("g").await, Err(GraphError::NotFound { .. })));
        assert!(matches!(
            c.initialize("g", "again", None),
            Err(GraphError::AlreadyExists(_))
        ));
        assert!(matches!(c.remove("g").await, Err(GraphError::NotFound { .. })));
    }

    #[tokio::test]
    async fn capacity_bound_evicts_least_recently_used() {
        let c = GraphController::new(ControllerConfig {
            max_graphs: Some(2),
            ..ControllerConfig::default()
        });
        c.initialize("a", "t", None).unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        c.initialize("b", "t", None).unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        c.get_state("a").await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        c.initialize("c", "t", None).unwrap();
        assert_eq!(c.graph_ids(), vec!["a", "c"]);
    }

    #[tokio::test]
    async fn zero_capacity_still_holds_one_graph() {
        let c = GraphController::new(ControllerConfig {
            max_graphs: Some(0),
            ..ControllerConfig::default()
        });
        c.initialize("a", "t", None).unwrap();
        assert_eq!(c.graph_ids(), vec!["a"]);
        c.initialize("b", "t", None).unwrap();
        assert_eq!(c.graph_ids(), vec!["b"]);
        assert!(matches!(
            c.initialize("a", "t", None),
            Err(GraphError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn finalized_root_stays_root_and_terminal() {
        let c = GraphController::default();
        let root = c.initialize("g", "t", None).unwrap().root_ids[0].clone();
        c.set_terminal_vertices("g", &[root.clone()]).await.unwrap();
        let out = c.prune("g", Some(1.0)).await.unwrap();
        assert!(out.removed_ids.is_empty());
        let s = c.get_state("g").await.unwrap();
        assert_eq!(s.root_ids, vec![root.clone()]);
        assert_eq!(s.terminal_ids, vec![root]);
        assert!(s.active_ids.is_empty());
        assert!(s.check_invariants().is_ok());
    }

    #[tokio::test]
    async fn evict_idle_removes_stale_graphs() {
        let c = GraphController::new(ControllerConfig {
            idle_ttl: Some(Duration::from_millis(10)),
            ..ControllerConfig::default()
        });
        c.initialize("old", "t", None).unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        c.initialize("new", "t", None).unwrap();
        assert_eq!(c.evict_idle(), vec!["old"]);
        assert_eq!(c.graph_ids(), vec!["new"]);
    }

    #[test]
    fn evict_idle_without_ttl_is_noop() {
        let c = GraphController::default();
        c.initialize("g", "t", None).unwrap();
        assert!(c.evict_idle().is_empty());
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn controller_env_overrides() {
        std::env::set_var("THOUGHTGRAPH_GENERATOR_TIMEOUT_MS", "250");
        let cfg = ControllerConfig::default().with_env_overrides();
        std::env::remove_var("THOUGHTGRAPH_GENERATOR_TIMEOUT_MS");
        assert_eq!(cfg.generator_timeout, Some(Duration::from_millis(250)));
    }

    #[tokio::test]
    async fn prune_rejects_out_of_range_threshold() {
        let c = GraphController::default();
        c.initialize("g", "t", None).unwrap();
        assert!(matches!(
            c.prune("g", Some(1.5)).await,
            Err(GraphError::InvalidArgument(_))
        ));
        let out = c.prune("g", None).await.unwrap();
        assert_eq!(out.threshold, 0.3);
        assert_eq!(out.remaining_count, 1);
    }

    #[tokio::test]
    async fn set_terminal_validates_before_mutating() {
        let c = GraphController::default();
        let s = c.initialize("g", "t", None).unwrap();
        let root = s.root_ids[0].clone();
        assert!(matches!(
            c.set_terminal_vertices("g", &[]).await,
            Err(GraphError::InvalidArgument(_))
        ));
        assert!(matches!(
            c.set_terminal_vertices("g", &[root.clone(), "missing".into()]).await,
            Err(GraphError::NotFound { .. })
        ));
        assert!(c.get_state("g").await.unwrap().terminal_ids.is_empty());
        let out = c
            .set_terminal_vertices("g", &[root.clone(), root.clone()])
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        let s = c.get_state("g").await.unwrap();
        assert_eq!(s.terminal_ids, vec![root]);
        assert!(s.active_ids.is_empty());
    }
}
