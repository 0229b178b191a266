//! One-call exploration: initialize → (generate → score → prune → refine)* → finalize.
//!
//! Built entirely on the public [`GraphController`] operations, so it takes the same
//! locks and honours the same limits as a caller driving the graph by hand.
//! Individual score and refine failures are logged and counted; a failed generate
//! or prune ends the run with that error.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::controller::{GenerateParams, GraphController, RefineParams, ScoreParams};
use crate::error::GraphError;
use crate::generator::ThoughtGenerator;
use crate::graph::{GraphConfig, VertexSummary};
use crate::score::AssessMode;

/// Number of top scored vertices marked terminal at the end of a run.
pub const CONCLUSION_COUNT: usize = 3;

const DETAIL_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExploreConfig {
    /// Continuations per source each iteration.
    pub k: usize,
    pub max_iterations: usize,
    pub prune_threshold: f64,
    /// How many of the best scored vertices get refined each iteration.
    pub refine_top_n: usize,
    /// Score every vertex instead of only the active set.
    pub score_all: bool,
    pub assessment: AssessMode,
    pub skip_refine: bool,
    /// Score concurrently rather than one vertex at a time.
    pub parallel_scoring: bool,
}

impl Default for ExploreConfig {
    fn default() -> Self {
        Self {
            k: 3,
            max_iterations: 1,
            prune_threshold: 0.3,
            refine_top_n: 1,
            score_all: false,
            assessment: AssessMode::Heuristic,
            skip_refine: false,
            parallel_scoring: true,
        }
    }
}

impl ExploreConfig {
    /// Two iterations, refines the top two, and lets the generator assess.
    pub fn thorough() -> Self {
        Self {
            max_iterations: 2,
            refine_top_n: 2,
            assessment: AssessMode::Auto,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExploreRequest {
    pub initial_thought: String,
    pub problem: String,
    #[serde(default)]
    pub config: ExploreConfig,
    /// Limits for the created graph; `prune_threshold` is taken from `config`.
    #[serde(default)]
    pub graph_config: Option<GraphConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorationStep {
    pub step: usize,
    /// `initialize`, `generate`, `score`, `prune`, `refine` or `finalize`.
    pub action: String,
    pub vertex_count: usize,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExploreResult {
    pub graph_id: String,
    pub problem: String,
    pub iterations: usize,
    pub total_generated: usize,
    pub total_pruned: usize,
    pub total_refined: usize,
    /// Best scored vertices, now terminal; best first.
    pub conclusions: Vec<VertexSummary>,
    /// Same vertices as `conclusions`, under the name older clients read.
    pub best_vertices: Vec<VertexSummary>,
    pub exploration_path: Vec<ExplorationStep>,
}

impl ExploreResult {
    fn record(&mut self, action: &str, vertex_count: usize, details: String) {
        let step = self.exploration_path.len() + 1;
        tracing::debug!(graph_id = %self.graph_id, step, action, vertex_count, "explore step");
        self.exploration_path.push(ExplorationStep {
            step,
            action: action.to_string(),
            vertex_count,
            details,
        });
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max).collect();
    out.push_str("...");
    out
}

impl GraphController {
    /// Creates `graph_id` and drives a full exploration over it.
    pub async fn explore(
        &self,
        ctx: &CancellationToken,
        generator: &dyn ThoughtGenerator,
        graph_id: &str,
        request: ExploreRequest,
    ) -> Result<ExploreResult, GraphError> {
        if request.problem.trim().is_empty() {
            return Err(GraphError::invalid("problem is required"));
        }
        let cfg = &request.config;
        let mut graph_config = request.graph_config.clone().unwrap_or_default();
        graph_config.prune_threshold = cfg.prune_threshold;

        self.initialize(graph_id, &request.initial_thought, Some(graph_config))?;
        let mut result = ExploreResult {
            graph_id: graph_id.to_string(),
            problem: request.problem.clone(),
            iterations: 0,
            total_generated: 0,
            total_pruned: 0,
            total_refined: 0,
            conclusions: Vec::new(),
            best_vertices: Vec::new(),
            exploration_path: Vec::new(),
        };
        result.record(
            "initialize",
            1,
            format!(
                "Created graph with initial thought: {}",
                truncate(&request.initial_thought, DETAIL_CHARS)
            ),
        );

        for iteration in 1..=cfg.max_iterations {
            let generated = self
                .generate(ctx, generator, graph_id, GenerateParams::new(cfg.k, &request.problem))
                .await?;
            let count = generated.new_vertices.len();
            result.total_generated += count;
            result.iterations = iteration;
            result.record(
                "generate",
                count,
                format!("Iteration {iteration}: generated {count} continuations"),
            );
            if count == 0 {
                break;
            }

            let scored = self.score_round(ctx, generator, graph_id, &request).await?;
            let method = match (cfg.assessment, cfg.parallel_scoring) {
                (AssessMode::Heuristic, _) => "heuristic",
                (AssessMode::Auto, true) => "generator, parallel",
                (AssessMode::Auto, false) => "generator",
            };
            result.record("score", scored, format!("Scored {scored} vertices ({method})"));

            let pruned = self.prune(graph_id, Some(cfg.prune_threshold)).await?;
            result.total_pruned += pruned.removed_count();
            if pruned.removed_count() > 0 {
                result.record(
                    "prune",
                    pruned.removed_count(),
                    format!(
                        "Pruned {} vertices below threshold {:.2}",
                        pruned.removed_count(),
                        pruned.threshold
                    ),
                );
            }

            if !cfg.skip_refine {
                let refined = self.refine_round(ctx, generator, graph_id, &request).await?;
                result.total_refined += refined;
                if refined > 0 {
                    result.record(
                        "refine",
                        refined,
                        format!("Refined {refined} top-scoring vertices"),
                    );
                }
            }
        }

        let best: Vec<String> = self
            .top_scored(graph_id, CONCLUSION_COUNT)
            .await?
            .into_iter()
            .map(|v| v.id)
            .collect();
        if !best.is_empty() {
            let conclusions = self.set_terminal_vertices(graph_id, &best).await?;
            result.conclusions = conclusions.iter().map(|v| v.summary()).collect();
            result.best_vertices = result.conclusions.clone();
        }
        result.record(
            "finalize",
            result.conclusions.len(),
            format!("Finalized with {} best conclusions", result.conclusions.len()),
        );
        tracing::info!(
            graph_id,
            iterations = result.iterations,
            generated = result.total_generated,
            pruned = result.total_pruned,
            refined = result.total_refined,
            conclusions = result.conclusions.len(),
            "exploration finished"
        );
        Ok(result)
    }

    /// Scores the active set (or every vertex). Returns how many scores succeeded.
    async fn score_round(
        &self,
        ctx: &CancellationToken,
        generator: &dyn ThoughtGenerator,
        graph_id: &str,
        request: &ExploreRequest,
    ) -> Result<usize, GraphError> {
        let state = self.get_state(graph_id).await?;
        let targets: Vec<String> = if request.config.score_all {
            state.vertices_in_order().into_iter().map(|v| v.id.clone()).collect()
        } else {
            state.active_ids.clone()
        };
        let params = |id: &String| ScoreParams {
            vertex_id: id.clone(),
            problem: request.problem.clone(),
            mode: request.config.assessment,
        };

        let outcomes = if request.config.parallel_scoring && targets.len() > 1 {
            join_all(
                targets
                    .iter()
                    .map(|id| self.score(ctx, generator, graph_id, params(id))),
            )
            .await
        } else {
            let mut outcomes = Vec::with_capacity(targets.len());
            for id in &targets {
                outcomes.push(self.score(ctx, generator, graph_id, params(id)).await);
            }
            outcomes
        };

        let mut scored = 0;
        for (id, outcome) in targets.iter().zip(outcomes) {
            match outcome {
                Ok(_) => scored += 1,
                Err(e) => tracing::warn!(graph_id, vertex_id = %id, error = %e, "score failed"),
            }
        }
        Ok(scored)
    }

    /// Refines the `refine_top_n` best scored vertices. Returns how many succeeded.
    async fn refine_round(
        &self,
        ctx: &CancellationToken,
        generator: &dyn ThoughtGenerator,
        graph_id: &str,
        request: &ExploreRequest,
    ) -> Result<usize, GraphError> {
        let top = self.top_scored(graph_id, request.config.refine_top_n).await?;
        let mut refined = 0;
        for v in top {
            let params = RefineParams {
                vertex_id: v.id.clone(),
                problem: request.problem.clone(),
            };
            match self.refine(ctx, generator, graph_id, params).await {
                Ok(_) => refined += 1,
                Err(e) => tracing::warn!(graph_id, vertex_id = %v.id, error = %e, "refine failed"),
            }
        }
        Ok(refined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets() {
        let d = ExploreConfig::default();
        assert_eq!((d.k, d.max_iterations, d.refine_top_n), (3, 1, 1));
        assert_eq!(d.assessment, AssessMode::Heuristic);
        let t = ExploreConfig::thorough();
        assert_eq!((t.max_iterations, t.refine_top_n), (2, 2));
        assert_eq!(t.assessment, AssessMode::Auto);
        assert!(t.parallel_scoring);
    }

    #[test]
    fn partial_config_json_fills_defaults() {
        let cfg: ExploreConfig = serde_json::from_str(r#"{"k": 2, "skip_refine": true}"#).unwrap();
        assert_eq!(cfg.k, 2);
        assert!(cfg.skip_refine);
        assert_eq!(cfg.prune_threshold, 0.3);
    }

    #[test]
    fn truncate_counts_chars() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }
}
