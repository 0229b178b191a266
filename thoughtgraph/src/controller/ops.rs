//! Generator-backed operations: Generate, Aggregate, Refine, Score.
//!
//! Each follows the same three phases: validate and snapshot under the read lock,
//! call the generator with no lock held, re-validate and commit under the write
//! lock. A vertex that vanished in between (pruned or replaced concurrently) turns
//! into `NotFound` at commit time rather than a dangling edge.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::{GeneratorError, GraphError};
use crate::generator::ThoughtGenerator;
use crate::graph::{EdgeKind, Vertex, VertexKind};
use crate::score::{AssessMode, ScoreBreakdown, ScoreEngine, VertexProbe};

use super::params::{
    AggregateParams, GenerateOutcome, GenerateParams, RefineParams, ScoreParams, MAX_K,
};
use super::GraphController;

/// One source as seen at snapshot time.
struct SourceSnapshot {
    id: String,
    content: String,
    depth: u32,
}

impl GraphController {
    /// Runs one generator call, racing it against `ctx` and the configured timeout.
    async fn call_generator<T, F>(&self, ctx: &CancellationToken, call: F) -> Result<T, GeneratorError>
    where
        F: Future<Output = Result<T, GeneratorError>>,
    {
        if ctx.is_cancelled() {
            return Err(GeneratorError::Cancelled);
        }
        let limited = async {
            match self.config.generator_timeout {
                Some(limit) => match tokio::time::timeout(limit, call).await {
                    Ok(out) => out,
                    Err(_) => Err(GeneratorError::TimedOut(limit)),
                },
                None => call.await,
            }
        };
        tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(GeneratorError::Cancelled),
            out = limited => out,
        }
    }

    /// Expands each source into up to `k` child thoughts.
    ///
    /// Sources default to the active set. Sources already at `max_depth` are skipped
    /// and reported. Each expanded source leaves the active set and its children
    /// join it. Sources are expanded one at a time; if a later one fails, children
    /// committed for earlier sources stay in the graph.
    pub async fn generate(
        &self,
        ctx: &CancellationToken,
        generator: &dyn ThoughtGenerator,
        graph_id: &str,
        params: GenerateParams,
    ) -> Result<GenerateOutcome, GraphError> {
        if params.k == 0 || params.k > MAX_K {
            return Err(GraphError::invalid(format!(
                "k must be between 1 and {MAX_K}, got {}",
                params.k
            )));
        }
        let entry = self.entry(graph_id)?;

        let (sources, skipped) = {
            let state = entry.state.read().await;
            let requested = if params.source_vertex_ids.is_empty() {
                state.active_ids.clone()
            } else {
                params.source_vertex_ids.clone()
            };
            if requested.is_empty() {
                return Err(GraphError::invalid("no source vertices to expand"));
            }
            let mut sources: Vec<SourceSnapshot> = Vec::new();
            let mut skipped = Vec::new();
            for id in &requested {
                if sources.iter().any(|s| &s.id == id) || skipped.contains(id) {
                    continue;
                }
                let v = state
                    .vertex(id)
                    .ok_or_else(|| GraphError::vertex_not_found(id))?;
                if v.depth >= state.config.max_depth {
                    skipped.push(id.clone());
                } else {
                    sources.push(SourceSnapshot {
                        id: v.id.clone(),
                        content: v.content.clone(),
                        depth: v.depth,
                    });
                }
            }
            (sources, skipped)
        };
        if !skipped.is_empty() {
            tracing::debug!(graph_id, ?skipped, "sources at max depth not expanded");
        }

        let mut new_vertices = Vec::new();
        for source in &sources {
            let raw = self
                .call_generator(ctx, generator.generate(&source.content, &params.problem, params.k))
                .await?;
            let continuations: Vec<String> = raw
                .into_iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .take(params.k)
                .collect();
            if continuations.is_empty() {
                return Err(GeneratorError::Malformed(format!(
                    "no usable continuations for {}",
                    source.id
                ))
                .into());
            }

            let mut state = entry.state.write().await;
            if !state.contains(&source.id) {
                return Err(GraphError::vertex_not_found(&source.id));
            }
            let parents = [source.id.clone()];
            for content in continuations {
                let (id, seq) = self.next_vertex_id(graph_id);
                let vertex = Vertex::new(
                    id,
                    seq,
                    content,
                    VertexKind::Generated,
                    VertexKind::Generated.default_confidence(),
                    source.depth + 1,
                );
                let committed = state
                    .commit_derived(vertex, &parents, EdgeKind::Generation)?
                    .clone();
                state.activate(&committed.id);
                new_vertices.push(committed);
            }
            state.deactivate(&source.id);
            tracing::debug!(graph_id, source = %source.id, "source expanded");
        }

        let active_count = entry.state.read().await.active_ids.len();
        tracing::info!(
            graph_id,
            generated = new_vertices.len(),
            active_count,
            "generate committed"
        );
        Ok(GenerateOutcome {
            new_vertices,
            active_count,
            skipped_sources: skipped,
        })
    }

    /// Merges several vertices into one aggregated vertex one level below the
    /// deepest source. Sources leave the active set; the result joins it.
    pub async fn aggregate(
        &self,
        ctx: &CancellationToken,
        generator: &dyn ThoughtGenerator,
        graph_id: &str,
        params: AggregateParams,
    ) -> Result<Vertex, GraphError> {
        let entry = self.entry(graph_id)?;

        let (contents, depth, confidence) = {
            let state = entry.state.read().await;
            let min_paths = state.config.aggregate_min_paths.max(2);
            if params.vertex_ids.len() < min_paths {
                return Err(GraphError::invalid(format!(
                    "aggregation needs at least {min_paths} vertices, got {}",
                    params.vertex_ids.len()
                )));
            }
            let mut sources: Vec<&Vertex> = Vec::with_capacity(params.vertex_ids.len());
            for id in &params.vertex_ids {
                let v = state
                    .vertex(id)
                    .ok_or_else(|| GraphError::invalid(format!("unknown vertex id: {id}")))?;
                if sources.iter().any(|s| s.id == v.id) {
                    return Err(GraphError::invalid(format!("duplicate vertex id: {id}")));
                }
                sources.push(v);
            }
            let contents: Vec<String> = sources.iter().map(|v| v.content.clone()).collect();
            let depth = sources.iter().map(|v| v.depth).max().unwrap_or(0) + 1;
            let confidences: Vec<f64> = sources.iter().map(|v| v.confidence).collect();
            (contents, depth, ScoreEngine::merge_confidence(&confidences))
        };

        let merged = self
            .call_generator(ctx, generator.aggregate(&contents, &params.problem))
            .await?;
        let merged = merged.trim().to_string();
        if merged.is_empty() {
            return Err(GeneratorError::Malformed("empty aggregation".to_string()).into());
        }

        let mut state = entry.state.write().await;
        let (id, seq) = self.next_vertex_id(graph_id);
        let vertex = Vertex::new(id, seq, merged, VertexKind::Aggregated, confidence, depth);
        let committed = state
            .commit_derived(vertex, &params.vertex_ids, EdgeKind::Aggregation)?
            .clone();
        for source in &params.vertex_ids {
            state.deactivate(source);
        }
        state.activate(&committed.id);
        tracing::info!(
            graph_id,
            vertex_id = %committed.id,
            sources = params.vertex_ids.len(),
            depth,
            "aggregate committed"
        );
        Ok(committed)
    }

    /// Produces an improved version of a vertex at the same depth. The original
    /// leaves the active set; the refinement joins it.
    pub async fn refine(
        &self,
        ctx: &CancellationToken,
        generator: &dyn ThoughtGenerator,
        graph_id: &str,
        params: RefineParams,
    ) -> Result<Vertex, GraphError> {
        let entry = self.entry(graph_id)?;

        let (content, depth, count) = {
            let state = entry.state.read().await;
            let v = state
                .vertex(&params.vertex_id)
                .ok_or_else(|| GraphError::vertex_not_found(&params.vertex_id))?;
            if v.refinement_count >= state.config.max_refinements {
                return Err(GraphError::LimitReached(format!(
                    "vertex {} already refined {} times",
                    v.id, v.refinement_count
                )));
            }
            (v.content.clone(), v.depth, v.refinement_count)
        };

        let improved = self
            .call_generator(ctx, generator.refine(&content, &params.problem, count))
            .await?;
        let improved = improved.trim().to_string();
        if improved.is_empty() {
            return Err(GeneratorError::Malformed("empty refinement".to_string()).into());
        }

        let mut state = entry.state.write().await;
        let (id, seq) = self.next_vertex_id(graph_id);
        let mut vertex = Vertex::new(
            id,
            seq,
            improved,
            VertexKind::Refined,
            VertexKind::Refined.default_confidence(),
            depth,
        );
        vertex.refinement_count = count + 1;
        let parents = [params.vertex_id.clone()];
        let committed = state
            .commit_derived(vertex, &parents, EdgeKind::Refinement)?
            .clone();
        state.deactivate(&params.vertex_id);
        state.activate(&committed.id);
        tracing::info!(
            graph_id,
            original = %params.vertex_id,
            vertex_id = %committed.id,
            refinement_count = committed.refinement_count,
            "refine committed"
        );
        Ok(committed)
    }

    /// Computes and stores a vertex's score. Re-scoring overwrites the old value.
    ///
    /// In [`AssessMode::Auto`] the generator's `assess` hook is consulted first; a
    /// generator error there fails the whole call.
    pub async fn score(
        &self,
        ctx: &CancellationToken,
        generator: &dyn ThoughtGenerator,
        graph_id: &str,
        params: ScoreParams,
    ) -> Result<ScoreBreakdown, GraphError> {
        let entry = self.entry(graph_id)?;

        let (probe, engine) = {
            let state = entry.state.read().await;
            let v = state
                .vertex(&params.vertex_id)
                .ok_or_else(|| GraphError::vertex_not_found(&params.vertex_id))?;
            let siblings = state
                .siblings_of(&v.id)
                .into_iter()
                .map(|s| s.content.clone())
                .collect();
            let probe = VertexProbe {
                content: v.content.clone(),
                depth: v.depth,
                confidence: v.confidence,
                siblings,
            };
            (probe, ScoreEngine::new(&state.config))
        };

        let assessment = match params.mode {
            AssessMode::Heuristic => None,
            AssessMode::Auto => {
                self.call_generator(
                    ctx,
                    generator.assess(&probe.content, &params.problem, &probe.siblings),
                )
                .await?
            }
        };
        let from_generator = assessment.is_some();
        let breakdown = engine.score(&probe, &params.problem, assessment);

        let mut state = entry.state.write().await;
        let Some(v) = state.vertices.get_mut(&params.vertex_id) else {
            return Err(GraphError::vertex_not_found(&params.vertex_id));
        };
        v.score = Some(breakdown.overall);
        state.touch();
        tracing::debug!(
            graph_id,
            vertex_id = %params.vertex_id,
            overall = breakdown.overall,
            from_generator,
            "score committed"
        );
        Ok(breakdown)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::controller::ControllerConfig;
    use crate::generator::{MockGenerator, MockOp};
    use crate::score::Assessment;

    fn setup() -> (GraphController, String) {
        let c = GraphController::default();
        let s = c.initialize("g", "Sort [3,1,2]", None).unwrap();
        let root = s.root_ids[0].clone();
        (c, root)
    }

    #[tokio::test]
    async fn generate_from_active_set_replaces_it_with_children() {
        let (c, root) = setup();
        let g = MockGenerator::new();
        let out = c
            .generate(&CancellationToken::new(), &g, "g", GenerateParams::new(2, "sort"))
            .await
            .unwrap();
        assert_eq!(out.new_vertices.len(), 2);
        assert_eq!(out.active_count, 2);
        let s = c.get_state("g").await.unwrap();
        assert!(!s.is_active(&root));
        for v in &out.new_vertices {
            assert_eq!(v.depth, 1);
            assert_eq!(v.parent_ids, vec![root.clone()]);
            assert!(s.is_active(&v.id));
        }
        assert!(s.check_invariants().is_ok());
    }

    #[tokio::test]
    async fn generate_rejects_bad_k_and_unknown_source() {
        let (c, _) = setup();
        let g = MockGenerator::new();
        let ctx = CancellationToken::new();
        for k in [0, MAX_K + 1] {
            assert!(matches!(
                c.generate(&ctx, &g, "g", GenerateParams::new(k, "p")).await,
                Err(GraphError::InvalidArgument(_))
            ));
        }
        let params = GenerateParams::new(1, "p").from_sources(["nope"]);
        assert!(matches!(
            c.generate(&ctx, &g, "g", params).await,
            Err(GraphError::NotFound { .. })
        ));
        assert_eq!(g.calls(MockOp::Generate), 0);
    }

    #[tokio::test]
    async fn generate_drops_blank_and_excess_continuations() {
        struct Noisy;
        #[async_trait::async_trait]
        impl ThoughtGenerator for Noisy {
            async fn generate(&self, _: &str, _: &str, _: usize) -> Result<Vec<String>, GeneratorError> {
                Ok(vec![" ".into(), "a".into(), "b".into(), "c".into()])
            }
            async fn aggregate(&self, _: &[String], _: &str) -> Result<String, GeneratorError> {
                Ok(String::new())
            }
            async fn refine(&self, _: &str, _: &str, _: u32) -> Result<String, GeneratorError> {
                Ok(String::new())
            }
        }
        let (c, _) = setup();
        let out = c
            .generate(&CancellationToken::new(), &Noisy, "g", GenerateParams::new(2, "p"))
            .await
            .unwrap();
        let contents: Vec<&str> = out.new_vertices.iter().map(|v| v.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn generate_skips_sources_at_max_depth() {
        let c = GraphController::default();
        let cfg = crate::graph::GraphConfig {
            max_depth: 1,
            ..Default::default()
        };
        c.initialize("g", "t", Some(cfg)).unwrap();
        let g = MockGenerator::new();
        let ctx = CancellationToken::new();
        let first = c.generate(&ctx, &g, "g", GenerateParams::new(1, "p")).await.unwrap();
        let child = first.new_vertices[0].id.clone();
        let second = c.generate(&ctx, &g, "g", GenerateParams::new(1, "p")).await.unwrap();
        assert!(second.new_vertices.is_empty());
        assert_eq!(second.skipped_sources, vec![child]);
    }

    #[tokio::test]
    async fn aggregate_requires_two_distinct_known_vertices() {
        let (c, root) = setup();
        let g = MockGenerator::new();
        let ctx = CancellationToken::new();
        let before = c.get_state("g").await.unwrap();
        let one = AggregateParams {
            vertex_ids: vec![root.clone()],
            problem: "p".into(),
        };
        assert!(matches!(
            c.aggregate(&ctx, &g, "g", one).await,
            Err(GraphError::InvalidArgument(_))
        ));
        let dup = AggregateParams {
            vertex_ids: vec![root.clone(), root.clone()],
            problem: "p".into(),
        };
        assert!(matches!(
            c.aggregate(&ctx, &g, "g", dup).await,
            Err(GraphError::InvalidArgument(_))
        ));
        let unknown = AggregateParams {
            vertex_ids: vec![root, "missing".into()],
            problem: "p".into(),
        };
        assert!(matches!(
            c.aggregate(&ctx, &g, "g", unknown).await,
            Err(GraphError::InvalidArgument(_))
        ));
        assert_eq!(g.calls(MockOp::Aggregate), 0);
        let after = c.get_state("g").await.unwrap();
        assert_eq!(before.vertices, after.vertices);
        assert_eq!(before.edges, after.edges);
    }

    #[tokio::test]
    async fn aggregate_goes_below_deepest_source() {
        let (c, root) = setup();
        let g = MockGenerator::new();
        let ctx = CancellationToken::new();
        let gen = c.generate(&ctx, &g, "g", GenerateParams::new(1, "p")).await.unwrap();
        let child = gen.new_vertices[0].id.clone();
        let merged = c
            .aggregate(
                &ctx,
                &g,
                "g",
                AggregateParams {
                    vertex_ids: vec![root.clone(), child.clone()],
                    problem: "p".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(merged.depth, 2);
        assert_eq!(merged.kind, VertexKind::Aggregated);
        assert!((merged.confidence - 0.75).abs() < 1e-9);
        let s = c.get_state("g").await.unwrap();
        assert_eq!(s.active_ids, vec![merged.id.clone()]);
        assert!(s.check_invariants().is_ok());
    }

    #[tokio::test]
    async fn refine_keeps_depth_and_stops_at_limit() {
        let c = GraphController::default();
        let cfg = crate::graph::GraphConfig {
            max_refinements: 1,
            ..Default::default()
        };
        let s = c.initialize("g", "t", Some(cfg)).unwrap();
        let root = s.root_ids[0].clone();
        let g = MockGenerator::new();
        let ctx = CancellationToken::new();
        let refined = c
            .refine(&ctx, &g, "g", RefineParams { vertex_id: root.clone(), problem: "p".into() })
            .await
            .unwrap();
        assert_eq!(refined.depth, 0);
        assert_eq!(refined.refinement_count, 1);
        assert_eq!(refined.parent_ids, vec![root.clone()]);
        let again = c
            .refine(&ctx, &g, "g", RefineParams { vertex_id: refined.id.clone(), problem: "p".into() })
            .await;
        assert!(matches!(again, Err(GraphError::LimitReached(_))));
        assert!(c.get_state("g").await.unwrap().check_invariants().is_ok());
    }

    #[tokio::test]
    async fn score_uses_generator_assessment_in_auto_mode() {
        let (c, root) = setup();
        let perfect = Assessment {
            validity: 1.0,
            relevance: 1.0,
            novelty: 1.0,
        };
        let g = MockGenerator::new().with_assessment(perfect);
        let ctx = CancellationToken::new();
        let auto = c
            .score(&ctx, &g, "g", ScoreParams { vertex_id: root.clone(), problem: "p".into(), mode: AssessMode::Auto })
            .await
            .unwrap();
        assert_eq!(auto.validity, 1.0);
        let heur = c
            .score(&ctx, &g, "g", ScoreParams { vertex_id: root.clone(), problem: "p".into(), mode: AssessMode::Heuristic })
            .await
            .unwrap();
        assert_eq!(g.calls(MockOp::Assess), 1);
        let s = c.get_state("g").await.unwrap();
        assert_eq!(s.vertex(&root).unwrap().score, Some(heur.overall));
    }

    #[tokio::test]
    async fn cancelled_token_prevents_generator_call() {
        let (c, _) = setup();
        let g = MockGenerator::new();
        let ctx = CancellationToken::new();
        ctx.cancel();
        let err = c
            .generate(&ctx, &g, "g", GenerateParams::new(2, "p"))
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::GenerationFailed(GeneratorError::Cancelled)));
        assert_eq!(g.calls(MockOp::Generate), 0);
        assert_eq!(c.get_state("g").await.unwrap().vertex_count(), 1);
    }

    #[tokio::test]
    async fn slow_generator_times_out() {
        let c = GraphController::new(ControllerConfig {
            generator_timeout: Some(Duration::from_millis(20)),
            ..Default::default()
        });
        c.initialize("g", "t", None).unwrap();
        let g = Arc::new(MockGenerator::new().with_delay(Duration::from_millis(500)));
        let err = c
            .generate(&CancellationToken::new(), g.as_ref(), "g", GenerateParams::new(1, "p"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GraphError::GenerationFailed(GeneratorError::TimedOut(_))
        ));
        assert_eq!(c.get_state("g").await.unwrap().vertex_count(), 1);
    }
}
