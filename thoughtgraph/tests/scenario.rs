//! End-to-end walk through the basic lifecycle: initialize, generate, score,
//! prune, finalize, prune again.
//!
//! Scores are forced through a generator that returns a fixed assessment per
//! vertex content, so prune outcomes are exact.


use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use thoughtgraph::{
    AssessMode, Assessment, GenerateParams, GeneratorError, GraphController, MockGenerator,
    ScoreParams, ThoughtGenerator, VertexKind,
};
use tokio_util::sync::CancellationToken;

/// Delegates content to [`MockGenerator`] and assesses from a lookup table.
struct Graded {
    inner: MockGenerator,
    grades: Mutex<HashMap<String, f64>>,
}

impl Graded {
    fn new() -> Self {
        Self {
            inner: MockGenerator::new(),
            grades: Mutex::new(HashMap::new()),
        }
    }

    fn grade(&self, content: &str, value: f64) {
        self.grades.lock().unwrap().insert(content.to_string(), value);
    }
}

#[async_trait]
impl ThoughtGenerator for Graded {
    async fn generate(&self, context: &str, problem: &str, k: usize) -> Result<Vec<String>, GeneratorError> {
        self.inner.generate(context, problem, k).await
    }

    async fn aggregate(&self, contents: &[String], problem: &str) -> Result<String, GeneratorError> {
        self.inner.aggregate(contents, problem).await
    }

    async fn refine(&self, context: &str, problem: &str, n: u32) -> Result<String, GeneratorError> {
        self.inner.refine(context, problem, n).await
    }

    async fn assess(
        &self,
        content: &str,
        _problem: &str,
        _siblings: &[String],
    ) -> Result<Option<Assessment>, GeneratorError> {
        let grade = self.grades.lock().unwrap().get(content).copied();
        Ok(grade.map(|g| Assessment {
            validity: g,
            relevance: g,
            novelty: g,
        }))
    }
}

#[tokio::test]
async fn sort_problem_lifecycle() {
    let controller = GraphController::default();
    let generator = Graded::new();
    let ctx = CancellationToken::new();
    let problem = "Sort [3,1,2]";

    let state = controller.initialize("g1", problem, None).unwrap();
    assert_eq!(state.vertex_count(), 1);
    let v0 = state.root_ids[0].clone();
    let root = state.vertex(&v0).unwrap();
    assert_eq!(root.kind, VertexKind::Root);
    assert_eq!(root.depth, 0);

    let out = controller
        .generate(
            &ctx,
            &generator,
            "g1",
            GenerateParams::new(2, problem).from_sources([v0.clone()]),
        )
        .await
        .unwrap();
    assert_eq!(out.new_vertices.len(), 2);
    assert_eq!(out.active_count, 2);
    let (v1, v2) = (&out.new_vertices[0], &out.new_vertices[1]);
    assert_eq!((v1.depth, v2.depth), (1, 1));

    let heuristic = controller
        .score(
            &ctx,
            &generator,
            "g1",
            ScoreParams {
                vertex_id: v1.id.clone(),
                problem: problem.into(),
                mode: AssessMode::Heuristic,
            },
        )
        .await
        .unwrap();
    assert!((0.0..=1.0).contains(&heuristic.overall));

    // Generator-judged: v1 excellent, v2 poor.
    generator.grade(&v1.content, 1.0);
    generator.grade(&v2.content, 0.0);
    for v in [v1, v2] {
        controller
            .score(
                &ctx,
                &generator,
                "g1",
                ScoreParams {
                    vertex_id: v.id.clone(),
                    problem: problem.into(),
                    mode: AssessMode::Auto,
                },
            )
            .await
            .unwrap();
    }
    let scored = controller.get_state("g1").await.unwrap();
    let s1 = scored.vertex(&v1.id).unwrap().score.unwrap();
    let s2 = scored.vertex(&v2.id).unwrap().score.unwrap();
    assert!(s1 > 0.5, "v1 scored {s1}");
    assert!(s2 < 0.5, "v2 scored {s2}");

    let pruned = controller.prune("g1", Some(0.5)).await.unwrap();
    assert_eq!(pruned.removed_count(), 1);
    assert_eq!(pruned.remaining_count, 2);
    assert_eq!(pruned.removed_ids, vec![v2.id.clone()]);

    let conclusions = controller
        .set_terminal_vertices("g1", &[v1.id.clone()])
        .await
        .unwrap();
    assert_eq!(conclusions.len(), 1);
    let state = controller.get_state("g1").await.unwrap();
    assert_eq!(state.terminal_ids, vec![v1.id.clone()]);

    let pruned = controller.prune("g1", Some(1.0)).await.unwrap();
    assert_eq!(pruned.removed_count(), 0);
    let state = controller.get_state("g1").await.unwrap();
    assert!(state.contains(&v1.id));
    assert!(state.contains(&v0));
    assert!(state.check_invariants().is_ok());
}
