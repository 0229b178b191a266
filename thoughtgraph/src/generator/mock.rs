//! Deterministic generator for tests and offline runs.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::GeneratorError;
use crate::score::Assessment;

use super::ThoughtGenerator;

/// Generator operations, for failure injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    Generate,
    Aggregate,
    Refine,
    Assess,
}

const STRATEGIES: &[&str] = &[
    "partition",
    "recursion",
    "invariant",
    "greedy",
    "induction",
    "counterexample",
    "decomposition",
    "simulation",
    "memoization",
    "bisection",
];

const EXCERPT_CHARS: usize = 60;

/// Mock generator: templated, reproducible content.
///
/// Each generate call cycles through a fixed list of strategy words so sibling
/// continuations differ. Builder methods inject failures, latency and a fixed
/// assessment.
///
/// ```rust
/// use thoughtgraph::{MockGenerator, MockOp};
/// let g = MockGenerator::new().failing(MockOp::Refine);
/// assert_eq!(g.calls(MockOp::Refine), 0);
/// ```
#[derive(Debug, Default)]
pub struct MockGenerator {
    failing: HashSet<MockOp>,
    fail_generate_after: Option<usize>,
    max_continuations: Option<usize>,
    delay: Option<Duration>,
    assessment: Option<Assessment>,
    generate_calls: AtomicUsize,
    aggregate_calls: AtomicUsize,
    refine_calls: AtomicUsize,
    assess_calls: AtomicUsize,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call of `op` fails with [`GeneratorError::Failed`].
    pub fn failing(mut self, op: MockOp) -> Self {
        self.failing.insert(op);
        self
    }

    /// The first `n` generate calls succeed, later ones fail.
    pub fn failing_generate_after(mut self, n: usize) -> Self {
        self.fail_generate_after = Some(n);
        self
    }

    /// Return at most `n` continuations regardless of the requested k.
    pub fn with_max_continuations(mut self, n: usize) -> Self {
        self.max_continuations = Some(n);
        self
    }

    /// Sleep before answering every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// `assess` answers with this instead of declining.
    pub fn with_assessment(mut self, assessment: Assessment) -> Self {
        self.assessment = Some(assessment);
        self
    }

    /// Number of calls made to `op` so far, including failed ones.
    pub fn calls(&self, op: MockOp) -> usize {
        self.counter(op).load(Ordering::SeqCst)
    }

    fn counter(&self, op: MockOp) -> &AtomicUsize {
        match op {
            MockOp::Generate => &self.generate_calls,
            MockOp::Aggregate => &self.aggregate_calls,
            MockOp::Refine => &self.refine_calls,
            MockOp::Assess => &self.assess_calls,
        }
    }

    /// Counts the call, waits out the configured delay, and applies failure injection.
    /// Returns the zero-based call number.
    async fn enter(&self, op: MockOp) -> Result<usize, GeneratorError> {
        let n = self.counter(op).fetch_add(1, Ordering::SeqCst);
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        if self.failing.contains(&op) {
            return Err(GeneratorError::Failed(format!("mock {op:?} failure")));
        }
        if op == MockOp::Generate && self.fail_generate_after.is_some_and(|limit| n >= limit) {
            return Err(GeneratorError::Failed(format!(
                "mock generate failure after {n} calls"
            )));
        }
        Ok(n)
    }
}

fn excerpt(text: &str) -> String {
    let mut out: String = text.chars().take(EXCERPT_CHARS).collect();
    if text.chars().count() > EXCERPT_CHARS {
        out.push_str("...");
    }
    out
}

#[async_trait]
impl ThoughtGenerator for MockGenerator {
    async fn generate(
        &self,
        context: &str,
        problem: &str,
        k: usize,
    ) -> Result<Vec<String>, GeneratorError> {
        let call = self.enter(MockOp::Generate).await?;
        let k = self.max_continuations.map_or(k, |cap| k.min(cap));
        let goal = if problem.trim().is_empty() {
            "the problem"
        } else {
            problem.trim()
        };
        Ok((0..k)
            .map(|i| {
                let strategy = STRATEGIES[(call * k + i) % STRATEGIES.len()];
                format!(
                    "Consider a {strategy} approach to {goal}; building on \"{}\", next apply {strategy} step {}.",
                    excerpt(context),
                    i + 1
                )
            })
            .collect())
    }

    async fn aggregate(&self, contents: &[String], problem: &str) -> Result<String, GeneratorError> {
        self.enter(MockOp::Aggregate).await?;
        let parts: Vec<String> = contents.iter().map(|c| excerpt(c)).collect();
        Ok(format!(
            "Synthesis of {} thoughts for {}: {}",
            contents.len(),
            problem.trim(),
            parts.join(" | ")
        ))
    }

    async fn refine(
        &self,
        context: &str,
        _problem: &str,
        refinement_count: u32,
    ) -> Result<String, GeneratorError> {
        self.enter(MockOp::Refine).await?;
        Ok(format!(
            "{} [refinement {}: tightened because the earlier draft skipped an edge case]",
            excerpt(context),
            refinement_count + 1
        ))
    }

    async fn assess(
        &self,
        _content: &str,
        _problem: &str,
        _siblings: &[String],
    ) -> Result<Option<Assessment>, GeneratorError> {
        self.enter(MockOp::Assess).await?;
        Ok(self.assessment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn generate_returns_k_distinct_continuations() {
        let g = MockGenerator::new();
        let out = g.generate("start", "sort [3,1,2]", 3).await.unwrap();
        assert_eq!(out.len(), 3);
        let distinct: HashSet<&String> = out.iter().collect();
        assert_eq!(distinct.len(), 3);
        assert_eq!(g.calls(MockOp::Generate), 1);
    }

    #[tokio::test]
    async fn max_continuations_caps_output() {
        let g = MockGenerator::new().with_max_continuations(1);
        assert_eq!(g.generate("c", "p", 4).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failing_op_errors_and_still_counts() {
        let g = MockGenerator::new().failing(MockOp::Aggregate);
        let err = g.aggregate(&["a".into(), "b".into()], "p").await.unwrap_err();
        assert!(matches!(err, GeneratorError::Failed(_)));
        assert_eq!(g.calls(MockOp::Aggregate), 1);
    }

    #[tokio::test]
    async fn generate_fails_after_budget() {
        let g = MockGenerator::new().failing_generate_after(1);
        assert!(g.generate("c", "p", 1).await.is_ok());
        assert!(g.generate("c", "p", 1).await.is_err());
    }

    #[tokio::test]
    async fn refine_mentions_next_refinement_number() {
        let g = MockGenerator::new();
        let out = g.refine("draft", "p", 2).await.unwrap();
        assert!(out.starts_with("draft"));
        assert!(out.contains("refinement 3"));
    }

    #[tokio::test]
    async fn assess_returns_configured_assessment() {
        let a = Assessment {
            validity: 0.9,
            relevance: 0.8,
            novelty: 0.7,
        };
        let g = MockGenerator::new().with_assessment(a);
        assert_eq!(g.assess("c", "p", &[]).await.unwrap(), Some(a));
        assert_eq!(MockGenerator::new().assess("c", "p", &[]).await.unwrap(), None);
    }

    #[test]
    fn excerpt_truncates_on_char_boundary() {
        let long = "é".repeat(100);
        let e = excerpt(&long);
        assert_eq!(e.chars().count(), EXCERPT_CHARS + 3);
    }
}
