//! Thought generation boundary.
//!
//! The engine never produces natural-language content itself; it asks an injected
//! [`ThoughtGenerator`] (typically an LLM client) to continue, merge or refine
//! thoughts. Calls may be slow and may fail. The controller makes them with no
//! graph lock held and races them against the caller's cancellation token.
//!
//! [`MockGenerator`] is a deterministic implementation for tests and offline runs.

mod mock;

pub use mock::{MockGenerator, MockOp};

use async_trait::async_trait;

use crate::error::GeneratorError;
use crate::score::Assessment;

/// Produces thought content for the graph.
///
/// The three required operations are the whole contract the controller relies on.
/// `assess` is optional: the default declines, and scoring falls back to local
/// heuristics.
///
/// **Interaction**: Passed as `&dyn ThoughtGenerator` to
/// [`GraphController`](crate::GraphController) generate/aggregate/refine/score, and
/// held as `Arc<dyn ThoughtGenerator>` by [`GotService`](crate::GotService).
#[async_trait]
pub trait ThoughtGenerator: Send + Sync {
    /// Returns up to `k` diverse continuations of `context`, conditioned on `problem`.
    async fn generate(
        &self,
        context: &str,
        problem: &str,
        k: usize,
    ) -> Result<Vec<String>, GeneratorError>;

    /// Merges `contents` into a single synthesis.
    async fn aggregate(&self, contents: &[String], problem: &str)
        -> Result<String, GeneratorError>;

    /// Critiques `context` and returns an improved version. `refinement_count` is how
    /// many times this lineage has been refined already.
    async fn refine(
        &self,
        context: &str,
        problem: &str,
        refinement_count: u32,
    ) -> Result<String, GeneratorError>;

    /// Judges validity, relevance and novelty of `content`. `Ok(None)` means no opinion.
    async fn assess(
        &self,
        _content: &str,
        _problem: &str,
        _siblings: &[String],
    ) -> Result<Option<Assessment>, GeneratorError> {
        Ok(None)
    }
}
