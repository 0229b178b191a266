//! # Thoughtgraph
//!
//! A Graph-of-Thoughts reasoning engine. Candidate thoughts are vertices in a
//! directed acyclic graph; the engine grows the graph by asking an injected
//! [`ThoughtGenerator`] to continue, merge or refine thoughts, scores vertices on
//! several criteria, and prunes weak branches until the caller marks conclusions.
//!
//! ## Design principles
//!
//! - **Explicit registry**: one [`GraphController`] owns every graph. The caller
//!   constructs it and shares it as `Arc<GraphController>`; there is no global state.
//! - **Lock per graph**: operations on different graphs never contend; operations on
//!   the same graph are serialised. Generator calls happen with no lock held.
//! - **Narrow generator boundary**: three required operations (generate, aggregate,
//!   refine) plus an optional assessment hook. [`MockGenerator`] makes the whole
//!   engine testable offline.
//! - **Closed vertex kinds**: [`VertexKind`] is an enum; engine logic matches on it.
//!
//! ## Main modules
//!
//! - [`graph`]: [`Vertex`], [`Edge`], [`GraphState`], [`GraphConfig`].
//! - [`controller`]: [`GraphController`] and operation parameters.
//! - [`generator`]: [`ThoughtGenerator`], [`MockGenerator`].
//! - [`score`]: [`ScoreEngine`], [`ScoreBreakdown`], [`Assessment`].
//! - [`prune`]: [`PruningEngine`], [`PruneOutcome`].
//! - [`explore`]: one-call orchestration ([`ExploreConfig`], [`ExploreResult`]).
//! - [`protocol`]: op-tagged JSON requests and [`GotService`].
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use thoughtgraph::{GenerateParams, GraphController, MockGenerator};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), thoughtgraph::GraphError> {
//! let controller = GraphController::default();
//! let generator = MockGenerator::new();
//! let ctx = CancellationToken::new();
//!
//! controller.initialize("g1", "Sort [3,1,2]", None)?;
//! let out = controller
//!     .generate(&ctx, &generator, "g1", GenerateParams::new(2, "Sort [3,1,2]"))
//!     .await?;
//! assert_eq!(out.new_vertices.len(), 2);
//! # Ok(())
//! # }
//! ```

pub mod controller;
pub mod error;
pub mod explore;
pub mod generator;
pub mod graph;
pub mod protocol;
pub mod prune;
pub mod score;

pub use controller::{
    AggregateParams, ControllerConfig, GenerateOutcome, GenerateParams, GraphController,
    RefineParams, ScoreParams, MAX_K,
};
pub use error::{GeneratorError, GraphError};
pub use explore::{ExplorationStep, ExploreConfig, ExploreRequest, ExploreResult};
pub use generator::{MockGenerator, MockOp, ThoughtGenerator};
pub use graph::{Edge, EdgeKind, GraphConfig, GraphState, Vertex, VertexKind, VertexSummary};
pub use protocol::{ErrorResponse, GotRequest, GotResponse, GotService, ProtocolError};
pub use prune::{PruneOutcome, PrunePlan, PruningEngine};
pub use score::{AssessMode, Assessment, ScoreBreakdown, ScoreEngine, ScoreWeights, VertexProbe};
