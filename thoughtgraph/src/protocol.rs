//! # Protocol module
//!
//! Request/response records for the graph operations, with the field names
//! collaborators rely on, plus an op-tagged envelope and [`GotService`], which
//! dispatches envelopes onto a shared [`GraphController`].
//!
//! Every vertex in a response is a [`VertexSummary`]. Failures serialize as
//! `{"error": {"kind": "...", "message": "..."}}`. No transport is implied: the
//! embedding application moves the JSON.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::controller::{
    AggregateParams, GenerateParams, GraphController, RefineParams, ScoreParams,
};
use crate::error::GraphError;
use crate::explore::{ExploreRequest as ExploreSpec, ExploreResult};
use crate::generator::ThoughtGenerator;
use crate::graph::{Edge, GraphConfig, GraphState, Vertex, VertexSummary};
use crate::score::{AssessMode, ScoreBreakdown};

// -----------------------------------------------------------------------------
// Requests
// -----------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InitializeRequest {
    pub graph_id: String,
    pub initial_thought: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<GraphConfig>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub graph_id: String,
    pub k: usize,
    /// Empty means the active set.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_ids: Vec<String>,
    #[serde(default)]
    pub problem: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AggregateRequest {
    pub graph_id: String,
    pub vertex_ids: Vec<String>,
    #[serde(default)]
    pub problem: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RefineRequest {
    pub graph_id: String,
    pub vertex_id: String,
    #[serde(default)]
    pub problem: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScoreRequest {
    pub graph_id: String,
    pub vertex_id: String,
    #[serde(default)]
    pub problem: String,
    #[serde(default)]
    pub mode: AssessMode,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PruneRequest {
    pub graph_id: String,
    /// Absent or zero means the graph's configured threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FinalizeRequest {
    pub graph_id: String,
    pub terminal_ids: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetStateRequest {
    pub graph_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExploreRequest {
    pub graph_id: String,
    #[serde(flatten)]
    pub explore: ExploreSpec,
}

/// Request envelope. Each variant maps to a JSON object with `"op": "<variant_name>"`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum GotRequest {
    Initialize(InitializeRequest),
    Generate(GenerateRequest),
    Aggregate(AggregateRequest),
    Refine(RefineRequest),
    Score(ScoreRequest),
    Prune(PruneRequest),
    Finalize(FinalizeRequest),
    GetState(GetStateRequest),
    Explore(ExploreRequest),
}

impl GotRequest {
    pub fn graph_id(&self) -> &str {
        match self {
            Self::Initialize(r) => &r.graph_id,
            Self::Generate(r) => &r.graph_id,
            Self::Aggregate(r) => &r.graph_id,
            Self::Refine(r) => &r.graph_id,
            Self::Score(r) => &r.graph_id,
            Self::Prune(r) => &r.graph_id,
            Self::Finalize(r) => &r.graph_id,
            Self::GetState(r) => &r.graph_id,
            Self::Explore(r) => &r.graph_id,
        }
    }

    pub fn op(&self) -> &'static str {
        match self {
            Self::Initialize(_) => "initialize",
            Self::Generate(_) => "generate",
            Self::Aggregate(_) => "aggregate",
            Self::Refine(_) => "refine",
            Self::Score(_) => "score",
            Self::Prune(_) => "prune",
            Self::Finalize(_) => "finalize",
            Self::GetState(_) => "get_state",
            Self::Explore(_) => "explore",
        }
    }
}

// -----------------------------------------------------------------------------
// Responses
// -----------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InitializeResponse {
    pub graph_id: String,
    pub root_id: String,
    pub config: GraphConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub new_vertices: Vec<VertexSummary>,
    pub active_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_sources: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AggregateResponse {
    pub aggregated_vertex: VertexSummary,
    pub source_count: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RefineResponse {
    pub refined_vertex: VertexSummary,
    pub refinement_count: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScoreResponse {
    pub vertex_id: String,
    pub breakdown: ScoreBreakdown,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PruneResponse {
    pub removed_count: usize,
    pub remaining_count: usize,
    pub threshold: f64,
    #[serde(default)]
    pub removed_ids: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FinalizeResponse {
    pub terminal_ids: Vec<String>,
    pub conclusions: Vec<VertexSummary>,
}

/// Full dump of a graph; vertices in creation order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetStateResponse {
    pub graph_id: String,
    pub vertices: Vec<Vertex>,
    pub edges: Vec<Edge>,
    pub root_ids: Vec<String>,
    pub active_ids: Vec<String>,
    pub terminal_ids: Vec<String>,
    pub config: GraphConfig,
}

impl From<GraphState> for GetStateResponse {
    fn from(state: GraphState) -> Self {
        let vertices = state.vertices_in_order().into_iter().cloned().collect();
        Self {
            graph_id: state.id,
            vertices,
            edges: state.edges,
            root_ids: state.root_ids,
            active_ids: state.active_ids,
            terminal_ids: state.terminal_ids,
            config: state.config,
        }
    }
}

/// Response envelope, tagged like [`GotRequest`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum GotResponse {
    Initialize(InitializeResponse),
    Generate(GenerateResponse),
    Aggregate(AggregateResponse),
    Refine(RefineResponse),
    Score(ScoreResponse),
    Prune(PruneResponse),
    Finalize(FinalizeResponse),
    GetState(GetStateResponse),
    Explore(ExploreResult),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

// -----------------------------------------------------------------------------
// Service
// -----------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("invalid request: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ProtocolError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Graph(e) => e.kind(),
            Self::Decode(_) => "invalid_request",
        }
    }

    pub fn to_body(&self) -> ErrorResponse {
        ErrorResponse {
            error: ErrorBody {
                kind: self.kind().to_string(),
                message: self.to_string(),
            },
        }
    }
}

/// Dispatches protocol requests onto a controller with one generator.
///
/// Every request runs under a child of the service's cancellation token, so
/// cancelling the service aborts in-flight generator calls.
///
/// **Interaction**: Shares the [`GraphController`] with any other holder of the
/// same `Arc`; the CLI's `script` subcommand feeds it a JSON list of requests.
#[derive(Clone)]
pub struct GotService {
    controller: Arc<GraphController>,
    generator: Arc<dyn ThoughtGenerator>,
    cancel: CancellationToken,
}

impl GotService {
    pub fn new(controller: Arc<GraphController>, generator: Arc<dyn ThoughtGenerator>) -> Self {
        Self {
            controller,
            generator,
            cancel: CancellationToken::new(),
        }
    }

    /// Use `cancel` as the parent token for every request.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn controller(&self) -> &Arc<GraphController> {
        &self.controller
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub async fn handle(&self, request: GotRequest) -> Result<GotResponse, ProtocolError> {
        if request.graph_id().trim().is_empty() {
            return Err(GraphError::invalid("graph_id is required").into());
        }
        let ctx = self.cancel.child_token();
        let c = &self.controller;
        let g = self.generator.as_ref();
        tracing::debug!(op = request.op(), graph_id = request.graph_id(), "handling request");

        let response = match request {
            GotRequest::Initialize(r) => {
                let state = c.initialize(&r.graph_id, &r.initial_thought, r.config)?;
                let root_id = state.root_ids.first().cloned().unwrap_or_default();
                GotResponse::Initialize(InitializeResponse {
                    graph_id: state.id,
                    root_id,
                    config: state.config,
                })
            }
            GotRequest::Generate(r) => {
                let params = GenerateParams::new(r.k, r.problem).from_sources(r.source_ids);
                let out = c.generate(&ctx, g, &r.graph_id, params).await?;
                GotResponse::Generate(GenerateResponse {
                    new_vertices: out.new_vertices.iter().map(Vertex::summary).collect(),
                    active_count: out.active_count,
                    skipped_sources: out.skipped_sources,
                })
            }
            GotRequest::Aggregate(r) => {
                let source_count = r.vertex_ids.len();
                let params = AggregateParams {
                    vertex_ids: r.vertex_ids,
                    problem: r.problem,
                };
                let v = c.aggregate(&ctx, g, &r.graph_id, params).await?;
                GotResponse::Aggregate(AggregateResponse {
                    aggregated_vertex: v.summary(),
                    source_count,
                })
            }
            GotRequest::Refine(r) => {
                let params = RefineParams {
                    vertex_id: r.vertex_id,
                    problem: r.problem,
                };
                let v = c.refine(&ctx, g, &r.graph_id, params).await?;
                GotResponse::Refine(RefineResponse {
                    refinement_count: v.refinement_count,
                    refined_vertex: v.summary(),
                })
            }
            GotRequest::Score(r) => {
                let params = ScoreParams {
                    vertex_id: r.vertex_id.clone(),
                    problem: r.problem,
                    mode: r.mode,
                };
                let breakdown = c.score(&ctx, g, &r.graph_id, params).await?;
                GotResponse::Score(ScoreResponse {
                    vertex_id: r.vertex_id,
                    breakdown,
                })
            }
            GotRequest::Prune(r) => {
                let out = c.prune(&r.graph_id, r.threshold).await?;
                GotResponse::Prune(PruneResponse {
                    removed_count: out.removed_count(),
                    remaining_count: out.remaining_count,
                    threshold: out.threshold,
                    removed_ids: out.removed_ids,
                })
            }
            GotRequest::Finalize(r) => {
                let conclusions = c.set_terminal_vertices(&r.graph_id, &r.terminal_ids).await?;
                GotResponse::Finalize(FinalizeResponse {
                    terminal_ids: conclusions.iter().map(|v| v.id.clone()).collect(),
                    conclusions: conclusions.iter().map(Vertex::summary).collect(),
                })
            }
            GotRequest::GetState(r) => {
                GotResponse::GetState(c.get_state(&r.graph_id).await?.into())
            }
            GotRequest::Explore(r) => {
                GotResponse::Explore(c.explore(&ctx, g, &r.graph_id, r.explore).await?)
            }
        };
        Ok(response)
    }

    /// Decodes, handles and encodes one request. Never fails: errors become an
    /// [`ErrorResponse`] value.
    pub async fn handle_json(&self, request: serde_json::Value) -> serde_json::Value {
        let outcome = match serde_json::from_value::<GotRequest>(request) {
            Ok(request) => self.handle(request).await,
            Err(e) => Err(ProtocolError::from(e)),
        };
        let encoded = match outcome {
            Ok(response) => serde_json::to_value(&response).map_err(ProtocolError::from),
            Err(e) => Err(e),
        };
        match encoded {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(kind = e.kind(), error = %e, "request failed");
                serde_json::to_value(e.to_body()).unwrap_or(serde_json::Value::Null)
            }
        }
    }
}
