//! Graph data model: vertices, edges, per-graph state and configuration.

mod config;
mod edge;
mod state;
mod vertex;

pub use config::{GraphConfig, ENV_PREFIX};
pub(crate) use config::{env_override, unit_interval};
pub use edge::{Edge, EdgeKind};
pub use state::GraphState;
pub use vertex::{Vertex, VertexKind, VertexSummary};
