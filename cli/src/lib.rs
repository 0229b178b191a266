//! Thoughtgraph CLI library: drives the engine offline with the deterministic
//! generator, for trying graphs out and for scripting request sequences.
//!
//! - [`run_explore`]: one-call exploration of a problem.
//! - [`run_script`]: feed a JSON list of protocol requests through [`GotService`].
//! - [`effective_config`]: the graph/controller settings after env overrides.

mod display;
mod run;

pub use display::{format_explore_summary, truncate_display};
pub use run::{effective_config, run_explore, run_script, ExploreOptions};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Graph(#[from] thoughtgraph::GraphError),
    #[error("read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Env var naming the log file; see `config::init_logging`.
pub const LOG_FILE_ENV: &str = "LOG_FILE";

/// App name for `.env`/XDG lookup and the `THOUGHTGRAPH_` env prefix.
pub const APP_NAME: &str = "thoughtgraph";
