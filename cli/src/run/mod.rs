//! Subcommand runners. Each builds its own controller from env-derived config and
//! runs under an `info_span` so file logs group per invocation.

mod explore;
mod script;

pub use explore::{run_explore, ExploreOptions};
pub use script::run_script;

use thoughtgraph::{ControllerConfig, GraphConfig};

/// Graph and controller settings after `THOUGHTGRAPH_*` overrides, as JSON.
pub fn effective_config() -> Result<serde_json::Value, crate::CliError> {
    let graph = GraphConfig::default().with_env_overrides();
    graph.validate()?;
    let controller = ControllerConfig::default().with_env_overrides();
    Ok(serde_json::json!({
        "graph": graph,
        "controller": {
            "max_graphs": controller.max_graphs,
            "idle_ttl_secs": controller.idle_ttl.map(|d| d.as_secs()),
            "generator_timeout_ms": controller.generator_timeout.map(|d| d.as_millis() as u64),
        },
        "config_file": config::config_path(crate::APP_NAME)
            .ok()
            .map(|p| p.display().to_string()),
    }))
}
