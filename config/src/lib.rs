//! Load configuration from XDG `config.toml` and project `.env`, then apply it to the
//! process environment with priority: **existing env > .env > XDG**.
//!
//! The XDG file may carry three tables:
//!
//! ```toml
//! [env]            # copied verbatim
//! RUST_LOG = "thoughtgraph=debug"
//!
//! [graph]          # becomes THOUGHTGRAPH_MAX_VERTICES, THOUGHTGRAPH_PRUNE_THRESHOLD, ...
//! max_vertices = 80
//! prune_threshold = 0.4
//!
//! [controller]     # becomes THOUGHTGRAPH_MAX_GRAPHS, THOUGHTGRAPH_GENERATOR_TIMEOUT_MS, ...
//! max_graphs = 16
//! ```
//!
//! Setting tables are prefixed with the upper-cased app name, so the engine only ever
//! reads environment variables.

mod dotenv;
#[cfg(feature = "tracing-init")]
mod tracing_init;
mod xdg_toml;

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

#[cfg(feature = "tracing-init")]
pub use tracing_init::{init_logging, LogGuard};
pub use xdg_toml::config_path;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("xdg config path: {0}")]
    XdgPath(String),
    #[error("read xdg config: {0}")]
    XdgRead(std::io::Error),
    #[error("parse xdg toml: {0}")]
    XdgParse(#[from] toml::de::Error),
    #[error("unsupported value for {key}: tables and arrays are not allowed")]
    XdgValue { key: String },
    #[error("read .env: {0}")]
    DotenvRead(std::io::Error),
    #[error("logging setup: {0}")]
    Logging(String),
}

/// Env var prefix for an app's setting tables: `"thoughtgraph"` → `"THOUGHTGRAPH_"`.
pub fn env_prefix(app_name: &str) -> String {
    let mut prefix: String = app_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    prefix.push('_');
    prefix
}

/// Loads XDG `config.toml` and the optional project `.env`, then sets each key that is
/// **not** already present in the process environment.
///
/// When a key is missing from the environment:
/// 1. the value from `.env` (in `override_dir`, else the current directory) wins;
/// 2. otherwise the value from `$XDG_CONFIG_HOME/<app_name>/config.toml`.
///
/// Returns the keys that were set.
pub fn load_and_apply(app_name: &str, override_dir: Option<&Path>) -> Result<Vec<String>, LoadError> {
    let xdg_map = xdg_toml::load_env_map(app_name)?;
    let dotenv_map = dotenv::load_env_map(override_dir).map_err(LoadError::DotenvRead)?;
    let merged = merge(xdg_map, dotenv_map);

    let mut applied = Vec::new();
    for (key, value) in merged {
        if std::env::var_os(&key).is_some() {
            continue;
        }
        std::env::set_var(&key, value);
        applied.push(key);
    }
    applied.sort();
    Ok(applied)
}

/// `.env` entries replace XDG entries with the same key.
fn merge(
    mut xdg: HashMap<String, String>,
    dotenv: HashMap<String, String>,
) -> HashMap<String, String> {
    xdg.extend(dotenv);
    xdg
}
