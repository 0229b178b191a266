//! Per-graph limits and tunables, frozen into a [`GraphState`](super::GraphState) at Initialize.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::score::ScoreWeights;

/// Env var prefix shared by every override read in this crate.
pub const ENV_PREFIX: &str = "THOUGHTGRAPH_";

/// Reads `THOUGHTGRAPH_<key>` and parses it. Unset yields `None`; an unparsable
/// value is logged and ignored.
pub(crate) fn env_override<T: FromStr>(key: &str) -> Option<T> {
    let name = format!("{ENV_PREFIX}{key}");
    let raw = std::env::var(&name).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(var = %name, value = %raw, "ignoring unparsable config override");
            None
        }
    }
}

/// Limits and scoring knobs for one graph.
///
/// Every field has a default, so a partial JSON/TOML object deserializes cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Total vertex limit.
    pub max_vertices: usize,
    /// Upper bound for an explicit `set_active_vertices` call.
    pub max_active_vertices: usize,
    /// Sources at this depth are not expanded by Generate.
    pub max_depth: u32,
    /// Refine fails once a vertex has been refined this many times.
    pub max_refinements: u32,
    /// Used by Prune when the caller passes no (or a zero) threshold.
    pub prune_threshold: f64,
    /// Minimum number of vertices Aggregate accepts; never below 2.
    pub aggregate_min_paths: usize,
    /// How strongly similarity to siblings depresses heuristic novelty, in [0, 1].
    pub diversity_penalty: f64,
    /// Depth at which the depth factor peaks before it starts decaying.
    pub preferred_depth: u32,
    pub score_weights: ScoreWeights,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_vertices: 50,
            max_active_vertices: 10,
            max_depth: 7,
            max_refinements: 3,
            prune_threshold: 0.3,
            aggregate_min_paths: 2,
            diversity_penalty: 0.1,
            preferred_depth: 3,
            score_weights: ScoreWeights::default(),
        }
    }
}

impl GraphConfig {
    /// Overlays `THOUGHTGRAPH_*` environment variables on top of `self`.
    ///
    /// Call after `config::load_and_apply` so `.env` and XDG values are visible.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_override("MAX_VERTICES") {
            self.max_vertices = v;
        }
        if let Some(v) = env_override("MAX_ACTIVE_VERTICES") {
            self.max_active_vertices = v;
        }
        if let Some(v) = env_override("MAX_DEPTH") {
            self.max_depth = v;
        }
        if let Some(v) = env_override("MAX_REFINEMENTS") {
            self.max_refinements = v;
        }
        if let Some(v) = env_override("PRUNE_THRESHOLD") {
            self.prune_threshold = v;
        }
        if let Some(v) = env_override("AGGREGATE_MIN_PATHS") {
            self.aggregate_min_paths = v;
        }
        if let Some(v) = env_override("DIVERSITY_PENALTY") {
            self.diversity_penalty = v;
        }
        if let Some(v) = env_override("PREFERRED_DEPTH") {
            self.preferred_depth = v;
        }
        self
    }

    /// Rejects configurations the engine cannot honor.
    pub fn validate(&self) -> Result<(), GraphError> {
        if self.max_vertices == 0 {
            return Err(GraphError::invalid("max_vertices must be at least 1"));
        }
        if self.max_active_vertices == 0 {
            return Err(GraphError::invalid("max_active_vertices must be at least 1"));
        }
        if self.aggregate_min_paths < 2 {
            return Err(GraphError::invalid("aggregate_min_paths must be at least 2"));
        }
        if !unit_interval(self.prune_threshold) {
            return Err(GraphError::invalid(format!(
                "prune_threshold must be within [0, 1], got {}",
                self.prune_threshold
            )));
        }
        if !unit_interval(self.diversity_penalty) {
            return Err(GraphError::invalid(format!(
                "diversity_penalty must be within [0, 1], got {}",
                self.diversity_penalty
            )));
        }
        self.score_weights.validate().map_err(GraphError::InvalidArgument)
    }
}

pub(crate) fn unit_interval(x: f64) -> bool {
    x.is_finite() && (0.0..=1.0).contains(&x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let c = GraphConfig::default();
        assert!(c.validate().is_ok());
        assert_eq!(c.max_vertices, 50);
        assert_eq!(c.prune_threshold, 0.3);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let c: GraphConfig = serde_json::from_str(r#"{"max_depth": 2}"#).unwrap();
        assert_eq!(c.max_depth, 2);
        assert_eq!(c.max_vertices, 50);
        assert_eq!(c.score_weights, ScoreWeights::default());
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let c = GraphConfig {
            prune_threshold: 1.5,
            ..GraphConfig::default()
        };
        assert!(matches!(c.validate(), Err(GraphError::InvalidArgument(_))));
        let c = GraphConfig {
            prune_threshold: f64::NAN,
            ..GraphConfig::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn aggregate_min_paths_below_two_is_rejected() {
        let c = GraphConfig {
            aggregate_min_paths: 1,
            ..GraphConfig::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn env_overrides_apply_and_ignore_garbage() {
        std::env::set_var("THOUGHTGRAPH_MAX_REFINEMENTS", "5");
        std::env::set_var("THOUGHTGRAPH_PREFERRED_DEPTH", "not-a-number");
        let c = GraphConfig::default().with_env_overrides();
        std::env::remove_var("THOUGHTGRAPH_MAX_REFINEMENTS");
        std::env::remove_var("THOUGHTGRAPH_PREFERRED_DEPTH");
        assert_eq!(c.max_refinements, 5);
        assert_eq!(c.preferred_depth, 3);
    }
}
