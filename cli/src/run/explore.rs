//! `explore` subcommand: initialize → generate → score → prune → refine → finalize.

use std::sync::Arc;

use thoughtgraph::{
    ControllerConfig, ExploreConfig, ExploreRequest, ExploreResult, GraphConfig, GraphController,
    MockGenerator,
};
use tokio_util::sync::CancellationToken;
use tracing::{info_span, Instrument};

use crate::CliError;

#[derive(Debug, Clone, Default)]
pub struct ExploreOptions {
    pub graph_id: Option<String>,
    pub initial_thought: String,
    /// Defaults to the initial thought.
    pub problem: Option<String>,
    pub thorough: bool,
    pub k: Option<usize>,
    pub iterations: Option<usize>,
    pub prune_threshold: Option<f64>,
    pub skip_refine: bool,
}

impl ExploreOptions {
    fn explore_config(&self) -> ExploreConfig {
        let mut cfg = if self.thorough {
            ExploreConfig::thorough()
        } else {
            ExploreConfig::default()
        };
        if let Some(k) = self.k {
            cfg.k = k;
        }
        if let Some(n) = self.iterations {
            cfg.max_iterations = n;
        }
        if let Some(t) = self.prune_threshold {
            cfg.prune_threshold = t;
        }
        cfg.skip_refine |= self.skip_refine;
        cfg
    }
}

fn default_graph_id() -> String {
    format!("explore-{}", chrono::Utc::now().format("%Y%m%d%H%M%S%3f"))
}

/// Runs one exploration with the deterministic generator. `cancel` aborts it.
pub async fn run_explore(
    opts: &ExploreOptions,
    cancel: CancellationToken,
) -> Result<ExploreResult, CliError> {
    if opts.initial_thought.trim().is_empty() {
        return Err(CliError::Usage(
            "provide an initial thought via -m/--message or positional args".into(),
        ));
    }
    let graph_id = opts.graph_id.clone().unwrap_or_else(default_graph_id);
    let span = info_span!("run_explore", graph_id = %graph_id);
    tracing::info!(parent: &span, thorough = opts.thorough, "run started");

    let controller = Arc::new(GraphController::new(
        ControllerConfig::default().with_env_overrides(),
    ));
    let generator = MockGenerator::new();
    let request = ExploreRequest {
        initial_thought: opts.initial_thought.clone(),
        problem: opts
            .problem
            .clone()
            .unwrap_or_else(|| opts.initial_thought.clone()),
        config: opts.explore_config(),
        graph_config: Some(GraphConfig::default().with_env_overrides()),
    };

    let result = controller
        .explore(&cancel, &generator, &graph_id, request)
        .instrument(span.clone())
        .await?;
    tracing::info!(parent: &span, conclusions = result.conclusions.len(), "run finished");
    Ok(result)
}
