//! `script` subcommand: run a JSON array of protocol requests in order.
//!
//! Requests share one controller, so a script can initialize a graph and then work
//! on it. A failing request yields an error object in its slot and the script goes on.

use std::sync::Arc;

use serde_json::Value;
use thoughtgraph::{ControllerConfig, GotService, GraphController, MockGenerator};
use tokio_util::sync::CancellationToken;
use tracing::{info_span, Instrument};

use crate::CliError;

/// Accepts either an array of requests or a single request object.
pub async fn run_script(script: Value, cancel: CancellationToken) -> Result<Value, CliError> {
    let requests = match script {
        Value::Array(items) => items,
        obj @ Value::Object(_) => vec![obj],
        _ => {
            return Err(CliError::Usage(
                "script must be a JSON array of requests or a single request object".into(),
            ))
        }
    };
    let span = info_span!("run_script", requests = requests.len());
    let service = GotService::new(
        Arc::new(GraphController::new(
            ControllerConfig::default().with_env_overrides(),
        )),
        Arc::new(MockGenerator::new()),
    )
    .with_cancellation(cancel);

    let mut responses = Vec::with_capacity(requests.len());
    let mut failed = 0usize;
    for request in requests {
        let response = service.handle_json(request).instrument(span.clone()).await;
        if response.get("error").is_some() {
            failed += 1;
        }
        responses.push(response);
    }
    tracing::info!(parent: &span, total = responses.len(), failed, "script finished");
    Ok(Value::Array(responses))
}
