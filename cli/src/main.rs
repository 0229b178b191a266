//! Thoughtgraph CLI binary: explore a problem, replay a request script, or print config.
//!
//! Subcommands: `explore` (default), `script` (JSON requests), `config` (effective settings).

use clap::{Parser, Subcommand};
use cli::{
    effective_config, format_explore_summary, run_explore, run_script, CliError, ExploreOptions,
    APP_NAME, LOG_FILE_ENV,
};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Default max length for vertex content printed in the text summary. 0 means no truncation.
const DEFAULT_MAX_DISPLAY_LEN: usize = 120;

#[derive(Parser, Debug)]
#[command(name = "thoughtgraph")]
#[command(about = "Thoughtgraph: explore a problem as a graph of thoughts")]
struct Args {
    #[command(subcommand)]
    cmd: Option<Command>,

    /// Initial thought (or pass as positional arguments)
    #[arg(global = true, short, long, value_name = "TEXT")]
    message: Option<String>,

    /// Positional args: initial thought when -m/--message is not used
    #[arg(trailing_var_arg = true)]
    rest: Vec<String>,

    /// Output JSON instead of the text summary
    #[arg(global = true, long)]
    json: bool,

    /// Write JSON output to this file instead of stdout
    #[arg(global = true, long, value_name = "PATH")]
    file: Option<PathBuf>,

    /// Pretty-print JSON (multi-line). Default: compact
    #[arg(global = true, long)]
    pretty: bool,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Run initialize → generate → score → prune → refine → finalize
    Explore(ExploreArgs),
    /// Run a JSON array of protocol requests against one controller
    Script(ScriptArgs),
    /// Print the effective graph and controller settings as JSON
    Config,
}

#[derive(clap::Args, Debug, Clone, Default)]
struct ExploreArgs {
    /// Initial thought as positional words
    #[arg(trailing_var_arg = true)]
    thought: Vec<String>,
    /// Problem the thoughts should address (default: the initial thought)
    #[arg(short, long, value_name = "TEXT")]
    problem: Option<String>,
    /// Graph id (default: explore-<timestamp>)
    #[arg(long, value_name = "ID")]
    graph_id: Option<String>,
    /// Branching factor per expanded vertex (1..=10)
    #[arg(short, long)]
    k: Option<usize>,
    /// Generate/score/prune/refine rounds
    #[arg(long)]
    iterations: Option<usize>,
    /// Prune threshold in [0, 1]
    #[arg(long)]
    prune_threshold: Option<f64>,
    /// Two rounds, refine top two, generator-backed assessment
    #[arg(long)]
    thorough: bool,
    /// Skip the refine phase
    #[arg(long)]
    skip_refine: bool,
}

#[derive(clap::Args, Debug, Clone)]
struct ScriptArgs {
    /// JSON file with an array of requests; `-` reads stdin
    path: PathBuf,
}

/// Reads max display length from `THOUGHTGRAPH_MAX_DISPLAY_LEN`. Returns default on missing/invalid.
fn max_display_len() -> usize {
    std::env::var("THOUGHTGRAPH_MAX_DISPLAY_LEN")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_MAX_DISPLAY_LEN)
}

/// Writes JSON to stdout or to the given file. When pretty is true, multi-line; else one line.
fn write_json_output(
    value: &serde_json::Value,
    file: Option<&Path>,
    pretty: bool,
) -> Result<(), CliError> {
    let s = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    match file {
        Some(path) => std::fs::write(path, format!("{}\n", s))?,
        None => {
            println!("{}", s);
            std::io::Write::flush(&mut std::io::stdout())?;
        }
    }
    Ok(())
}

fn read_script(path: &Path) -> Result<serde_json::Value, CliError> {
    let raw = if path.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin())?
    } else {
        std::fs::read_to_string(path).map_err(|source| CliError::Read {
            path: path.display().to_string(),
            source,
        })?
    };
    Ok(serde_json::from_str(&raw)?)
}

/// Cancels `token` on Ctrl-C so in-flight generator calls stop.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted");
            token.cancel();
        }
    });
}

async fn run(args: Args) -> Result<(), CliError> {
    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let cmd = args
        .cmd
        .clone()
        .unwrap_or_else(|| Command::Explore(ExploreArgs::default()));
    match cmd {
        Command::Config => {
            write_json_output(&effective_config()?, args.file.as_deref(), true)?;
        }
        Command::Script(sa) => {
            let script = read_script(&sa.path)?;
            let out = run_script(script, cancel).await?;
            write_json_output(&out, args.file.as_deref(), args.pretty)?;
        }
        Command::Explore(ea) => {
            let words = if ea.thought.is_empty() { &args.rest } else { &ea.thought };
            let thought = args.message.clone().or_else(|| {
                if words.is_empty() {
                    None
                } else {
                    Some(words.join(" "))
                }
            });
            let opts = ExploreOptions {
                graph_id: ea.graph_id,
                initial_thought: thought.unwrap_or_default(),
                problem: ea.problem,
                thorough: ea.thorough,
                k: ea.k,
                iterations: ea.iterations,
                prune_threshold: ea.prune_threshold,
                skip_refine: ea.skip_refine,
            };
            let result = run_explore(&opts, cancel).await?;
            if args.json || args.file.is_some() {
                let value = serde_json::to_value(&result)?;
                write_json_output(&value, args.file.as_deref(), args.pretty)?;
            } else {
                println!("{}", format_explore_summary(&result, max_display_len()));
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let applied = config::load_and_apply(APP_NAME, None::<&Path>);
    let _guard = match config::init_logging("info") {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("thoughtgraph: {} ({}={:?})", e, LOG_FILE_ENV, std::env::var(LOG_FILE_ENV).ok());
            std::process::exit(1);
        }
    };
    match applied {
        Ok(keys) => tracing::debug!(count = keys.len(), "config applied"),
        Err(e) => tracing::warn!(error = %e, "config not applied"),
    }

    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("thoughtgraph: {}", e);
        std::process::exit(1);
    }
}
