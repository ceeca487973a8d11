//! upll-momgrd - UPLL managed-object manager daemon
//!
//! Loads the engine configuration and runs a request script against an
//! in-memory configuration store, printing one JSON outcome per step.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use upll_dal::InMemoryStore;
use upll_momgr::script::{run_script, Script};
use upll_momgr::{BufferedNotifier, EngineConfig, LoopbackDriver, MoMgrImpl};

/// UPLL managed-object manager
#[derive(Parser, Debug)]
#[command(name = "upll-momgrd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Engine configuration file (YAML, or JSON by extension)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Request script to run
    #[arg(short = 's', long)]
    script: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    info!("--- Starting upll-momgrd ---");
    match run(&args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            error!("upll-momgrd failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Runs the script. Returns whether every step succeeded.
async fn run(args: &Args) -> anyhow::Result<bool> {
    let config = match &args.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let script = Script::from_file(&args.script)
        .with_context(|| format!("loading script {}", args.script.display()))?;
    info!(steps = script.steps.len(), "script loaded");

    let notifier = Arc::new(BufferedNotifier::new());
    let engine = MoMgrImpl::new(config, Arc::new(LoopbackDriver), notifier.clone());
    let mut store = InMemoryStore::new();

    let outcomes = run_script(&engine, &mut store, &script).await;
    for outcome in &outcomes {
        println!("{}", serde_json::to_string(outcome)?);
    }

    let stats = engine.stats();
    info!(
        creates = stats.creates,
        updates = stats.updates,
        deletes = stats.deletes,
        reads = stats.reads,
        driver_requests = stats.driver_requests,
        notifications = notifier.len(),
        "script finished"
    );
    Ok(outcomes.iter().all(|o| o.is_success()))
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();
}
