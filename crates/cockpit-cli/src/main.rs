use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cockpit_core::domain::{CompletionStatus, ExecutorEvent};
use cockpit_core::{Catalog, ExecutorConfig, Registry, RunId, SnapshotEntry, SubmissionResult, TaskExecutor};

/// Run cockpit jobs and batch processes from the terminal.
#[derive(Debug, Parser)]
#[command(name = "cockpit", version, about)]
struct Cli {
    /// JSON seed catalog. Defaults to the built-in demo set.
    #[arg(long, global = true, env = "COCKPIT_SEED")]
    seed: Option<PathBuf>,

    /// Overrides COCKPIT_POOL_SIZE.
    #[arg(long, global = true)]
    pool_size: Option<usize>,

    /// Print JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show every registered job and batch.
    List,
    /// Submit entities by name and stream their events until they finish.
    Run {
        #[arg(required = true)]
        names: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cockpit_core=info,cockpit=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let catalog = match &cli.seed {
        Some(path) => Catalog::from_path(path)?,
        None => Catalog::demo(),
    };
    let registry = Arc::new(Registry::from_catalog(&catalog)?);

    match cli.command {
        Command::List => print_snapshot(&registry.snapshot().await, cli.json)?,
        Command::Run { names } => {
            let mut config = ExecutorConfig::from_env()?;
            if let Some(pool_size) = cli.pool_size {
                config.pool_size = pool_size;
            }
            run(Arc::clone(&registry), config, &names, cli.json).await?;
            print_snapshot(&registry.snapshot().await, cli.json)?;
        }
    }
    Ok(())
}

async fn run(
    registry: Arc<Registry>,
    config: ExecutorConfig,
    names: &[String],
    json: bool,
) -> anyhow::Result<()> {
    let executor = TaskExecutor::builder(Arc::clone(&registry))
        .config(config)
        .build()
        .await
        .context("starting executor")?;

    // subscribe before submitting so no event is missed
    let mut rx = executor.subscribe();
    let mut pending: HashMap<RunId, String> = HashMap::new();
    for name in names {
        match executor.submit(name).await? {
            SubmissionResult::Accepted { run_id } => {
                pending.insert(run_id, name.clone());
            }
            SubmissionResult::AlreadyRunning => {
                tracing::warn!(entity = %name, "already running, not submitted")
            }
        }
    }

    let mut cancelling = false;
    while !pending.is_empty() {
        tokio::select! {
            received = rx.recv() => match received {
                Ok(event) => {
                    if !pending.contains_key(&event.run_id()) {
                        continue;
                    }
                    print_event(&event, json)?;
                    if let ExecutorEvent::Completion(done) = &event {
                        pending.remove(&done.run_id);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event stream lagged, checking registry");
                    let mut finished = Vec::new();
                    for (run_id, name) in &pending {
                        if !registry.is_in_flight(name).await? {
                            finished.push(*run_id);
                        }
                    }
                    for run_id in finished {
                        pending.remove(&run_id);
                    }
                }
                Err(RecvError::Closed) => break,
            },
            signal = tokio::signal::ctrl_c(), if !cancelling => {
                signal.context("listening for ctrl-c")?;
                cancelling = true;
                for name in pending.values() {
                    executor.cancel(name).await?;
                }
            }
        }
    }

    executor.shutdown_and_join().await;
    Ok(())
}

fn print_event(event: &ExecutorEvent, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }
    match event {
        ExecutorEvent::Started(e) => println!("{:<20} started ({})", e.name, e.run_id),
        ExecutorEvent::Progress(e) => println!("{:<20} {:>3}%", e.name, e.value),
        ExecutorEvent::Completion(e) => match (e.status, &e.reason) {
            (CompletionStatus::Failed, Some(reason)) => println!("{:<20} failed: {reason}", e.name),
            (CompletionStatus::Failed, None) => println!("{:<20} failed", e.name),
            (CompletionStatus::Complete, _) => println!("{:<20} complete", e.name),
        },
    }
    Ok(())
}

fn print_snapshot(entries: &[SnapshotEntry], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(entries)?);
        return Ok(());
    }
    println!("{:<20} {:<6} {:<10} {:>8}", "NAME", "KIND", "STATUS", "PROGRESS");
    for entry in entries {
        println!(
            "{:<20} {:<6} {:<10} {:>7}%",
            entry.name,
            entry.kind.to_string(),
            entry.status.to_string(),
            entry.progress
        );
    }
    Ok(())
}
