//! chainindex — run configured indexers (`start`) or reprocess a block
//! range on one of them (`parse range`).

mod logging;
mod registry;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use chainindex_core::{CancellationToken, Config, ConfigError, GlobalObjects};
use chainindex_engine::{Builder, RangeProducer};

#[derive(Parser)]
#[command(name = "chainindex", version, about = "Run and reprocess configured blockchain indexers")]
struct Cli {
    /// Home folder holding config.yaml; all indexer state is relative to it.
    #[arg(long, global = true, default_value = ".")]
    home: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start every non-disabled indexer and run until SIGINT/SIGTERM.
    Start,
    /// Re-parse a range of blocks without touching the other indexers.
    Parse {
        #[command(subcommand)]
        command: ParseCommand,
    },
}

#[derive(Subcommand)]
enum ParseCommand {
    /// Re-parse [start, end] (or just start, if end is omitted) for one indexer.
    Range {
        indexer: String,
        start: u64,
        end: Option<u64>,
    },
}

fn load_config(home: &Path) -> Result<Config, ConfigError> {
    let path = home.join("config.yaml");
    let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    Config::from_yaml(&raw)
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

async fn run_start(home: &Path) -> Result<()> {
    let config = load_config(home)?;
    logging::init(&config.logging);

    let liveness = chainindex_metrics::Liveness::new();
    if config.monitoring.enabled {
        chainindex_metrics::init().context("registering prometheus series")?;
        let router = chainindex_metrics::router(liveness.clone());
        let addr = format!("0.0.0.0:{}", config.monitoring.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("binding metrics server on {addr}"))?;
        tracing::info!(addr, "metrics server listening");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!(error = %e, "metrics server exited");
            }
        });
    }

    let token = CancellationToken::new();
    let shutdown_token = token.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        tracing::info!("shutdown signal received, cancelling indexers");
        shutdown_token.cancel();
    });

    let registry = registry::build_registry();
    let builder = Builder::new(&registry, &config, GlobalObjects::default());
    let indexers = builder.build_all(&token).await.context("building indexers")?;

    liveness.mark_ready();

    let mut handles = Vec::with_capacity(indexers.len());
    for indexer in indexers {
        if indexer.config.disabled {
            tracing::info!(indexer_name = %indexer.name, "skipping disabled indexer");
            continue;
        }
        let name = indexer.name.clone();
        let indexer = Arc::new(indexer);
        let indexer_token = token.clone();
        handles.push((name, tokio::spawn(async move { indexer.start(indexer_token).await })));
    }

    for (name, handle) in handles {
        match handle.await {
            Ok(Ok(())) => tracing::info!(indexer_name = %name, "indexer stopped"),
            Ok(Err(e)) => tracing::error!(indexer_name = %name, error = %e, "indexer stopped with error"),
            Err(join_err) => tracing::error!(indexer_name = %name, error = %join_err, "indexer task panicked"),
        }
    }

    Ok(())
}

async fn run_parse_range(home: &Path, indexer_name: &str, start: u64, end: Option<u64>) -> Result<()> {
    let config = load_config(home)?;
    logging::init(&config.logging);

    let token = CancellationToken::new();
    let registry = registry::build_registry();
    let builder = Builder::new(&registry, &config, GlobalObjects::default());
    let mut indexer = builder
        .build_named(&token, indexer_name)
        .await
        .with_context(|| format!("building indexer '{indexer_name}'"))?;

    let end = end.unwrap_or(start);
    indexer.custom_producer = Some(Arc::new(RangeProducer::new(start, end)));

    tracing::info!(indexer_name, start, end, "reprocessing range");
    Arc::new(indexer).start(token).await.context("reprocessing range")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let result = match &cli.command {
        Command::Start => run_start(&cli.home).await,
        Command::Parse {
            command: ParseCommand::Range { indexer, start, end },
        } => run_parse_range(&cli.home, indexer, *start, *end).await,
    };

    if let Err(e) = &result {
        eprintln!("error: {e:#}");
    }
    result
}
