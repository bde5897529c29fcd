use std::path::Path;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{error, info};

use hookwire_engine::{QueueWorker, WebhookEngine, WebhookEngineBuilder};
use hookwire_sender::HttpSender;
use hookwire_server::config::HookwireConfig;
use hookwire_server::error::ServerError;
use hookwire_server::store_factory::create_store;

/// Hookwire webhook delivery worker.
#[derive(Parser, Debug)]
#[command(name = "hookwire", version, about = "Outbound webhook delivery worker")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "hookwire.toml")]
    config: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run sweep loops until interrupted (the default).
    Run,
    /// Sweep the queue once and print the report as JSON. Suitable for cron.
    Sweep {
        /// Override the batch size for this sweep.
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Run database migrations for the configured backend, then exit.
    Migrate,
    /// Print a freshly generated endpoint signing secret.
    GenerateSecret,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(Commands::GenerateSecret) = cli.command {
        println!("{}", hookwire_signer::generate_secret().expose());
        return Ok(());
    }

    let config = HookwireConfig::load(&cli.config)?;
    hookwire_server::telemetry::init(&config.log);

    if !Path::new(&cli.config).exists() {
        info!(path = %cli.config, "config file not found, using defaults");
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Migrate => run_migrate(&config).await?,
        Commands::Sweep { batch_size } => run_sweep(&config, batch_size).await?,
        Commands::Run => run_workers(&config).await?,
        Commands::GenerateSecret => {}
    }
    Ok(())
}

async fn build_engine(config: &HookwireConfig) -> Result<WebhookEngine, ServerError> {
    config.store.require_shared()?;
    let engine_config = config.engine.to_engine_config()?;
    let sender = HttpSender::new(config.sender.to_sender_config(engine_config.send_timeout))?;
    let (registry, deliveries) = create_store(&config.store).await?;
    info!(backend = %config.store.backend, "store initialized");

    Ok(WebhookEngineBuilder::new()
        .registry(registry)
        .delivery_store(deliveries)
        .sender(Arc::new(sender))
        .config(engine_config)
        .build()?)
}

async fn run_migrate(config: &HookwireConfig) -> Result<(), ServerError> {
    info!(backend = %config.store.backend, "running store migrations...");
    let _store = create_store(&config.store).await?;
    info!(backend = %config.store.backend, "store migrations complete");
    Ok(())
}

async fn run_sweep(config: &HookwireConfig, batch_size: Option<usize>) -> Result<(), ServerError> {
    let engine = build_engine(config).await?;
    let batch_size = batch_size.unwrap_or(engine.config().batch_size);
    let report = engine.process_queue(batch_size).await?;
    engine.shutdown().await;

    let json = serde_json::to_string_pretty(&report)
        .map_err(|e| ServerError::Config(format!("failed to encode sweep report: {e}")))?;
    println!("{json}");
    Ok(())
}

async fn run_workers(config: &HookwireConfig) -> Result<(), ServerError> {
    let engine = build_engine(config).await?;
    let worker_count = config.worker.worker_count()?;
    let worker_config = config.worker.to_worker_config(engine.config().batch_size)?;

    let mut shutdown_txs = Vec::with_capacity(worker_count);
    let mut handles = Vec::with_capacity(worker_count);
    for _ in 0..worker_count {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let mut worker = QueueWorker::new(engine.clone(), worker_config.clone(), shutdown_rx);
        handles.push(tokio::spawn(async move { worker.run().await }));
        shutdown_txs.push(shutdown_tx);
    }
    info!(workers = worker_count, "hookwire worker started");

    shutdown_signal().await;

    for tx in &shutdown_txs {
        let _ = tx.send(()).await;
    }
    for handle in handles {
        if let Err(e) = handle.await {
            error!(error = %e, "worker task panicked");
        }
    }
    engine.shutdown().await;
    info!("hookwire worker stopped");
    Ok(())
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received SIGINT"); }
        () = terminate => { info!("received SIGTERM"); }
    }
}
