use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sitevote::client::{
    CooldownGuard, FileStore, Fingerprinter, IpifyResolver, LocalStore, MemoryStore, VoteResult,
    Voter,
};
use sitevote::clock::SystemClock;
use sitevote::config::{LoggingConfig, SitevoteConfig};
use sitevote::directory::Directory;
use sitevote::grpc::{GrpcServer, GrpcVoteBackend};
use sitevote::ratelimit::{CooldownWindow, VoteLimiter};

#[derive(Debug, Parser)]
#[command(name = "sitevote", version, about = "Abuse-resistant voting for a site directory")]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the vote server
    Serve,
    /// Vote for a site
    Vote {
        /// Site id
        #[arg(long)]
        item: String,
        /// Cooldown window in minutes
        #[arg(long)]
        window: Option<u32>,
    },
    /// List approved sites by votes
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = SitevoteConfig::load(cli.config.as_deref()).context("loading configuration")?;

    init_tracing(&config.logging);

    match cli.command {
        Command::Serve => serve(config).await,
        Command::Vote { item, window } => vote(config, &item, window).await,
        Command::List => list(config).await,
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn serve(config: SitevoteConfig) -> anyhow::Result<()> {
    info!("Starting Sitevote server");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let directory = match &config.voting.catalog_path {
        Some(path) => Directory::from_file(path).context("loading site catalog")?,
        None => {
            warn!("No catalog_path configured, serving an empty directory");
            Directory::new()
        }
    };

    let max_window = CooldownWindow::from_minutes(config.voting.max_window_minutes)?;
    let limiter = Arc::new(VoteLimiter::new(Arc::new(directory)).with_max_window(max_window));
    info!(max_window = %max_window, "Vote limiter initialized");

    let pruner = {
        let limiter = limiter.clone();
        let retention = config.voting.record_retention()?;
        let mut interval =
            tokio::time::interval(Duration::from_secs(config.voting.prune_interval_secs));
        tokio::spawn(async move {
            loop {
                interval.tick().await;
                limiter.prune_expired(retention);
            }
        })
    };

    let server = GrpcServer::new(config.server.grpc_addr, limiter);
    let result = server.serve_with_shutdown(shutdown_signal()).await;
    pruner.abort();
    result?;

    info!("Sitevote server stopped");
    Ok(())
}

async fn vote(config: SitevoteConfig, item: &str, window: Option<u32>) -> anyhow::Result<()> {
    let window = CooldownWindow::from_minutes(
        window.unwrap_or(config.voting.default_window_minutes),
    )?;

    // An unusable store only disables the local guard; the server still limits.
    let store: Arc<dyn LocalStore> = match FileStore::open(&config.client.store_path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!(error = %e, "Local vote store unavailable, continuing without it");
            Arc::new(MemoryStore::new())
        }
    };

    let voter = Voter::new(
        CooldownGuard::new(store, Arc::new(SystemClock)),
        Fingerprinter::new(Arc::new(IpifyResolver::new(&config.client.ip_lookup_url))),
        Arc::new(GrpcVoteBackend::new(&config.client.server_url)?),
    );

    let result = voter.vote(item, window).await;
    println!("{}", result.message());

    if let VoteResult::Error(e) = result {
        anyhow::bail!("vote for {} failed: {}", item, e);
    }
    Ok(())
}

async fn list(config: SitevoteConfig) -> anyhow::Result<()> {
    let backend = GrpcVoteBackend::new(&config.client.server_url)?;
    let sites = backend.list_approved_sites().await?;

    for site in sites {
        println!("{:>6}  {}  {}", site.votes.unwrap_or(0), site.name, site.url);
    }
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
