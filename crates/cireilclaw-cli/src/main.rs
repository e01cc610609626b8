use clap::{Parser, Subcommand};

mod clear;
mod error;
mod harness;
mod inbound;
mod init;
mod runtime;
mod scheduler_runner;
mod send_filter;
mod turn_sink;

use error::Result;
use harness::Harness;

#[derive(Parser)]
#[command(name = "cireilclaw")]
#[command(about = "Multi-agent chat/scheduler harness", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lay down a new agent's on-disk directory structure.
    Init,
    /// Start the harness: loads every agent, connects channels, runs schedulers.
    Run {
        #[arg(long, value_parser = ["error", "warning", "info", "debug"], default_value = "info")]
        log_level: String,
    },
    /// Remove persisted sessions for one agent, or every agent.
    Clear {
        #[arg(long)]
        agent: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let root = cireilclaw_core::config::root_dir()?;

    match cli.command {
        Commands::Init => {
            tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();
            std::fs::create_dir_all(root.join("agents"))?;
            init::run(&root)?;
        }
        Commands::Run { log_level } => {
            init_tracing(&log_level);
            run_harness(&root).await?;
        }
        Commands::Clear { agent } => {
            tracing_subscriber::fmt().with_max_level(tracing::Level::WARN).init();
            clear::run(&root, agent)?;
        }
    }

    Ok(())
}

fn init_tracing(log_level: &str) {
    let level = match log_level {
        "error" => tracing::Level::ERROR,
        "warning" => tracing::Level::WARN,
        "debug" => tracing::Level::DEBUG,
        _ => tracing::Level::INFO,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("cireilclaw={level}").into()),
        )
        .init();
}

/// Starts the harness and blocks until a graceful shutdown completes. The
/// first SIGINT/SIGTERM begins a graceful drain; a second forces immediate
/// exit with status 1.
async fn run_harness(root: &std::path::Path) -> Result<()> {
    let harness = Harness::start(root).await?;
    tracing::info!(agents = harness.agent_slugs().count(), "harness started");

    wait_for_first_signal().await;
    tracing::info!("shutdown signal received, draining");

    tokio::select! {
        _ = harness.shutdown() => {
            tracing::info!("graceful shutdown complete");
        }
        _ = wait_for_first_signal() => {
            tracing::warn!("second shutdown signal received, forcing exit");
            std::process::exit(1);
        }
    }

    Ok(())
}

async fn wait_for_first_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(_) => return,
        };
        let mut sigint = match signal(SignalKind::interrupt()) {
            Ok(s) => s,
            Err(_) => return,
        };
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
