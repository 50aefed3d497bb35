//! LegacyMark automation CLI and REST API entry point.
//!
//! Binary name: `lmark`
//!
//! Parses CLI arguments, initializes database and services, then dispatches
//! to the appropriate command handler or starts the REST API server together
//! with the delayed-resume poller.

mod cli;
mod http;
mod state;

use clap::Parser;
use clap_complete::generate;
use legacymark_core::workflow::scheduler::ResumePoller;
use legacymark_observe::tracing_setup::{filter_for_verbosity, init_tracing, shutdown_tracing, LogFormat};
use tokio_util::sync::CancellationToken;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let format = if cli.json { LogFormat::Json } else { LogFormat::Pretty };
    if let Err(e) = init_tracing(filter_for_verbosity(cli.verbose, cli.quiet), format, cli.otel) {
        eprintln!("failed to initialize tracing: {e}");
    }

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "lmark", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init().await?;

    let result = run(state, cli.command, cli.json).await;
    shutdown_tracing();
    result
}

async fn run(state: AppState, command: Commands, json: bool) -> anyhow::Result<()> {
    match command {
        Commands::Serve { port, host } => serve(state, host, port).await?,

        Commands::Workflow { action } => cli::workflow::handle(&state, action, json).await?,

        Commands::Trigger {
            trigger_type,
            data,
            company,
        } => {
            cli::trigger::trigger(&state, &trigger_type, &data, company.as_deref(), json).await?;
        }

        Commands::Tasks { action } => cli::tasks::handle(&state, action, json).await?,

        Commands::Completions { .. } => unreachable!("handled before state init"),
    }

    Ok(())
}

async fn serve(state: AppState, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let host = host.unwrap_or_else(|| state.config.server.host.clone());
    let port = port.unwrap_or(state.config.server.port);

    if state.api_key.is_none() {
        println!(
            "  {} No automation API key configured; set {} to enable /api/automation/trigger and admin routes",
            console::style("!").yellow().bold(),
            console::style(legacymark_infra::config::API_KEY_ENV).yellow()
        );
    }

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let cancel = CancellationToken::new();
    let poller = ResumePoller::new(state.executor.clone(), &state.config.executor).spawn(cancel.clone());

    println!(
        "  {} LegacyMark automation API listening on {}",
        console::style("⚡").bold(),
        console::style(format!("http://{addr}")).cyan()
    );
    println!(
        "  {} {}",
        console::style("Data directory:").dim(),
        console::style(state.data_dir.display()).dim()
    );
    println!("  {}", console::style("Press Ctrl+C to stop").dim());

    let router = http::router::build_router(state);

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    cancel.cancel();
    if let Err(e) = poller.await {
        tracing::warn!(error = %e, "resume poller task ended abnormally");
    }

    served?;
    println!("\n  Server stopped.");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
