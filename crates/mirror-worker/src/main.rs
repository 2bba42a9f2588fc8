use anyhow::{
    Context,
    Result,
};
use clap::Parser;
use mirror_worker::cli::Args;
use rust_tracing::trace;
use tokio_util::sync::CancellationToken;
use tracing::{
    info,
    warn,
};

#[tokio::main]
async fn main() -> Result<()> {
    let _guard = trace();

    let config = Args::parse().into_config();
    info!(
        workspace = %config.workspace,
        rpc_server = %config.rpc_server,
        network_id = config.network_id,
        "starting chain mirror"
    );

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if let Err(e) = shutdown_signal().await {
                warn!("Error setting up signal handler: {}", e);
            } else {
                info!("Shutdown signal received, initiating graceful shutdown...");
                cancel.cancel();
            }
        }
    });

    mirror_worker::run(config, cancel)
        .await
        .context("chain mirror terminated unexpectedly")?;
    info!("Chain mirror shutdown gracefully");
    Ok(())
}

/// Wait for SIGTERM or SIGINT (Ctrl+C)
async fn shutdown_signal() -> Result<()> {
    use tokio::signal;

    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("failed to install SIGTERM handler")?;
        let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
            .context("failed to install SIGINT handler")?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c()
            .await
            .context("failed to listen for ctrl-c")?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
