use anyhow::{Context, Result};
use clap::Parser;
use styleshift_server::{
    config::Args,
    startup::{build_app, init_tracing, shutdown_signal},
};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let (app, workers) = build_app(&args)?;

    let bind_address = args.bind_address();
    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;
    tracing::info!("Started server on {}", listener.local_addr()?);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router (and its queue handle) is gone once serve returns.
    workers.drain().await;
    Ok(())
}
