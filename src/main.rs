use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use learnhub_gate::config::Args;
use learnhub_gate::limiters::Limiters;
use learnhub_gate::router;
use learnhub_gate::state::AppState;

#[tokio::main]
async fn main() {
    init_tracing();

    // parse cli arguments
    let args = Args::parse();
    if let Err(err) = run(args).await {
        error!(%err, "gateway exited with error");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let limiters = Limiters::from_settings(&args.limits())?;
    limiters.log_summary();

    let client = reqwest::Client::builder()
        .timeout(args.upstream_timeout())
        .build()?;

    // creating shared state
    let state = Arc::new(AppState {
        client,
        upstream: args.upstream_base(),
        limiters,
    });

    // background sweep of expired keys, one task per limiter
    let sweepers = state.limiters.spawn_sweepers(args.sweep_interval())?;

    let app = router(Arc::clone(&state));

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(%addr, upstream = %state.upstream, "gateway listening");
    info!(sweep_interval_secs = args.sweep_interval, "sweeping expired keys");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    for sweeper in sweepers {
        sweeper.stop().await;
    }
    info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(%err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
