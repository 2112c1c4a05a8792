use anyhow::Context;
use clap::Parser;
use diabetes_core::{artifacts::default_model_dir, config::Config, pipeline::AppCore};
use diabetes_server::{router, AppState};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// diabetes-server: diabetes risk prediction over HTTP.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Bind address
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Listen port
    #[arg(long, env = "PORT", default_value_t = 5000)]
    port: u16,

    /// Exported model directory (default: clinical_model_export next to the executable)
    #[arg(long, env = "MODEL_DIR")]
    model_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("info".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    // metrics
    let prom = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install prometheus recorder")?;

    // a missing or broken model is a deployment error: refuse to start
    let model_dir = match args.model_dir {
        Some(dir) => dir,
        None => default_model_dir()?,
    };
    let core = Arc::new(AppCore::load(Config::default(), &model_dir)?);

    let app = router(AppState { core, prom });

    let listener = tokio::net::TcpListener::bind((args.host.as_str(), args.port))
        .await
        .with_context(|| format!("bind {}:{}", args.host, args.port))?;
    let addr = listener.local_addr()?;
    tracing::info!("diabetes-server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("diabetes-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        // no signal handler: keep serving until killed
        tracing::warn!(error = %e, "ctrl-c handler failed");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
