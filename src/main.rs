//! Knowledge Export server binary.
//!
//! Loads configuration, wires the export pipeline and serves the HTTP API.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use knowledge_export::adapters::generation::PipelineExportGenerator;
use knowledge_export::adapters::http::{export_router, ExportAppState};
use knowledge_export::adapters::resilience::InMemoryCircuitBreaker;
use knowledge_export::adapters::status::InMemoryStatusStore;
use knowledge_export::application::{ExportManager, StatusSweeper, StatusSweeperConfig};
use knowledge_export::config::{AppConfig, ServerConfig};

/// Upper bound on one blocking PDF render, independent of the per-attempt timeout.
const PDF_STREAM_TIMEOUT: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate()?;

    let generator = PipelineExportGenerator::with_stream_timeout(PDF_STREAM_TIMEOUT);
    let blocks = generator.block_cache().clone();
    let breaker = InMemoryCircuitBreaker::new("document-generation", config.resilience.breaker_config());

    let manager = Arc::new(
        ExportManager::new(
            Arc::new(generator),
            Arc::new(InMemoryStatusStore::new()),
            Arc::new(breaker),
        )
        .with_retention(config.export.status_retention()),
    );

    let cleanup_interval = config.export.cleanup_interval();
    let sweeper = StatusSweeper::new(
        Arc::clone(&manager),
        StatusSweeperConfig::default().with_interval(cleanup_interval),
    )
    .with_sweep("notion_blocks", move || blocks.sweep(cleanup_interval));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper_task = tokio::spawn(async move { sweeper.run(shutdown_rx).await });

    let state = ExportAppState::new(Arc::clone(&manager), config.export.default_options())
        .with_redacted_errors(config.is_production());
    let app = export_router()
        .with_state(state)
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http());

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        environment = ?config.server.environment,
        formats = ?config.export.supported_formats,
        "Knowledge export server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    let _ = sweeper_task.await;
    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&server.log_level));

    if server.log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_target(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
