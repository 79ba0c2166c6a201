//! PlateMate detection service - Main entry point
//!
//! Wires the recipe catalog, the detection engine and its external
//! collaborators, and the HTTP/SSE control surface together.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use platemate::api;
use platemate::config::Config;
use platemate::detect::{DetectionEngine, HttpClassifier, SnapshotSource};
use platemate::events::EventBus;
use platemate::kb::FoodKb;
use platemate::resolver::ProductMatcherClient;
use platemate::state::SessionState;

/// Command-line arguments for platemate
#[derive(Parser, Debug)]
#[command(name = "platemate")]
#[command(about = "Food detection and ingredient resolution service")]
#[command(version)]
struct Args {
    /// Path to the configuration file
    #[arg(
        short,
        long,
        default_value = "platemate.toml",
        env = "PLATEMATE_CONFIG"
    )]
    config: PathBuf,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "PLATEMATE_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    // Config comes first; its [logging] level is the filter default
    let mut config = Config::load_or_default(&args.config)
        .await
        .context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.port = port;
    }

    // Initialize tracing; RUST_LOG overrides the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(config.logging.filter_directive())
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if args.config.exists() {
        info!("Loaded configuration from {:?}", args.config);
    } else {
        info!("No config file at {:?}, using built-in defaults", args.config);
    }
    info!("Starting PlateMate on port {}", config.port);

    // Recipe catalog: operator override or the embedded default
    let kb = Arc::new(match &config.catalog_path {
        Some(path) => FoodKb::load(path)
            .await
            .context("Failed to load recipe catalog")?,
        None => FoodKb::builtin().context("Failed to load built-in recipe catalog")?,
    });

    let state = Arc::new(SessionState::new());
    let event_bus = EventBus::new(1000);

    // External collaborators
    let source =
        Arc::new(SnapshotSource::new(&config.capture).context("Failed to build frame source")?);
    let classifier = Arc::new(
        HttpClassifier::new(&config.classifier).context("Failed to build classifier client")?,
    );
    let resolver = Arc::new(
        ProductMatcherClient::new(&config.matcher)
            .context("Failed to build product matcher client")?,
    );

    let engine = Arc::new(DetectionEngine::new(
        &config,
        Arc::clone(&state),
        event_bus.clone(),
        Arc::clone(&kb),
        source,
        classifier,
        resolver,
    ));
    info!("Detection engine initialized");

    // Build the application router
    let ctx = api::AppContext {
        state,
        engine: Arc::clone(&engine),
        kb,
        event_bus,
    };
    let app = api::build_router(ctx);

    // Create socket address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    info!("Starting HTTP server on {}", addr);

    // Create and run the server
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Release the camera if a session is still running
    engine.stop().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
