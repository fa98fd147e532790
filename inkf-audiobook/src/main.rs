//! Audiobook service (inkf-audiobook) - Main entry point
//!
//! Resolves configuration, opens the database, starts the background worker
//! and serves the HTTP API until Ctrl+C or SIGTERM.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use inkf_common::config::{CompiledDefaults, RootFolderInitializer, RootFolderResolver, TomlConfig};
use inkf_common::events::EventBus;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use inkf_audiobook::services::{LocalObjectStore, OpenAiSpeechClient};
use inkf_audiobook::workflow::{AudiobookPipeline, JobQueue};
use inkf_audiobook::{build_router, config, db, AppState, StripeConfig};

const MODULE_NAME: &str = "inkf-audiobook";
const DEFAULT_PORT: u16 = 5810;
const QUEUE_CAPACITY: usize = 64;
const EVENT_BUS_CAPACITY: usize = 100;
const WORKER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Command-line arguments for inkf-audiobook
#[derive(Parser, Debug)]
#[command(name = "inkf-audiobook")]
#[command(about = "Audiobook generation microservice for Inkfluence")]
#[command(version)]
struct Args {
    /// Root folder holding the database and generated audio
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "INKF_AUDIOBOOK_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(short, long)]
    bind: Option<String>,

    /// TOML bootstrap config (defaults to the platform config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inkf_audiobook=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting Inkfluence audiobook service v{}", env!("CARGO_PKG_VERSION"));

    let toml_config = TomlConfig::load_or_default(args.config.as_deref(), MODULE_NAME);

    let root_folder = RootFolderResolver::new(MODULE_NAME)
        .with_cli_arg(args.root_folder.clone())
        .with_toml_config(&toml_config)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to create root folder")?;

    info!("Root folder: {}", initializer.root_folder().display());
    info!("Database: {}", initializer.database_path().display());

    let pool = inkf_common::db::init_database(&initializer.database_path())
        .await
        .context("Failed to initialize database")?;

    let openai_api_key = config::resolve_openai_api_key(&pool, &toml_config).await?;
    let speech_client = OpenAiSpeechClient::new(openai_api_key, toml_config.speech_base_url.as_deref())
        .context("Failed to create speech client")?;
    info!("Speech endpoint: {}", speech_client.endpoint());

    let stripe = StripeConfig {
        webhook_secret: config::resolve_stripe_webhook_secret(&pool, &toml_config).await?,
        price_tiers: db::settings::get_price_tiers(&pool).await?,
    };

    let (chunker, pipeline_config) = config::load_pipeline_settings(&pool).await?;

    let port = args.port.or(toml_config.port).unwrap_or(DEFAULT_PORT);
    let bind_address = args
        .bind
        .or_else(|| toml_config.bind_address.clone())
        .unwrap_or_else(|| CompiledDefaults::for_current_platform().bind_address);
    let public_base_url = toml_config
        .public_base_url
        .clone()
        .unwrap_or_else(|| format!("http://localhost:{}", port));

    let files_root = initializer.files_path();
    info!("Serving audio from {} at {}/files", files_root.display(), public_base_url);
    let store = LocalObjectStore::new(files_root.clone(), &public_base_url);

    let event_bus = EventBus::new(EVENT_BUS_CAPACITY);
    let pipeline = Arc::new(AudiobookPipeline::new(
        pool.clone(),
        Arc::new(speech_client),
        Arc::new(store),
        event_bus.clone(),
        pipeline_config,
    ));

    let cancel_token = CancellationToken::new();
    let (queue, worker) = JobQueue::start(pipeline, QUEUE_CAPACITY, event_bus.clone(), cancel_token.clone());

    let state = AppState::new(pool, event_bus, queue, chunker, stripe, files_root);
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", bind_address, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind_address, port))?;

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    cancel_token.cancel();
    if tokio::time::timeout(WORKER_SHUTDOWN_TIMEOUT, worker).await.is_err() {
        warn!("Audiobook worker did not stop within {:?}", WORKER_SHUTDOWN_TIMEOUT);
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
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
