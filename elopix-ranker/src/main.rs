//! EloPix ranker - main entry point
//!
//! Scans the image folder, loads the rating and blacklist documents, starts
//! the prefetch producer and serves the ranking UI. Ratings are saved on
//! shutdown.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use elopix_common::config::{self, TomlConfig};
use elopix_common::events::EventBus;
use elopix_ranker::assets::{AssetLoader, FileAssetLoader};
use elopix_ranker::catalog::{CatalogProvider, FolderCatalog};
use elopix_ranker::prefetch::{self, PrefetchSettings};
use elopix_ranker::ranking::{Blacklist, PersistenceController, RankingState, RatingStore, SelectionPolicy};
use elopix_ranker::session::RankingSession;
use elopix_ranker::{build_router, AppState};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Command-line arguments for elopix-ranker
#[derive(Parser, Debug)]
#[command(name = "elopix-ranker")]
#[command(about = "Rank a folder of images by pairwise comparison")]
#[command(version)]
struct Args {
    /// Config file (default: ~/.config/elopix/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Folder of images to rank (env: ELOPIX_IMAGE_ROOT)
    #[arg(short, long)]
    image_root: Option<PathBuf>,

    /// Folder holding ratings.json and blacklist.json (env: ELOPIX_DATA_FOLDER)
    #[arg(short, long)]
    data_folder: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "ELOPIX_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (config, config_source) =
        config::load_config(args.config.as_deref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!(
        "Starting EloPix ranker v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    config_source.log();

    let image_root = config::resolve_folder(
        args.image_root.as_deref(),
        "ELOPIX_IMAGE_ROOT",
        config.image_root.as_deref(),
        config::default_image_root,
    );
    let data_folder = config::resolve_folder(
        args.data_folder.as_deref(),
        "ELOPIX_DATA_FOLDER",
        config.data_folder.as_deref(),
        config::default_data_folder,
    );
    std::fs::create_dir_all(&data_folder)
        .with_context(|| format!("Failed to create data folder {}", data_folder.display()))?;
    info!("Image root: {}", image_root.display());
    info!("Data folder: {}", data_folder.display());

    let catalog = FolderCatalog::new(config.identity)
        .scan(&image_root)
        .context("Failed to scan image folder")?;
    if catalog.len() < 2 {
        warn!("Only {} images found; at least two are needed to compare", catalog.len());
    }

    let persistence = PersistenceController::in_folder(&data_folder);
    let store = RatingStore::load(persistence.ratings_path()).context("Failed to load ratings")?;
    let blacklist = Blacklist::load(persistence.blacklist_path()).context("Failed to load blacklist")?;
    let ranking = RankingState::new(catalog, store, blacklist).shared();

    let events = EventBus::new(100);
    let cancel = CancellationToken::new();
    let policy = SelectionPolicy::new(config.selection.pool_size);
    let loader: Arc<dyn AssetLoader> = Arc::new(FileAssetLoader::new(config.assets.max_bytes));

    let (queue, producer) = prefetch::spawn(
        ranking.clone(),
        policy,
        loader.clone(),
        prefetch_settings(&config),
        cancel.clone(),
    );

    let autosave = (config.autosave_interval_secs > 0).then(|| {
        persistence.spawn_autosave(
            ranking.clone(),
            Duration::from_secs(config.autosave_interval_secs),
            cancel.clone(),
            events.clone(),
        )
    });

    let session = RankingSession::new(ranking.clone(), policy, loader, queue, Arc::new(events.clone()));
    let state = AppState::new(session, ranking.clone(), persistence.clone(), events, config.top_rank_count);
    let app = build_router(state);

    let port = args.port.unwrap_or(config.port);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("elopix-ranker listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    cancel.cancel();
    producer.shutdown().await;
    if let Some(task) = autosave {
        if let Err(e) = task.await {
            warn!("Autosave task ended abnormally: {}", e);
        }
    }

    match persistence.save(&ranking).await {
        Ok(summary) => info!(
            "Final save complete: {} ratings, {} blacklisted",
            summary.items, summary.blacklisted
        ),
        Err(e) => {
            error!("Final save failed: {}", e);
            return Err(e).context("Failed to save ratings on shutdown");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

fn prefetch_settings(config: &TomlConfig) -> PrefetchSettings {
    PrefetchSettings {
        capacity: config.prefetch.capacity,
        retry_backoff: Duration::from_millis(config.prefetch.retry_backoff_ms),
        idle_backoff: Duration::from_millis(config.prefetch.idle_backoff_ms),
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install signal handler: {}", e);
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
