use anyhow::Result;
use axum::Router;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::{fs, io::ErrorKind, path::Path, str::FromStr, sync::Arc};
use tokio::{net::TcpListener, sync::mpsc};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
#[cfg(test)]
mod test_support;

use app_state::AppState;
use services::{
    metadata_store::SqliteMetadataStore,
    notifications::{CHANNEL_CAPACITY, MAX_IN_FLIGHT, spawn_dispatcher},
    object_store::DiskObjectStore,
    pipeline::{PipelineSettings, ThumbnailPipeline},
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting thumbnail-service with config: {:?}", cfg);

    // --- Ensure storage directory exists ---
    if !Path::new(&cfg.storage_dir).exists() {
        fs::create_dir_all(&cfg.storage_dir)?;
        tracing::info!("Created storage directory at {}", cfg.storage_dir);
    }

    // --- Initialize SQLite connection ---
    let connect_options = SqliteConnectOptions::from_str(&cfg.database_url)?.create_if_missing(true);
    if let Some(parent) = connect_options.get_filename().parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }

    let db = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?,
    );

    // --- Stores + schema ---
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let objects = DiskObjectStore::new(db.clone(), cfg.storage_dir.clone()).with_notifier(tx);
    let records = Arc::new(SqliteMetadataStore::new(
        db.clone(),
        cfg.table.clone(),
        cfg.scan_page_size,
    )?);

    objects.ensure_schema().await?;
    records.ensure_schema().await?;
    tracing::info!("Schema ready (metadata table `{}`)", records.table());

    if migrate {
        tracing::info!("Database migration complete.");
        return Ok(());
    }

    // --- Pipeline + notification dispatcher ---
    let pipeline = Arc::new(ThumbnailPipeline::new(
        Arc::new(objects.clone()),
        records.clone(),
        PipelineSettings {
            thumbnail_size: cfg.thumbnail_size,
            public_base_url: cfg.public_base_url.clone(),
        },
    ));
    spawn_dispatcher(pipeline.clone(), rx, MAX_IN_FLIGHT);

    // --- Build router ---
    let app: Router = routes::routes::routes().with_state(AppState {
        pipeline,
        objects,
        records,
    });

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!(
        region = %cfg.region,
        thumbnail_size = cfg.thumbnail_size,
        "Server listening on http://{}",
        listener.local_addr()?
    );
    axum::serve(listener, app).await?;

    Ok(())
}
