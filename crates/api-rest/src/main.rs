//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own, backed by the in-memory document
//! store and the local blob store.
//!
//! ## Intended use
//! Development and debugging when you only want the REST server (with
//! OpenAPI/Swagger UI). The workspace's main `expediente-run` binary is the
//! full entry point.

use api_rest::{app, AppState};
use expediente_core::{config, CoreConfig, StoreDoctorDirectory};
use expediente_files::LocalBlobStore;
use expediente_store::memory::MemoryStore;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("EXPEDIENTE_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let config = CoreConfig::new(config::blob_dir_from_env_value(
        std::env::var("EXPEDIENTE_BLOB_DIR").ok(),
    ));

    tracing::info!("-- Starting Expediente REST API on {}", addr);

    let store = Arc::new(MemoryStore::new());
    let doctors = Arc::new(StoreDoctorDirectory::new(store.clone()));
    let blobs = Arc::new(LocalBlobStore::new(config.blob_dir())?);

    let state = AppState::new(store, doctors, blobs);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}
