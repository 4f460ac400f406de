//! Main entry point for the expediente server.
//!
//! Wires the document store, doctor directory and blob store together and
//! serves the REST API with OpenAPI/Swagger documentation.
//!
//! # Environment Variables
//! - `EXPEDIENTE_REST_ADDR`: server address (default: "0.0.0.0:3000")
//! - `EXPEDIENTE_BLOB_DIR`: directory for binary content (default: "expediente_data/blobs")
//! - `API_KEY`: when set, every request must present it in `x-api-key`

use api_rest::{app, AppState};
use expediente_core::{config, CoreConfig, StoreDoctorDirectory};
use expediente_files::LocalBlobStore;
use expediente_store::memory::MemoryStore;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("expediente=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("EXPEDIENTE_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let config = CoreConfig::new(config::blob_dir_from_env_value(
        std::env::var("EXPEDIENTE_BLOB_DIR").ok(),
    ));

    tracing::info!("-- Starting Expediente on {}", rest_addr);
    tracing::info!("-- Binary content under {}", config.blob_dir().display());

    let store = Arc::new(MemoryStore::new());
    let doctors = Arc::new(StoreDoctorDirectory::new(store.clone()));
    let blobs = Arc::new(LocalBlobStore::new(config.blob_dir())?);

    let state = AppState::new(store, doctors, blobs);

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}
