//! Feature modules implementing the GeoDepot API
//!
//! Each feature is a vertical slice with its own commands, queries, and
//! routes:
//! - `commands/` - Write operations (upload, replace, remove)
//! - `queries/` - Read operations (get, list)
//! - `routes.rs` - HTTP route definitions
//! - `types.rs` - Shared types

pub mod datasets;
pub mod upload_sessions;

use axum::Router;
use sqlx::PgPool;
use std::sync::Arc;

use crate::catalog::CatalogClient;
use crate::ingest::scheduler::DeletionDispatch;
use crate::ingest::Ingestor;

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    /// PostgreSQL connection pool for database operations
    pub db: PgPool,
    /// Ingestion pipeline shared by the upload and replace commands
    pub ingestor: Arc<Ingestor>,
    /// Catalog client for operations outside the pipeline
    pub catalog: Arc<dyn CatalogClient>,
    /// Enqueue handle for the deletion queue
    pub deletions: Arc<dyn DeletionDispatch>,
}

/// Creates the main API router with all feature routes mounted
pub fn router(state: FeatureState) -> Router<()> {
    Router::new()
        .nest(
            "/datasets",
            datasets::datasets_routes().with_state(state.clone()),
        )
        .nest(
            "/upload-sessions",
            upload_sessions::upload_sessions_routes().with_state(state),
        )
}
