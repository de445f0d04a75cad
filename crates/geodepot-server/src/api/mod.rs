pub mod response;

use crate::catalog::GeoServerClient;
use crate::config::{Config, CorsConfig};
use crate::db;
use crate::features::{self, FeatureState};
use crate::ingest::scheduler::{DeletionContext, DeletionQueue, DeletionWorker};
use crate::ingest::Ingestor;
use apalis_postgres::PostgresStorage;
use axum::{
    http::{HeaderValue, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub async fn serve(config: Config) -> anyhow::Result<()> {
    let db = db::create_pool(&config.database).await?;
    db::run_migrations(&db).await?;

    // Queue tables for the deletion worker.
    PostgresStorage::setup(&db).await?;

    let catalog = Arc::new(GeoServerClient::new(&config.catalog)?);
    let ingestor = Arc::new(Ingestor::new(
        db.clone(),
        catalog.clone(),
        config.staging.root.clone(),
        config.catalog.log_file.clone(),
    ));

    let queue = DeletionQueue::new(&db);
    let worker = DeletionWorker::new(
        &queue,
        DeletionContext {
            db: db.clone(),
            catalog: catalog.clone(),
        },
    );
    let worker_handle = worker.start();

    let state = FeatureState {
        db,
        ingestor,
        catalog,
        deletions: Arc::new(queue),
    };
    let app = create_router(state, &config.cors);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    worker_handle.abort();
    Ok(())
}

fn create_router(state: FeatureState, cors: &CorsConfig) -> Router {
    let api_v1 = features::router(state);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/api/v1", api_v1)
        .layer(cors_layer(cors))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    if origins.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "GeoDepot Server",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
