//! Deletion queue
//!
//! Sets up and manages the apalis job queue with PostgreSQL storage. Removal
//! is two-phase: the HTTP handler runs the synchronous checks and enqueues,
//! and the worker here performs the destructive teardown.

use anyhow::Result;
use apalis::prelude::*;
use apalis_postgres::PostgresStorage;
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::jobs::DeleteDatasetJob;
use crate::catalog::CatalogClient;
use crate::resources;

/// Enqueue-side handle to the deletion queue
///
/// A trait so command tests can observe enqueues without a running backend.
#[async_trait]
pub trait DeletionDispatch: Send + Sync {
    async fn enqueue(&self, job: DeleteDatasetJob) -> Result<()>;
}

/// Production dispatch over apalis PostgreSQL storage
#[derive(Clone)]
pub struct DeletionQueue {
    storage: PostgresStorage<DeleteDatasetJob>,
}

impl DeletionQueue {
    /// Create queue storage. The apalis schema must already exist; call
    /// [`PostgresStorage::setup`] during startup before this.
    pub fn new(db: &PgPool) -> Self {
        Self {
            storage: PostgresStorage::new(db),
        }
    }

    pub fn storage(&self) -> PostgresStorage<DeleteDatasetJob> {
        self.storage.clone()
    }
}

#[async_trait]
impl DeletionDispatch for DeletionQueue {
    async fn enqueue(&self, job: DeleteDatasetJob) -> Result<()> {
        let mut storage = self.storage.clone();
        storage
            .push(job.clone())
            .await
            .map_err(|e| anyhow::anyhow!("failed to enqueue deletion job: {e}"))?;
        info!(resource_id = %job.resource_id, store = %job.type_name, "deletion job enqueued");
        Ok(())
    }
}

/// Dependencies the worker needs to process a deletion
#[derive(Clone)]
pub struct DeletionContext {
    pub db: PgPool,
    pub catalog: Arc<dyn CatalogClient>,
}

/// Worker half of the deletion queue
pub struct DeletionWorker {
    storage: PostgresStorage<DeleteDatasetJob>,
    ctx: DeletionContext,
}

impl DeletionWorker {
    pub fn new(queue: &DeletionQueue, ctx: DeletionContext) -> Self {
        Self {
            storage: queue.storage(),
            ctx,
        }
    }

    /// Start the worker monitor in a background task
    pub fn start(self) -> JoinHandle<()> {
        let storage = self.storage;
        let ctx = self.ctx;
        tokio::spawn(async move {
            info!("Deletion worker started");
            if let Err(e) = Monitor::new()
                .register(move |_index| {
                    // The backend must be set before worker data can be
                    // attached.
                    WorkerBuilder::new("geodepot-deletion-worker")
                        .backend(storage.clone())
                        .data(ctx.clone())
                        .build(process_delete_job)
                })
                .run()
                .await
            {
                tracing::error!("Deletion worker error: {:?}", e);
            }
            info!("Deletion worker stopped");
        })
    }
}

/// Process one dataset deletion job.
///
/// Ordering matters: the catalog store is torn down first so a crash leaves
/// a row pointing at a missing store (re-runnable) rather than a dangling
/// store with no row. Every step is idempotent; a job whose resource is
/// already gone is a logged no-op.
pub async fn process_delete_job(
    job: DeleteDatasetJob,
    ctx: Data<DeletionContext>,
) -> Result<()> {
    info!(
        resource_id = %job.resource_id,
        store = %job.type_name,
        triggered_by = job.triggered_by.as_deref().unwrap_or("system"),
        "processing dataset deletion"
    );

    ctx.catalog.delete_store(&job.type_name).await?;

    sqlx::query("DELETE FROM metadata_records WHERE resource_id = $1")
        .bind(job.resource_id)
        .execute(&ctx.db)
        .await?;

    let deleted = resources::delete_by_id(&ctx.db, job.resource_id).await?;
    if deleted {
        info!(resource_id = %job.resource_id, "dataset deleted");
    } else {
        warn!(resource_id = %job.resource_id, "resource already gone, nothing to delete");
    }

    Ok(())
}
