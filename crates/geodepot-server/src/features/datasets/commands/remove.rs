//! Remove command: synchronous checks, then enqueue the deletion job
//!
//! The destructive teardown runs in the background worker
//! (`ingest::scheduler`); this command only verifies the removal is allowed,
//! detaches the metadata record, and enqueues. A refused removal enqueues
//! nothing and deletes nothing.

use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::ingest::jobs::DeleteDatasetJob;
use crate::ingest::scheduler::DeletionDispatch;
use crate::metadata;
use crate::resources;

/// Remove a dataset
#[derive(Debug)]
pub struct RemoveDatasetCommand {
    pub type_name: String,
    pub user: String,
}

#[derive(Debug, Error)]
pub enum RemoveDatasetError {
    #[error("Dataset '{0}' not found")]
    NotFound(String),

    #[error("This dataset is a member of a dataset group, you must remove it from the group before deleting.")]
    GroupMembership,

    #[error("Failed to enqueue deletion: {0}")]
    Dispatch(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug)]
pub struct RemoveDatasetResponse {
    pub resource_id: Uuid,
    pub type_name: String,
}

#[tracing::instrument(skip(pool, deletions, command), fields(type_name = %command.type_name, user = %command.user))]
pub async fn handle(
    pool: PgPool,
    deletions: Arc<dyn DeletionDispatch>,
    command: RemoveDatasetCommand,
) -> Result<RemoveDatasetResponse, RemoveDatasetError> {
    let resource = resources::find_by_type_name(&pool, &command.type_name)
        .await?
        .ok_or_else(|| RemoveDatasetError::NotFound(command.type_name.clone()))?;

    if resources::is_group_member(&pool, resource.id).await? {
        return Err(RemoveDatasetError::GroupMembership);
    }

    if let Some(record) = metadata::find_for_resource(&pool, resource.id).await? {
        metadata::delete(&pool, record.id).await?;
    }

    let job = DeleteDatasetJob::new(resource.id, command.type_name.clone())
        .with_triggered_by(command.user);
    deletions
        .enqueue(job)
        .await
        .map_err(|e| RemoveDatasetError::Dispatch(e.to_string()))?;

    tracing::info!(resource_id = %resource.id, "dataset removal enqueued");

    Ok(RemoveDatasetResponse {
        resource_id: resource.id,
        type_name: command.type_name,
    })
}
