//! Metadata edit command
//!
//! Get-or-create: resources that predate metadata capture gain a record on
//! their first edit.

use sqlx::PgPool;
use thiserror::Error;

use crate::metadata::{
    self, DateFields, DescriptiveFields, MetadataError, MetadataRecord, TaxonomyRefs,
};
use crate::resources;

#[derive(Debug)]
pub struct UpdateMetadataCommand {
    pub type_name: String,
    pub refs: TaxonomyRefs,
    pub dates: DateFields,
    pub regions: Vec<String>,
    pub fields: DescriptiveFields,
}

#[derive(Debug, Error)]
pub enum UpdateMetadataError {
    #[error("Dataset '{0}' not found")]
    NotFound(String),

    #[error("{0}")]
    Metadata(#[from] MetadataError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[tracing::instrument(skip(pool, command), fields(type_name = %command.type_name))]
pub async fn handle(
    pool: PgPool,
    command: UpdateMetadataCommand,
) -> Result<MetadataRecord, UpdateMetadataError> {
    let resource = resources::find_by_type_name(&pool, &command.type_name)
        .await?
        .ok_or_else(|| UpdateMetadataError::NotFound(command.type_name.clone()))?;

    let record = metadata::update_for_resource(
        &pool,
        resource.id,
        command.refs,
        &command.dates,
        &command.regions,
        &command.fields,
        &command.type_name,
    )
    .await?;

    tracing::info!(resource_id = %resource.id, metadata_id = %record.id, "metadata updated");
    Ok(record)
}
