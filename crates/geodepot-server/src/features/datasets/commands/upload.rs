//! Upload command: create a new dataset from a multipart submission

use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::ingest::{
    derive_store_name, IngestFailure, IngestRequest, Ingestor, MetadataAttachment,
};
use crate::metadata::{self, DateFields, DescriptiveFields, MetadataError, TaxonomyRefs};
use crate::resources::Resource;
use crate::staging::FilePart;

/// Upload a new dataset
#[derive(Debug)]
pub struct UploadDatasetCommand {
    pub base: FilePart,
    pub sidecars: Vec<FilePart>,
    pub title: String,
    pub charset: String,
    pub refs: TaxonomyRefs,
    pub dates: DateFields,
    pub regions: Vec<String>,
    pub fields: DescriptiveFields,
    pub permissions: Option<serde_json::Value>,
    pub user: String,
}

#[derive(Debug, Error)]
pub enum UploadDatasetError {
    #[error("No base file was provided")]
    MissingBaseFile,

    #[error("A dataset named '{0}' already exists; use replace instead")]
    AlreadyExists(String),

    #[error("{0}")]
    Metadata(#[from] MetadataError),

    #[error("{0}")]
    Ingest(IngestFailure),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl UploadDatasetError {
    /// Session the failure was recorded on, when one was opened
    pub fn session_id(&self) -> Option<Uuid> {
        match self {
            UploadDatasetError::Ingest(failure) => failure.session_id,
            _ => None,
        }
    }

    pub fn traceback(&self) -> Option<String> {
        match self {
            UploadDatasetError::Ingest(failure) => Some(failure.traceback()),
            _ => None,
        }
    }

    /// Catalog log tail captured when the pipeline failed
    pub fn diagnostic_log(&self) -> Option<String> {
        match self {
            UploadDatasetError::Ingest(failure) => failure.diagnostic_log.clone(),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct UploadDatasetResponse {
    pub resource: Resource,
    pub session_id: Uuid,
}

/// Create the metadata record, then run the pipeline with the record
/// attached as created-this-attempt so a failure compensates it.
#[tracing::instrument(skip(pool, ingestor, command), fields(title = %command.title, user = %command.user))]
pub async fn handle(
    pool: PgPool,
    ingestor: Arc<Ingestor>,
    command: UploadDatasetCommand,
) -> Result<UploadDatasetResponse, UploadDatasetError> {
    if command.base.bytes.is_empty() || command.base.file_name.trim().is_empty() {
        return Err(UploadDatasetError::MissingBaseFile);
    }

    let type_name = derive_store_name(&command.title, &command.base.file_name);
    if crate::resources::find_by_type_name(&pool, &type_name)
        .await?
        .is_some()
    {
        return Err(UploadDatasetError::AlreadyExists(type_name));
    }

    let basename = std::path::Path::new(&command.base.file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(&command.base.file_name)
        .to_string();

    let record = metadata::build(
        &pool,
        command.refs,
        &command.dates,
        &command.regions,
        &command.fields,
        &basename,
    )
    .await?;

    let request = IngestRequest {
        base: command.base,
        sidecars: command.sidecars,
        type_name: type_name.clone(),
        title: command.title,
        user: command.user,
        charset: command.charset,
        overwrite: false,
        metadata: MetadataAttachment::CreatedThisAttempt(record.id),
        permissions: command.permissions,
    };

    let outcome = ingestor
        .ingest(request)
        .await
        .map_err(UploadDatasetError::Ingest)?;

    tracing::info!(
        resource_id = %outcome.resource.id,
        type_name = %type_name,
        "dataset uploaded"
    );

    Ok(UploadDatasetResponse {
        resource: outcome.resource,
        session_id: outcome.session_id,
    })
}
