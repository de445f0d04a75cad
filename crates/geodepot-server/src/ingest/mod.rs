//! Ingestion pipeline
//!
//! Runs one upload/replace attempt end to end: open a session, validate,
//! stage the payload, register the store with the catalog, then commit the
//! database side. The catalog and the database share no transaction, so the
//! pipeline compensates on failure instead of rolling back: a metadata
//! record created for the failing attempt is deleted, staged files release
//! on drop, and the session keeps the diagnostics.

pub mod jobs;
pub mod scheduler;

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::catalog::{CatalogClient, CatalogSyncError, StoreKind, StoreOptions};
use crate::diagnostics::log_snippet;
use crate::metadata::{self, MetadataError};
use crate::permissions;
use crate::resources::{self, NewResource, Resource};
use crate::sessions;
use crate::staging::{self, FilePart, StagingError};

/// How the attempt relates to a metadata record
///
/// Compensation only ever deletes a record the failing attempt itself
/// created; a pre-existing record (the replace path) is left untouched.
#[derive(Debug, Clone, Copy)]
pub enum MetadataAttachment {
    CreatedThisAttempt(Uuid),
    Existing(Uuid),
    None,
}

/// One upload/replace attempt
#[derive(Debug)]
pub struct IngestRequest {
    pub base: FilePart,
    pub sidecars: Vec<FilePart>,
    pub type_name: String,
    pub title: String,
    pub user: String,
    pub charset: String,
    pub overwrite: bool,
    pub metadata: MetadataAttachment,
    pub permissions: Option<serde_json::Value>,
}

/// Errors raised inside one pipeline attempt
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{0}")]
    Validation(String),

    #[error("Staging failed: {0}")]
    Staging(#[from] StagingError),

    #[error("Catalog sync failed: {0}")]
    Catalog(#[from] CatalogSyncError),

    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A failed attempt, with the session carrying its diagnostics
#[derive(Debug)]
pub struct IngestFailure {
    /// Absent only when opening the session itself failed
    pub session_id: Option<Uuid>,
    /// Tail of the catalog log captured at failure time
    pub diagnostic_log: Option<String>,
    pub error: IngestError,
}

impl IngestFailure {
    pub fn traceback(&self) -> String {
        render_traceback(&self.error)
    }
}

impl std::fmt::Display for IngestFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.error.fmt(f)
    }
}

/// A successful attempt
#[derive(Debug)]
pub struct IngestOutcome {
    pub resource: Resource,
    pub session_id: Uuid,
}

/// Derive the catalog store name from the submitted title, falling back to
/// the base file's stem.
///
/// Dots become underscores before slugging, so "My Layer.Data" yields
/// "my_layer_data" rather than dropping the extension-like suffix.
pub fn derive_store_name(title: &str, base_file_name: &str) -> String {
    let source = if title.trim().is_empty() {
        std::path::Path::new(base_file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(base_file_name)
    } else {
        title
    };

    let mut slug = String::with_capacity(source.len());
    let mut last_was_sep = true;
    for ch in source.replace('.', "_").chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            slug.push('_');
            last_was_sep = true;
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    slug
}

/// Render an error and its source chain as attachable diagnostics
pub fn render_traceback(error: &dyn std::error::Error) -> String {
    let mut out = format!("{error}");
    let mut source = error.source();
    while let Some(cause) = source {
        out.push_str(&format!("\ncaused by: {cause}"));
        source = cause.source();
    }
    out
}

/// The ingestion pipeline's shared dependencies
pub struct Ingestor {
    pool: sqlx::PgPool,
    catalog: Arc<dyn CatalogClient>,
    staging_root: PathBuf,
    catalog_log_path: Option<PathBuf>,
}

impl Ingestor {
    pub fn new(
        pool: sqlx::PgPool,
        catalog: Arc<dyn CatalogClient>,
        staging_root: PathBuf,
        catalog_log_path: Option<PathBuf>,
    ) -> Self {
        Self {
            pool,
            catalog,
            staging_root,
            catalog_log_path,
        }
    }

    /// Run one attempt. Failures are recorded on the session before
    /// returning; compensation never masks the original error.
    #[tracing::instrument(skip(self, request), fields(type_name = %request.type_name, user = %request.user))]
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestOutcome, IngestFailure> {
        let session_id = match sessions::open(&self.pool, &request.user).await {
            Ok(id) => id,
            Err(e) => {
                // No session to record on, but the attempt's own metadata
                // record still has to go.
                self.compensate(&request).await;
                let snippet = log_snippet(self.catalog_log_path.as_deref()).await;
                return Err(IngestFailure {
                    session_id: None,
                    diagnostic_log: Some(snippet),
                    error: e.into(),
                });
            },
        };

        match self.attempt(&request).await {
            Ok(resource) => {
                if let Err(e) = sessions::mark_processed(&self.pool, session_id).await {
                    tracing::error!(session_id = %session_id, error = %e, "failed to mark session processed");
                }
                tracing::info!(
                    session_id = %session_id,
                    resource_id = %resource.id,
                    "ingest succeeded"
                );
                Ok(IngestOutcome {
                    resource,
                    session_id,
                })
            },
            Err(error) => {
                self.compensate(&request).await;

                let traceback = render_traceback(&error);
                let snippet = log_snippet(self.catalog_log_path.as_deref()).await;
                if let Err(e) = sessions::record_failure(
                    &self.pool,
                    session_id,
                    &error.to_string(),
                    &traceback,
                    &snippet,
                )
                .await
                {
                    tracing::error!(session_id = %session_id, error = %e, "failed to record failure on session");
                }

                tracing::warn!(session_id = %session_id, error = %error, "ingest failed");
                Err(IngestFailure {
                    session_id: Some(session_id),
                    diagnostic_log: Some(snippet),
                    error,
                })
            },
        }
    }

    async fn attempt(&self, request: &IngestRequest) -> Result<Resource, IngestError> {
        tracing::debug!(state = "validating");
        let kind = StoreKind::for_path(std::path::Path::new(&request.base.file_name))
            .ok_or_else(|| {
                IngestError::Validation(format!(
                    "Unsupported file type: '{}'",
                    request.base.file_name
                ))
            })?;
        if request.type_name.is_empty() {
            return Err(IngestError::Validation(
                "A dataset name could not be derived from the submission".to_string(),
            ));
        }

        tracing::debug!(state = "staging");
        let staged = staging::stage(
            &self.staging_root,
            request.base.clone(),
            request.sidecars.clone(),
        )
        .await?;

        tracing::debug!(state = "syncing_catalog");
        let opts = StoreOptions {
            kind,
            charset: request.charset.clone(),
            overwrite: request.overwrite,
        };
        let handle = self
            .catalog
            .create_or_replace_store(&request.type_name, staged.base_file(), &opts)
            .await?;

        let resource = resources::upsert(
            &self.pool,
            &NewResource {
                type_name: request.type_name.clone(),
                title: request.title.clone(),
                store_type: handle.kind,
                owner_name: request.user.clone(),
                bounding_box: handle
                    .bounding_box
                    .map(|bbox| serde_json::json!(bbox)),
            },
        )
        .await?;

        match request.metadata {
            MetadataAttachment::CreatedThisAttempt(id) | MetadataAttachment::Existing(id) => {
                metadata::link_resource(&self.pool, id, resource.id).await?;
            },
            MetadataAttachment::None => {},
        }

        if let Some(map) = &request.permissions {
            permissions::apply(&self.pool, resource.id, map).await?;
        }

        Ok(resource)
    }

    /// Undo the attempt's own side effects after a failure.
    ///
    /// A compensation failure is logged for operators and swallowed; the
    /// caller still sees the original error.
    async fn compensate(&self, request: &IngestRequest) {
        if let MetadataAttachment::CreatedThisAttempt(id) = request.metadata {
            if let Err(e) = metadata::delete(&self.pool, id).await {
                tracing::error!(
                    metadata_id = %id,
                    error = %e,
                    "CompensationError: orphan metadata record left behind"
                );
            } else {
                tracing::debug!(metadata_id = %id, "compensated: metadata record deleted");
            }
        }
    }
}
