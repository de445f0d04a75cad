//! Replace command: swap the content of an existing dataset
//!
//! The compatibility guard runs before the destructive catalog delete, so
//! an incompatible submission leaves the existing store untouched. After
//! the delete the legacy asymmetry applies: a failed re-ingest reports the
//! error but does not restore the old store.

use sqlx::PgPool;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::catalog::{CatalogClient, CatalogSyncError, StoreKind};
use crate::ingest::{IngestFailure, IngestRequest, Ingestor, MetadataAttachment};
use crate::metadata;
use crate::resources::{self, Resource};
use crate::staging::FilePart;

/// Replace the content of an existing dataset
#[derive(Debug)]
pub struct ReplaceDatasetCommand {
    pub type_name: String,
    pub base: FilePart,
    pub sidecars: Vec<FilePart>,
    pub charset: String,
    pub user: String,
}

#[derive(Debug, Error)]
pub enum ReplaceDatasetError {
    #[error("Dataset '{0}' not found")]
    NotFound(String),

    #[error("Unsupported file type: '{0}'")]
    Unsupported(String),

    #[error("{0}")]
    Incompatible(String),

    #[error("Failed to remove the existing store: {0}")]
    CatalogDelete(#[from] CatalogSyncError),

    #[error("{0}")]
    Ingest(IngestFailure),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ReplaceDatasetError {
    pub fn session_id(&self) -> Option<Uuid> {
        match self {
            ReplaceDatasetError::Ingest(failure) => failure.session_id,
            _ => None,
        }
    }

    pub fn traceback(&self) -> Option<String> {
        match self {
            ReplaceDatasetError::Ingest(failure) => Some(failure.traceback()),
            _ => None,
        }
    }

    /// Catalog log tail captured when the pipeline failed
    pub fn diagnostic_log(&self) -> Option<String> {
        match self {
            ReplaceDatasetError::Ingest(failure) => failure.diagnostic_log.clone(),
            _ => None,
        }
    }
}

fn mismatch_message(existing: StoreKind, incoming: StoreKind) -> Option<String> {
    match (existing, incoming) {
        (StoreKind::Vector, StoreKind::Raster) => {
            Some("You are attempting to replace a vector dataset with a raster.".to_string())
        },
        (StoreKind::Raster, StoreKind::Vector) => {
            Some("You are attempting to replace a raster dataset with a vector.".to_string())
        },
        _ => None,
    }
}

#[tracing::instrument(skip(pool, catalog, ingestor, command), fields(type_name = %command.type_name, user = %command.user))]
pub async fn handle(
    pool: PgPool,
    catalog: Arc<dyn CatalogClient>,
    ingestor: Arc<Ingestor>,
    command: ReplaceDatasetCommand,
) -> Result<Resource, ReplaceDatasetError> {
    let existing = resources::find_by_type_name(&pool, &command.type_name)
        .await?
        .ok_or_else(|| ReplaceDatasetError::NotFound(command.type_name.clone()))?;

    let incoming_kind = StoreKind::for_path(Path::new(&command.base.file_name))
        .ok_or_else(|| ReplaceDatasetError::Unsupported(command.base.file_name.clone()))?;

    if let Some(existing_kind) = existing.store_kind() {
        if let Some(message) = mismatch_message(existing_kind, incoming_kind) {
            return Err(ReplaceDatasetError::Incompatible(message));
        }
    }

    let attachment = match metadata::find_for_resource(&pool, existing.id).await? {
        Some(record) => MetadataAttachment::Existing(record.id),
        None => MetadataAttachment::None,
    };

    // Point of no return: the old store is gone after this call.
    catalog.delete_store(&command.type_name).await?;

    let request = IngestRequest {
        base: command.base,
        sidecars: command.sidecars,
        type_name: command.type_name.clone(),
        title: existing.title.clone(),
        user: command.user,
        charset: command.charset,
        overwrite: true,
        metadata: attachment,
        permissions: None,
    };

    let outcome = ingestor
        .ingest(request)
        .await
        .map_err(ReplaceDatasetError::Ingest)?;

    tracing::info!(
        resource_id = %outcome.resource.id,
        type_name = %command.type_name,
        "dataset replaced"
    );

    Ok(outcome.resource)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatch_messages_are_direction_specific() {
        assert_eq!(
            mismatch_message(StoreKind::Vector, StoreKind::Raster).as_deref(),
            Some("You are attempting to replace a vector dataset with a raster.")
        );
        assert_eq!(
            mismatch_message(StoreKind::Raster, StoreKind::Vector).as_deref(),
            Some("You are attempting to replace a raster dataset with a vector.")
        );
        assert_eq!(mismatch_message(StoreKind::Vector, StoreKind::Vector), None);
        assert_eq!(mismatch_message(StoreKind::Raster, StoreKind::Raster), None);
    }

    mod db {
        use super::*;
        use crate::catalog::{StoreHandle, StoreOptions};
        use crate::resources::test_support::vector_resource;
        use async_trait::async_trait;
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Mutex;

        struct RecordingCatalog {
            deleted: Mutex<Vec<String>>,
            created: Mutex<Vec<String>>,
            fail_create: AtomicBool,
        }

        impl RecordingCatalog {
            fn new() -> Arc<Self> {
                Arc::new(Self {
                    deleted: Mutex::new(Vec::new()),
                    created: Mutex::new(Vec::new()),
                    fail_create: AtomicBool::new(false),
                })
            }
        }

        #[async_trait]
        impl CatalogClient for RecordingCatalog {
            async fn create_or_replace_store(
                &self,
                type_name: &str,
                _base_file: &Path,
                opts: &StoreOptions,
            ) -> Result<StoreHandle, CatalogSyncError> {
                if self.fail_create.load(Ordering::SeqCst) {
                    return Err(CatalogSyncError::Rejected {
                        type_name: type_name.to_string(),
                        status: 500,
                        message: "re-ingest failed".to_string(),
                    });
                }
                self.created.lock().unwrap().push(type_name.to_string());
                Ok(StoreHandle {
                    type_name: type_name.to_string(),
                    kind: opts.kind,
                    bounding_box: None,
                })
            }

            async fn delete_store(&self, type_name: &str) -> Result<(), CatalogSyncError> {
                self.deleted.lock().unwrap().push(type_name.to_string());
                Ok(())
            }
        }

        fn ingestor(pool: &PgPool, catalog: Arc<RecordingCatalog>) -> Arc<Ingestor> {
            Arc::new(Ingestor::new(
                pool.clone(),
                catalog,
                std::env::temp_dir().join("geodepot-replace-tests"),
                None,
            ))
        }

        fn command(type_name: &str, file_name: &str) -> ReplaceDatasetCommand {
            ReplaceDatasetCommand {
                type_name: type_name.to_string(),
                base: FilePart::new(file_name, b"payload".to_vec()),
                sidecars: vec![],
                charset: "UTF-8".to_string(),
                user: "alice".to_string(),
            }
        }

        #[sqlx::test]
        async fn test_mismatch_fails_before_any_delete(pool: PgPool) -> sqlx::Result<()> {
            resources::upsert(&pool, &vector_resource("roads", "alice")).await?;
            let catalog = RecordingCatalog::new();

            let err = handle(
                pool.clone(),
                catalog.clone(),
                ingestor(&pool, catalog.clone()),
                command("roads", "elevation.tif"),
            )
            .await
            .expect_err("raster over vector must be refused");

            assert!(matches!(err, ReplaceDatasetError::Incompatible(_)));
            assert!(
                err.to_string()
                    .contains("replace a vector dataset with a raster")
            );
            // The guard ran before anything destructive.
            assert!(catalog.deleted.lock().unwrap().is_empty());
            Ok(())
        }

        #[sqlx::test]
        async fn test_replace_deletes_then_reingests(pool: PgPool) -> sqlx::Result<()> {
            let original = resources::upsert(&pool, &vector_resource("roads", "alice")).await?;
            let catalog = RecordingCatalog::new();

            let replaced = handle(
                pool.clone(),
                catalog.clone(),
                ingestor(&pool, catalog.clone()),
                command("roads", "roads_v2.shp"),
            )
            .await
            .expect("replace should succeed");

            assert_eq!(replaced.id, original.id);
            assert_eq!(catalog.deleted.lock().unwrap().as_slice(), ["roads"]);
            assert_eq!(catalog.created.lock().unwrap().as_slice(), ["roads"]);
            Ok(())
        }

        #[sqlx::test]
        async fn test_failed_reingest_reports_but_does_not_restore(
            pool: PgPool,
        ) -> sqlx::Result<()> {
            resources::upsert(&pool, &vector_resource("roads", "alice")).await?;
            let catalog = RecordingCatalog::new();
            catalog.fail_create.store(true, Ordering::SeqCst);

            let err = handle(
                pool.clone(),
                catalog.clone(),
                ingestor(&pool, catalog.clone()),
                command("roads", "roads_v2.shp"),
            )
            .await
            .expect_err("re-ingest failure must surface");

            assert!(matches!(err, ReplaceDatasetError::Ingest(_)));
            assert!(err.session_id().is_some());
            assert!(err.diagnostic_log().is_some());
            // The destructive delete already happened; nothing restores it.
            assert_eq!(catalog.deleted.lock().unwrap().as_slice(), ["roads"]);
            // The resource row survives the failed replace.
            assert!(resources::find_by_type_name(&pool, "roads").await?.is_some());
            Ok(())
        }

        #[sqlx::test]
        async fn test_unknown_dataset_is_not_found(pool: PgPool) -> sqlx::Result<()> {
            let catalog = RecordingCatalog::new();
            let err = handle(
                pool.clone(),
                catalog.clone(),
                ingestor(&pool, catalog),
                command("ghost", "ghost.shp"),
            )
            .await
            .expect_err("missing dataset");

            assert!(matches!(err, ReplaceDatasetError::NotFound(_)));
            Ok(())
        }
    }
}
