//! Catalog synchronization client
//!
//! External-facing operations against the geospatial catalog service that
//! owns the physical data stores. The catalog and the local database are not
//! covered by a shared transaction; callers reconcile failures through the
//! compensation paths in [`crate::ingest`].
//!
//! All calls are bounded by the configured client timeout. A timed-out or
//! unreachable catalog surfaces as a [`CatalogSyncError`] and takes the same
//! failure path as an explicit rejection.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::config::CatalogConfig;

/// Physical store kind, derived from the base file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Vector,
    Raster,
    Remote,
}

impl StoreKind {
    /// Detect the store kind from a file name or path.
    ///
    /// Zip archives are treated as vector data (shapefile archives), matching
    /// the upload form's assumptions.
    pub fn for_path(path: &Path) -> Option<StoreKind> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "shp" | "geojson" | "json" | "gpkg" | "csv" | "zip" => Some(StoreKind::Vector),
            "tif" | "tiff" | "geotiff" | "asc" | "img" => Some(StoreKind::Raster),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKind::Vector => "vector",
            StoreKind::Raster => "raster",
            StoreKind::Remote => "remote",
        }
    }
}

impl std::str::FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vector" => Ok(StoreKind::Vector),
            "raster" => Ok(StoreKind::Raster),
            "remote" => Ok(StoreKind::Remote),
            other => Err(format!("unknown store kind: {}", other)),
        }
    }
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for a store create/replace call
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub kind: StoreKind,
    pub charset: String,
    pub overwrite: bool,
}

/// Result of a successful store registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreHandle {
    pub type_name: String,
    pub kind: StoreKind,
    /// [min_x, min_y, max_x, max_y] if the catalog reported one
    pub bounding_box: Option<[f64; 4]>,
}

/// Errors from the catalog service
#[derive(Debug, Error)]
pub enum CatalogSyncError {
    #[error("Catalog service unreachable: {0}")]
    Unreachable(String),

    #[error("Catalog request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Catalog rejected store '{type_name}' (HTTP {status}): {message}")]
    Rejected {
        type_name: String,
        status: u16,
        message: String,
    },

    #[error("Failed to read upload payload: {0}")]
    Payload(#[from] std::io::Error),

    #[error("Invalid catalog configuration: {0}")]
    Config(String),
}

/// External catalog operations
///
/// Implemented over HTTP for the real service and by recording doubles in
/// tests; the orchestrator and workflows only see this trait.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Create the physical store for `type_name`, or replace it when
    /// `opts.overwrite` is set.
    async fn create_or_replace_store(
        &self,
        type_name: &str,
        base_file: &Path,
        opts: &StoreOptions,
    ) -> Result<StoreHandle, CatalogSyncError>;

    /// Delete the physical store for `type_name`, cascading to dependent
    /// feature/coverage stores, styles, and layer-group references on the
    /// remote side.
    ///
    /// Idempotent: deleting an already-absent store succeeds.
    async fn delete_store(&self, type_name: &str) -> Result<(), CatalogSyncError>;
}

/// HTTP client against a GeoServer-compatible catalog REST API
pub struct GeoServerClient {
    http: reqwest::Client,
    base_url: String,
    workspace: String,
    username: Option<String>,
    password: Option<String>,
    timeout: Duration,
}

impl GeoServerClient {
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogSyncError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CatalogSyncError::Config(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            workspace: config.workspace.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            timeout,
        })
    }

    fn store_url(&self, kind: StoreKind, type_name: &str) -> String {
        let collection = match kind {
            StoreKind::Raster => "coveragestores",
            _ => "datastores",
        };
        format!(
            "{}/rest/workspaces/{}/{}/{}",
            self.base_url, self.workspace, collection, type_name
        )
    }

    fn upload_url(&self, kind: StoreKind, type_name: &str, base_file: &Path) -> String {
        let ext = base_file
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin")
            .to_ascii_lowercase();
        // GeoServer's file-upload endpoints key the parser off the extension.
        let format = match (kind, ext.as_str()) {
            (StoreKind::Raster, _) => "geotiff".to_string(),
            (_, "zip") | (_, "shp") => "shp".to_string(),
            (_, other) => other.to_string(),
        };
        format!("{}/file.{}", self.store_url(kind, type_name), format)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match (&self.username, &self.password) {
            (Some(user), password) => req.basic_auth(user, password.as_deref()),
            _ => req,
        }
    }

    fn map_transport_error(&self, err: reqwest::Error) -> CatalogSyncError {
        if err.is_timeout() {
            CatalogSyncError::Timeout(self.timeout)
        } else {
            CatalogSyncError::Unreachable(err.to_string())
        }
    }
}

#[async_trait]
impl CatalogClient for GeoServerClient {
    #[tracing::instrument(skip(self, base_file), fields(kind = %opts.kind))]
    async fn create_or_replace_store(
        &self,
        type_name: &str,
        base_file: &Path,
        opts: &StoreOptions,
    ) -> Result<StoreHandle, CatalogSyncError> {
        let payload = tokio::fs::read(base_file).await?;

        let url = self.upload_url(opts.kind, type_name, base_file);
        let update = if opts.overwrite { "overwrite" } else { "append" };

        let response = self
            .authed(self.http.put(&url))
            .query(&[("update", update), ("charset", opts.charset.as_str())])
            .header("content-type", "application/octet-stream")
            .body(payload)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CatalogSyncError::Rejected {
                type_name: type_name.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        let bounding_box = response
            .json::<StoreUploadResponse>()
            .await
            .ok()
            .and_then(|body| body.bounding_box);

        tracing::info!(store = %type_name, "catalog store registered");

        Ok(StoreHandle {
            type_name: type_name.to_string(),
            kind: opts.kind,
            bounding_box,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn delete_store(&self, type_name: &str) -> Result<(), CatalogSyncError> {
        // The store may be registered as either collection; both deletes are
        // idempotent, so issuing the pair implements the cascading contract
        // without knowing the kind up front.
        for kind in [StoreKind::Vector, StoreKind::Raster] {
            let url = self.store_url(kind, type_name);
            let response = self
                .authed(self.http.delete(&url))
                .query(&[("recurse", "true")])
                .send()
                .await
                .map_err(|e| self.map_transport_error(e))?;

            let status = response.status();
            if status == reqwest::StatusCode::NOT_FOUND {
                // Already absent: success by contract.
                continue;
            }
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(CatalogSyncError::Rejected {
                    type_name: type_name.to_string(),
                    status: status.as_u16(),
                    message,
                });
            }
        }

        tracing::info!(store = %type_name, "catalog store deleted");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct StoreUploadResponse {
    #[serde(rename = "boundingBox")]
    bounding_box: Option<[f64; 4]>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_store_kind_vector_extensions() {
        for name in ["roads.shp", "sites.geojson", "parcels.GPKG", "bundle.zip"] {
            assert_eq!(
                StoreKind::for_path(&PathBuf::from(name)),
                Some(StoreKind::Vector),
                "{name}"
            );
        }
    }

    #[test]
    fn test_store_kind_raster_extensions() {
        for name in ["elevation.tif", "relief.TIFF", "dem.asc"] {
            assert_eq!(
                StoreKind::for_path(&PathBuf::from(name)),
                Some(StoreKind::Raster),
                "{name}"
            );
        }
    }

    #[test]
    fn test_store_kind_unknown_extension() {
        assert_eq!(StoreKind::for_path(&PathBuf::from("notes.txt")), None);
        assert_eq!(StoreKind::for_path(&PathBuf::from("no_extension")), None);
    }

    #[test]
    fn test_store_kind_round_trip() {
        assert_eq!("vector".parse::<StoreKind>().ok(), Some(StoreKind::Vector));
        assert_eq!(StoreKind::Raster.as_str(), "raster");
        assert!("polygonal".parse::<StoreKind>().is_err());
    }

    #[test]
    fn test_upload_url_maps_zip_to_shp() {
        let client = GeoServerClient::new(&crate::config::CatalogConfig {
            base_url: "http://catalog.local/geoserver/".to_string(),
            workspace: "geodepot".to_string(),
            username: None,
            password: None,
            timeout_secs: 30,
            log_file: None,
        })
        .unwrap();

        let url = client.upload_url(
            StoreKind::Vector,
            "roads",
            &PathBuf::from("roads.zip"),
        );
        assert_eq!(
            url,
            "http://catalog.local/geoserver/rest/workspaces/geodepot/datastores/roads/file.shp"
        );
    }

    #[test]
    fn test_upload_url_raster_uses_coveragestores() {
        let client = GeoServerClient::new(&crate::config::CatalogConfig {
            base_url: "http://catalog.local/geoserver".to_string(),
            workspace: "geodepot".to_string(),
            username: None,
            password: None,
            timeout_secs: 30,
            log_file: None,
        })
        .unwrap();

        let url = client.upload_url(
            StoreKind::Raster,
            "elevation",
            &PathBuf::from("elevation.tif"),
        );
        assert_eq!(
            url,
            "http://catalog.local/geoserver/rest/workspaces/geodepot/coveragestores/elevation/file.geotiff"
        );
    }
}
