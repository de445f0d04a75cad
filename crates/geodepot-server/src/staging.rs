//! Staging area for uploaded file parts
//!
//! Each pipeline invocation owns exactly one staging directory. The
//! directory is backed by a [`tempfile::TempDir`], so release is tied to
//! `Drop`: success, validation failure, and panics all remove it. Writes are
//! all-or-nothing: a failure mid-write returns an error and the partially
//! written directory is destroyed with the `TempDir`.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;

/// One uploaded file part, as extracted from the multipart request
#[derive(Debug, Clone)]
pub struct FilePart {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl FilePart {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }
}

/// Errors while staging uploaded parts
#[derive(Debug, Error)]
pub enum StagingError {
    #[error("No base file provided")]
    MissingBaseFile,

    #[error("Invalid file name: '{0}'")]
    InvalidFileName(String),

    #[error("Failed to create staging directory under {root}: {source}")]
    CreateDir {
        root: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write staged file '{name}': {source}")]
    Write {
        name: String,
        source: std::io::Error,
    },
}

/// A fully staged file set, owned by one pipeline invocation
///
/// Dropping the set deletes the staging directory and everything in it.
#[derive(Debug)]
pub struct StagedFileSet {
    dir: TempDir,
    base_file: PathBuf,
    sidecar_files: Vec<PathBuf>,
}

impl StagedFileSet {
    pub fn directory(&self) -> &Path {
        self.dir.path()
    }

    pub fn base_file(&self) -> &Path {
        &self.base_file
    }

    pub fn sidecar_files(&self) -> &[PathBuf] {
        &self.sidecar_files
    }
}

/// Write the uploaded parts into a fresh per-request staging directory.
///
/// All-or-nothing: the first failed write aborts and the directory is
/// removed when the partially built `TempDir` drops.
pub async fn stage(
    root: &Path,
    base: FilePart,
    sidecars: Vec<FilePart>,
) -> Result<StagedFileSet, StagingError> {
    if base.bytes.is_empty() || base.file_name.trim().is_empty() {
        return Err(StagingError::MissingBaseFile);
    }

    tokio::fs::create_dir_all(root)
        .await
        .map_err(|source| StagingError::CreateDir {
            root: root.to_path_buf(),
            source,
        })?;

    let dir = TempDir::with_prefix_in("upload-", root).map_err(|source| {
        StagingError::CreateDir {
            root: root.to_path_buf(),
            source,
        }
    })?;

    let base_file = write_part(dir.path(), &base).await?;

    let mut sidecar_files = Vec::with_capacity(sidecars.len());
    for part in &sidecars {
        sidecar_files.push(write_part(dir.path(), part).await?);
    }

    tracing::debug!(
        directory = %dir.path().display(),
        base = %base.file_name,
        sidecars = sidecars.len(),
        "upload staged"
    );

    Ok(StagedFileSet {
        dir,
        base_file,
        sidecar_files,
    })
}

async fn write_part(dir: &Path, part: &FilePart) -> Result<PathBuf, StagingError> {
    // Only the final path component is honored; uploads cannot escape the
    // staging directory.
    let name = Path::new(&part.file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| StagingError::InvalidFileName(part.file_name.clone()))?;

    let path = dir.join(name);
    tokio::fs::write(&path, &part.bytes)
        .await
        .map_err(|source| StagingError::Write {
            name: name.to_string(),
            source,
        })?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(name: &str, contents: &[u8]) -> FilePart {
        FilePart::new(name, contents.to_vec())
    }

    #[tokio::test]
    async fn test_stage_writes_base_and_sidecars() {
        let root = tempfile::tempdir().unwrap();
        let staged = stage(
            root.path(),
            part("roads.shp", b"shape data"),
            vec![part("roads.dbf", b"attrs"), part("roads.prj", b"proj")],
        )
        .await
        .unwrap();

        assert!(staged.base_file().exists());
        assert_eq!(staged.sidecar_files().len(), 2);
        for sidecar in staged.sidecar_files() {
            assert!(sidecar.exists());
        }
        assert_eq!(std::fs::read(staged.base_file()).unwrap(), b"shape data");
    }

    #[tokio::test]
    async fn test_drop_removes_staging_directory() {
        let root = tempfile::tempdir().unwrap();
        let staged = stage(root.path(), part("sites.geojson", b"{}"), vec![])
            .await
            .unwrap();

        let dir = staged.directory().to_path_buf();
        assert!(dir.exists());
        drop(staged);
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_empty_base_file_rejected() {
        let root = tempfile::tempdir().unwrap();
        let result = stage(root.path(), part("roads.shp", b""), vec![]).await;
        assert!(matches!(result, Err(StagingError::MissingBaseFile)));
    }

    #[tokio::test]
    async fn test_failed_sidecar_write_leaves_nothing_behind() {
        let root = tempfile::tempdir().unwrap();
        let result = stage(
            root.path(),
            part("roads.shp", b"shape data"),
            // ".." has no final path component, so the write is refused.
            vec![part("..", b"escape attempt")],
        )
        .await;

        assert!(matches!(result, Err(StagingError::InvalidFileName(_))));
        // The only entries under the root would be leaked staging dirs.
        let leftover: Vec<_> = std::fs::read_dir(root.path()).unwrap().collect();
        assert!(leftover.is_empty(), "staging directory survived a failed stage");
    }

    #[tokio::test]
    async fn test_part_names_are_flattened_to_file_name() {
        let root = tempfile::tempdir().unwrap();
        let staged = stage(
            root.path(),
            part("nested/dir/roads.shp", b"shape data"),
            vec![],
        )
        .await
        .unwrap();

        assert_eq!(
            staged.base_file().file_name().and_then(|n| n.to_str()),
            Some("roads.shp")
        );
    }
}
