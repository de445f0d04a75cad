//! Write operations for datasets

pub mod remove;
pub mod replace;
pub mod update_metadata;
pub mod upload;

pub use remove::{RemoveDatasetCommand, RemoveDatasetError, RemoveDatasetResponse};
pub use replace::{ReplaceDatasetCommand, ReplaceDatasetError};
pub use update_metadata::{UpdateMetadataCommand, UpdateMetadataError};
pub use upload::{UploadDatasetCommand, UploadDatasetError, UploadDatasetResponse};
