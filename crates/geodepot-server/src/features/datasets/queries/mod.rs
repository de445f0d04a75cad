//! Read operations for datasets

pub mod get;
pub mod list;

pub use get::{GetDatasetError, GetDatasetQuery};
pub use list::{ListDatasetsError, ListDatasetsQuery, ListDatasetsResponse};
