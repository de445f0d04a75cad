//! Error types for GeoDepot

use thiserror::Error;

/// Result type alias for GeoDepot operations
pub type Result<T> = std::result::Result<T, GeodepotError>;

/// Errors raised by the shared infrastructure
#[derive(Error, Debug)]
pub enum GeodepotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}
