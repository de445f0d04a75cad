//! GeoDepot Common Library
//!
//! Shared error handling and logging for the GeoDepot workspace.
//!
//! # Overview
//!
//! This crate provides functionality used across all GeoDepot workspace
//! members:
//!
//! - **Error Handling**: the shared [`GeodepotError`] type and result alias
//! - **Logging**: tracing subscriber initialization with configurable
//!   output targets and formats
//!
//! # Example
//!
//! ```no_run
//! use geodepot_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> geodepot_common::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     init_logging(&config)?;
//!     tracing::info!("geodepot starting");
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{GeodepotError, Result};
