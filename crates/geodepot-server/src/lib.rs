//! GeoDepot Server Library
//!
//! HTTP server for ingesting, replacing, and removing geospatial datasets.
//!
//! # Overview
//!
//! The server coordinates two independently-failing systems without a shared
//! transaction: a PostgreSQL store holding metadata records, upload sessions,
//! and resource rows, and an external geospatial catalog service holding the
//! physical data stores. Partial failures are reconciled through explicit
//! compensating actions rather than two-phase commit.
//!
//! - **Staging**: ephemeral per-request directories with guaranteed release
//! - **Metadata**: auxiliary classification/provenance records, created
//!   before catalog registration so their id can be threaded into ingestion
//! - **Catalog**: external-facing create/replace/delete of physical stores
//! - **Sessions**: per-attempt outcome and diagnostics tracking
//! - **Ingest**: the orchestrator driving one upload attempt end to end,
//!   plus the asynchronous deletion queue and worker
//!
//! # Example
//!
//! ```no_run
//! use geodepot_server::{api, config::Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     api::serve(config).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod catalog;
pub mod config;
pub mod db;
pub mod diagnostics;
pub mod error;
pub mod features;
pub mod ingest;
pub mod metadata;
pub mod permissions;
pub mod resources;
pub mod sessions;
pub mod staging;

// Re-export commonly used types
pub use error::{AppError, ServerResult};
