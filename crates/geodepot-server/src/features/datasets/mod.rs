//! Dataset feature slice: upload, replace, remove, metadata, detail, listing

pub mod commands;
pub mod queries;
pub mod routes;
pub mod types;

pub use routes::datasets_routes;
