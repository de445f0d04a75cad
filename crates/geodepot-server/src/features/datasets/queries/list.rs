//! Dataset listing query

use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;

use crate::api::response::PaginationMeta;
use crate::resources::{self, Resource};

const DEFAULT_PER_PAGE: i64 = 20;
const MAX_PER_PAGE: i64 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct ListDatasetsQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Error)]
pub enum ListDatasetsError {
    #[error("Page must be >= 1")]
    InvalidPage,

    #[error("Per-page must be between 1 and {MAX_PER_PAGE}")]
    InvalidPerPage,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug)]
pub struct ListDatasetsResponse {
    pub items: Vec<Resource>,
    pub pagination: PaginationMeta,
}

#[tracing::instrument(skip(pool, query), fields(page = ?query.page, per_page = ?query.per_page))]
pub async fn handle(
    pool: PgPool,
    query: ListDatasetsQuery,
) -> Result<ListDatasetsResponse, ListDatasetsError> {
    let page = query.page.unwrap_or(1);
    let per_page = query.per_page.unwrap_or(DEFAULT_PER_PAGE);

    if page < 1 {
        return Err(ListDatasetsError::InvalidPage);
    }
    if !(1..=MAX_PER_PAGE).contains(&per_page) {
        return Err(ListDatasetsError::InvalidPerPage);
    }

    let total = resources::count(&pool).await?;
    let items = resources::list(&pool, per_page, (page - 1) * per_page).await?;

    Ok(ListDatasetsResponse {
        items,
        pagination: PaginationMeta::new(page, per_page, total),
    })
}
