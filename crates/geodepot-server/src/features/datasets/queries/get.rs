//! Dataset detail query

use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;

use super::super::types::DatasetDetail;
use crate::{metadata, permissions, resources};

#[derive(Debug, Deserialize)]
pub struct GetDatasetQuery {
    #[serde(skip)]
    pub type_name: String,
    /// Viewer identity; owner views do not count towards popularity
    #[serde(default)]
    pub viewer: Option<String>,
}

#[derive(Debug, Error)]
pub enum GetDatasetError {
    #[error("Dataset '{0}' not found")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Fetch the detail view, counting the view.
///
/// The popularity bump is a single conditional UPDATE so concurrent views
/// never lose counts; a returned row doubles as the fetched resource.
#[tracing::instrument(skip(pool, query), fields(type_name = %query.type_name))]
pub async fn handle(pool: PgPool, query: GetDatasetQuery) -> Result<DatasetDetail, GetDatasetError> {
    let viewer = query.viewer.as_deref().unwrap_or("anonymous");

    let resource = sqlx::query_as::<_, resources::Resource>(
        r#"
        UPDATE resources
        SET popularity_count = popularity_count + 1
        WHERE type_name = $1 AND owner_name <> $2
        RETURNING id, type_name, title, store_type, owner_name,
                  popularity_count, bounding_box, created_at
        "#,
    )
    .bind(&query.type_name)
    .bind(viewer)
    .fetch_optional(&pool)
    .await?;

    // No row updated: either the viewer owns it or it does not exist.
    let resource = match resource {
        Some(resource) => resource,
        None => resources::find_by_type_name(&pool, &query.type_name)
            .await?
            .ok_or_else(|| GetDatasetError::NotFound(query.type_name.clone()))?,
    };

    let record = metadata::find_for_resource(&pool, resource.id).await?;
    let perms = permissions::for_resource(&pool, resource.id).await?;

    Ok(DatasetDetail {
        resource,
        metadata: record,
        permissions: perms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::test_support::vector_resource;

    fn query(type_name: &str, viewer: &str) -> GetDatasetQuery {
        GetDatasetQuery {
            type_name: type_name.to_string(),
            viewer: Some(viewer.to_string()),
        }
    }

    #[sqlx::test]
    async fn test_non_owner_view_bumps_popularity(pool: PgPool) -> sqlx::Result<()> {
        resources::upsert(&pool, &vector_resource("roads", "alice")).await?;

        let detail = handle(pool.clone(), query("roads", "bob")).await.unwrap();
        assert_eq!(detail.resource.popularity_count, 1);

        let detail = handle(pool.clone(), query("roads", "carol")).await.unwrap();
        assert_eq!(detail.resource.popularity_count, 2);
        Ok(())
    }

    #[sqlx::test]
    async fn test_owner_view_does_not_count(pool: PgPool) -> sqlx::Result<()> {
        resources::upsert(&pool, &vector_resource("roads", "alice")).await?;

        let detail = handle(pool.clone(), query("roads", "alice")).await.unwrap();
        assert_eq!(detail.resource.popularity_count, 0);
        Ok(())
    }

    #[sqlx::test]
    async fn test_missing_dataset_is_not_found(pool: PgPool) -> sqlx::Result<()> {
        let err = handle(pool.clone(), query("ghost", "bob"))
            .await
            .expect_err("missing dataset");
        assert!(matches!(err, GetDatasetError::NotFound(_)));
        Ok(())
    }
}
