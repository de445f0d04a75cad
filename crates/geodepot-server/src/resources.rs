//! Dataset resource registry
//!
//! The database-side record of each published dataset. `type_name` is the
//! stable identity shared with the catalog; the row is upserted on ingest so
//! a replace keeps the same id and popularity history.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::catalog::StoreKind;

/// A published dataset resource
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Resource {
    pub id: Uuid,
    pub type_name: String,
    pub title: String,
    pub store_type: String,
    pub owner_name: String,
    pub popularity_count: i64,
    pub bounding_box: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl Resource {
    pub fn store_kind(&self) -> Option<StoreKind> {
        self.store_type.parse().ok()
    }
}

/// Fields for creating or replacing a resource row
#[derive(Debug, Clone)]
pub struct NewResource {
    pub type_name: String,
    pub title: String,
    pub store_type: StoreKind,
    pub owner_name: String,
    pub bounding_box: Option<serde_json::Value>,
}

/// Insert the resource, or refresh it in place when `type_name` exists.
///
/// A replace keeps the row's id, owner, creation time, and popularity count.
pub async fn upsert(pool: &PgPool, new: &NewResource) -> Result<Resource, sqlx::Error> {
    sqlx::query_as::<_, Resource>(
        r#"
        INSERT INTO resources (type_name, title, store_type, owner_name, bounding_box)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (type_name) DO UPDATE
        SET title = EXCLUDED.title,
            store_type = EXCLUDED.store_type,
            bounding_box = EXCLUDED.bounding_box
        RETURNING id, type_name, title, store_type, owner_name,
                  popularity_count, bounding_box, created_at
        "#,
    )
    .bind(&new.type_name)
    .bind(&new.title)
    .bind(new.store_type.as_str())
    .bind(&new.owner_name)
    .bind(&new.bounding_box)
    .fetch_one(pool)
    .await
}

pub async fn find_by_type_name(
    pool: &PgPool,
    type_name: &str,
) -> Result<Option<Resource>, sqlx::Error> {
    sqlx::query_as::<_, Resource>(
        r#"
        SELECT id, type_name, title, store_type, owner_name,
               popularity_count, bounding_box, created_at
        FROM resources
        WHERE type_name = $1
        "#,
    )
    .bind(type_name)
    .fetch_optional(pool)
    .await
}

/// Paginated listing, newest first
pub async fn list(
    pool: &PgPool,
    limit: i64,
    offset: i64,
) -> Result<Vec<Resource>, sqlx::Error> {
    sqlx::query_as::<_, Resource>(
        r#"
        SELECT id, type_name, title, store_type, owner_name,
               popularity_count, bounding_box, created_at
        FROM resources
        ORDER BY created_at DESC
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM resources")
        .fetch_one(pool)
        .await
}

/// Atomically bump the view counter.
///
/// The increment runs in the database, so concurrent views never lose
/// counts to a read-modify-write race.
pub async fn increment_popularity(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE resources SET popularity_count = popularity_count + 1 WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete a resource row. Returns `false` when the row was already gone.
pub async fn delete_by_id(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM resources WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Whether the resource is a member of any dataset group
pub async fn is_group_member(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM dataset_group_members WHERE resource_id = $1)",
    )
    .bind(id)
    .fetch_one(pool)
    .await
}

#[cfg(test)]
pub mod test_support {
    //! Shared fixtures for database tests

    use super::*;
    use crate::metadata::TaxonomyRefs;

    /// Seed one row in every taxonomy table and return the references
    pub async fn seed_taxonomy(pool: &PgPool, year: i32) -> sqlx::Result<TaxonomyRefs> {
        let category: i64 =
            sqlx::query_scalar("INSERT INTO categories (name) VALUES ('Transport') RETURNING id")
                .fetch_one(pool)
                .await?;
        let coverage: i64 =
            sqlx::query_scalar("INSERT INTO coverages (name) VALUES ('National') RETURNING id")
                .fetch_one(pool)
                .await?;
        let source: i64 =
            sqlx::query_scalar("INSERT INTO sources (name) VALUES ('Survey Dept') RETURNING id")
                .fetch_one(pool)
                .await?;
        let year_id: i64 =
            sqlx::query_scalar("INSERT INTO years (year_num) VALUES ($1) RETURNING id")
                .bind(year)
                .fetch_one(pool)
                .await?;
        let topic_category: i64 = sqlx::query_scalar(
            "INSERT INTO topic_categories (name) VALUES ('transportation') RETURNING id",
        )
        .fetch_one(pool)
        .await?;

        Ok(TaxonomyRefs {
            category,
            coverage,
            source,
            year: year_id,
            topic_category,
        })
    }

    pub fn vector_resource(type_name: &str, owner: &str) -> NewResource {
        NewResource {
            type_name: type_name.to_string(),
            title: type_name.replace('_', " "),
            store_type: StoreKind::Vector,
            owner_name: owner.to_string(),
            bounding_box: None,
        }
    }

    /// Put a resource into a (possibly fresh) dataset group
    pub async fn add_to_group(
        pool: &PgPool,
        resource_id: Uuid,
        group_name: &str,
    ) -> sqlx::Result<()> {
        let group_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO dataset_groups (name) VALUES ($1)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            "#,
        )
        .bind(group_name)
        .fetch_one(pool)
        .await?;

        sqlx::query(
            "INSERT INTO dataset_group_members (group_id, resource_id) VALUES ($1, $2)",
        )
        .bind(group_id)
        .bind(resource_id)
        .execute(pool)
        .await?;
        Ok(())
    }
}
