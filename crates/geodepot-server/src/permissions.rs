//! Pass-through permission map storage
//!
//! The service does not evaluate permissions; the caller submits a map of
//! subject -> grants and it is stored verbatim for downstream consumers.
//! Applying a map replaces the resource's previous map wholesale.

use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

/// Replace the stored permission map for a resource.
///
/// The map is an object of `subject -> grants`; grants are opaque here and
/// stored as submitted. A non-object map is ignored.
pub async fn apply(pool: &PgPool, resource_id: Uuid, map: &Value) -> Result<(), sqlx::Error> {
    let Some(entries) = map.as_object() else {
        tracing::warn!(resource_id = %resource_id, "ignoring non-object permission map");
        return Ok(());
    };

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM resource_permissions WHERE resource_id = $1")
        .bind(resource_id)
        .execute(&mut *tx)
        .await?;

    for (subject, grants) in entries {
        sqlx::query(
            "INSERT INTO resource_permissions (resource_id, subject, permissions) VALUES ($1, $2, $3)",
        )
        .bind(resource_id)
        .bind(subject)
        .bind(grants)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    tracing::debug!(resource_id = %resource_id, subjects = entries.len(), "permission map applied");
    Ok(())
}

/// Fetch the stored map for a resource, reassembled as one object
pub async fn for_resource(pool: &PgPool, resource_id: Uuid) -> Result<Value, sqlx::Error> {
    let rows: Vec<(String, Value)> = sqlx::query_as(
        "SELECT subject, permissions FROM resource_permissions WHERE resource_id = $1 ORDER BY subject",
    )
    .bind(resource_id)
    .fetch_all(pool)
    .await?;

    Ok(Value::Object(rows.into_iter().collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{self, test_support::vector_resource};
    use serde_json::json;

    #[sqlx::test]
    async fn test_apply_stores_map_verbatim(pool: PgPool) -> sqlx::Result<()> {
        let resource = resources::upsert(&pool, &vector_resource("roads", "alice")).await?;

        let map = json!({
            "alice": ["view", "edit", "manage"],
            "group:public": ["view"],
        });
        apply(&pool, resource.id, &map).await?;

        assert_eq!(for_resource(&pool, resource.id).await?, map);
        Ok(())
    }

    #[sqlx::test]
    async fn test_apply_replaces_previous_map(pool: PgPool) -> sqlx::Result<()> {
        let resource = resources::upsert(&pool, &vector_resource("roads", "alice")).await?;

        apply(&pool, resource.id, &json!({"alice": ["view"], "bob": ["view"]})).await?;
        apply(&pool, resource.id, &json!({"alice": ["view", "edit"]})).await?;

        let stored = for_resource(&pool, resource.id).await?;
        assert_eq!(stored, json!({"alice": ["view", "edit"]}));
        Ok(())
    }

    #[sqlx::test]
    async fn test_non_object_map_is_ignored(pool: PgPool) -> sqlx::Result<()> {
        let resource = resources::upsert(&pool, &vector_resource("roads", "alice")).await?;

        apply(&pool, resource.id, &json!("everything")).await?;
        assert_eq!(for_resource(&pool, resource.id).await?, json!({}));
        Ok(())
    }
}
