//! Metadata record builder
//!
//! Builds and persists the auxiliary classification/provenance record for a
//! dataset. The record is inserted *before* catalog registration so its id
//! can be threaded into ingestion; until the attempt resolves, the record's
//! `resource_id` is null and readers must treat the link as optional. A
//! failed attempt deletes the record it created (see [`crate::ingest`]).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

/// Classification taxonomy references, as submitted
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TaxonomyRefs {
    pub category: i64,
    pub coverage: i64,
    pub source: i64,
    pub year: i64,
    pub topic_category: i64,
}

/// Free-text date fields, as submitted
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DateFields {
    pub created: String,
    pub published: String,
    pub revised: String,
}

/// Raw descriptive metadata fields, merged into the descriptive blob
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DescriptiveFields {
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub purpose: String,
    pub maintenance_frequency: String,
    pub restriction_code_type: String,
    pub constraints_other: String,
    pub license: String,
    pub language: String,
    pub spatial_representation_type: String,
    pub temporal_extent_start: String,
    pub temporal_extent_end: String,
    pub supplemental_information: String,
    pub distribution_url: String,
    pub distribution_description: String,
    pub data_quality_statement: String,
    pub keywords: String,
    pub featured: bool,
    pub is_published: bool,
}

/// A persisted metadata record
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MetadataRecord {
    pub id: Uuid,
    pub category_id: i64,
    pub coverage_id: i64,
    pub source_id: i64,
    pub year_id: i64,
    pub topic_category_id: i64,
    pub regions: String,
    pub date_created: Option<NaiveDate>,
    pub date_published: Option<NaiveDate>,
    pub date_revised: Option<NaiveDate>,
    pub basename: String,
    pub descriptive_blob: serde_json::Value,
    pub resource_id: Option<Uuid>,
}

/// Errors while building a metadata record
#[derive(Debug, Error)]
pub enum MetadataError {
    /// A taxonomy reference did not resolve to an existing row
    #[error("{field} reference '{id}' not found")]
    UnresolvedReference { field: &'static str, id: i64 },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Leniently parse a user-submitted date string.
///
/// Empty and unparsable strings both become `None`; this never fails. The
/// silent null on parse failure is intentional, inherited behavior.
pub fn lenient_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    const FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d-%m-%Y", "%d/%m/%Y", "%Y%m%d"];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Normalize a multi-value region selection into the stored delimited list
pub fn join_regions(regions: &[String]) -> String {
    regions
        .iter()
        .map(|r| r.trim())
        .filter(|r| !r.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

/// Merge the raw descriptive fields with the two derived overrides.
///
/// The blob's displayed `date` is taken from the *created* date field and
/// its `edition` from the year reference's numeric value, never from raw
/// "date"/"edition" values in the submission. The remapping is kept in this
/// one place.
pub fn descriptive_blob(
    fields: &DescriptiveFields,
    regions: &str,
    date_created: Option<NaiveDate>,
    year_num: i32,
) -> serde_json::Value {
    let mut blob = match serde_json::to_value(fields) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    };

    blob.insert("regions".to_string(), json!(regions));
    blob.insert(
        "date".to_string(),
        json!(date_created.map(|d| d.to_string())),
    );
    blob.insert("edition".to_string(), json!(year_num.to_string()));

    serde_json::Value::Object(blob)
}

async fn resolve_ref(
    pool: &PgPool,
    table: &'static str,
    field: &'static str,
    id: i64,
) -> Result<(), MetadataError> {
    // Taxonomy tables are fixed; `table` is always a compile-time constant.
    let exists: bool =
        sqlx::query_scalar(&format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)", table))
            .bind(id)
            .fetch_one(pool)
            .await?;

    if exists {
        Ok(())
    } else {
        Err(MetadataError::UnresolvedReference { field, id })
    }
}

async fn year_num(pool: &PgPool, year_id: i64) -> Result<i32, MetadataError> {
    sqlx::query_scalar("SELECT year_num FROM years WHERE id = $1")
        .bind(year_id)
        .fetch_optional(pool)
        .await?
        .ok_or(MetadataError::UnresolvedReference {
            field: "year",
            id: year_id,
        })
}

/// Validated and normalized values, ready to persist
struct RenderedMetadata {
    region_list: String,
    date_created: Option<NaiveDate>,
    date_published: Option<NaiveDate>,
    date_revised: Option<NaiveDate>,
    blob: serde_json::Value,
}

async fn validate_and_render(
    pool: &PgPool,
    refs: TaxonomyRefs,
    dates: &DateFields,
    regions: &[String],
    fields: &DescriptiveFields,
) -> Result<RenderedMetadata, MetadataError> {
    resolve_ref(pool, "categories", "category", refs.category).await?;
    resolve_ref(pool, "coverages", "coverage", refs.coverage).await?;
    resolve_ref(pool, "sources", "source", refs.source).await?;
    resolve_ref(pool, "topic_categories", "topic_category", refs.topic_category).await?;
    let year_num = year_num(pool, refs.year).await?;

    let date_created = lenient_date(&dates.created);
    let date_published = lenient_date(&dates.published);
    let date_revised = lenient_date(&dates.revised);

    let region_list = join_regions(regions);
    let blob = descriptive_blob(fields, &region_list, date_created, year_num);

    Ok(RenderedMetadata {
        region_list,
        date_created,
        date_published,
        date_revised,
        blob,
    })
}

/// Validate the taxonomy references, normalize dates and regions, and
/// persist the record. Returns the record with its generated id so the id
/// can be threaded into ingestion before any content exists.
#[tracing::instrument(skip(pool, dates, regions, fields))]
pub async fn build(
    pool: &PgPool,
    refs: TaxonomyRefs,
    dates: &DateFields,
    regions: &[String],
    fields: &DescriptiveFields,
    basename: &str,
) -> Result<MetadataRecord, MetadataError> {
    let rendered = validate_and_render(pool, refs, dates, regions, fields).await?;

    let record = sqlx::query_as::<_, MetadataRecord>(
        r#"
        INSERT INTO metadata_records (
            category_id, coverage_id, source_id, year_id, topic_category_id,
            regions, date_created, date_published, date_revised,
            basename, descriptive_blob
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING id, category_id, coverage_id, source_id, year_id, topic_category_id,
                  regions, date_created, date_published, date_revised,
                  basename, descriptive_blob, resource_id
        "#,
    )
    .bind(refs.category)
    .bind(refs.coverage)
    .bind(refs.source)
    .bind(refs.year)
    .bind(refs.topic_category)
    .bind(&rendered.region_list)
    .bind(rendered.date_created)
    .bind(rendered.date_published)
    .bind(rendered.date_revised)
    .bind(basename)
    .bind(&rendered.blob)
    .fetch_one(pool)
    .await?;

    tracing::debug!(metadata_id = %record.id, "metadata record created");
    Ok(record)
}

/// Update the record linked to a resource, creating and linking one when
/// the resource predates metadata capture.
#[tracing::instrument(skip(pool, dates, regions, fields))]
pub async fn update_for_resource(
    pool: &PgPool,
    resource_id: Uuid,
    refs: TaxonomyRefs,
    dates: &DateFields,
    regions: &[String],
    fields: &DescriptiveFields,
    basename: &str,
) -> Result<MetadataRecord, MetadataError> {
    let Some(existing) = find_for_resource(pool, resource_id).await? else {
        let record = build(pool, refs, dates, regions, fields, basename).await?;
        link_resource(pool, record.id, resource_id).await?;
        return find(pool, record.id)
            .await?
            .ok_or(MetadataError::Database(sqlx::Error::RowNotFound));
    };

    let rendered = validate_and_render(pool, refs, dates, regions, fields).await?;

    let record = sqlx::query_as::<_, MetadataRecord>(
        r#"
        UPDATE metadata_records
        SET category_id = $2, coverage_id = $3, source_id = $4, year_id = $5,
            topic_category_id = $6, regions = $7, date_created = $8,
            date_published = $9, date_revised = $10, descriptive_blob = $11
        WHERE id = $1
        RETURNING id, category_id, coverage_id, source_id, year_id, topic_category_id,
                  regions, date_created, date_published, date_revised,
                  basename, descriptive_blob, resource_id
        "#,
    )
    .bind(existing.id)
    .bind(refs.category)
    .bind(refs.coverage)
    .bind(refs.source)
    .bind(refs.year)
    .bind(refs.topic_category)
    .bind(&rendered.region_list)
    .bind(rendered.date_created)
    .bind(rendered.date_published)
    .bind(rendered.date_revised)
    .bind(&rendered.blob)
    .fetch_one(pool)
    .await?;

    tracing::debug!(metadata_id = %record.id, resource_id = %resource_id, "metadata record updated");
    Ok(record)
}

/// Delete a metadata record (the compensation path for failed attempts)
pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM metadata_records WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Find the metadata record linked to a resource, if any.
///
/// Legacy resources may lack one; callers must treat the link as optional.
pub async fn find_for_resource(
    pool: &PgPool,
    resource_id: Uuid,
) -> Result<Option<MetadataRecord>, sqlx::Error> {
    sqlx::query_as::<_, MetadataRecord>(
        r#"
        SELECT id, category_id, coverage_id, source_id, year_id, topic_category_id,
               regions, date_created, date_published, date_revised,
               basename, descriptive_blob, resource_id
        FROM metadata_records
        WHERE resource_id = $1
        "#,
    )
    .bind(resource_id)
    .fetch_optional(pool)
    .await
}

/// Link a metadata record to the resource created for its attempt
pub async fn link_resource(
    pool: &PgPool,
    id: Uuid,
    resource_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE metadata_records SET resource_id = $2 WHERE id = $1")
        .bind(id)
        .bind(resource_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Fetch a metadata record by id
pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<MetadataRecord>, sqlx::Error> {
    sqlx::query_as::<_, MetadataRecord>(
        r#"
        SELECT id, category_id, coverage_id, source_id, year_id, topic_category_id,
               regions, date_created, date_published, date_revised,
               basename, descriptive_blob, resource_id
        FROM metadata_records
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}
