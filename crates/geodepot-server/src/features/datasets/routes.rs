use crate::api::response::{ApiResponse, ErrorResponse};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::{
    commands::{
        RemoveDatasetCommand, RemoveDatasetError, ReplaceDatasetCommand, ReplaceDatasetError,
        UpdateMetadataCommand, UpdateMetadataError, UploadDatasetCommand, UploadDatasetError,
    },
    queries::{GetDatasetError, GetDatasetQuery, ListDatasetsError, ListDatasetsQuery},
    types::UploadEnvelope,
};
use crate::features::FeatureState;
use crate::metadata::{DateFields, DescriptiveFields, TaxonomyRefs};
use crate::staging::FilePart;

pub fn datasets_routes() -> Router<FeatureState> {
    Router::new()
        .route("/", get(list_datasets).post(upload_dataset))
        .route(
            "/:type_name",
            get(get_dataset)
                .put(replace_dataset)
                .delete(remove_dataset),
        )
        .route("/:type_name/metadata", put(update_metadata))
}

/// Multipart upload form, accumulated field by field
#[derive(Debug, Default)]
struct UploadForm {
    base: Option<FilePart>,
    sidecars: Vec<FilePart>,
    title: String,
    charset: Option<String>,
    category: Option<i64>,
    coverage: Option<i64>,
    source: Option<i64>,
    year: Option<i64>,
    topic_category: Option<i64>,
    dates: DateFields,
    regions: Vec<String>,
    fields: DescriptiveFields,
    permissions: Option<serde_json::Value>,
    user: Option<String>,
}

impl UploadForm {
    fn taxonomy_refs(&self) -> Result<TaxonomyRefs, String> {
        let required = |value: Option<i64>, name: &str| {
            value.ok_or_else(|| format!("Missing required field: {name}"))
        };
        Ok(TaxonomyRefs {
            category: required(self.category, "category")?,
            coverage: required(self.coverage, "coverage")?,
            source: required(self.source, "source")?,
            year: required(self.year, "year")?,
            topic_category: required(self.topic_category, "topic_category")?,
        })
    }
}

fn parse_id(name: &str, text: &str) -> Result<i64, String> {
    text.trim()
        .parse::<i64>()
        .map_err(|_| format!("Invalid value for field '{name}': '{text}'"))
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, String> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| format!("Malformed multipart body: {e}"))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        match name.as_str() {
            "base_file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| format!("Failed to read base file: {e}"))?;
                form.base = Some(FilePart::new(file_name, bytes.to_vec()));
            },
            "sidecar_file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| format!("Failed to read sidecar file: {e}"))?;
                form.sidecars.push(FilePart::new(file_name, bytes.to_vec()));
            },
            _ => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| format!("Failed to read field '{name}': {e}"))?;
                apply_text_field(&mut form, &name, text)?;
            },
        }
    }

    Ok(form)
}

fn apply_text_field(form: &mut UploadForm, name: &str, text: String) -> Result<(), String> {
    match name {
        "title" => {
            form.title = text.clone();
            form.fields.title = text;
        },
        "charset" => form.charset = Some(text),
        "category" => form.category = Some(parse_id(name, &text)?),
        "coverage" => form.coverage = Some(parse_id(name, &text)?),
        "source" => form.source = Some(parse_id(name, &text)?),
        "year" => form.year = Some(parse_id(name, &text)?),
        "topic_category" => form.topic_category = Some(parse_id(name, &text)?),
        "date_created" => form.dates.created = text,
        "date_published" => form.dates.published = text,
        "date_revised" => form.dates.revised = text,
        "regions" => form.regions.push(text),
        "permissions" => {
            form.permissions = Some(
                serde_json::from_str(&text)
                    .map_err(|e| format!("Invalid permissions JSON: {e}"))?,
            );
        },
        "user" => form.user = Some(text),
        "abstract" => form.fields.abstract_text = text,
        "purpose" => form.fields.purpose = text,
        "maintenance_frequency" => form.fields.maintenance_frequency = text,
        "restriction_code_type" => form.fields.restriction_code_type = text,
        "constraints_other" => form.fields.constraints_other = text,
        "license" => form.fields.license = text,
        "language" => form.fields.language = text,
        "spatial_representation_type" => form.fields.spatial_representation_type = text,
        "temporal_extent_start" => form.fields.temporal_extent_start = text,
        "temporal_extent_end" => form.fields.temporal_extent_end = text,
        "supplemental_information" => form.fields.supplemental_information = text,
        "distribution_url" => form.fields.distribution_url = text,
        "distribution_description" => form.fields.distribution_description = text,
        "data_quality_statement" => form.fields.data_quality_statement = text,
        "keywords" => form.fields.keywords = text,
        "featured" => form.fields.featured = text == "true" || text == "on",
        "is_published" => form.fields.is_published = text == "true" || text == "on",
        // Unknown fields are ignored, matching the legacy form's tolerance.
        _ => {},
    }
    Ok(())
}

fn bad_request(envelope: UploadEnvelope) -> Response {
    (StatusCode::BAD_REQUEST, Json(envelope)).into_response()
}

#[tracing::instrument(skip(state, multipart))]
async fn upload_dataset(State(state): State<FeatureState>, multipart: Multipart) -> Response {
    let form = match read_form(multipart).await {
        Ok(form) => form,
        Err(message) => return bad_request(UploadEnvelope::failed(message, None, None)),
    };

    let refs = match form.taxonomy_refs() {
        Ok(refs) => refs,
        Err(message) => return bad_request(UploadEnvelope::failed(message, None, None)),
    };
    let Some(base) = form.base else {
        return bad_request(UploadEnvelope::failed(
            "No base file was provided",
            None,
            None,
        ));
    };

    let command = UploadDatasetCommand {
        base,
        sidecars: form.sidecars,
        title: form.title,
        charset: form.charset.unwrap_or_else(|| "UTF-8".to_string()),
        refs,
        dates: form.dates,
        regions: form.regions,
        fields: form.fields,
        permissions: form.permissions,
        user: form.user.unwrap_or_else(|| "anonymous".to_string()),
    };

    match super::commands::upload::handle(state.db, state.ingestor, command).await {
        Ok(response) => {
            let mut envelope = UploadEnvelope::succeeded(&response.resource.type_name);
            envelope.upload_session = Some(response.session_id);
            (StatusCode::OK, Json(envelope)).into_response()
        },
        Err(error) => {
            let mut envelope =
                UploadEnvelope::failed(error.to_string(), error.traceback(), error.session_id());
            envelope.context = error.diagnostic_log();
            bad_request(envelope)
        },
    }
}

#[tracing::instrument(skip(state, multipart), fields(type_name = %type_name))]
async fn replace_dataset(
    State(state): State<FeatureState>,
    Path(type_name): Path<String>,
    multipart: Multipart,
) -> Response {
    let form = match read_form(multipart).await {
        Ok(form) => form,
        Err(message) => return bad_request(UploadEnvelope::failed(message, None, None)),
    };
    let Some(base) = form.base else {
        return bad_request(UploadEnvelope::failed(
            "No base file was provided",
            None,
            None,
        ));
    };

    let command = ReplaceDatasetCommand {
        type_name,
        base,
        sidecars: form.sidecars,
        charset: form.charset.unwrap_or_else(|| "UTF-8".to_string()),
        user: form.user.unwrap_or_else(|| "anonymous".to_string()),
    };

    match super::commands::replace::handle(state.db, state.catalog, state.ingestor, command).await {
        Ok(resource) => {
            let envelope = UploadEnvelope::succeeded(&resource.type_name);
            (StatusCode::OK, Json(envelope)).into_response()
        },
        Err(ReplaceDatasetError::NotFound(name)) => {
            let envelope = UploadEnvelope::failed(format!("Dataset '{name}' not found"), None, None);
            (StatusCode::NOT_FOUND, Json(envelope)).into_response()
        },
        Err(error) => {
            let mut envelope =
                UploadEnvelope::failed(error.to_string(), error.traceback(), error.session_id());
            envelope.context = error.diagnostic_log();
            bad_request(envelope)
        },
    }
}

#[tracing::instrument(skip(state), fields(type_name = %type_name))]
async fn remove_dataset(
    State(state): State<FeatureState>,
    Path(type_name): Path<String>,
    Query(identity): Query<Identity>,
) -> Response {
    let command = RemoveDatasetCommand {
        type_name,
        user: identity.user.unwrap_or_else(|| "anonymous".to_string()),
    };

    match super::commands::remove::handle(state.db, state.deletions, command).await {
        Ok(response) => {
            tracing::info!(resource_id = %response.resource_id, "dataset removal accepted");
            Redirect::to("/api/v1/datasets").into_response()
        },
        Err(error @ RemoveDatasetError::NotFound(_)) => {
            let body = ErrorResponse::new("NOT_FOUND", error.to_string());
            (StatusCode::NOT_FOUND, Json(body)).into_response()
        },
        Err(error @ RemoveDatasetError::GroupMembership) => {
            let body = ErrorResponse::new("CONFLICT", error.to_string());
            (StatusCode::BAD_REQUEST, Json(body)).into_response()
        },
        Err(error) => {
            tracing::error!("Removal failed: {}", error);
            let body = ErrorResponse::new("INTERNAL_ERROR", "The dataset could not be removed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        },
    }
}

#[derive(Debug, Default, Deserialize)]
struct Identity {
    user: Option<String>,
}

#[tracing::instrument(skip(state), fields(type_name = %type_name))]
async fn get_dataset(
    State(state): State<FeatureState>,
    Path(type_name): Path<String>,
    Query(identity): Query<Identity>,
) -> Response {
    let query = GetDatasetQuery {
        type_name,
        viewer: identity.user,
    };

    match super::queries::get::handle(state.db, query).await {
        Ok(detail) => (StatusCode::OK, Json(ApiResponse::success(detail))).into_response(),
        Err(error @ GetDatasetError::NotFound(_)) => {
            let body = ErrorResponse::new("NOT_FOUND", error.to_string());
            (StatusCode::NOT_FOUND, Json(body)).into_response()
        },
        Err(error) => {
            tracing::error!("Database error during dataset retrieval: {}", error);
            let body = ErrorResponse::new("INTERNAL_ERROR", "A database error occurred");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        },
    }
}

#[tracing::instrument(skip(state, query), fields(page = ?query.page, per_page = ?query.per_page))]
async fn list_datasets(
    State(state): State<FeatureState>,
    Query(query): Query<ListDatasetsQuery>,
) -> Response {
    match super::queries::list::handle(state.db, query).await {
        Ok(response) => {
            let meta = json!({ "pagination": response.pagination });
            (
                StatusCode::OK,
                Json(ApiResponse::success_with_meta(response.items, meta)),
            )
                .into_response()
        },
        Err(error @ (ListDatasetsError::InvalidPage | ListDatasetsError::InvalidPerPage)) => {
            let body = ErrorResponse::new("VALIDATION_ERROR", error.to_string());
            (StatusCode::BAD_REQUEST, Json(body)).into_response()
        },
        Err(error) => {
            tracing::error!("Database error during dataset listing: {}", error);
            let body = ErrorResponse::new("INTERNAL_ERROR", "A database error occurred");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        },
    }
}

#[derive(Debug, Deserialize)]
struct UpdateMetadataPayload {
    category: i64,
    coverage: i64,
    source: i64,
    year: i64,
    topic_category: i64,
    #[serde(default)]
    date_created: String,
    #[serde(default)]
    date_published: String,
    #[serde(default)]
    date_revised: String,
    #[serde(default)]
    regions: Vec<String>,
    #[serde(flatten)]
    fields: DescriptiveFields,
}

#[tracing::instrument(skip(state, payload), fields(type_name = %type_name))]
async fn update_metadata(
    State(state): State<FeatureState>,
    Path(type_name): Path<String>,
    Json(payload): Json<UpdateMetadataPayload>,
) -> Response {
    let command = UpdateMetadataCommand {
        type_name,
        refs: TaxonomyRefs {
            category: payload.category,
            coverage: payload.coverage,
            source: payload.source,
            year: payload.year,
            topic_category: payload.topic_category,
        },
        dates: DateFields {
            created: payload.date_created,
            published: payload.date_published,
            revised: payload.date_revised,
        },
        regions: payload.regions,
        fields: payload.fields,
    };

    match super::commands::update_metadata::handle(state.db, command).await {
        Ok(record) => (StatusCode::OK, Json(ApiResponse::success(record))).into_response(),
        Err(error @ UpdateMetadataError::NotFound(_)) => {
            let body = ErrorResponse::new("NOT_FOUND", error.to_string());
            (StatusCode::NOT_FOUND, Json(body)).into_response()
        },
        Err(UpdateMetadataError::Metadata(error)) => {
            let body = ErrorResponse::new("VALIDATION_ERROR", error.to_string());
            (StatusCode::BAD_REQUEST, Json(body)).into_response()
        },
        Err(error) => {
            tracing::error!("Database error during metadata update: {}", error);
            let body = ErrorResponse::new("INTERNAL_ERROR", "A database error occurred");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes_structure() {
        let router = datasets_routes();
        assert!(format!("{:?}", router).contains("Router"));
    }

    #[test]
    fn test_parse_id_rejects_non_numeric() {
        assert_eq!(parse_id("category", " 7 "), Ok(7));
        assert!(parse_id("category", "seven").is_err());
    }

    #[test]
    fn test_taxonomy_refs_reports_first_missing_field() {
        let mut form = UploadForm {
            category: Some(1),
            coverage: Some(2),
            source: Some(3),
            year: Some(4),
            topic_category: Some(5),
            ..Default::default()
        };
        assert!(form.taxonomy_refs().is_ok());

        form.year = None;
        assert_eq!(
            form.taxonomy_refs().unwrap_err(),
            "Missing required field: year"
        );
    }
}
