//! Upload-session diagnostics
//!
//! Lets a client fetch the outcome of its most recent attempt. Attribution
//! uses the latest-session-for-user heuristic, so concurrent attempts by
//! the same user may read each other's diagnostics.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::response::ApiResponse;
use crate::error::{AppError, ServerResult};
use crate::features::FeatureState;
use crate::sessions::{self, UploadSession};

pub fn upload_sessions_routes() -> Router<FeatureState> {
    Router::new().route("/latest", get(latest_session))
}

#[derive(Debug, Deserialize)]
struct LatestSessionQuery {
    user: String,
}

#[tracing::instrument(skip(state, query), fields(user = %query.user))]
async fn latest_session(
    State(state): State<FeatureState>,
    Query(query): Query<LatestSessionQuery>,
) -> ServerResult<Json<ApiResponse<UploadSession>>> {
    let session = sessions::latest_for_user(&state.db, &query.user)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("No upload sessions for user '{}'", query.user))
        })?;

    Ok(Json(ApiResponse::success(session)))
}
