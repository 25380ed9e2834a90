use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    http::{header::HOST, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::classifier::{Classification, DishClassifier};
use crate::error::{
    ApiError, MSG_BAD_IMAGE, MSG_CLASSIFIER_UNAVAILABLE, MSG_EMPTY_FILENAME, MSG_INVALID_FILENAME,
    MSG_NO_FILE_PART, MSG_TOO_LARGE,
};
use crate::preprocess::{self, PreprocessError};
use crate::recipe::RecipeGenerator;
use crate::storage::{sanitize_filename, UploadStore};

/// Read-only handles shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub classifier: Option<Arc<DishClassifier>>,
    pub recipes: RecipeGenerator,
    pub uploads: Arc<UploadStore>,
    pub public_base_url: Option<Arc<str>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub food_name: String,
    pub recipe: String,
    pub image_url: String,
}

struct Upload {
    file_name: String,
    bytes: Bytes,
}

/// `body_limit_bytes` caps request bodies; `None` accepts uploads of any size.
pub fn router(state: AppState, body_limit_bytes: Option<usize>) -> Router {
    let uploads = ServeDir::new(state.uploads.root());
    let body_limit = match body_limit_bytes {
        Some(limit) => DefaultBodyLimit::max(limit),
        None => DefaultBodyLimit::disable(),
    };

    Router::new()
        .route("/predict", post(predict_handler))
        .route("/health", get(health_check))
        .nest_service("/uploads", uploads)
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn predict_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    // Checked before the body is read so nothing is stored while the model is down.
    let classifier = state
        .classifier
        .clone()
        .ok_or_else(|| ApiError::ServiceUnavailable(MSG_CLASSIFIER_UNAVAILABLE.to_string()))?;

    let multipart = multipart.map_err(|e| {
        tracing::debug!("rejected non-multipart body: {}", e);
        ApiError::BadRequest(MSG_NO_FILE_PART.to_string())
    })?;
    let upload = read_file_part(multipart).await?;

    let file_name = sanitize_filename(&upload.file_name)
        .ok_or_else(|| ApiError::BadRequest(MSG_INVALID_FILENAME.to_string()))?;
    let path = state
        .uploads
        .save(&file_name, &upload.bytes)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let classification = tokio::task::spawn_blocking(move || -> Result<Classification, ApiError> {
        let tensor = preprocess::load_tensor(&path).map_err(|e| match e {
            PreprocessError::Decode(_) => {
                tracing::warn!(error = %e, "rejecting upload");
                ApiError::BadRequest(MSG_BAD_IMAGE.to_string())
            }
            PreprocessError::Missing(_) => ApiError::Internal(e.to_string()),
        })?;
        classifier
            .classify(&tensor)
            .map_err(|e| ApiError::Internal(e.to_string()))
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    tracing::info!(
        file = %file_name,
        label = %classification.label,
        index = classification.index,
        "classified upload"
    );

    let recipe = state
        .recipes
        .recipe_for(&classification.display_name)
        .await
        .into_text();

    Ok(Json(PredictResponse {
        food_name: classification.display_name,
        recipe,
        image_url: image_url(state.public_base_url.as_deref(), &headers, &file_name),
    }))
}

/// Returns the first part named `file` that carries a filename.
async fn read_file_part(mut multipart: Multipart) -> Result<Upload, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(multipart_error)?
    {
        if field.name() != Some("file") {
            continue;
        }
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        if file_name.is_empty() {
            return Err(ApiError::BadRequest(MSG_EMPTY_FILENAME.to_string()));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(multipart_error)?;
        return Ok(Upload { file_name, bytes });
    }

    Err(ApiError::BadRequest(MSG_NO_FILE_PART.to_string()))
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::PayloadTooLarge(MSG_TOO_LARGE.to_string());
    }
    tracing::debug!("unreadable multipart body: {}", e.body_text());
    ApiError::BadRequest(MSG_NO_FILE_PART.to_string())
}

fn image_url(public_base_url: Option<&str>, headers: &HeaderMap, file_name: &str) -> String {
    let base = match public_base_url {
        Some(base) => base.trim_end_matches('/').to_string(),
        None => {
            let host = headers
                .get(HOST)
                .and_then(|h| h.to_str().ok())
                .unwrap_or("localhost");
            format!("http://{}", host.replace("0.0.0.0", "127.0.0.1"))
        }
    };
    format!("{}/uploads/{}", base, file_name)
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "OK",
        "classifier": state.classifier.is_some(),
        "recipes": state.recipes.is_available(),
    }))
}
