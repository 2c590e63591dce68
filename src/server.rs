//! # HTTP Routes
//!
//! Thin axum layer over [`crate::api`]:
//!
//! - `GET  /health`                  - Health check
//! - `GET  /api/config`              - Filter metadata of the active dataset
//! - `POST /api/upload`              - Upload a CSV catalog (multipart field `file`)
//! - `GET  /api/data/:dataset`       - Filtered star systems of a dataset
//! - `POST /api/predict`             - Annotate a dataset with classifier scores
//! - `GET  /api/star_system/:star`   - All planets of one star
//!
//! Any other path is served from the configured static directory.
//!
//! ## Error Handling
//!
//! Errors are returned as `{"error": "<message>"}` with:
//! - 400 Bad Request: validation failures (file type, missing columns)
//! - 404 Not Found: unknown dataset or star
//! - 500 Internal Server Error: classifier failure, I/O failure

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::error;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::api::{self, AppState};
use crate::error::AppError;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::MissingColumns(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Classifier(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if !self.is_client_error() {
            error!("{self}");
        }
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let static_files = ServeDir::new(&state.config.static_dir);
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health))
        .route("/api/config", get(get_config))
        .route("/api/upload", post(upload))
        .route("/api/data/:dataset_name", get(get_data))
        .route("/api/predict", post(predict))
        .route("/api/star_system/:star_name", get(get_star_system))
        .fallback_service(static_files)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /health
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Run a request operation on the blocking pool. Uploads parse and write
/// files, and predictions read the model and score every row.
async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(format!("request task failed: {e}")))?
}

/// GET /api/config
async fn get_config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(api::client_config(&state))
}

/// POST /api/upload: multipart form with a `file` part. A `file` field
/// without a filename is a plain form field, not a file part.
async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut file: Option<(String, Bytes)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(e.to_string()))?;
        file = Some((filename, data));
        break;
    }

    let response = blocking(move || match &file {
        Some((filename, data)) => api::upload_dataset(&state, Some(filename.as_str()), data),
        None => api::upload_dataset(&state, None, &[]),
    })
    .await?;
    Ok(Json(response))
}

/// GET /api/data/:dataset_name?column=min,max&column=value&max_stars=N
async fn get_data(
    State(state): State<Arc<AppState>>,
    Path(dataset_name): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, AppError> {
    let systems = blocking(move || api::star_systems(&state, &dataset_name, &params)).await?;
    Ok(Json(systems))
}

#[derive(Deserialize, Default)]
struct PredictRequest {
    dataset: Option<String>,
}

/// POST /api/predict: optional JSON body `{"dataset": "<name>"}`.
async fn predict(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let request: PredictRequest = if body.is_empty() {
        PredictRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::Validation(format!("invalid JSON body: {e}")))?
    };
    let response = blocking(move || api::predict(&state, request.dataset.as_deref())).await?;
    Ok(Json(response))
}

/// GET /api/star_system/:star_name
async fn get_star_system(
    State(state): State<Arc<AppState>>,
    Path(star_name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let detail = blocking(move || api::star_system_detail(&state, &star_name)).await?;
    Ok(Json(detail))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blocking_work_leaves_the_runtime_thread() {
        let caller = std::thread::current().id();
        let worker = blocking(|| Ok(std::thread::current().id())).await.unwrap();
        assert_ne!(caller, worker);
    }

    #[tokio::test]
    async fn panicking_operation_is_an_internal_error() {
        let err = blocking(|| -> Result<(), AppError> { panic!("parser blew up") })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        assert!(!err.is_client_error());
    }
}
