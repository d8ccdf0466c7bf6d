//! HTTP front for the upload service.
//!
//! Routes:
//! - `POST /upload`: raw `multipart/form-data` body
//! - `POST /api/files`: raw body, name from the `X-Filename` header
//! - `GET /api/files`: list uploads
//! - `GET /api/files/{id}`: metadata and extraction
//! - `DELETE /api/files/{id}`: remove an upload
//! - `GET /raw/{id}`: stored bytes, always as inert `text/plain`
//! - `GET /view/{id}`: plain-text report

use crate::config::GatewayConfig;
use crate::service::{UploadError, UploadService};
use crate::uploads::describe::describe_upload;
use crate::uploads::{FileSummary, StoredFile};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info};

const FILENAME_HEADER: &str = "x-filename";

/// Build the router over `service`.
pub fn router(service: UploadService, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/upload", post(upload_multipart))
        .route("/api/files", get(list_files).post(upload_raw))
        .route("/api/files/{id}", get(show_file).delete(delete_file))
        .route("/raw/{id}", get(raw_file))
        .route("/view/{id}", get(view_file))
        .with_state(service)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
}

/// Bind and serve until Ctrl-C.
pub async fn run(service: UploadService, config: &GatewayConfig) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind gateway on {addr}"))?;
    info!(addr = %addr, "gateway listening");
    axum::serve(listener, router(service, config.max_body_bytes))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("Gateway server error")
}

struct ApiError(UploadError);

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            UploadError::MissingBoundary | UploadError::NoFilePart => StatusCode::BAD_REQUEST,
            UploadError::Store(err) => {
                error!(error = %err, "store operation failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

fn not_found(id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("no upload with id {id}") })),
    )
        .into_response()
}

async fn upload_multipart(
    State(service): State<UploadService>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let receipt = service.upload_multipart(&body, content_type).await?;
    Ok((StatusCode::CREATED, Json(receipt)).into_response())
}

async fn upload_raw(
    State(service): State<UploadService>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let name = headers
        .get(FILENAME_HEADER)
        .and_then(|value| value.to_str().ok());
    let receipt = service.upload(&body, name).await?;
    Ok((StatusCode::CREATED, Json(receipt)).into_response())
}

async fn list_files(State(service): State<UploadService>) -> Json<Vec<FileSummary>> {
    Json(service.list())
}

async fn show_file(
    State(service): State<UploadService>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    Ok(match service.read(&id).await? {
        Some(file) => Json::<StoredFile>(file).into_response(),
        None => not_found(&id),
    })
}

async fn raw_file(
    State(service): State<UploadService>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    Ok(match service.read(&id).await? {
        // Never served as markup: uploads are untrusted and share our origin.
        Some(file) => (
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
                (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
            ],
            file.content,
        )
            .into_response(),
        None => not_found(&id),
    })
}

async fn view_file(
    State(service): State<UploadService>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    Ok(match service.read(&id).await? {
        Some(file) => (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            describe_upload(&file),
        )
            .into_response(),
        None => not_found(&id),
    })
}

async fn delete_file(
    State(service): State<UploadService>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    Ok(if service.delete(&id).await? {
        Json(json!({ "deleted": true })).into_response()
    } else {
        not_found(&id)
    })
}
