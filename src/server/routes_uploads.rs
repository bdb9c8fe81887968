//! Chunked upload API routes.
//!
//! The three-step protocol: init allocates a session, chunk writes bytes at
//! an offset, complete runs the validation/transcode pipeline and returns
//! the persisted image. Chunk data travels base64-encoded in JSON bodies.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use stillbox_common::{Error, ImageKind, SessionToken};

use super::error::{ApiError, ApiResult};
use super::extract::CallerId;
use super::AppContext;

/// Create upload-related routes.
pub fn upload_routes() -> Router<AppContext> {
    Router::new()
        .route("/upload/init", post(upload_init))
        .route("/upload/chunk", post(upload_chunk))
        .route("/upload/complete", post(upload_complete))
}

// ============================================================================
// Request/response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct InitRequest {
    pub filename: String,
    pub mime_type: String,
    pub total_size: u64,
    pub image_type: ImageKind,
}

#[derive(Debug, Serialize)]
pub struct InitResponse {
    pub session_token: SessionToken,
}

#[derive(Debug, Deserialize)]
pub struct ChunkRequest {
    pub session_token: SessionToken,
    pub offset: u64,
    /// Base64-encoded chunk bytes.
    pub data: String,
}

#[derive(Debug, Serialize)]
pub struct ChunkResponse {
    pub received_bytes: u64,
}

#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    pub session_token: SessionToken,
    #[serde(default)]
    pub raw_upload: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// Start a chunked upload session.
async fn upload_init(
    State(ctx): State<AppContext>,
    CallerId(user_id): CallerId,
    Json(req): Json<InitRequest>,
) -> ApiResult<Json<InitResponse>> {
    let sessions = ctx.sessions.clone();
    let token = tokio::task::spawn_blocking(move || {
        sessions.init(
            user_id,
            &req.filename,
            &req.mime_type,
            req.total_size,
            req.image_type,
        )
    })
    .await
    .map_err(|e| ApiError::internal(format!("init task failed: {}", e)))??;

    Ok(Json(InitResponse {
        session_token: token,
    }))
}

/// Accept one chunk at an arbitrary offset.
async fn upload_chunk(
    State(ctx): State<AppContext>,
    CallerId(user_id): CallerId,
    Json(req): Json<ChunkRequest>,
) -> ApiResult<Json<ChunkResponse>> {
    let bytes = BASE64
        .decode(&req.data)
        .map_err(|_| Error::validation("Chunk data is not valid base64"))?;

    let sessions = ctx.sessions.clone();
    let received = tokio::task::spawn_blocking(move || {
        sessions.accept_chunk(req.session_token, user_id, req.offset, &bytes)
    })
    .await
    .map_err(|e| ApiError::internal(format!("chunk task failed: {}", e)))??;

    Ok(Json(ChunkResponse {
        received_bytes: received,
    }))
}

/// Finalize the session: validate, harden, transcode, persist.
async fn upload_complete(
    State(ctx): State<AppContext>,
    CallerId(user_id): CallerId,
    Json(req): Json<CompleteRequest>,
) -> ApiResult<impl IntoResponse> {
    let sessions = ctx.sessions.clone();
    let done = tokio::task::spawn_blocking(move || {
        sessions.finalize(req.session_token, user_id, req.raw_upload)
    })
    .await
    .map_err(|e| ApiError::internal(format!("finalize task failed: {}", e)))??;

    Ok((StatusCode::CREATED, Json(done)))
}
