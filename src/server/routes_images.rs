//! Image serving, inline creation, and deletion routes.
//!
//! Serving is public and cache-friendly: strong ETag from content bytes,
//! `If-None-Match` short-circuits to 304, immutable Cache-Control. Creation
//! and deletion require the caller identity header.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use stillbox_common::{Error, ImageId, ImageKind};
use stillbox_db::queries::images;
use tokio_util::io::ReaderStream;

use super::error::{ApiError, ApiResult};
use super::extract::CallerId;
use super::AppContext;
use crate::uploads::validate::check_size;

/// Create image-related routes.
pub fn image_routes() -> Router<AppContext> {
    Router::new()
        .route("/images", axum::routing::post(create_image))
        .route("/images/:image_id", get(serve_image).delete(delete_image))
}

// ============================================================================
// Request types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateImageRequest {
    pub filename: String,
    pub mime_type: String,
    pub image_type: ImageKind,
    /// Base64-encoded image bytes.
    pub data: String,
    #[serde(default)]
    pub raw_upload: bool,
}

// ============================================================================
// Handlers
// ============================================================================

fn parse_image_id(raw: &str) -> ApiResult<ImageId> {
    raw.parse::<uuid::Uuid>()
        .map(ImageId::from)
        .map_err(|_| ApiError(Error::validation("Invalid image ID")))
}

/// Single-shot inline upload, used by entry creation.
///
/// Bypasses the chunk protocol but runs the same validation, hardening,
/// and transcoding pipeline.
async fn create_image(
    State(ctx): State<AppContext>,
    CallerId(user_id): CallerId,
    Json(req): Json<CreateImageRequest>,
) -> ApiResult<impl IntoResponse> {
    let bytes = BASE64
        .decode(&req.data)
        .map_err(|_| Error::validation("Image data is not valid base64"))?;
    check_size(bytes.len() as u64)?;

    let sessions = ctx.sessions.clone();
    let done = tokio::task::spawn_blocking(move || {
        sessions.ingest(
            user_id,
            &req.filename,
            &req.mime_type,
            req.image_type,
            &bytes,
            req.raw_upload,
        )
    })
    .await
    .map_err(|e| ApiError::internal(format!("ingest task failed: {}", e)))??;

    Ok((StatusCode::CREATED, Json(done)))
}

/// Serve stored image bytes. Public, no auth.
async fn serve_image(
    State(ctx): State<AppContext>,
    Path(image_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<axum::response::Response> {
    let id = parse_image_id(&image_id)?;

    let conn = stillbox_db::pool::get_conn(&ctx.db)?;
    let image = images::get_image(&conn, id)?
        .ok_or_else(|| Error::not_found("Image not found"))?;
    drop(conn);

    let etag = format!("\"{}\"", image.etag);

    // Conditional GET short-circuit
    if let Some(candidate) = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
    {
        if candidate == etag || candidate == "*" {
            return Ok((
                StatusCode::NOT_MODIFIED,
                [(header::ETAG, etag)],
            )
                .into_response());
        }
    }

    let path = ctx.paths.image_path(image.user_id, &image.stored_filename)?;
    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|_| Error::not_found("Image file not found on disk"))?;

    let stream = ReaderStream::new(file);
    let body = Body::from_stream(stream);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, image.mime_type),
            (header::ETAG, etag),
            (
                header::CACHE_CONTROL,
                "public, max-age=31536000, immutable".to_string(),
            ),
        ],
        body,
    )
        .into_response())
}

/// Delete an image the caller owns.
///
/// 403 for non-owners, 409 while any entry still references it. File is
/// removed before the row so prune can reconcile a crash in between.
async fn delete_image(
    State(ctx): State<AppContext>,
    CallerId(user_id): CallerId,
    Path(image_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_image_id(&image_id)?;

    let ctx2 = ctx.clone();
    tokio::task::spawn_blocking(move || -> stillbox_common::Result<()> {
        let conn = stillbox_db::pool::get_conn(&ctx2.db)?;
        let image = images::get_image(&conn, id)?
            .ok_or_else(|| Error::not_found("Image not found"))?;

        if image.user_id != user_id {
            return Err(Error::Forbidden);
        }
        if images::is_referenced(&conn, id)? {
            return Err(Error::conflict("Image is still referenced by an entry"));
        }

        let path = ctx2.paths.image_path(image.user_id, &image.stored_filename)?;
        if let Err(e) = std::fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(e.into());
            }
        }
        images::delete_image(&conn, id)?;

        tracing::info!(id = %id, user_id = user_id, "Image deleted");
        Ok(())
    })
    .await
    .map_err(|e| ApiError::internal(format!("delete task failed: {}", e)))??;

    Ok(StatusCode::NO_CONTENT)
}
