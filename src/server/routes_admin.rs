//! Operator routes: storage summary and pruning.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use super::error::{ApiError, ApiResult};
use super::AppContext;

/// Create admin routes.
pub fn admin_routes() -> Router<AppContext> {
    Router::new()
        .route("/admin/storage", get(storage_summary))
        .route("/admin/storage/users", get(user_stats))
        .route("/admin/storage/users/:user_id", get(user_summary))
        .route("/admin/prune", post(prune))
}

#[derive(Debug, Serialize)]
pub struct PruneResponse {
    pub orphans_removed: usize,
    pub temp_files_removed: usize,
}

/// Global storage summary: DB totals next to on-disk totals.
async fn storage_summary(State(ctx): State<AppContext>) -> ApiResult<impl IntoResponse> {
    let accountant = ctx.accountant.clone();
    let summary = tokio::task::spawn_blocking(move || accountant.summary())
        .await
        .map_err(|e| ApiError::internal(format!("summary task failed: {}", e)))??;

    Ok(Json(summary))
}

/// Per-user totals, largest consumers first.
async fn user_stats(State(ctx): State<AppContext>) -> ApiResult<impl IntoResponse> {
    let accountant = ctx.accountant.clone();
    let stats = tokio::task::spawn_blocking(move || accountant.all_user_stats())
        .await
        .map_err(|e| ApiError::internal(format!("stats task failed: {}", e)))??;

    Ok(Json(stats))
}

/// One user's breakdown with kind counts.
async fn user_summary(
    State(ctx): State<AppContext>,
    Path(user_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let accountant = ctx.accountant.clone();
    let summary = tokio::task::spawn_blocking(move || accountant.user_summary(user_id))
        .await
        .map_err(|e| ApiError::internal(format!("stats task failed: {}", e)))??;

    Ok(Json(summary))
}

/// Run both prune passes and report counts.
async fn prune(State(ctx): State<AppContext>) -> ApiResult<impl IntoResponse> {
    let accountant = ctx.accountant.clone();
    let sessions = ctx.sessions.clone();
    let grace = chrono::Duration::days(ctx.config.uploads.prune_grace_days as i64);
    let temp_max_age = std::time::Duration::from_secs(ctx.config.uploads.temp_max_age_secs);

    let result = tokio::task::spawn_blocking(move || -> stillbox_common::Result<PruneResponse> {
        let orphans_removed = accountant.prune_orphaned_images(grace)?;
        let live = sessions.live_temp_paths();
        let temp_files_removed = accountant.prune_temp(temp_max_age, &live);
        Ok(PruneResponse {
            orphans_removed,
            temp_files_removed,
        })
    })
    .await
    .map_err(|e| ApiError::internal(format!("prune task failed: {}", e)))??;

    Ok(Json(result))
}
