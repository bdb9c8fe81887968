use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use stillbox_db::pool::DbPool;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::Config;
use crate::storage::StorageAccountant;
use crate::uploads::validate::MAX_FILE_SIZE;
use crate::uploads::{start_cleanup_task, SessionManager, StoragePaths};

/// Request body cap. Chunk and inline payloads travel base64-encoded in
/// JSON, so a file at the upload ceiling needs a 4/3-sized body plus room
/// for the envelope.
const MAX_BODY_SIZE: usize = (MAX_FILE_SIZE as usize / 3) * 4 + 64 * 1024;

pub mod error;
pub mod extract;
pub mod routes_admin;
pub mod routes_images;
pub mod routes_uploads;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    /// Database connection pool
    pub db: DbPool,
    /// Upload session manager
    pub sessions: SessionManager,
    /// Storage path layout
    pub paths: StoragePaths,
    /// Storage accountant for summaries and pruning
    pub accountant: StorageAccountant,
}

impl AppContext {
    /// Build a context from config and an initialized pool, creating the
    /// storage roots.
    pub fn new(config: Config, db: DbPool) -> Result<Self> {
        let paths = StoragePaths::new(config.storage.upload_root(), config.storage.temp_root())
            .context("Failed to create storage directories")?;
        let sessions = SessionManager::new(
            db.clone(),
            paths.clone(),
            config.uploads.session_idle_secs,
        );
        let accountant = StorageAccountant::new(db.clone(), paths.clone());

        Ok(Self {
            config: Arc::new(config),
            db,
            sessions,
            paths,
            accountant,
        })
    }
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes())
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

fn api_routes() -> Router<AppContext> {
    routes_uploads::upload_routes()
        .merge(routes_images::image_routes())
        .merge(routes_admin::admin_routes())
}

async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// Start the HTTP server
pub async fn start_server(config: Config, db: DbPool) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let ctx = AppContext::new(config, db)?;

    // Reclaim idle sessions in the background
    start_cleanup_task(ctx.sessions.clone(), 60);

    let app = create_router(ctx);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
