//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which creates an in-memory DB, a temp-dir
//! storage layout, and a full [`AppContext`]. The [`with_server`]
//! constructor starts Axum on a random port for HTTP-level testing.

use std::io::Cursor;
use std::net::SocketAddr;

use image::{ImageFormat, Rgba, RgbaImage};
use tempfile::TempDir;

use stillbox::config::Config;
use stillbox::server::{create_router, AppContext};
use stillbox_db::pool::{init_memory_pool, DbPool};

/// Test harness wrapping a fully-constructed [`AppContext`] backed by an
/// in-memory database and temp-dir storage roots.
pub struct TestHarness {
    pub ctx: AppContext,
    pub db: DbPool,
    // Held so the storage roots outlive the harness
    _storage: TempDir,
}

impl TestHarness {
    /// Create a new harness with default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create a new harness with a custom configuration. Storage paths in
    /// the config are replaced by a fresh temp directory.
    pub fn with_config(mut config: Config) -> Self {
        let storage = TempDir::new().expect("failed to create temp storage dir");
        config.storage.data_dir = storage.path().to_path_buf();
        config.storage.upload_dir = None;
        config.storage.temp_dir = None;

        let db = init_memory_pool().expect("failed to create in-memory pool");
        let ctx = AppContext::new(config, db.clone()).expect("failed to build app context");

        Self {
            ctx,
            db,
            _storage: storage,
        }
    }

    /// Start an Axum server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn with_server() -> (Self, SocketAddr) {
        let harness = Self::new();
        let app = create_router(harness.ctx.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (harness, addr)
    }

    /// Get a database connection from the pool.
    pub fn conn(&self) -> stillbox_db::pool::PooledConnection {
        stillbox_db::pool::get_conn(&self.db).expect("failed to get db connection")
    }
}

/// A small valid PNG for upload fixtures.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([200, 100, 50, 255]));
    let mut out = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .unwrap();
    out
}

/// A PNG of random pixels. Noise defeats PNG compression, so the encoded
/// size tracks the raw pixel size; use this for large-body fixtures.
#[allow(dead_code)]
pub fn noise_png(width: u32, height: u32) -> Vec<u8> {
    use rand::RngCore;

    let mut pixels = vec![0u8; (width * height * 4) as usize];
    rand::thread_rng().fill_bytes(&mut pixels);
    let img = RgbaImage::from_raw(width, height, pixels).unwrap();
    let mut out = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .unwrap();
    out
}
