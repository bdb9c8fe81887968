//! Stillbox-DB: Database schema, migrations, and query operations
//!
//! This crate provides database functionality for stillbox using SQLite
//! with rusqlite and r2d2 connection pooling.
//!
//! # Modules
//!
//! - `migrations` - Database schema migrations
//! - `pool` - Connection pool management
//! - `models` - Rust models matching the database schema
//! - `queries` - Database query operations
//!
//! # Example
//!
//! ```no_run
//! use stillbox_db::pool::{init_pool, get_conn};
//! use stillbox_db::queries::images;
//!
//! let pool = init_pool("/var/lib/stillbox/stillbox.db").unwrap();
//! let conn = get_conn(&pool).unwrap();
//!
//! let count = images::total_image_count(&conn).unwrap();
//! println!("{} images stored", count);
//! ```

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
