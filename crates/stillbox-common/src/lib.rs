//! Stillbox-Common: Shared types, IDs, and error handling.
//!
//! This crate provides common functionality used across stillbox:
//!
//! - **Typed IDs**: Type-safe UUID wrappers for images, upload sessions, and entries
//! - **Core Types**: The image kind enum and MIME helpers
//! - **Error Handling**: The error taxonomy used at every component boundary
//!
//! # Examples
//!
//! ```
//! use stillbox_common::{ImageId, ImageKind, Error, Result};
//!
//! let image_id = ImageId::new();
//! let kind = ImageKind::Post;
//!
//! fn example() -> Result<()> {
//!     Err(Error::not_found("image"))
//! }
//! ```

pub mod error;
pub mod ids;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
