//! The upload pipeline.
//!
//! Client bytes flow through sanitization and path guarding, chunk assembly,
//! content validation, hardening, and transcoding before an Image row is
//! committed. Side effects stay inside the temp directory until finalize
//! succeeds.

pub mod harden;
pub mod paths;
pub mod sanitize;
pub mod sessions;
pub mod transcode;
pub mod validate;

pub use paths::StoragePaths;
pub use sessions::{start_cleanup_task, CompletedUpload, SessionManager};
