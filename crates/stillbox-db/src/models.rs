//! Internal Rust models matching the database schema.
//!
//! This module provides strongly-typed Rust structures that map to database
//! tables. All models use types from stillbox-common where appropriate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stillbox_common::{EntryId, ImageId, ImageKind};

/// Stored image record.
///
/// One row per file that survived validation and (optionally) transcoding.
/// `stored_filename` is the on-disk name under the owner's directory;
/// `original_filename` is the sanitized client-supplied name kept for display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Image {
    pub id: ImageId,
    pub user_id: i64,
    pub stored_filename: String,
    pub original_filename: String,
    pub image_kind: ImageKind,
    pub mime_type: String,
    /// Pixel width. None for formats without raster dimensions (SVG).
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub file_size: i64,
    /// Strong content tag used for conditional GET.
    pub etag: String,
    pub created_at: DateTime<Utc>,
}

/// A post-like entity that references zero or more images.
///
/// Entries belong to the surrounding application; this crate only cares
/// about the `image_ids` column for the reference boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entry {
    pub id: EntryId,
    pub image_ids: Vec<ImageId>,
    pub created_at: DateTime<Utc>,
}

/// Per-user storage accounting row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserImageStats {
    pub user_id: i64,
    pub image_count: i64,
    pub total_bytes: i64,
}
