//! Entry database queries.
//!
//! Entries are the post-like entities that hold image references. The
//! `image_ids` column is a JSON array of image IDs; reference checks against
//! it live in [`super::images`] and use SQLite's `json_each` table-valued
//! function.

use chrono::Utc;
use rusqlite::Connection;
use stillbox_common::{EntryId, Error, ImageId, Result};

use crate::models::Entry;

/// Create an entry referencing the given images.
pub fn create_entry(conn: &Connection, image_ids: &[ImageId]) -> Result<EntryId> {
    let entry = Entry {
        id: EntryId::new(),
        image_ids: image_ids.to_vec(),
        created_at: Utc::now(),
    };

    let ids_json = serde_json::to_string(
        &entry
            .image_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>(),
    )
    .map_err(|e| Error::database(e.to_string()))?;

    conn.execute(
        "INSERT INTO entries (id, image_ids, created_at) VALUES (:id, :image_ids, :created_at)",
        rusqlite::named_params! {
            ":id": entry.id.to_string(),
            ":image_ids": ids_json,
            ":created_at": entry.created_at.to_rfc3339(),
        },
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(entry.id)
}
