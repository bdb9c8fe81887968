//! Image database queries.
//!
//! CRUD operations for stored image records plus the aggregate queries
//! used by storage accounting and orphan pruning.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use stillbox_common::{Error, ImageId, Result};
use uuid::Uuid;

use crate::models::{Image, UserImageStats};

/// Parse an image from a database row.
///
/// Expects columns in order: id, user_id, stored_filename, original_filename,
/// image_kind, mime_type, width, height, file_size, etag, created_at.
fn parse_image_row(row: &rusqlite::Row) -> rusqlite::Result<Image> {
    Ok(Image {
        id: ImageId::from(Uuid::parse_str(&row.get::<_, String>(0)?).unwrap()),
        user_id: row.get(1)?,
        stored_filename: row.get(2)?,
        original_filename: row.get(3)?,
        image_kind: row.get::<_, String>(4)?.parse().unwrap(),
        mime_type: row.get(5)?,
        width: row.get(6)?,
        height: row.get(7)?,
        file_size: row.get(8)?,
        etag: row.get(9)?,
        created_at: DateTime::parse_from_rfc3339(&row.get::<_, String>(10)?)
            .unwrap()
            .with_timezone(&Utc),
    })
}

const IMAGE_COLUMNS: &str = "id, user_id, stored_filename, original_filename, image_kind, \
     mime_type, width, height, file_size, etag, created_at";

/// Insert a new image record.
///
/// # Returns
///
/// * `Ok(ImageId)` - The ID of the inserted image
/// * `Err(Error)` - If a database error occurs
pub fn insert_image(conn: &Connection, image: &Image) -> Result<ImageId> {
    conn.execute(
        "INSERT INTO images (id, user_id, stored_filename, original_filename, image_kind,
                             mime_type, width, height, file_size, etag, created_at)
         VALUES (:id, :user_id, :stored_filename, :original_filename, :image_kind,
                 :mime_type, :width, :height, :file_size, :etag, :created_at)",
        rusqlite::named_params! {
            ":id": image.id.to_string(),
            ":user_id": image.user_id,
            ":stored_filename": &image.stored_filename,
            ":original_filename": &image.original_filename,
            ":image_kind": image.image_kind.to_string(),
            ":mime_type": &image.mime_type,
            ":width": image.width,
            ":height": image.height,
            ":file_size": image.file_size,
            ":etag": &image.etag,
            ":created_at": image.created_at.to_rfc3339(),
        },
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(image.id)
}

/// Get an image by ID.
///
/// # Returns
///
/// * `Ok(Some(Image))` - The image if found
/// * `Ok(None)` - If the image does not exist
/// * `Err(Error)` - If a database error occurs
pub fn get_image(conn: &Connection, id: ImageId) -> Result<Option<Image>> {
    let result = conn.query_row(
        &format!("SELECT {} FROM images WHERE id = :id", IMAGE_COLUMNS),
        rusqlite::named_params! { ":id": id.to_string() },
        parse_image_row,
    );

    match result {
        Ok(image) => Ok(Some(image)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Get all images owned by a user, newest first.
pub fn images_for_user(conn: &Connection, user_id: i64) -> Result<Vec<Image>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM images WHERE user_id = :user_id ORDER BY created_at DESC",
            IMAGE_COLUMNS
        ))
        .map_err(|e| Error::database(e.to_string()))?;

    let images = stmt
        .query_map(
            rusqlite::named_params! { ":user_id": user_id },
            parse_image_row,
        )
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(images)
}

/// Delete an image record by ID.
///
/// # Returns
///
/// * `Ok(true)` - If the image was deleted
/// * `Ok(false)` - If the image did not exist
/// * `Err(Error)` - If a database error occurs
pub fn delete_image(conn: &Connection, id: ImageId) -> Result<bool> {
    let rows_affected = conn
        .execute(
            "DELETE FROM images WHERE id = :id",
            rusqlite::named_params! { ":id": id.to_string() },
        )
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(rows_affected > 0)
}

/// Total number of image records.
pub fn total_image_count(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))
        .map_err(|e| Error::database(e.to_string()))
}

/// Sum of recorded file sizes across all images.
pub fn total_image_size(conn: &Connection) -> Result<i64> {
    conn.query_row(
        "SELECT COALESCE(SUM(file_size), 0) FROM images",
        [],
        |row| row.get(0),
    )
    .map_err(|e| Error::database(e.to_string()))
}

/// Per-user image count and byte totals, largest consumers first.
pub fn user_image_stats(conn: &Connection) -> Result<Vec<UserImageStats>> {
    let mut stmt = conn
        .prepare(
            "SELECT user_id, COUNT(*), COALESCE(SUM(file_size), 0)
             FROM images
             GROUP BY user_id
             ORDER BY SUM(file_size) DESC",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let stats = stmt
        .query_map([], |row| {
            Ok(UserImageStats {
                user_id: row.get(0)?,
                image_count: row.get(1)?,
                total_bytes: row.get(2)?,
            })
        })
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(stats)
}

/// Whether any entry references the given image.
pub fn is_referenced(conn: &Connection, id: ImageId) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*)
             FROM entries, json_each(entries.image_ids)
             WHERE json_each.value = :id",
            rusqlite::named_params! { ":id": id.to_string() },
            |row| row.get(0),
        )
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(count > 0)
}

/// Find orphan candidates: post and comment images created before `cutoff`
/// that no entry references.
///
/// Profile and header images are excluded at the SQL level; the caller
/// does not need to re-check kinds.
pub fn orphan_candidates(conn: &Connection, cutoff: DateTime<Utc>) -> Result<Vec<Image>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM images
             WHERE image_kind IN ('post', 'comment')
               AND created_at < :cutoff
               AND id NOT IN (
                   SELECT json_each.value
                   FROM entries, json_each(entries.image_ids)
               )
             ORDER BY created_at ASC",
            IMAGE_COLUMNS
        ))
        .map_err(|e| Error::database(e.to_string()))?;

    let images = stmt
        .query_map(
            rusqlite::named_params! { ":cutoff": cutoff.to_rfc3339() },
            parse_image_row,
        )
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(images)
}
