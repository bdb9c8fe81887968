//! Storage accounting and reclamation.
//!
//! Read side computes aggregate sizes from the database and a filesystem
//! walk, per request, never cached. DB-reported totals sit next to actual
//! on-disk totals so operators can spot drift between rows and files. Write
//! side prunes orphaned images and stale temp files in best-effort batches.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::Utc;
use serde::Serialize;
use stillbox_common::{ImageKind, Result};
use stillbox_db::models::UserImageStats;
use stillbox_db::pool::DbPool;
use stillbox_db::queries::images;

use crate::uploads::StoragePaths;

/// Aggregate storage counters, derived on demand.
#[derive(Debug, Clone, Serialize)]
pub struct StorageSummary {
    pub total_images: i64,
    /// Sum of sizes recorded in Image rows.
    pub total_image_size_bytes: i64,
    /// Sum of stat-reported sizes under the upload root.
    pub total_disk_size_bytes: u64,
    /// Sum of stat-reported sizes under the temp root.
    pub temp_size_bytes: u64,
    pub total_image_size_formatted: String,
    pub total_disk_size_formatted: String,
    pub temp_size_formatted: String,
}

/// Per-user breakdown with kind counts.
#[derive(Debug, Clone, Serialize)]
pub struct UserStorageSummary {
    pub user_id: i64,
    pub image_count: i64,
    pub total_bytes: i64,
    pub total_formatted: String,
    pub post_count: i64,
    pub profile_count: i64,
    pub header_count: i64,
    pub comment_count: i64,
}

/// Storage accountant bound to one database and path layout.
#[derive(Clone)]
pub struct StorageAccountant {
    db: DbPool,
    paths: StoragePaths,
}

impl StorageAccountant {
    pub fn new(db: DbPool, paths: StoragePaths) -> Self {
        Self { db, paths }
    }

    /// Compute the global storage summary.
    pub fn summary(&self) -> Result<StorageSummary> {
        let conn = stillbox_db::pool::get_conn(&self.db)?;
        let total_images = images::total_image_count(&conn)?;
        let total_image_size_bytes = images::total_image_size(&conn)?;
        let total_disk_size_bytes = dir_size(self.paths.upload_root());
        let temp_size_bytes = dir_size(self.paths.temp_root());

        Ok(StorageSummary {
            total_images,
            total_image_size_bytes,
            total_disk_size_bytes,
            temp_size_bytes,
            total_image_size_formatted: format_bytes(total_image_size_bytes as u64),
            total_disk_size_formatted: format_bytes(total_disk_size_bytes),
            temp_size_formatted: format_bytes(temp_size_bytes),
        })
    }

    /// All users' counts and byte totals, largest first.
    pub fn all_user_stats(&self) -> Result<Vec<UserImageStats>> {
        let conn = stillbox_db::pool::get_conn(&self.db)?;
        images::user_image_stats(&conn)
    }

    /// One user's breakdown, including per-kind counts.
    pub fn user_summary(&self, user_id: i64) -> Result<UserStorageSummary> {
        let conn = stillbox_db::pool::get_conn(&self.db)?;
        let rows = images::images_for_user(&conn, user_id)?;

        let mut summary = UserStorageSummary {
            user_id,
            image_count: rows.len() as i64,
            total_bytes: 0,
            total_formatted: String::new(),
            post_count: 0,
            profile_count: 0,
            header_count: 0,
            comment_count: 0,
        };
        for row in &rows {
            summary.total_bytes += row.file_size;
            match row.image_kind {
                ImageKind::Post => summary.post_count += 1,
                ImageKind::Profile => summary.profile_count += 1,
                ImageKind::Header => summary.header_count += 1,
                ImageKind::Comment => summary.comment_count += 1,
            }
        }
        summary.total_formatted = format_bytes(summary.total_bytes as u64);

        Ok(summary)
    }

    /// Remove orphaned post/comment images older than the grace period.
    ///
    /// File first, then row; a failure on one image is logged and the batch
    /// continues.
    ///
    /// # Returns
    /// The number of images removed.
    pub fn prune_orphaned_images(&self, grace: chrono::Duration) -> Result<usize> {
        let conn = stillbox_db::pool::get_conn(&self.db)?;
        let cutoff = Utc::now() - grace;
        let candidates = images::orphan_candidates(&conn, cutoff)?;

        let mut removed = 0;
        for image in candidates {
            let path = match self.paths.image_path(image.user_id, &image.stored_filename) {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(id = %image.id, error = %e, "Skipping orphan with bad path");
                    continue;
                }
            };

            if let Err(e) = std::fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(id = %image.id, error = %e, "Failed to remove orphan file");
                    continue;
                }
                // Row without a file: remove the row to reconcile
            }

            match images::delete_image(&conn, image.id) {
                Ok(_) => {
                    removed += 1;
                    tracing::info!(id = %image.id, user_id = image.user_id, "Pruned orphaned image");
                }
                Err(e) => {
                    tracing::warn!(id = %image.id, error = %e, "Failed to remove orphan row");
                }
            }
        }

        Ok(removed)
    }

    /// Count orphan candidates without removing anything.
    pub fn orphan_candidate_count(&self, grace: chrono::Duration) -> Result<usize> {
        let conn = stillbox_db::pool::get_conn(&self.db)?;
        Ok(images::orphan_candidates(&conn, Utc::now() - grace)?.len())
    }

    /// Remove temp files older than `max_age`, skipping live session files.
    ///
    /// # Returns
    /// The number of files removed.
    pub fn prune_temp(&self, max_age: Duration, live: &HashSet<PathBuf>) -> usize {
        // A max_age reaching past the clock's range means nothing is stale
        let Some(cutoff) = SystemTime::now().checked_sub(max_age) else {
            return 0;
        };

        let entries = match std::fs::read_dir(self.paths.temp_root()) {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read temp directory");
                return 0;
            }
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if live.contains(&path) {
                continue;
            }
            let Ok(meta) = entry.metadata() else { continue };
            if !meta.is_file() {
                continue;
            }
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            if modified >= cutoff {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    removed += 1;
                    tracing::info!(path = %path.display(), "Pruned stale temp file");
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove temp file");
                }
            }
        }

        removed
    }
}

/// Sum of stat-reported file sizes under a directory.
///
/// Tolerates concurrent creation and deletion: entries that fail to stat
/// are skipped, never fatal.
pub fn dir_size(root: &Path) -> u64 {
    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|meta| meta.len())
        .sum()
}

/// Human-readable byte count, two decimals.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", size, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use stillbox_common::ImageId;
    use stillbox_db::models::Image;
    use stillbox_db::pool::init_memory_pool;
    use stillbox_db::queries::entries::create_entry;
    use tempfile::TempDir;

    fn make_accountant() -> (TempDir, StorageAccountant) {
        let dir = TempDir::new().unwrap();
        let paths =
            StoragePaths::new(dir.path().join("uploads"), dir.path().join("tmp")).unwrap();
        let db = init_memory_pool().unwrap();
        (dir, StorageAccountant::new(db, paths))
    }

    fn insert_image_with_file(
        acct: &StorageAccountant,
        user_id: i64,
        kind: ImageKind,
        body: &[u8],
        created_at: DateTime<Utc>,
    ) -> Image {
        let stored_filename = format!("{}_{}_{}.webp", user_id, created_at.timestamp(), ImageId::new());
        let path = acct.paths.image_path(user_id, &stored_filename).unwrap();
        acct.paths.user_dir(user_id).unwrap();
        std::fs::write(&path, body).unwrap();

        let image = Image {
            id: ImageId::new(),
            user_id,
            stored_filename,
            original_filename: "pic.png".to_string(),
            image_kind: kind,
            mime_type: "image/webp".to_string(),
            width: Some(10),
            height: Some(10),
            file_size: body.len() as i64,
            etag: "aabbccdd00112233".to_string(),
            created_at,
        };
        let conn = acct.db.get().unwrap();
        images::insert_image(&conn, &image).unwrap();
        image
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.00 GB");
        assert_eq!(format_bytes(2 * 1024 * 1024 * 1024 * 1024), "2.00 TB");
    }

    #[test]
    fn test_summary_matches_disk() {
        let (_dir, acct) = make_accountant();
        insert_image_with_file(&acct, 1, ImageKind::Post, &[0u8; 100], Utc::now());
        insert_image_with_file(&acct, 2, ImageKind::Profile, &[0u8; 250], Utc::now());

        let summary = acct.summary().unwrap();
        assert_eq!(summary.total_images, 2);
        assert_eq!(summary.total_image_size_bytes, 350);
        assert_eq!(summary.total_disk_size_bytes, 350);
        assert_eq!(summary.temp_size_bytes, 0);
        assert_eq!(summary.total_disk_size_formatted, "350 B");
    }

    #[test]
    fn test_summary_reports_drift() {
        let (_dir, acct) = make_accountant();
        let image = insert_image_with_file(&acct, 1, ImageKind::Post, &[0u8; 100], Utc::now());

        // A file vanishes out from under the database
        let path = acct.paths.image_path(1, &image.stored_filename).unwrap();
        std::fs::remove_file(path).unwrap();

        let summary = acct.summary().unwrap();
        assert_eq!(summary.total_image_size_bytes, 100);
        assert_eq!(summary.total_disk_size_bytes, 0);
    }

    #[test]
    fn test_user_summary_kind_breakdown() {
        let (_dir, acct) = make_accountant();
        insert_image_with_file(&acct, 1, ImageKind::Post, &[0u8; 10], Utc::now());
        insert_image_with_file(&acct, 1, ImageKind::Post, &[0u8; 10], Utc::now());
        insert_image_with_file(&acct, 1, ImageKind::Profile, &[0u8; 30], Utc::now());
        insert_image_with_file(&acct, 2, ImageKind::Header, &[0u8; 99], Utc::now());

        let stats = acct.user_summary(1).unwrap();
        assert_eq!(stats.image_count, 3);
        assert_eq!(stats.total_bytes, 50);
        assert_eq!(stats.post_count, 2);
        assert_eq!(stats.profile_count, 1);
        assert_eq!(stats.header_count, 0);
    }

    #[test]
    fn test_prune_orphaned_images() {
        let (_dir, acct) = make_accountant();
        let old = Utc::now() - chrono::Duration::days(10);

        let orphan = insert_image_with_file(&acct, 1, ImageKind::Post, &[1u8; 10], old);
        let referenced = insert_image_with_file(&acct, 1, ImageKind::Post, &[2u8; 10], old);
        let profile = insert_image_with_file(&acct, 1, ImageKind::Profile, &[3u8; 10], old);
        let recent = insert_image_with_file(&acct, 1, ImageKind::Post, &[4u8; 10], Utc::now());

        {
            let conn = acct.db.get().unwrap();
            create_entry(&conn, &[referenced.id]).unwrap();
        }

        let removed = acct.prune_orphaned_images(chrono::Duration::days(7)).unwrap();
        assert_eq!(removed, 1);

        let conn = acct.db.get().unwrap();
        assert!(images::get_image(&conn, orphan.id).unwrap().is_none());
        assert!(images::get_image(&conn, referenced.id).unwrap().is_some());
        assert!(images::get_image(&conn, profile.id).unwrap().is_some());
        assert!(images::get_image(&conn, recent.id).unwrap().is_some());

        // The orphan's file is gone too
        let path = acct.paths.image_path(1, &orphan.stored_filename).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_prune_orphan_reconciles_missing_file() {
        let (_dir, acct) = make_accountant();
        let old = Utc::now() - chrono::Duration::days(10);
        let orphan = insert_image_with_file(&acct, 1, ImageKind::Post, &[1u8; 10], old);

        let path = acct.paths.image_path(1, &orphan.stored_filename).unwrap();
        std::fs::remove_file(path).unwrap();

        // The dangling row is still removed
        let removed = acct.prune_orphaned_images(chrono::Duration::days(7)).unwrap();
        assert_eq!(removed, 1);
    }

    #[test]
    fn test_prune_temp_skips_live_and_recent() {
        let (_dir, acct) = make_accountant();
        let stale = acct.paths.temp_root().join("stale");
        let live = acct.paths.temp_root().join("live");
        let fresh = acct.paths.temp_root().join("fresh");
        for p in [&stale, &live, &fresh] {
            std::fs::write(p, b"data").unwrap();
        }

        let mut live_set = HashSet::new();
        live_set.insert(live.clone());

        std::thread::sleep(Duration::from_millis(1100));
        // Re-touch the fresh file so only `stale` is past the cutoff
        std::fs::write(&fresh, b"data2").unwrap();

        let removed = acct.prune_temp(Duration::from_secs(1), &live_set);
        assert_eq!(removed, 1);
        assert!(!stale.exists());
        assert!(live.exists());
        assert!(fresh.exists());
    }

    #[test]
    fn test_prune_temp_with_absurd_max_age_is_noop() {
        let (_dir, acct) = make_accountant();
        std::fs::write(acct.paths.temp_root().join("old"), b"data").unwrap();

        let removed = acct.prune_temp(Duration::from_secs(u64::MAX), &HashSet::new());
        assert_eq!(removed, 0);
        assert!(acct.paths.temp_root().join("old").exists());
    }

    #[test]
    fn test_dir_size_missing_dir_is_zero() {
        assert_eq!(dir_size(Path::new("/nonexistent/stillbox-test")), 0);
    }
}
