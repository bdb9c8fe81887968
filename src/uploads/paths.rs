//! Filesystem path construction for stored and in-flight files.
//!
//! All persisted images live under `<upload_root>/<user_id>/<filename>` and
//! all chunk-assembly files under `<temp_root>/<session_token>`. Path
//! building never dereferences symlinks; that check happens after write in
//! the hardening step.

use std::path::{Path, PathBuf};

use stillbox_common::{Error, Result, SessionToken};

/// Storage path layout for one service instance.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    upload_root: PathBuf,
    temp_root: PathBuf,
}

impl StoragePaths {
    /// Create the layout, making both roots if they do not exist.
    pub fn new(upload_root: PathBuf, temp_root: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&upload_root)?;
        std::fs::create_dir_all(&temp_root)?;
        Ok(Self {
            upload_root,
            temp_root,
        })
    }

    pub fn upload_root(&self) -> &Path {
        &self.upload_root
    }

    pub fn temp_root(&self) -> &Path {
        &self.temp_root
    }

    /// Directory holding one user's images, creating it on first use.
    ///
    /// Fails with a Validation error for non-positive user IDs.
    pub fn user_dir(&self, user_id: i64) -> Result<PathBuf> {
        if user_id <= 0 {
            return Err(Error::validation("User ID must be a positive integer"));
        }
        let dir = self.upload_root.join(user_id.to_string());
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Full path for a stored image.
    ///
    /// The filename is re-checked here even though callers normally sanitize
    /// first; a separator or empty name is rejected outright.
    pub fn image_path(&self, user_id: i64, filename: &str) -> Result<PathBuf> {
        if user_id <= 0 {
            return Err(Error::validation("User ID must be a positive integer"));
        }
        if filename.is_empty() {
            return Err(Error::validation("Filename cannot be empty"));
        }
        if filename.contains('/') || filename.contains('\\') {
            return Err(Error::validation("Filename cannot contain path separators"));
        }
        Ok(self.upload_root.join(user_id.to_string()).join(filename))
    }

    /// Assembly file for an in-flight session.
    pub fn session_temp_path(&self, token: SessionToken) -> PathBuf {
        self.temp_root.join(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_paths() -> (TempDir, StoragePaths) {
        let dir = TempDir::new().unwrap();
        let paths = StoragePaths::new(dir.path().join("uploads"), dir.path().join("tmp")).unwrap();
        (dir, paths)
    }

    #[test]
    fn test_new_creates_roots() {
        let (_dir, paths) = make_paths();
        assert!(paths.upload_root().is_dir());
        assert!(paths.temp_root().is_dir());
    }

    #[test]
    fn test_user_dir_created_and_shaped() {
        let (_dir, paths) = make_paths();
        let dir = paths.user_dir(42).unwrap();
        assert!(dir.is_dir());
        assert!(dir.ends_with("42"));
    }

    #[test]
    fn test_nonpositive_user_id_rejected() {
        let (_dir, paths) = make_paths();
        assert!(paths.user_dir(0).is_err());
        assert!(paths.user_dir(-5).is_err());
        assert!(paths.image_path(0, "a.jpg").is_err());
    }

    #[test]
    fn test_image_path_shape() {
        let (_dir, paths) = make_paths();
        let p = paths.image_path(7, "photo.webp").unwrap();
        assert!(p.starts_with(paths.upload_root()));
        assert!(p.ends_with("7/photo.webp"));
    }

    #[test]
    fn test_separators_rejected_regardless_of_sanitization() {
        let (_dir, paths) = make_paths();
        assert!(paths.image_path(7, "../escape.jpg").is_err());
        assert!(paths.image_path(7, "a/b.jpg").is_err());
        assert!(paths.image_path(7, "a\\b.jpg").is_err());
        assert!(paths.image_path(7, "").is_err());
    }

    #[test]
    fn test_session_temp_path_keyed_by_token() {
        let (_dir, paths) = make_paths();
        let token = SessionToken::new();
        let p = paths.session_temp_path(token);
        assert!(p.starts_with(paths.temp_root()));
        assert!(p.ends_with(token.to_string()));
    }
}
