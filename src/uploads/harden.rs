//! Post-write file hardening.
//!
//! After any upload byte lands on disk, and before a database row points at
//! it, the file gets non-executable permissions and a symlink check. A
//! symlink found where a regular file was written means the path was swapped
//! out underneath us; it is removed and the upload fails.

use std::path::Path;

use stillbox_common::{Error, Result};

/// Lock down a freshly-written file.
///
/// Sets mode `0644` (owner read/write, group/other read, never executable)
/// and rejects symlinks. The permission change is best-effort: a failure is
/// logged and the upload continues, matching the serving path's tolerance
/// for restrictive mounts. A symlink is always fatal: the link is removed
/// and a Security error is returned.
pub fn secure_file(path: &Path) -> Result<()> {
    let meta = std::fs::symlink_metadata(path)?;

    if meta.file_type().is_symlink() {
        if let Err(e) = std::fs::remove_file(path) {
            tracing::error!(path = %path.display(), error = %e, "Failed to remove symlink");
        } else {
            tracing::warn!(path = %path.display(), "Removed symlink found at upload path");
        }
        return Err(Error::security("Uploaded path resolved to a symbolic link"));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o644);
        if let Err(e) = std::fs::set_permissions(path, perms) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to set file permissions");
        }
    }

    Ok(())
}
