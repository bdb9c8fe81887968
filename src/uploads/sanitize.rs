//! Client-supplied filename sanitization.
//!
//! Uploaded filenames are hostile input: they can carry traversal sequences,
//! null bytes, separators for either platform, or hidden-file leading dots.
//! [`sanitize_filename`] reduces any string to a safe name drawn from
//! `[A-Za-z0-9._-]` and is idempotent.

/// Maximum length of a sanitized filename, in bytes.
const MAX_FILENAME_LEN: usize = 255;

/// Fallback name when sanitization leaves nothing usable.
const FALLBACK_NAME: &str = "unnamed_file";

/// Sanitize a client-supplied filename.
///
/// Steps, in order:
/// 1. Strip null bytes.
/// 2. Keep only the final path component (handles both `/` and `\`).
/// 3. Remove `..` sequences.
/// 4. Replace every character outside `[A-Za-z0-9._-]` with `_`.
/// 5. Collapse runs of `.` into a single dot.
/// 6. Strip leading dots.
/// 7. Fall back to `unnamed_file` if nothing remains.
/// 8. Truncate to 255 bytes.
pub fn sanitize_filename(input: &str) -> String {
    let no_nulls: String = input.chars().filter(|&c| c != '\0').collect();

    // Basename across both separator conventions
    let basename = no_nulls
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .to_string();

    let no_traversal = basename.replace("..", "");

    let mapped: String = no_traversal
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let mut collapsed = String::with_capacity(mapped.len());
    let mut prev_dot = false;
    for c in mapped.chars() {
        if c == '.' {
            if !prev_dot {
                collapsed.push(c);
            }
            prev_dot = true;
        } else {
            collapsed.push(c);
            prev_dot = false;
        }
    }

    let trimmed = collapsed.trim_start_matches('.');

    let result = if trimmed.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        trimmed.to_string()
    };

    if result.len() > MAX_FILENAME_LEN {
        result[..MAX_FILENAME_LEN].to_string()
    } else {
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_name_unchanged() {
        assert_eq!(sanitize_filename("photo.jpg"), "photo.jpg");
        assert_eq!(sanitize_filename("my-pic_01.png"), "my-pic_01.png");
    }

    #[test]
    fn test_strips_path_components() {
        assert_eq!(sanitize_filename("/etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("dir/sub/photo.jpg"), "photo.jpg");
        assert_eq!(sanitize_filename("C:\\Users\\x\\photo.jpg"), "photo.jpg");
    }

    #[test]
    fn test_removes_traversal() {
        let out = sanitize_filename("../../../etc/passwd");
        assert!(!out.contains(".."));
        assert!(!out.contains('/'));
        assert_eq!(out, "passwd");
    }

    #[test]
    fn test_strips_null_bytes() {
        assert_eq!(sanitize_filename("photo\0.jpg"), "photo.jpg");
    }

    #[test]
    fn test_replaces_disallowed_chars() {
        assert_eq!(sanitize_filename("my photo (1).jpg"), "my_photo__1_.jpg");
        assert_eq!(sanitize_filename("caf\u{e9}.png"), "caf_.png");
    }

    #[test]
    fn test_collapses_dots_and_strips_leading() {
        assert_eq!(sanitize_filename(".hidden"), "hidden");
        assert_eq!(sanitize_filename("...gitignore"), "gitignore");
        assert_eq!(sanitize_filename("a...b.jpg"), "a.b.jpg");
    }

    #[test]
    fn test_empty_falls_back() {
        assert_eq!(sanitize_filename(""), "unnamed_file");
        assert_eq!(sanitize_filename("...."), "unnamed_file");
        assert_eq!(sanitize_filename("///"), "unnamed_file");
    }

    #[test]
    fn test_truncates_long_names() {
        let long = "a".repeat(300) + ".jpg";
        let out = sanitize_filename(&long);
        assert_eq!(out.len(), 255);
    }

    #[test]
    fn test_idempotent() {
        for input in [
            "photo.jpg",
            "../../etc/passwd",
            "my photo (1).jpg",
            ".hidden",
            "",
            "a...b.jpg",
            "dir/sub\\mixed.png",
        ] {
            let once = sanitize_filename(input);
            let twice = sanitize_filename(&once);
            assert_eq!(once, twice, "not idempotent for {:?}", input);
        }
    }
}
