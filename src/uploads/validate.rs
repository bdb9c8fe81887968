//! Content validation by magic-byte sniffing.
//!
//! The true type of an upload is decided by its leading bytes, never by the
//! client-declared MIME type or the filename extension. Declared and
//! detected types must also agree, and total size is capped at 20 MB.

use stillbox_common::{Error, Result};

/// Hard ceiling on upload size, enforced at init (declared) and at finalize
/// (actual).
pub const MAX_FILE_SIZE: u64 = 20 * 1024 * 1024;

/// Outcome of a successful validation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedContent {
    pub mime_type: String,
    pub file_size: u64,
}

/// Sniff the MIME type of a byte buffer from its signature.
///
/// Supported: JPEG, PNG, GIF, WebP, SVG, AVIF. Returns a Validation error
/// when no signature matches.
pub fn detect_mime(bytes: &[u8]) -> Result<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Ok("image/jpeg");
    }
    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Ok("image/png");
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Ok("image/gif");
    }
    if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
        return Ok("image/webp");
    }
    // AVIF: ISO-BMFF with an ftyp box at offset 4 and an avif/avis brand
    if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" && (&bytes[8..12] == b"avif" || &bytes[8..12] == b"avis")
    {
        return Ok("image/avif");
    }
    if is_svg(bytes) {
        return Ok("image/svg+xml");
    }

    Err(Error::validation(
        "File content does not match any supported image format (magic bytes check failed)",
    ))
}

/// SVG detection: `<?xml` or `<svg` at the start, leading ASCII whitespace
/// tolerated.
fn is_svg(bytes: &[u8]) -> bool {
    let mut start = 0;
    while start < bytes.len() && bytes[start].is_ascii_whitespace() {
        start += 1;
    }
    let rest = &bytes[start..];
    rest.starts_with(b"<?xml") || rest.starts_with(b"<svg")
}

/// Validate a buffer against the declared MIME type and the size ceiling.
pub fn validate(bytes: &[u8], declared_mime: &str) -> Result<ValidatedContent> {
    let size = bytes.len() as u64;
    check_size(size)?;

    let detected = detect_mime(bytes)?;

    if !mime_matches(declared_mime, detected) {
        return Err(Error::validation(format!(
            "Declared type {} does not match detected type {} (magic bytes check failed)",
            declared_mime, detected
        )));
    }

    Ok(ValidatedContent {
        mime_type: detected.to_string(),
        file_size: size,
    })
}

/// Enforce the size ceiling with the distinct size-limit error kind.
pub fn check_size(size: u64) -> Result<()> {
    if size > MAX_FILE_SIZE {
        return Err(Error::SizeLimit {
            actual: size,
            max: MAX_FILE_SIZE,
        });
    }
    Ok(())
}

/// Compare declared and detected MIME types, accepting the common
/// `image/jpg` alias for JPEG.
fn mime_matches(declared: &str, detected: &str) -> bool {
    let declared = declared.to_ascii_lowercase();
    if declared == detected {
        return true;
    }
    declared == "image/jpg" && detected == "image/jpeg"
}

/// Whether a GIF buffer is animated.
///
/// Looks for the NETSCAPE application extension or two or more Graphic
/// Control Extension blocks.
pub fn is_animated_gif(bytes: &[u8]) -> bool {
    if !bytes.starts_with(b"GIF87a") && !bytes.starts_with(b"GIF89a") {
        return false;
    }
    if bytes.windows(8).any(|w| w == b"NETSCAPE") {
        return true;
    }
    let gce_count = bytes
        .windows(4)
        .filter(|w| *w == [0x00, 0x21, 0xF9, 0x04])
        .count();
    gce_count >= 2
}

/// Preferred file extension for a detected MIME type.
pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        "image/avif" => "avif",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn tiny_png() -> Vec<u8> {
        // 1x1 transparent PNG
        vec![
            0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48,
            0x44, 0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00,
            0x00, 0x1F, 0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78,
            0x9C, 0x62, 0x00, 0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00,
            0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
        ]
    }

    #[test]
    fn test_detect_jpeg() {
        let bytes = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        assert_eq!(detect_mime(&bytes).unwrap(), "image/jpeg");
    }

    #[test]
    fn test_detect_png() {
        assert_eq!(detect_mime(&tiny_png()).unwrap(), "image/png");
    }

    #[test]
    fn test_detect_gif() {
        assert_eq!(detect_mime(b"GIF89a\x01\x00").unwrap(), "image/gif");
        assert_eq!(detect_mime(b"GIF87a\x01\x00").unwrap(), "image/gif");
    }

    #[test]
    fn test_detect_webp() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&[0x24, 0x00, 0x00, 0x00]);
        bytes.extend_from_slice(b"WEBP");
        assert_eq!(detect_mime(&bytes).unwrap(), "image/webp");
    }

    #[test]
    fn test_detect_avif() {
        let mut bytes = vec![0x00, 0x00, 0x00, 0x1C];
        bytes.extend_from_slice(b"ftypavif");
        bytes.extend_from_slice(&[0u8; 16]);
        assert_eq!(detect_mime(&bytes).unwrap(), "image/avif");
    }

    #[test]
    fn test_detect_svg() {
        assert_eq!(detect_mime(b"<svg xmlns=\"a\">").unwrap(), "image/svg+xml");
        assert_eq!(
            detect_mime(b"  \n<?xml version=\"1.0\"?><svg/>").unwrap(),
            "image/svg+xml"
        );
    }

    #[test]
    fn test_rejects_disguised_script() {
        let bytes = b"<?php phpinfo(); ?>";
        let err = detect_mime(bytes).unwrap_err();
        assert!(err.to_string().contains("magic bytes"));
    }

    #[test]
    fn test_rejects_empty_and_truncated() {
        assert!(detect_mime(&[]).is_err());
        assert!(detect_mime(&[0xFF]).is_err());
        // RIFF without the WEBP fourcc is not a WebP
        assert!(detect_mime(b"RIFF\x00\x00\x00\x00WAVE").is_err());
    }

    #[test]
    fn test_validate_declared_mismatch() {
        let err = validate(&tiny_png(), "image/jpeg").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(err.to_string().contains("magic bytes"));
    }

    #[test]
    fn test_validate_ok_and_jpg_alias() {
        let out = validate(&tiny_png(), "image/png").unwrap();
        assert_eq!(out.mime_type, "image/png");
        assert_eq!(out.file_size, tiny_png().len() as u64);

        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0];
        assert!(validate(&jpeg, "image/jpg").is_ok());
        assert!(validate(&jpeg, "IMAGE/JPEG").is_ok());
    }

    #[test]
    fn test_size_ceiling() {
        assert!(check_size(MAX_FILE_SIZE).is_ok());
        let err = check_size(MAX_FILE_SIZE + 1).unwrap_err();
        assert!(matches!(err, Error::SizeLimit { .. }));
        assert!(matches!(check_size(21_000_000), Err(Error::SizeLimit { .. })));
    }

    #[test]
    fn test_animated_gif_detection() {
        let mut netscape = b"GIF89a".to_vec();
        netscape.extend_from_slice(b"\x21\xFF\x0BNETSCAPE2.0");
        assert!(is_animated_gif(&netscape));

        let mut two_frames = b"GIF89a".to_vec();
        two_frames.extend_from_slice(&[0x00, 0x21, 0xF9, 0x04]);
        two_frames.extend_from_slice(&[0x11, 0x22]);
        two_frames.extend_from_slice(&[0x00, 0x21, 0xF9, 0x04]);
        assert!(is_animated_gif(&two_frames));

        let mut single = b"GIF89a".to_vec();
        single.extend_from_slice(&[0x00, 0x21, 0xF9, 0x04]);
        assert!(!is_animated_gif(&single));

        // Not a GIF at all
        assert!(!is_animated_gif(b"NETSCAPE"));
    }

    #[test]
    fn test_extension_for_mime() {
        assert_eq!(extension_for_mime("image/jpeg"), "jpg");
        assert_eq!(extension_for_mime("image/svg+xml"), "svg");
        assert_eq!(extension_for_mime("application/zip"), "bin");
    }
}
