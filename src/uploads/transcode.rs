//! Image transcoding to the canonical on-disk format.
//!
//! Processed uploads are decoded, downscaled to the per-kind dimension
//! bounds (never upscaled), and re-encoded as WebP. Raw uploads keep their
//! bytes untouched. SVG and animated GIF inputs pass through even in
//! processed mode: SVG has no raster to re-encode and re-encoding a GIF
//! would drop its animation.

use std::io::Cursor;

use image::{imageops::FilterType, ImageFormat, ImageReader, Limits};
use stillbox_common::{Error, ImageKind, Result};

use super::validate::{extension_for_mime, is_animated_gif};

/// Decoder guard against decompression bombs. Inputs that pass signature
/// validation can still declare absurd dimensions.
pub const MAX_IMAGE_DIMENSION: u32 = 16384;

/// Result of transcoding or pass-through.
#[derive(Debug, Clone)]
pub struct TranscodeOutput {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub extension: &'static str,
    pub width: Option<i32>,
    pub height: Option<i32>,
}

/// Maximum output dimensions for an image kind.
pub fn kind_bounds(kind: ImageKind) -> (u32, u32) {
    match kind {
        ImageKind::Profile => (512, 512),
        ImageKind::Header => (1920, 400),
        ImageKind::Post | ImageKind::Comment => (1200, 1200),
    }
}

/// Compute output dimensions: shrink to fit the bounds preserving aspect
/// ratio, never enlarge.
pub fn target_dimensions(width: u32, height: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    let ratio = f64::min(
        f64::min(max_w as f64 / width as f64, max_h as f64 / height as f64),
        1.0,
    );
    let new_w = ((width as f64 * ratio).round() as u32).max(1);
    let new_h = ((height as f64 * ratio).round() as u32).max(1);
    (new_w, new_h)
}

/// Processed mode: decode, bound, re-encode.
///
/// `mime_type` is the already-sniffed type of `bytes`. Decode failures on
/// content that passed signature checks surface as Processing errors.
pub fn process(bytes: &[u8], mime_type: &str, kind: ImageKind) -> Result<TranscodeOutput> {
    match mime_type {
        // No raster content to transcode
        "image/svg+xml" => {
            return Ok(TranscodeOutput {
                bytes: bytes.to_vec(),
                mime_type: mime_type.to_string(),
                extension: "svg",
                width: None,
                height: None,
            });
        }
        "image/avif" => {
            return Err(Error::processing(
                "AVIF images cannot be transcoded; use a raw upload",
            ));
        }
        "image/gif" if is_animated_gif(bytes) => {
            let (width, height) = read_dimensions(bytes);
            return Ok(TranscodeOutput {
                bytes: bytes.to_vec(),
                mime_type: mime_type.to_string(),
                extension: "gif",
                width,
                height,
            });
        }
        _ => {}
    }

    let img = decode(bytes)?;

    let (max_w, max_h) = kind_bounds(kind);
    let (new_w, new_h) = target_dimensions(img.width(), img.height(), max_w, max_h);

    let img = if (new_w, new_h) != (img.width(), img.height()) {
        img.resize_exact(new_w, new_h, FilterType::Lanczos3)
    } else {
        img
    };

    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), ImageFormat::WebP)
        .map_err(|e| Error::processing(format!("Failed to encode image: {}", e)))?;

    Ok(TranscodeOutput {
        bytes: out,
        mime_type: "image/webp".to_string(),
        extension: "webp",
        width: Some(new_w as i32),
        height: Some(new_h as i32),
    })
}

/// Raw mode: bytes unchanged, dimensions filled in when the header makes
/// them cheap to read.
pub fn raw(bytes: &[u8], mime_type: &str) -> TranscodeOutput {
    let (width, height) = if mime_type == "image/svg+xml" {
        (None, None)
    } else {
        read_dimensions(bytes)
    };

    TranscodeOutput {
        bytes: bytes.to_vec(),
        mime_type: mime_type.to_string(),
        extension: extension_for_mime(mime_type),
        width,
        height,
    }
}

fn decode(bytes: &[u8]) -> Result<image::DynamicImage> {
    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| Error::processing(format!("Failed to read image header: {}", e)))?;

    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_IMAGE_DIMENSION);
    limits.max_image_height = Some(MAX_IMAGE_DIMENSION);
    reader.limits(limits);

    reader
        .decode()
        .map_err(|e| Error::processing(format!("Failed to decode image: {}", e)))
}

fn read_dimensions(bytes: &[u8]) -> (Option<i32>, Option<i32>) {
    let dims = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()
        .and_then(|r| r.into_dimensions().ok());
    match dims {
        Some((w, h)) => (Some(w as i32), Some(h as i32)),
        None => (None, None),
    }
}
