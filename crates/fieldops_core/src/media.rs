//! Preparing captured media for upload.
//!
//! Photos are shrunk to fit the configured box and re-encoded as JPEG.
//! Videos are passed through after a size check.

use crate::{AuditError, Result};
use fieldops_protocol::{EvidenceType, MediaConfig, MediaPayload};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};

/// Bytes ready for the object store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedMedia {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub extension: &'static str,
}

/// Resize and re-encode a photo.
///
/// Undecodable input is returned unchanged so the capture is never lost.
pub fn prepare_photo(payload: MediaPayload, config: &MediaConfig) -> PreparedMedia {
    match compress_photo(&payload.bytes, config) {
        Ok(bytes) => PreparedMedia {
            bytes,
            content_type: "image/jpeg".to_string(),
            extension: "jpg",
        },
        Err(e) => {
            tracing::warn!(
                error = %e,
                size = payload.bytes.len(),
                "Photo could not be processed, uploading original bytes"
            );
            PreparedMedia {
                bytes: payload.bytes,
                content_type: payload
                    .content_type
                    .filter(|ct| ct.starts_with("image/"))
                    .unwrap_or_else(|| "image/jpeg".to_string()),
                extension: "jpg",
            }
        }
    }
}

fn compress_photo(bytes: &[u8], config: &MediaConfig) -> image::ImageResult<Vec<u8>> {
    let img = image::load_from_memory(bytes)?;
    let (width, height) = img.dimensions();
    let img = if width > config.max_width || height > config.max_height {
        img.resize(config.max_width, config.max_height, FilterType::Triangle)
    } else {
        img
    };

    let flat = DynamicImage::ImageRgb8(flatten_on_white(&img));
    let mut buf = Vec::new();
    let quality = config.jpeg_quality.clamp(1, 100);
    flat.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))?;
    Ok(buf)
}

/// Composite transparent pixels onto white; JPEG has no alpha channel.
pub(crate) fn flatten_on_white(img: &DynamicImage) -> RgbImage {
    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = u16::from(a);
        let blend = |c: u8| ((u16::from(c) * alpha + 255 * (255 - alpha)) / 255) as u8;
        out.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }
    out
}

/// Check a video against the size cap and keep its bytes as they are.
pub fn prepare_video(payload: MediaPayload, item: &str, config: &MediaConfig) -> Result<PreparedMedia> {
    let size = payload.bytes.len() as u64;
    if size > config.max_video_bytes {
        return Err(AuditError::VideoTooLarge {
            item: item.to_string(),
            size,
            limit: config.max_video_bytes,
        });
    }
    let content_type = payload
        .content_type
        .filter(|ct| ct.starts_with("video/"))
        .unwrap_or_else(|| EvidenceType::Video.default_content_type().to_string());
    let extension = match content_type.as_str() {
        "video/mp4" => "mp4",
        "video/quicktime" => "mov",
        _ => EvidenceType::Video.extension(),
    };
    Ok(PreparedMedia {
        bytes: payload.bytes,
        content_type,
        extension,
    })
}

/// Prepare evidence according to the item's declared type.
pub fn prepare_evidence(
    payload: MediaPayload,
    evidence_type: EvidenceType,
    item: &str,
    config: &MediaConfig,
) -> Result<PreparedMedia> {
    match evidence_type {
        EvidenceType::Photo => Ok(prepare_photo(payload, config)),
        EvidenceType::Video => prepare_video(payload, item, config),
    }
}
