use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

use super::sniff::ImageContentType;
use crate::s3::error::{IngestError, Result};

/// Thumbnail width used when a resize request leaves it unset
pub const DEFAULT_THUMBNAIL_WIDTH: u32 = 128;

const JPEG_QUALITY: u8 = 95;

/// A decoded image together with the encoded bytes it came from
#[derive(Debug, Clone)]
pub struct ImageDescriptor {
    pub content_type: ImageContentType,
    pub width: u32,
    pub height: u32,
    /// Encoded bytes in `content_type`
    pub bytes: Vec<u8>,
    pixels: DynamicImage,
}

impl ImageDescriptor {
    pub fn pixels(&self) -> &DynamicImage {
        &self.pixels
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Whether `content_type` can be decoded and re-encoded
pub fn is_transformable(content_type: ImageContentType) -> bool {
    matches!(
        content_type,
        ImageContentType::Png | ImageContentType::Jpeg | ImageContentType::Jpg
    )
}

fn ensure_transformable(content_type: ImageContentType) -> Result<()> {
    if is_transformable(content_type) {
        Ok(())
    } else {
        Err(IngestError::UnsupportedFormat(format!(
            "{} can only be sniffed, not transformed",
            content_type
        )))
    }
}

/// Decode `bytes` as `content_type`, keeping the original bytes
///
/// # Errors
///
/// Returns `IngestError::UnsupportedFormat` for GIF and `IngestError::Decode`
/// if the bytes are not a valid image of the declared type.
pub fn decode(bytes: Vec<u8>, content_type: ImageContentType) -> Result<ImageDescriptor> {
    ensure_transformable(content_type)?;

    let pixels = image::load_from_memory_with_format(&bytes, content_type.image_format())
        .map_err(|e| IngestError::Decode(format!("{} decode failed: {}", content_type, e)))?;

    Ok(ImageDescriptor {
        content_type,
        width: pixels.width(),
        height: pixels.height(),
        bytes,
        pixels,
    })
}

/// Resolve requested thumbnail dimensions against the source size.
///
/// A zero width falls back to `DEFAULT_THUMBNAIL_WIDTH`; a zero height is
/// derived as `width * src_height / src_width`, truncated, never below 1.
pub fn thumbnail_dimensions(src_width: u32, src_height: u32, width: u32, height: u32) -> (u32, u32) {
    let width = if width == 0 {
        DEFAULT_THUMBNAIL_WIDTH
    } else {
        width
    };
    let height = if height == 0 {
        let derived = u64::from(width) * u64::from(src_height) / u64::from(src_width.max(1));
        u32::try_from(derived).unwrap_or(u32::MAX).max(1)
    } else {
        height
    };
    (width, height)
}

/// Lanczos3 resample into a new descriptor encoded in the source type.
/// The source descriptor is left untouched.
pub fn resize(
    descriptor: &ImageDescriptor,
    target_width: u32,
    target_height: u32,
) -> Result<ImageDescriptor> {
    ensure_transformable(descriptor.content_type)?;

    let (width, height) = thumbnail_dimensions(
        descriptor.width,
        descriptor.height,
        target_width,
        target_height,
    );
    let pixels = descriptor
        .pixels
        .resize_exact(width, height, FilterType::Lanczos3);

    let mut resized = ImageDescriptor {
        content_type: descriptor.content_type,
        width,
        height,
        bytes: Vec::new(),
        pixels,
    };
    resized.bytes = encode(&resized, descriptor.content_type)?;
    Ok(resized)
}

/// Serialize the pixels of `descriptor` as `content_type` (PNG or JPEG)
pub fn encode(descriptor: &ImageDescriptor, content_type: ImageContentType) -> Result<Vec<u8>> {
    ensure_transformable(content_type)?;

    let mut buf = Cursor::new(Vec::new());
    if content_type.is_jpeg() {
        let encoder = JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
        descriptor
            .pixels
            .to_rgb8()
            .write_with_encoder(encoder)
            .map_err(|e| IngestError::Decode(format!("JPEG encode failed: {}", e)))?;
    } else {
        descriptor
            .pixels
            .write_to(&mut buf, ImageFormat::Png)
            .map_err(|e| IngestError::Decode(format!("PNG encode failed: {}", e)))?;
    }

    Ok(buf.into_inner())
}
