use anyhow::{bail, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;

pub const MAX_WIDTH: u32 = 1600;
const JPEG_QUALITY: u8 = 85;

pub fn is_supported_image(mime_type: &str) -> bool {
    matches!(mime_type, "image/jpeg" | "image/png" | "image/webp")
}

fn format_for(mime_type: &str) -> Result<ImageFormat> {
    Ok(match mime_type {
        "image/jpeg" => ImageFormat::Jpeg,
        "image/png" => ImageFormat::Png,
        "image/webp" => ImageFormat::WebP,
        _ => bail!("Unsupported image format: {}", mime_type),
    })
}

/// Decodes an upload, scales it down to `max_width` and re-encodes it as JPEG.
pub fn to_jpeg(data: &[u8], mime_type: &str, max_width: Option<u32>) -> Result<Vec<u8>> {
    let img = image::load_from_memory_with_format(data, format_for(mime_type)?)?;
    let (width, height) = img.dimensions();

    let max_w = max_width.unwrap_or(MAX_WIDTH);
    let resized = if width > max_w {
        let ratio = max_w as f32 / width as f32;
        let new_height = ((height as f32 * ratio) as u32).max(1);
        img.resize(max_w, new_height, image::imageops::FilterType::Lanczos3)
    } else {
        img
    };

    encode_jpeg(&resized)
}

fn encode_jpeg(img: &DynamicImage) -> Result<Vec<u8>> {
    // JPEG has no alpha channel.
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buffer = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY);
    rgb.write_with_encoder(encoder)?;
    Ok(buffer.into_inner())
}
