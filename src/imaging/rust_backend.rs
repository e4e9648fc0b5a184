//! Pure Rust image backend built on the `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP, GIF) | `image` crate (pure Rust decoders) |
//! | Resize | `DynamicImage::resize` with `Lanczos3` |
//! | Encode JPEG | `JpegEncoder::new_with_quality` |
//! | Encode PNG, TIFF, WebP, GIF | `DynamicImage::save_with_format` |
//!
//! Formats without a compiled-in decoder (SVG, AVIF, HEIF) are never
//! downscaled; [`can_decode`] tells callers which is which.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::ResizeParams;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::path::Path;

const DECODABLE: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
    ("gif", ImageFormat::Gif),
];

fn format_for(path: &Path) -> Option<ImageFormat> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    DECODABLE
        .iter()
        .find(|(candidate, _)| *candidate == ext)
        .map(|(_, format)| *format)
        .filter(|format| format.reading_enabled())
}

/// True when `path`'s format can be decoded and re-encoded by [`RustBackend`].
pub fn can_decode(path: &Path) -> bool {
    format_for(path).is_some()
}

/// Pure Rust backend using the `image` crate.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    ImageReader::open(path)
        .map_err(BackendError::Io)?
        .with_guessed_format()
        .map_err(BackendError::Io)?
        .decode()
        .map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
        })
}

/// Save in the format implied by `path`'s extension.
fn save_image(img: &DynamicImage, path: &Path, quality: u32) -> Result<(), BackendError> {
    let format = format_for(path).ok_or_else(|| {
        BackendError::ProcessingFailed(format!("Unsupported output format: {}", path.display()))
    })?;

    match format {
        ImageFormat::Jpeg => {
            let file = std::fs::File::create(path).map_err(BackendError::Io)?;
            let writer = std::io::BufWriter::new(file);
            // JPEG has no alpha channel.
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(writer, quality as u8))
                .map_err(|e| BackendError::ProcessingFailed(format!("JPEG encode failed: {}", e)))
        }
        other => img.save_with_format(path, other).map_err(|e| {
            BackendError::ProcessingFailed(format!("Encode failed for {}: {}", path.display(), e))
        }),
    }
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = image::image_dimensions(path).map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to read dimensions: {}", e))
        })?;
        Ok(Dimensions { width, height })
    }

    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
        let img = load_image(&params.source)?;
        let resized = img.resize(params.width, params.height, FilterType::Lanczos3);
        save_image(&resized, &params.output, params.quality.value())
    }
}
