//! Caption generation: image file → alt text.
//!
//! ## Pipeline
//!
//! 1. Stat the source; warn (never reject) above the large-image threshold
//! 2. If the format is decodable and larger than `max_dimension`, write a
//!    downscaled copy into the run's [`ScratchDir`]
//! 3. Send the bytes with the language's prompt to a [`VisionClient`]
//! 4. Flatten the answer to one line; an empty answer is a failure
//!
//! Every failure is an `Err` for this one image. The scaled copy is a
//! [`tempfile::NamedTempFile`], so it is gone by the time this returns,
//! whatever the outcome.

pub mod client;
pub mod scratch;

pub use client::{ClientError, OllamaClient, VisionClient, check_model};
pub use scratch::{CleanupHandle, ScratchDir};

use crate::config::ToolConfig;
use crate::dialect::single_line;
use crate::imaging::{BackendError, DownscaleConfig, ImageBackend, Quality, can_decode, plan_downscale};
use crate::types::Language;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptionError {
    #[error("cannot read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("scratch file: {0}")]
    Scratch(io::Error),
    #[error("downscale failed: {0}")]
    Downscale(#[from] BackendError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("model returned an empty caption")]
    Empty,
}

/// One request to the vision model.
#[derive(Debug, Clone)]
pub struct CaptionRequest {
    /// Image bytes, possibly downscaled.
    pub image: Vec<u8>,
    pub language: Language,
    pub model: String,
}

/// Everything caption generation needs from the configuration.
#[derive(Debug, Clone)]
pub struct CaptionSettings {
    pub model: String,
    pub downscale: DownscaleConfig,
    /// Sources above this many bytes produce a warning.
    pub large_image_bytes: u64,
}

impl CaptionSettings {
    pub fn from_config(config: &ToolConfig) -> Self {
        Self {
            model: config.inference.model.clone(),
            downscale: DownscaleConfig {
                max_dimension: config.images.max_dimension,
                quality: Quality::new(config.images.quality),
            },
            large_image_bytes: config.images.large_image_mb.saturating_mul(1024 * 1024),
        }
    }
}

/// Progress notes emitted while preparing an image.
#[derive(Debug, Clone, PartialEq)]
pub enum PrepareEvent {
    LargeImage { path: PathBuf, bytes: u64 },
    Downscaled { path: PathBuf, width: u32, height: u32 },
}

/// Image bytes ready to send.
#[derive(Debug)]
pub struct Prepared {
    pub bytes: Vec<u8>,
    pub original_size: u64,
}

/// Read `path`, downscaling into `scratch` when it is decodable and too big.
pub fn prepare_image(
    backend: &impl ImageBackend,
    scratch: &ScratchDir,
    path: &Path,
    settings: &CaptionSettings,
    emit: &mut impl FnMut(PrepareEvent),
) -> Result<Prepared, CaptionError> {
    let read_err = |source| CaptionError::Read {
        path: path.to_path_buf(),
        source,
    };
    let original_size = fs::metadata(path).map_err(read_err)?.len();
    if original_size > settings.large_image_bytes {
        emit(PrepareEvent::LargeImage {
            path: path.to_path_buf(),
            bytes: original_size,
        });
    }

    if settings.downscale.max_dimension > 0 && can_decode(path) {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let artifact = scratch.artifact(&extension).map_err(CaptionError::Scratch)?;
        if let Some(params) = plan_downscale(backend, path, artifact.path(), &settings.downscale)? {
            backend.resize(&params)?;
            let bytes = fs::read(artifact.path()).map_err(CaptionError::Scratch)?;
            emit(PrepareEvent::Downscaled {
                path: path.to_path_buf(),
                width: params.width,
                height: params.height,
            });
            return Ok(Prepared {
                bytes,
                original_size,
            });
        }
    }

    let bytes = fs::read(path).map_err(read_err)?;
    Ok(Prepared {
        bytes,
        original_size,
    })
}

/// Generate a caption for the image at `path`.
pub fn generate_caption(
    backend: &impl ImageBackend,
    client: &impl VisionClient,
    scratch: &ScratchDir,
    path: &Path,
    language: Language,
    settings: &CaptionSettings,
    emit: &mut impl FnMut(PrepareEvent),
) -> Result<String, CaptionError> {
    let prepared = prepare_image(backend, scratch, path, settings, emit)?;
    let request = CaptionRequest {
        image: prepared.bytes,
        language,
        model: settings.model.clone(),
    };
    let caption = single_line(&client.generate(&request)?);
    if caption.is_empty() {
        return Err(CaptionError::Empty);
    }
    Ok(caption)
}
