//! High-level image operations.
//!
//! These functions combine calculations with backend execution.

use super::backend::{BackendError, ImageBackend};
use super::calculations::calculate_fit_dimensions;
use super::params::{Quality, ResizeParams};
use std::path::Path;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// How large an image may be when sent to the vision model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownscaleConfig {
    /// Longest allowed edge; 0 disables downscaling.
    pub max_dimension: u32,
    pub quality: Quality,
}

impl Default for DownscaleConfig {
    fn default() -> Self {
        Self {
            max_dimension: 1600,
            quality: Quality::default(),
        }
    }
}

/// Plan a downscale of `source` into `output` without executing it.
///
/// Returns `None` when the image already fits, so the original bytes can be
/// used unchanged.
pub fn plan_downscale(
    backend: &impl ImageBackend,
    source: &Path,
    output: &Path,
    config: &DownscaleConfig,
) -> Result<Option<ResizeParams>> {
    if config.max_dimension == 0 {
        return Ok(None);
    }
    let dims = backend.identify(source)?;
    Ok(
        calculate_fit_dimensions((dims.width, dims.height), config.max_dimension).map(
            |(width, height)| ResizeParams {
                source: source.to_path_buf(),
                output: output.to_path_buf(),
                width,
                height,
                quality: config.quality,
            },
        ),
    )
}
