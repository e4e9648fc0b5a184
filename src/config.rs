//! Tool configuration.
//!
//! Configuration is layered: stock defaults are overridden by an optional
//! `alt-scout.toml`, which is in turn overridden by command-line flags (the
//! last layer is applied in `main`).
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [content]
//! dirs = ["src/content/posts", "src/content/logs"]
//! static_root = "static"          # Where root-relative locators (/x.png) live
//! extensions = ["md", "svx", "svelte.md"]
//!
//! [inference]
//! endpoint = "http://localhost:11434"
//! model = "llava"
//! timeout_secs = 300
//!
//! [images]
//! max_dimension = 1600            # Longest edge sent to the model; 0 = never downscale
//! large_image_mb = 10             # Warn above this size
//! quality = 90                    # JPEG quality of downscaled copies
//! extensions = ["jpg", "jpeg", "png", "gif", "webp", "avif", "svg", "tiff", "heif"]
//!
//! [cleanup]
//! folder_names = ["images", "imgs", "pictures", "photos", "assets"]
//! numbered_prefix = "images_"     # images_1/, images_2/, ...
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILENAME: &str = "alt-scout.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Full tool configuration. Every field has a default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolConfig {
    pub content: ContentConfig,
    pub inference: InferenceConfig,
    pub images: ImagesConfig,
    pub cleanup: CleanupConfig,
}

impl ToolConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.content.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "content.extensions must not be empty".into(),
            ));
        }
        if self.images.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "images.extensions must not be empty".into(),
            ));
        }
        if !(1..=100).contains(&self.images.quality) {
            return Err(ConfigError::Validation(
                "images.quality must be 1-100".into(),
            ));
        }
        if self.inference.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "inference.timeout_secs must be non-zero".into(),
            ));
        }
        if self.inference.endpoint.trim().is_empty() {
            return Err(ConfigError::Validation(
                "inference.endpoint must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Where content lives and what counts as a content file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContentConfig {
    /// Directories scanned by `alt-text` when no `--dir` is given.
    pub dirs: Vec<String>,
    /// Root for locators starting with `/`.
    pub static_root: String,
    /// Content file extensions, without the leading dot.
    pub extensions: Vec<String>,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            dirs: vec!["src/content/posts".into(), "src/content/logs".into()],
            static_root: "static".into(),
            extensions: vec!["md".into(), "svx".into(), "svelte.md".into()],
        }
    }
}

/// Vision model endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InferenceConfig {
    pub endpoint: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".into(),
            model: "llava".into(),
            timeout_secs: 300,
        }
    }
}

/// Image preparation and the image extension allow-list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Longest edge of the copy sent to the model. `0` disables downscaling.
    pub max_dimension: u32,
    /// Size above which a warning is printed (never a rejection).
    pub large_image_mb: u64,
    pub quality: u32,
    pub extensions: Vec<String>,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            max_dimension: 1600,
            large_image_mb: 10,
            quality: 90,
            extensions: ["jpg", "jpeg", "png", "gif", "webp", "avif", "svg", "tiff", "heif"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Folder inference for the cleanup report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CleanupConfig {
    /// Conventional asset folder names checked next to a content file.
    pub folder_names: Vec<String>,
    /// Sibling folders named `<prefix><number>` are asset folders too.
    pub numbered_prefix: String,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            folder_names: ["images", "imgs", "pictures", "photos", "assets"]
                .into_iter()
                .map(String::from)
                .collect(),
            numbered_prefix: "images_".into(),
        }
    }
}

/// The stock defaults as a TOML value, the base layer for merging.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(ToolConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load the config file at `path` on top of stock defaults.
///
/// A missing file yields the defaults; a malformed one is an error.
pub fn load_config(path: &Path) -> Result<ToolConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = if path.exists() {
        let content = fs::read_to_string(path)?;
        let overlay: toml::Value = toml::from_str(&content)?;
        merge_toml(base, overlay)
    } else {
        base
    };
    let config: ToolConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// A fully-commented stock config file, printed by `gen-config`.
pub fn stock_config_toml() -> &'static str {
    r##"# alt-scout configuration
# ======================
#
# Every key is optional. Values shown are the defaults.
# Command-line flags override anything set here.

[content]
# Directories scanned by `alt-scout alt-text` when no --dir is given.
dirs = ["src/content/posts", "src/content/logs"]
# Root for locators that start with "/" (e.g. /icons/logo.svg).
static_root = "static"
# Content file extensions. Compound extensions like "svelte.md" work.
extensions = ["md", "svx", "svelte.md"]

[inference]
# Base URL of the local vision model service.
endpoint = "http://localhost:11434"
# Model name; availability is checked by name prefix before generating.
model = "llava"
# Seconds to wait for one caption.
timeout_secs = 300

[images]
# Longest edge of the copy sent to the model. 0 sends originals unchanged.
max_dimension = 1600
# Print a warning for source images larger than this many megabytes.
large_image_mb = 10
# JPEG quality used for downscaled copies (1-100).
quality = 90
# Files with these extensions count as images in the cleanup report.
extensions = ["jpg", "jpeg", "png", "gif", "webp", "avif", "svg", "tiff", "heif"]

[cleanup]
# Folder names checked next to a content file when none of its
# references point into an existing folder.
folder_names = ["images", "imgs", "pictures", "photos", "assets"]
# Sibling folders named <prefix><number> (images_1, images_2, ...).
numbered_prefix = "images_"
"##
}
