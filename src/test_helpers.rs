//! Shared test utilities for the alt-scout test suite.
//!
//! Provides the fixture content tree, synthetic images, and lookups over
//! extracted references.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_fixtures();
//! let refs = references_in(&tmp.path().join("posts/amiens/amiens.md"));
//! let hero = find_reference(&refs, "./files/cathedrale.png");
//! assert_eq!(hero.line_number, 13);
//! ```

use image::ImageEncoder;
use std::path::Path;
use tempfile::TempDir;

use crate::extract::{ExtractOptions, extract_references};
use crate::types::ImageReference;

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/content/` to a temp directory and return it.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/content");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// Write a gradient JPEG of the given size.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let file = std::fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    image::codecs::jpeg::JpegEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

// =========================================================================
// Reference lookups, panicking with a clear message on miss
// =========================================================================

/// References that need a caption in `file`, with language auto-detected.
pub fn references_in(file: &Path) -> Vec<ImageReference> {
    let content = std::fs::read_to_string(file).unwrap();
    extract_references(file, &content, &ExtractOptions::default())
}

/// Find a reference by locator. Panics if not found.
pub fn find_reference<'a>(refs: &'a [ImageReference], locator: &str) -> &'a ImageReference {
    refs.iter().find(|r| r.locator == locator).unwrap_or_else(|| {
        let locators: Vec<&str> = refs.iter().map(|r| r.locator.as_str()).collect();
        panic!("reference '{locator}' not found. Available: {locators:?}")
    })
}
