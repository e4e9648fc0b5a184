//! Unused-image analysis for the `cleanup` command.
//!
//! ## Flow
//!
//! ```text
//! content files ──analyze_file──► references + candidate folders
//!                                        │ (accumulated in the analyzer)
//!                                        ▼
//!                           finish ──► AnalysisReport
//! ```
//!
//! Each content file contributes its references to one global pool and
//! names the folders its images live in. Only after every file has been
//! seen are the folders inventoried, so an image used by any scanned file
//! counts as used in every folder.
//!
//! ## Usage heuristic
//!
//! An image is used when its file name occurs inside some reference, or some
//! reference occurs inside the image's full path. This errs towards "used":
//! an unrelated reference that happens to contain the file name keeps the
//! image. Nothing is ever deleted; the report lists what would be removed.

use crate::config::ToolConfig;
use crate::dialect::keyed_lookups;
use crate::discover::{find_files, normalize};
use crate::extract::extract_all;
use crate::resolve::strip_query;
use crate::types::Language;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A directory of images associated with one or more content files.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFolder {
    pub path: PathBuf,
    /// File names of the content files that led to this folder.
    pub used_by: Vec<String>,
    /// Every image below the folder, filled in by [`CleanupAnalyzer::finish`].
    pub images: Vec<PathBuf>,
    pub unused: Vec<PathBuf>,
}

impl ImageFolder {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            used_by: Vec::new(),
            images: Vec::new(),
            unused: Vec::new(),
        }
    }
}

/// What one content file contributed.
#[derive(Debug, Clone, PartialEq)]
pub struct FileSummary {
    pub file: PathBuf,
    pub reference_count: usize,
    pub folders: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisReport {
    pub files_analyzed: usize,
    pub folders: Vec<ImageFolder>,
    pub total_unused: usize,
    /// Sum of the unused images' sizes; images that cannot be stat'ed are
    /// left out.
    pub total_bytes: u64,
}

/// Owns all state of one cleanup run.
pub struct CleanupAnalyzer {
    folder_names: Vec<String>,
    numbered_prefix: String,
    image_extensions: Vec<String>,
    references: Vec<String>,
    folders: Vec<ImageFolder>,
    files_analyzed: usize,
}

impl CleanupAnalyzer {
    pub fn new(config: &ToolConfig) -> Self {
        Self {
            folder_names: config.cleanup.folder_names.clone(),
            numbered_prefix: config.cleanup.numbered_prefix.clone(),
            image_extensions: config.images.extensions.clone(),
            references: Vec::new(),
            folders: Vec::new(),
            files_analyzed: 0,
        }
    }

    /// Read and analyze one content file.
    pub fn analyze_file(&mut self, file: &Path) -> io::Result<FileSummary> {
        let content = fs::read_to_string(file)?;
        Ok(self.analyze_content(file, &content))
    }

    /// Record `content`'s references and the folders they point into.
    pub fn analyze_content(&mut self, file: &Path, content: &str) -> FileSummary {
        let locators = collect_locators(file, content);
        let folders = self.candidate_folders(file, &locators);

        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        for folder in &folders {
            let index = match self.folders.iter().position(|f| &f.path == folder) {
                Some(i) => i,
                None => {
                    self.folders.push(ImageFolder::new(folder.clone()));
                    self.folders.len() - 1
                }
            };
            let entry = &mut self.folders[index];
            if !entry.used_by.contains(&name) {
                entry.used_by.push(name.clone());
            }
        }

        let summary = FileSummary {
            file: file.to_path_buf(),
            reference_count: locators.len(),
            folders,
        };
        self.references.extend(locators);
        self.files_analyzed += 1;
        summary
    }

    /// Folders derived from the file's own references, or, when there are
    /// none, conventional asset folders next to the file.
    fn candidate_folders(&self, file: &Path, locators: &[String]) -> Vec<PathBuf> {
        let Some(dir) = file.parent() else {
            return Vec::new();
        };

        let mut folders: Vec<PathBuf> = Vec::new();
        for locator in locators {
            let clean = strip_query(locator.trim_start_matches("./"));
            // Root-relative assets are shared site-wide.
            if clean.starts_with('/') || !clean.contains('/') {
                continue;
            }
            let Some(parent) = Path::new(clean).parent() else {
                continue;
            };
            let folder = normalize(&dir.join(parent));
            if folder.is_dir() && !folders.contains(&folder) {
                folders.push(folder);
            }
        }
        if !folders.is_empty() {
            return folders;
        }

        for name in &self.folder_names {
            let folder = dir.join(name);
            if folder.is_dir() {
                folders.push(folder);
            }
        }
        let mut numbered: Vec<PathBuf> = fs::read_dir(dir)
            .into_iter()
            .flatten()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter(|e| is_numbered(&e.file_name().to_string_lossy(), &self.numbered_prefix))
            .map(|e| e.path())
            .collect();
        numbered.sort();
        for folder in numbered {
            if !folders.contains(&folder) {
                folders.push(folder);
            }
        }
        folders
    }

    /// Inventory every folder and mark unused images.
    pub fn finish(mut self) -> AnalysisReport {
        let mut total_unused = 0;
        let mut total_bytes = 0;
        for folder in &mut self.folders {
            folder.images = find_files(&folder.path, &self.image_extensions);
            folder.unused = folder
                .images
                .iter()
                .filter(|image| !is_referenced(image, &self.references))
                .cloned()
                .collect();
            total_unused += folder.unused.len();
            total_bytes += folder
                .unused
                .iter()
                .filter_map(|image| fs::metadata(image).ok())
                .map(|m| m.len())
                .sum::<u64>();
        }
        AnalysisReport {
            files_analyzed: self.files_analyzed,
            folders: self.folders,
            total_unused,
            total_bytes,
        }
    }
}

/// Locators of every dialect plus every keyed lookup in the file.
fn collect_locators(file: &Path, content: &str) -> Vec<String> {
    let mut locators: Vec<String> = extract_all(file, content, Language::En)
        .into_iter()
        .map(|r| r.locator)
        .collect();
    for line in content.split('\n') {
        locators.extend(keyed_lookups(line));
    }
    locators
}

/// `images_1`, `images_22`; not `images_` or `images_old`.
fn is_numbered(name: &str, prefix: &str) -> bool {
    name.strip_prefix(prefix)
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}

/// The usage test for one image against every collected reference.
pub fn is_referenced(image: &Path, references: &[String]) -> bool {
    let Some(name) = image.file_name().map(|n| n.to_string_lossy()) else {
        return false;
    };
    let full = image.to_string_lossy();
    references.iter().any(|reference| {
        let trimmed = reference.trim_start_matches("./");
        trimmed.contains(name.as_ref())
            || reference.contains(name.as_ref())
            || (!trimmed.is_empty() && full.contains(trimmed))
    })
}

/// `1536` → `1.5 KB`; two decimals at most, trailing zeros dropped.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    let rounded = (size * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}
