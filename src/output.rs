//! CLI output formatting for both commands.
//!
//! # Reference-First Display
//!
//! Every image reference is shown by where it lives (`file:line`) before
//! what it says, with the locator, language, and captions as indented
//! context. Paths are shown relative to the working directory when they are
//! below it.
//!
//! # Output Format
//!
//! ## alt-text
//!
//! ```text
//! Alt Text Generator
//!     Mode: batch
//!     Dry run: Yes
//!     Language: auto
//!     Model: llava
//!     Replace existing: No
//!     Directories: src/content/posts, src/content/logs
//!
//! [1/5] src/content/posts/amiens/amiens.md:13
//!     FR: "La cathédrale d'Amiens vue du parvis."
//!     [DRY RUN] Would update
//! [2/5] src/content/posts/amiens/amiens.md:17
//!     Could not resolve image path: ./files/gone.png
//!
//! Done. Processed: 4, Failed: 0, Skipped: 1
//! ```
//!
//! ## cleanup
//!
//! ```text
//! Analyzing 2 content file(s) for image references...
//!     amiens.md: 7 references
//!         files/
//!
//! Folder: files
//!     Used by: amiens.md
//!     Total images: 5
//!     Unused images: 1
//!         - orphan.png
//!
//! ==================== SUMMARY ====================
//! Total files analyzed: 2
//! Total folders: 1
//! Total unused images: 1
//! Total size of unused images: 120 B
//! DRY RUN: No files were deleted
//! ```
//!
//! # Architecture
//!
//! Each piece of output has a `format_*` function (returns `Vec<String>`)
//! for testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::analyze::{AnalysisReport, FileSummary, format_bytes};
use crate::caption::{ClientError, PrepareEvent};
use crate::session::{AltTextOptions, CaptionEvent, Mode, RunSummary, count_by_dialect};
use crate::types::ImageReference;
use std::io::Write;
use std::path::Path;

/// Unused images listed per folder before the rest are summarized.
const UNUSED_EXAMPLES: usize = 3;

// ============================================================================
// Shared helpers
// ============================================================================

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `path` relative to `base` when below it, otherwise as is.
fn display_path(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .display()
        .to_string()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn yes_no(value: bool) -> &'static str {
    if value { "Yes" } else { "No" }
}

/// `[3/12] posts/x/x.md:14`
fn reference_header(index: usize, total: usize, reference: &ImageReference, base: &Path) -> String {
    format!(
        "[{}/{}] {}:{}",
        index + 1,
        total,
        display_path(&reference.file, base),
        reference.line_number
    )
}

// ============================================================================
// alt-text
// ============================================================================

pub fn format_run_header(options: &AltTextOptions, model: &str, base: &Path) -> Vec<String> {
    let dirs: Vec<String> = options
        .dirs
        .iter()
        .map(|d| display_path(d, base))
        .collect();
    vec![
        "Alt Text Generator".to_string(),
        format!("{}Mode: {}", indent(1), options.mode.name()),
        format!("{}Dry run: {}", indent(1), yes_no(!options.apply)),
        format!("{}Language: {}", indent(1), options.language),
        format!("{}Model: {}", indent(1), model),
        format!("{}Replace existing: {}", indent(1), yes_no(options.replace_existing)),
        format!("{}Directories: {}", indent(1), dirs.join(", ")),
    ]
}

pub fn print_run_header(options: &AltTextOptions, model: &str, base: &Path) {
    for line in format_run_header(options, model, base) {
        println!("{}", line);
    }
}

/// Listing printed by `--check-only`.
pub fn format_check_only(
    references: &[ImageReference],
    replace_existing: bool,
    base: &Path,
) -> Vec<String> {
    let mut lines = Vec::new();
    lines.push(String::new());
    if replace_existing {
        lines.push(format!(
            "Found {} images (including those with existing alt text)",
            references.len()
        ));
    } else {
        lines.push(format!("Found {} images without alt text", references.len()));
    }
    lines.push(String::new());

    for (i, reference) in references.iter().enumerate() {
        lines.push(format!(
            "[{}] {}:{}",
            i + 1,
            display_path(&reference.file, base),
            reference.line_number
        ));
        lines.push(format!("{}Type: {}", indent(1), reference.dialect));
        lines.push(format!("{}Lang: {}", indent(1), reference.language.code().to_uppercase()));
        lines.push(format!("{}Image: {}", indent(1), reference.locator));
        lines.push(format!("{}Current alt: \"{}\"", indent(1), reference.caption));
    }

    lines.push(String::new());
    lines.push("Summary by type:".to_string());
    for (dialect, count) in count_by_dialect(references) {
        lines.push(format!("{}{}: {}", indent(1), dialect, count));
    }
    lines.push(String::new());
    lines.push("Run without --check-only to generate alt text".to_string());
    lines
}

pub fn format_summary(summary: &RunSummary) -> Vec<String> {
    match summary.mode {
        Some(Mode::Batch) => vec![
            String::new(),
            format!(
                "Done. Processed: {}, Failed: {}, Skipped: {}",
                summary.processed, summary.failed, summary.skipped
            ),
        ],
        _ => vec![String::new(), "Done.".to_string()],
    }
}

/// Format one alt-text progress event as display lines.
///
/// Interactive runs show the full context of each reference before the
/// suggestion; batch runs keep to one header line per reference.
pub fn format_caption_event(event: &CaptionEvent, base: &Path) -> Vec<String> {
    match event {
        CaptionEvent::DirectoryMissing(dir) => {
            vec![format!("Skipping missing directory: {}", display_path(dir, base))]
        }
        CaptionEvent::FileUnreadable { file, reason } => {
            vec![format!("Cannot read {}: {}", display_path(file, base), reason)]
        }
        CaptionEvent::AllCaptioned => vec![String::new(), "All images have alt text!".to_string()],
        CaptionEvent::CheckOnly {
            references,
            replace_existing,
        } => format_check_only(references, *replace_existing, base),
        CaptionEvent::Reviewing {
            index,
            total,
            reference,
            mode: Mode::Batch,
        } => vec![reference_header(*index, *total, reference, base)],
        CaptionEvent::Reviewing {
            index,
            total,
            reference,
            mode: Mode::Interactive,
        } => vec![
            String::new(),
            reference_header(*index, *total, reference, base),
            format!("{}Image: {}", indent(1), reference.locator),
            format!(
                "{}Language: {}",
                indent(1),
                reference.language.code().to_uppercase()
            ),
            format!("{}Current alt: \"{}\"", indent(1), reference.caption),
        ],
        CaptionEvent::Unresolved { locator } => {
            vec![format!("{}Could not resolve image path: {}", indent(1), locator)]
        }
        CaptionEvent::Generating { model } => {
            vec![format!("{}Generating alt text with {}...", indent(1), model)]
        }
        CaptionEvent::Prepared(PrepareEvent::LargeImage { path, bytes }) => vec![format!(
            "{}Warning: {} is large ({})",
            indent(1),
            file_name(path),
            format_bytes(*bytes)
        )],
        CaptionEvent::Prepared(PrepareEvent::Downscaled { width, height, .. }) => {
            vec![format!("{}Downscaled to {}x{}", indent(1), width, height)]
        }
        CaptionEvent::Suggested { reference, caption } => vec![format!(
            "{}{}: \"{}\"",
            indent(1),
            reference.language.code().to_uppercase(),
            caption
        )],
        CaptionEvent::GenerationFailed { reason } => {
            vec![format!("{}Failed to generate alt text: {}", indent(1), reason)]
        }
        CaptionEvent::Prompt(text) => vec![format!("{}{}", indent(1), text)],
        CaptionEvent::Skipped => vec![format!("{}Skipped", indent(1))],
        CaptionEvent::Quit => vec![String::new(), "Exiting...".to_string()],
        CaptionEvent::Updated { written: true } => vec![format!("{}Updated", indent(1))],
        CaptionEvent::Updated { written: false } => {
            vec![format!("{}[DRY RUN] Would update", indent(1))]
        }
        CaptionEvent::UpdateFailed { reason } => {
            vec![format!("{}Failed to update: {}", indent(1), reason)]
        }
        CaptionEvent::Finished(summary) => format_summary(summary),
    }
}

/// Print an event; prompts stay on the line so the answer follows them.
pub fn print_caption_event(event: &CaptionEvent, base: &Path) {
    let lines = format_caption_event(event, base);
    if let CaptionEvent::Prompt(_) = event {
        let mut stdout = std::io::stdout().lock();
        for line in lines {
            let _ = write!(stdout, "{}", line);
        }
        let _ = stdout.flush();
        return;
    }
    for line in lines {
        println!("{}", line);
    }
}

/// Explanation and remedy for a failed model check.
pub fn format_model_error(error: &ClientError, model: &str) -> Vec<String> {
    match error {
        ClientError::ModelMissing(_) => vec![
            format!("Error: Model '{}' not found.", model),
            format!("Run: ollama pull {}", model),
        ],
        ClientError::Unreachable { endpoint, .. } => vec![
            format!("Error: Cannot connect to the model service at {}.", endpoint),
            "Make sure it is running: ollama serve".to_string(),
        ],
        other => vec![format!("Error: {}", other)],
    }
}

pub fn print_model_error(error: &ClientError, model: &str) {
    for line in format_model_error(error, model) {
        eprintln!("{}", line);
    }
}

// ============================================================================
// cleanup
// ============================================================================

pub fn format_cleanup_start(file_count: usize) -> Vec<String> {
    vec![format!(
        "Analyzing {} content file(s) for image references...",
        file_count
    )]
}

/// What one content file contributed to the analysis.
pub fn format_file_summary(summary: &FileSummary) -> Vec<String> {
    let mut lines = vec![format!(
        "{}{}: {} references",
        indent(1),
        file_name(&summary.file),
        summary.reference_count
    )];
    if summary.folders.is_empty() {
        lines.push(format!("{}No image folders found", indent(2)));
    }
    for folder in &summary.folders {
        lines.push(format!("{}{}/", indent(2), file_name(folder)));
    }
    lines
}

pub fn format_unreadable_file(file: &Path, reason: &str) -> Vec<String> {
    vec![format!("{}Cannot read {}: {}", indent(1), file_name(file), reason)]
}

/// Per-folder findings.
pub fn format_analysis_report(report: &AnalysisReport) -> Vec<String> {
    let mut lines = Vec::new();
    if report.folders.is_empty() {
        lines.push(String::new());
        lines.push("No image folders found in any of the analyzed files.".to_string());
        lines.push("Nothing to clean up!".to_string());
        return lines;
    }

    for folder in &report.folders {
        lines.push(String::new());
        lines.push(format!("Folder: {}", file_name(&folder.path)));
        lines.push(format!("{}Used by: {}", indent(1), folder.used_by.join(", ")));
        lines.push(format!("{}Total images: {}", indent(1), folder.images.len()));
        if folder.images.is_empty() {
            lines.push(format!("{}No images found in folder", indent(1)));
            continue;
        }
        if folder.unused.is_empty() {
            lines.push(format!("{}All images are used!", indent(1)));
            continue;
        }
        lines.push(format!("{}Unused images: {}", indent(1), folder.unused.len()));
        for image in folder.unused.iter().take(UNUSED_EXAMPLES) {
            lines.push(format!("{}- {}", indent(2), file_name(image)));
        }
        if folder.unused.len() > UNUSED_EXAMPLES {
            lines.push(format!(
                "{}... and {} more",
                indent(2),
                folder.unused.len() - UNUSED_EXAMPLES
            ));
        }
    }
    lines
}

/// Totals, and what would be removed. Nothing is ever deleted.
pub fn format_cleanup_summary(report: &AnalysisReport, dry_run: bool, base: &Path) -> Vec<String> {
    let mut lines = vec![String::new()];
    if report.total_unused == 0 {
        lines.push("No unused images found across all files!".to_string());
        return lines;
    }

    lines.push("==================== SUMMARY ====================".to_string());
    lines.push(format!("Total files analyzed: {}", report.files_analyzed));
    lines.push(format!("Total folders: {}", report.folders.len()));
    lines.push(format!("Total unused images: {}", report.total_unused));
    if report.total_bytes > 0 {
        lines.push(format!(
            "Total size of unused images: {}",
            format_bytes(report.total_bytes)
        ));
    }

    if dry_run {
        lines.push("DRY RUN: No files were deleted".to_string());
        return lines;
    }
    lines.push(String::new());
    lines.push("Unused images that would be removed:".to_string());
    for folder in &report.folders {
        for image in &folder.unused {
            lines.push(format!("{}{}", indent(1), display_path(image, base)));
        }
    }
    lines
}

pub fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}
