//! Reference extraction: file text → [`ImageReference`]s.
//!
//! Extraction is strictly line-based. Each line is run through every
//! [`Dialect`] matcher in turn, and every site found is addressed by its
//! 1-based line number and its occurrence index among that dialect's sites
//! on the line. The mutator uses the same addressing, so a reference can be
//! written back without ambiguity.

use crate::dialect::{self, Site};
use crate::types::{Dialect, ImageReference, Language, LanguageChoice};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static FRONT_MATTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\A---\r?\n(?s:(?P<body>.*?))\r?\n---").unwrap());

static LANG_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^lang:\s*(?P<lang>\w+)").unwrap());

/// Which references to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    pub language: LanguageChoice,
    /// Keep references that already have a caption.
    pub replace_existing: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            language: LanguageChoice::Auto,
            replace_existing: false,
        }
    }
}

/// Detect a file's language from a `lang:` field in its leading front matter.
///
/// `fr` selects French; anything else, or no front matter, is English.
pub fn detect_language(content: &str) -> Language {
    FRONT_MATTER
        .captures(content)
        .and_then(|c| c.name("body"))
        .and_then(|body| LANG_FIELD.captures(body.as_str()))
        .and_then(|c| c.name("lang"))
        .map(|lang| {
            if lang.as_str().eq_ignore_ascii_case("fr") {
                Language::Fr
            } else {
                Language::En
            }
        })
        .unwrap_or(Language::En)
}

/// Resolve the caption language for one file.
pub fn resolve_language(choice: LanguageChoice, content: &str) -> Language {
    match choice {
        LanguageChoice::Fixed(lang) => lang,
        LanguageChoice::Auto => detect_language(content),
    }
}

/// Extract every reference in `content`, in line order, then dialect order
/// within a line.
pub fn extract_all(file: &Path, content: &str, language: Language) -> Vec<ImageReference> {
    let mut references = Vec::new();
    for (index, line) in content.split('\n').enumerate() {
        for dialect in Dialect::ALL {
            let sites = dialect::find_sites(dialect, line);
            references.extend(sites.into_iter().enumerate().map(|(occurrence, site)| {
                reference_from_site(file, index + 1, line, dialect, occurrence, site, language)
            }));
        }
    }
    references
}

/// Extract the references that need a caption, or all of them when
/// `replace_existing` is set.
pub fn extract_references(
    file: &Path,
    content: &str,
    options: &ExtractOptions,
) -> Vec<ImageReference> {
    let language = resolve_language(options.language, content);
    extract_all(file, content, language)
        .into_iter()
        .filter(|r| options.replace_existing || r.needs_caption())
        .collect()
}

fn reference_from_site(
    file: &Path,
    line_number: usize,
    line: &str,
    dialect: Dialect,
    occurrence: usize,
    site: Site,
    language: Language,
) -> ImageReference {
    ImageReference {
        file: file.to_path_buf(),
        caption: site.caption_text(dialect),
        locator: site.locator,
        line_number,
        line_content: line.to_string(),
        dialect,
        occurrence,
        language,
    }
}
