//! Shared types used by both the cleanup and the alt-text flows.
//!
//! An [`ImageReference`] is produced by [`extract`](crate::extract) and
//! consumed either by the reporting path ([`analyze`](crate::analyze),
//! [`output`](crate::output)) or by the mutation path
//! ([`mutate`](crate::mutate)). Nothing here is persisted.

use std::fmt;
use std::path::PathBuf;

/// One of the four image-embedding syntaxes found in content files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dialect {
    /// `![caption](locator)`
    MarkdownInline,
    /// `<img src="..." alt="...">`
    HtmlTag,
    /// `<enhanced:img src={...} alt="..." />`
    EnhancedComponent,
    /// `{ src: table['./path'], ..., alt: "..." }`
    GridObject,
}

impl Dialect {
    /// All dialects, in the order they are tried on each line.
    pub const ALL: [Dialect; 4] = [
        Dialect::MarkdownInline,
        Dialect::HtmlTag,
        Dialect::EnhancedComponent,
        Dialect::GridObject,
    ];

    /// Short tag used in reports.
    pub fn tag(self) -> &'static str {
        match self {
            Dialect::MarkdownInline => "markdown",
            Dialect::HtmlTag => "html",
            Dialect::EnhancedComponent => "enhanced",
            Dialect::GridObject => "picturegrid",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Language of the generated caption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    En,
    Fr,
}

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Fr => "fr",
        }
    }

    /// Instruction sent to the vision model with each image.
    pub fn prompt(self) -> &'static str {
        match self {
            Language::En => {
                "Describe this image in one clear, concise sentence for web accessibility \
                 (alt text). Focus on the main subject and key details. Be descriptive but \
                 brief. Answer in English only."
            }
            Language::Fr => {
                "Décris cette image en une phrase claire et concise pour l'accessibilité web \
                 (texte alt). Concentre-toi sur le sujet principal et les détails clés. Sois \
                 descriptif mais bref. Réponds uniquement en français."
            }
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Language requested on the command line: a fixed language, or detection
/// from each file's front matter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LanguageChoice {
    #[default]
    Auto,
    Fixed(Language),
}

impl std::str::FromStr for LanguageChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(LanguageChoice::Auto),
            "en" => Ok(LanguageChoice::Fixed(Language::En)),
            "fr" => Ok(LanguageChoice::Fixed(Language::Fr)),
            other => Err(format!("unsupported language '{other}' (expected en, fr or auto)")),
        }
    }
}

impl fmt::Display for LanguageChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LanguageChoice::Auto => f.write_str("auto"),
            LanguageChoice::Fixed(lang) => lang.fmt(f),
        }
    }
}

/// One textual mention of an image inside a content file.
///
/// `file` + `line_number` + `dialect` + `occurrence` address the mutation
/// site. `line_content` is a snapshot taken at scan time and is only used
/// for display; the mutator always re-matches the current line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub file: PathBuf,
    /// Locator as written in the source (relative, root-relative, or a module key).
    pub locator: String,
    /// Decoded caption text; empty when the caption field is empty or absent.
    pub caption: String,
    /// 1-based.
    pub line_number: usize,
    pub line_content: String,
    pub dialect: Dialect,
    /// Index among the matches of the same dialect on this line.
    pub occurrence: usize,
    pub language: Language,
}

impl ImageReference {
    /// True when the caption is absent, blank, or the placeholder word "image".
    pub fn needs_caption(&self) -> bool {
        caption_is_missing(&self.caption)
    }
}

pub(crate) fn caption_is_missing(caption: &str) -> bool {
    let trimmed = caption.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case("image")
}
