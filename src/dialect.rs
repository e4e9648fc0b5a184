//! Line-level matchers for the four image-embedding dialects.
//!
//! Every dialect answers the same three questions about a single line:
//!
//! | Question | Function |
//! |---|---|
//! | Where are the image mentions? | [`find_sites`] → [`Site`] |
//! | What does a stored caption mean? | [`decode_caption`] |
//! | How is a new caption written back? | [`render_field`], [`render_insertion`] |
//!
//! Extraction and mutation both go through [`find_sites`], so a line is
//! always addressed the same way whether it is being read or rewritten.
//!
//! ## Quotes
//!
//! The `regex` crate has no backreferences, so "the closing quote must match
//! the opening one" is expressed as an alternation of a double-quoted and a
//! single-quoted branch. A `'` inside a double-quoted caption (`L'église`)
//! therefore never terminates the capture.

use crate::types::Dialect;
use regex::{Captures, Regex};
use std::ops::Range;
use std::sync::LazyLock;

static MARKDOWN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[(?P<alt>.*?)\]\((?P<src>.+?)\)").unwrap());

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img\b(?:[^>"']|"[^"]*"|'[^']*')*>"#).unwrap()
});

static ENHANCED_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<enhanced:img\b(?:[^>"'{]|"[^"]*"|'[^']*'|\{[^}]*\})*/>"#).unwrap()
});

/// One attribute inside a tag, with or without a value. Unquoted and braced
/// values are consumed whole so their contents never look like attributes.
static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?:^|\s)(?P<name>[\w:.-]+)(?:\s*=\s*(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)'|(?P<br>\{[^}]*\})|(?P<bare>[^\s>"'/]+)))?"#,
    )
    .unwrap()
});

static GRID_OBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\{\s*src:\s*[A-Za-z_$][\w$]*\[\s*(?:'(?P<sq>[^']*)'|"(?P<dq>[^"]*)")\s*\](?P<rest>(?:[^{}"']|"(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*')*)(?P<close>\})?"#,
    )
    .unwrap()
});

/// Inside a grid object, the `alt:` field or any string literal. String
/// literals are matched so an `alt:` inside another field's value is skipped.
static GRID_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?P<field>\balt:\s*(?:"(?P<dq>(?:[^"\\]|\\.)*)"|'(?P<sq>(?:[^'\\]|\\.)*)'))|"(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'"#,
    )
    .unwrap()
});

static KEYED_LOOKUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[A-Za-z_$][\w$]*\[\s*(?:'(?P<sq>[^']*)'|"(?P<dq>[^"]*)")\s*\]"#).unwrap()
});

/// Quote style of a stored caption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quote {
    Double,
    Single,
    /// Markdown brackets.
    None,
    /// Unquoted (`alt=x`) or valueless (`alt`). Rewritten double-quoted.
    Bare,
    /// A braced expression (`alt={caption}`). Never rewritten.
    Expression,
}

/// The caption field of a site, as it currently appears on the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionField {
    /// Byte range of the whole field (`alt="..."`, `alt: '...'`, or the
    /// text between markdown brackets).
    pub span: Range<usize>,
    /// Raw text between the quotes, still escaped.
    pub raw: String,
    pub quote: Quote,
}

/// One image mention on a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    pub span: Range<usize>,
    pub locator: String,
    pub caption: Option<CaptionField>,
    /// Range replaced by [`render_insertion`] when there is no caption field.
    /// `None` when the line offers no safe place to add one.
    pub insert: Option<Range<usize>>,
}

impl Site {
    /// Decoded caption text, empty when the field is absent.
    pub fn caption_text(&self, dialect: Dialect) -> String {
        self.caption
            .as_ref()
            .map(|c| decode_caption(dialect, &c.raw, c.quote))
            .unwrap_or_default()
    }
}

/// Find every site of `dialect` on `line`, left to right.
pub fn find_sites(dialect: Dialect, line: &str) -> Vec<Site> {
    match dialect {
        Dialect::MarkdownInline => markdown_sites(line),
        Dialect::HtmlTag => html_sites(line),
        Dialect::EnhancedComponent => enhanced_sites(line),
        Dialect::GridObject => grid_sites(line),
    }
}

/// Every `table['key']` lookup on a line, regardless of dialect.
pub fn keyed_lookups(line: &str) -> Vec<String> {
    KEYED_LOOKUP
        .captures_iter(line)
        .filter_map(|c| quoted_value(&c).map(|(_, value, _)| value.to_string()))
        .collect()
}

fn markdown_sites(line: &str) -> Vec<Site> {
    MARKDOWN
        .captures_iter(line)
        .filter_map(|c| {
            let whole = c.get(0)?;
            let alt = c.name("alt")?;
            let src = c.name("src")?;
            Some(Site {
                span: whole.range(),
                locator: markdown_locator(src.as_str()),
                caption: Some(CaptionField {
                    span: alt.range(),
                    raw: alt.as_str().to_string(),
                    quote: Quote::None,
                }),
                insert: Some(alt.range()),
            })
        })
        .collect()
}

/// `./a.jpg "Title"` → `./a.jpg`; `<./a b.jpg>` → `./a b.jpg`.
fn markdown_locator(src: &str) -> String {
    let src = src.trim();
    if let Some(inner) = src.strip_prefix('<').and_then(|s| s.split_once('>')) {
        return inner.0.to_string();
    }
    let first = src.split_whitespace().next().unwrap_or(src);
    first.trim_matches(|c| c == '"' || c == '\'').to_string()
}

/// An attribute found inside a tag, with ranges relative to the line.
struct Attribute {
    name: String,
    span: Range<usize>,
    value: Option<(Range<usize>, String, Quote)>,
    braced: Option<String>,
    bare: Option<String>,
}

fn tag_attributes(line: &str, tag: Range<usize>) -> Vec<Attribute> {
    let text = &line[tag.clone()];
    ATTRIBUTE
        .captures_iter(text)
        .filter_map(|c| {
            let whole = c.get(0)?;
            let name = c.name("name")?.as_str().to_ascii_lowercase();
            // Skip the separating whitespace so the span starts at the name.
            let lead = whole.as_str().len() - whole.as_str().trim_start().len();
            let value = quoted_value(&c).map(|(range, value, quote)| {
                (
                    tag.start + range.start..tag.start + range.end,
                    value.to_string(),
                    quote,
                )
            });
            Some(Attribute {
                name,
                span: tag.start + whole.start() + lead..tag.start + whole.end(),
                value,
                braced: c.name("br").map(|m| m.as_str().to_string()),
                bare: c.name("bare").map(|m| m.as_str().to_string()),
            })
        })
        .collect()
}

fn quoted_value<'h>(c: &Captures<'h>) -> Option<(Range<usize>, &'h str, Quote)> {
    if let Some(m) = c.name("dq") {
        Some((m.range(), m.as_str(), Quote::Double))
    } else {
        c.name("sq").map(|m| (m.range(), m.as_str(), Quote::Single))
    }
}

/// The tag's `alt` attribute in whatever form it takes. Any `alt` counts,
/// so a rewrite replaces it instead of adding a second one.
fn alt_field(attributes: &[Attribute]) -> Option<CaptionField> {
    let alt = attributes.iter().find(|a| a.name == "alt")?;
    let (raw, quote) = match (&alt.value, &alt.braced, &alt.bare) {
        (Some((_, raw, quote)), _, _) => (raw.clone(), *quote),
        (None, Some(expression), _) => (expression.clone(), Quote::Expression),
        (None, None, Some(bare)) => (bare.clone(), Quote::Bare),
        (None, None, None) => (String::new(), Quote::Bare),
    };
    Some(CaptionField {
        span: alt.span.clone(),
        raw,
        quote,
    })
}

fn html_sites(line: &str) -> Vec<Site> {
    HTML_TAG
        .find_iter(line)
        .filter_map(|tag| {
            let attributes = tag_attributes(line, tag.range());
            let src = attributes.iter().find(|a| a.name == "src")?;
            let (_, locator, _) = src.value.as_ref()?;
            // Right after `<img`.
            let insert_at = tag.start() + 4;
            Some(Site {
                span: tag.range(),
                locator: locator.clone(),
                caption: alt_field(&attributes),
                insert: Some(insert_at..insert_at),
            })
        })
        .collect()
}

fn enhanced_sites(line: &str) -> Vec<Site> {
    ENHANCED_TAG
        .find_iter(line)
        .filter_map(|tag| {
            let attributes = tag_attributes(line, tag.range());
            let expression = attributes
                .iter()
                .find(|a| a.name == "src")?
                .braced
                .as_deref()?;
            let inner = expression.trim_start_matches('{').trim_end_matches('}').trim();
            let locator = keyed_lookups(inner)
                .into_iter()
                .next()
                .unwrap_or_else(|| inner.to_string());
            // Whitespace before the closing `/>` is absorbed by the insertion.
            let body = &line[tag.start()..tag.end() - 2];
            let close_start = tag.start() + body.trim_end().len();
            Some(Site {
                span: tag.range(),
                locator,
                caption: alt_field(&attributes),
                insert: Some(close_start..tag.end()),
            })
        })
        .collect()
}

fn grid_sites(line: &str) -> Vec<Site> {
    GRID_OBJECT
        .captures_iter(line)
        .filter_map(|c| {
            let whole = c.get(0)?;
            let (_, locator, _) = quoted_value(&c)?;
            let rest = c.name("rest")?;
            let caption = GRID_FIELD
                .captures_iter(rest.as_str())
                .find_map(|f| {
                    let field = f.name("field")?;
                    let (_, raw, quote) = quoted_value(&f)?;
                    Some(CaptionField {
                        span: rest.start() + field.start()..rest.start() + field.end(),
                        raw: raw.to_string(),
                        quote,
                    })
                });
            let body_end = rest.start() + rest.as_str().trim_end().len();
            // Without a closing brace the object either continues on the
            // next line or holds a nested object we will not write into.
            let insert = match c.name("close") {
                Some(close) => Some(body_end..close.end()),
                None if line[whole.end()..].trim().is_empty() => Some(body_end..body_end),
                None => None,
            };
            Some(Site {
                span: whole.range(),
                locator: locator.to_string(),
                caption,
                insert,
            })
        })
        .collect()
}

/// Turn a stored caption back into plain text.
///
/// An expression caption decodes to its source text, so it never reads as
/// missing.
pub fn decode_caption(dialect: Dialect, raw: &str, quote: Quote) -> String {
    match (dialect, quote) {
        (_, Quote::Expression) | (Dialect::MarkdownInline, _) => raw.to_string(),
        (Dialect::HtmlTag | Dialect::EnhancedComponent, _) => htmlize::unescape(raw).into_owned(),
        (Dialect::GridObject, Quote::Double | Quote::Single) => unescape_string_literal(raw),
        (Dialect::GridObject, _) => raw.to_string(),
    }
}

/// Escape a caption for the dialect's double-quoted field.
///
/// Markdown captions are written verbatim apart from line breaks: a `]` in
/// the caption will break the link syntax. Markdown and markup captions are
/// flattened to one line; string literals escape their line breaks instead.
pub fn escape_caption(dialect: Dialect, caption: &str) -> String {
    match dialect {
        Dialect::MarkdownInline => single_line(caption),
        Dialect::HtmlTag | Dialect::EnhancedComponent => {
            htmlize::escape_attribute(&single_line(caption)).into_owned()
        }
        Dialect::GridObject => escape_string_literal(caption),
    }
}

/// Collapse every whitespace run, line breaks included, to one space.
pub fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Replacement for an existing caption field's span.
pub fn render_field(dialect: Dialect, caption: &str) -> String {
    let escaped = escape_caption(dialect, caption);
    match dialect {
        Dialect::MarkdownInline => escaped,
        Dialect::HtmlTag | Dialect::EnhancedComponent => format!("alt=\"{escaped}\""),
        Dialect::GridObject => format!("alt: \"{escaped}\""),
    }
}

/// Replacement for `insert` when a site has no caption field.
pub fn render_insertion(
    dialect: Dialect,
    line: &str,
    span: &Range<usize>,
    insert: &Range<usize>,
    caption: &str,
) -> String {
    let field = render_field(dialect, caption);
    match dialect {
        Dialect::MarkdownInline => field,
        Dialect::HtmlTag => format!(" {field}"),
        Dialect::EnhancedComponent => format!(" {field} />"),
        Dialect::GridObject => {
            let closed = line[insert.clone()].ends_with('}');
            let trailing_comma = line[span.start..insert.start].ends_with(',');
            match (closed, trailing_comma) {
                (true, true) => format!(" {field}}}"),
                (true, false) => format!(", {field}}}"),
                // The object continues on the next line.
                (false, true) => format!(" {field},"),
                (false, false) => format!(", {field}"),
            }
        }
    }
}

/// Backslash first, so later escapes are not doubled.
fn escape_string_literal(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

fn unescape_string_literal(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
