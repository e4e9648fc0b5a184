//! Line mutation: write a caption back into its source line.
//!
//! A reference is addressed by line number, dialect, and occurrence. The
//! current line is re-matched with the same [`find_sites`] the extractor
//! used, and the site at that occurrence must still carry the expected
//! locator, otherwise the rewrite is refused as stale.
//!
//! Files are edited through [`FileEdit`]: one in-memory line array per file,
//! any number of line rewrites, one write. Splitting and joining on `\n`
//! leaves `\r\n` endings and the final newline exactly as they were. The
//! write goes to a sibling temp file that is renamed over the original, so a
//! file is always either the old or the new version.

use crate::dialect::{Quote, find_sites, render_field, render_insertion};
use crate::types::{Dialect, ImageReference};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MutateError {
    #[error("IO error on {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("line {line} is out of range ({len} lines)")]
    LineOutOfRange { line: usize, len: usize },
    #[error("line {line} changed since it was scanned (expected '{locator}')")]
    StaleLine { line: usize, locator: String },
    #[error("no place to add a caption on line {0}")]
    NoInsertionPoint(usize),
    #[error("the caption on line {0} is an expression and is left as is")]
    ExpressionCaption(usize),
}

/// Rewrite one site on `line` so its caption is `caption`.
///
/// An existing caption field is replaced in place; a missing one is added.
/// Either way the line ends up with exactly one caption field for the site.
pub fn rewrite_line(
    line: &str,
    dialect: Dialect,
    occurrence: usize,
    expected_locator: &str,
    caption: &str,
) -> Result<String, StaleSite> {
    let sites = find_sites(dialect, line);
    let site = sites
        .get(occurrence)
        .filter(|s| s.locator == expected_locator)
        .ok_or(StaleSite::Moved)?;
    if site.caption.as_ref().is_some_and(|f| f.quote == Quote::Expression) {
        return Err(StaleSite::Expression);
    }

    let (range, replacement) = match (&site.caption, &site.insert) {
        (Some(field), _) => (field.span.clone(), render_field(dialect, caption)),
        (None, Some(insert)) => (
            insert.clone(),
            render_insertion(dialect, line, &site.span, insert, caption),
        ),
        (None, None) => return Err(StaleSite::NoInsertionPoint),
    };

    let mut out = String::with_capacity(line.len() + replacement.len());
    out.push_str(&line[..range.start]);
    out.push_str(&replacement);
    out.push_str(&line[range.end..]);
    Ok(out)
}

/// Why [`rewrite_line`] could not rewrite a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleSite {
    /// The site is gone or now points elsewhere.
    Moved,
    NoInsertionPoint,
    /// The caption is computed (`alt={...}`).
    Expression,
}

/// One content file held in memory for editing.
#[derive(Debug)]
pub struct FileEdit {
    path: PathBuf,
    lines: Vec<String>,
    dirty: bool,
}

impl FileEdit {
    pub fn load(path: &Path) -> Result<Self, MutateError> {
        let content = fs::read_to_string(path).map_err(|source| MutateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            lines: content.split('\n').map(String::from).collect(),
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 1-based line access.
    pub fn line(&self, number: usize) -> Option<&str> {
        number
            .checked_sub(1)
            .and_then(|i| self.lines.get(i))
            .map(String::as_str)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Apply a caption to `reference`'s site in the in-memory copy.
    pub fn apply(&mut self, reference: &ImageReference, caption: &str) -> Result<(), MutateError> {
        let line_number = reference.line_number;
        let len = self.lines.len();
        let current = self
            .line(line_number)
            .ok_or(MutateError::LineOutOfRange {
                line: line_number,
                len,
            })?;
        let rewritten = rewrite_line(
            current,
            reference.dialect,
            reference.occurrence,
            &reference.locator,
            caption,
        )
        .map_err(|e| match e {
            StaleSite::Moved => MutateError::StaleLine {
                line: line_number,
                locator: reference.locator.clone(),
            },
            StaleSite::NoInsertionPoint => MutateError::NoInsertionPoint(line_number),
            StaleSite::Expression => MutateError::ExpressionCaption(line_number),
        })?;

        if rewritten != current {
            self.lines[line_number - 1] = rewritten;
            self.dirty = true;
        }
        Ok(())
    }

    pub fn content(&self) -> String {
        self.lines.join("\n")
    }

    /// Write the file if anything changed since the last save.
    pub fn save(&mut self) -> Result<bool, MutateError> {
        if !self.dirty {
            return Ok(false);
        }
        self.replace_on_disk().map_err(|source| MutateError::Io {
            path: self.path.clone(),
            source,
        })?;
        self.dirty = false;
        Ok(true)
    }

    /// Write a sibling temp file with the original's permissions, then
    /// rename it over the original.
    fn replace_on_disk(&self) -> io::Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let permissions = fs::metadata(&self.path)?.permissions();
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(self.content().as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.as_file().set_permissions(permissions)?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Language;
    use tempfile::TempDir;

    fn caption_at(line: &str, dialect: Dialect, occurrence: usize) -> Option<String> {
        find_sites(dialect, line)
            .get(occurrence)
            .map(|site| site.caption_text(dialect))
    }

    fn caption_field_count(line: &str, dialect: Dialect) -> usize {
        find_sites(dialect, line)
            .iter()
            .filter(|s| s.caption.is_some())
            .count()
    }

    fn rewrite(line: &str, dialect: Dialect, locator: &str, caption: &str) -> String {
        rewrite_line(line, dialect, 0, locator, caption).unwrap()
    }

    #[test]
    fn markdown_fills_empty_brackets() {
        assert_eq!(
            rewrite("See ![](./a.jpg) here", Dialect::MarkdownInline, "./a.jpg", "A dog"),
            "See ![A dog](./a.jpg) here"
        );
    }

    #[test]
    fn markdown_replaces_placeholder() {
        assert_eq!(
            rewrite("![image](./a.jpg \"Title\")", Dialect::MarkdownInline, "./a.jpg", "A dog"),
            "![A dog](./a.jpg \"Title\")"
        );
    }

    #[test]
    fn html_replaces_existing_alt_once() {
        let out = rewrite(
            "<img src=\"test.jpg\" alt=\"\" class=\"wide\">",
            Dialect::HtmlTag,
            "test.jpg",
            "A \"quoted\" <b>",
        );
        assert_eq!(
            out,
            "<img src=\"test.jpg\" alt=\"A &quot;quoted&quot; &lt;b&gt;\" class=\"wide\">"
        );
        assert_eq!(caption_field_count(&out, Dialect::HtmlTag), 1);
    }

    #[test]
    fn html_single_quoted_alt_is_rewritten_double_quoted() {
        assert_eq!(
            rewrite("<img alt='image' src='a.png'>", Dialect::HtmlTag, "a.png", "L'église"),
            "<img alt=\"L'église\" src='a.png'>"
        );
    }

    #[test]
    fn html_inserts_missing_alt() {
        assert_eq!(
            rewrite("<p><img src=\"a.png\"></p>", Dialect::HtmlTag, "a.png", "A chart"),
            "<p><img alt=\"A chart\" src=\"a.png\"></p>"
        );
    }

    #[test]
    fn enhanced_inserts_before_self_close() {
        assert_eq!(
            rewrite(
                "<enhanced:img src={imageModules['./files/a.jpg']} />",
                Dialect::EnhancedComponent,
                "./files/a.jpg",
                "A & B"
            ),
            "<enhanced:img src={imageModules['./files/a.jpg']} alt=\"A &amp; B\" />"
        );
    }

    #[test]
    fn grid_replaces_alt_after_other_keys() {
        assert_eq!(
            rewrite(
                "  { src: imageModules['./files/a.jpg'], colSpan:4, alt: \"\"},",
                Dialect::GridObject,
                "./files/a.jpg",
                "A \"big\" dog\\cat"
            ),
            "  { src: imageModules['./files/a.jpg'], colSpan:4, alt: \"A \\\"big\\\" dog\\\\cat\"},"
        );
    }

    #[test]
    fn grid_inserts_missing_alt() {
        assert_eq!(
            rewrite(
                "{ src: imageModules['./files/a.jpg'], colSpan: 2 },",
                Dialect::GridObject,
                "./files/a.jpg",
                "A dog"
            ),
            "{ src: imageModules['./files/a.jpg'], colSpan: 2, alt: \"A dog\"},"
        );
    }

    #[test]
    fn second_occurrence_is_addressed_independently() {
        let line = "![](./a.jpg) ![](./b.jpg)";
        assert_eq!(
            rewrite_line(line, Dialect::MarkdownInline, 1, "./b.jpg", "B").unwrap(),
            "![](./a.jpg) ![B](./b.jpg)"
        );
    }

    #[test]
    fn stale_locator_is_refused() {
        assert_eq!(
            rewrite_line("![](./other.jpg)", Dialect::MarkdownInline, 0, "./a.jpg", "x"),
            Err(StaleSite::Moved)
        );
        assert_eq!(
            rewrite_line("no images", Dialect::HtmlTag, 0, "a.png", "x"),
            Err(StaleSite::Moved)
        );
    }

    #[test]
    fn valueless_and_unquoted_alt_are_replaced_not_duplicated() {
        let out = rewrite("<img src=\"a.jpg\" alt>", Dialect::HtmlTag, "a.jpg", "A dog");
        assert_eq!(out, "<img src=\"a.jpg\" alt=\"A dog\">");

        let out = rewrite("<img src=\"a.jpg\" alt=image />", Dialect::HtmlTag, "a.jpg", "A dog");
        assert_eq!(out, "<img src=\"a.jpg\" alt=\"A dog\" />");

        let out = rewrite(
            "<enhanced:img src={m['./a.jpg']} alt />",
            Dialect::EnhancedComponent,
            "./a.jpg",
            "A dog",
        );
        assert_eq!(out, "<enhanced:img src={m['./a.jpg']} alt=\"A dog\" />");
        assert_eq!(out.matches("alt").count(), 1);
    }

    #[test]
    fn expression_caption_is_refused() {
        let line = "<enhanced:img src={m['./a.jpg']} alt={caption} />";
        assert_eq!(
            rewrite_line(line, Dialect::EnhancedComponent, 0, "./a.jpg", "A dog"),
            Err(StaleSite::Expression)
        );
    }

    #[test]
    fn multi_line_caption_stays_on_its_line() {
        let caption = "A dog on a beach.\nThe sun is setting.";
        for (line, dialect, locator) in [
            ("<img src=\"a.jpg\" alt=\"\">", Dialect::HtmlTag, "a.jpg"),
            ("![](./a.jpg)", Dialect::MarkdownInline, "./a.jpg"),
            ("<enhanced:img src={m['./a.jpg']} />", Dialect::EnhancedComponent, "./a.jpg"),
            ("{ src: m['./a.jpg'], alt: \"\" }", Dialect::GridObject, "./a.jpg"),
        ] {
            let out = rewrite(line, dialect, locator, caption);
            assert_eq!(out.lines().count(), 1, "{dialect}: {out}");
            assert_eq!(find_sites(dialect, &out).len(), 1, "{dialect}: {out}");
        }
    }

    #[test]
    fn rewrite_then_extract_round_trips() {
        let cases = [
            ("![](./a.jpg)", Dialect::MarkdownInline, "./a.jpg"),
            ("<img src=\"a.jpg\">", Dialect::HtmlTag, "a.jpg"),
            ("<enhanced:img src={m['./a.jpg']} alt=\"\" />", Dialect::EnhancedComponent, "./a.jpg"),
            ("{ src: m['./a.jpg'], alt: '' }", Dialect::GridObject, "./a.jpg"),
        ];
        let caption = "L'église d'Amiens & \"son\" parvis";
        for (line, dialect, locator) in cases {
            let out = rewrite(line, dialect, locator, caption);
            assert_eq!(caption_at(&out, dialect, 0).as_deref(), Some(caption), "{dialect}: {out}");
            assert_eq!(caption_field_count(&out, dialect), 1, "{dialect}: {out}");
            // Rewriting again changes nothing.
            assert_eq!(rewrite(&out, dialect, locator, caption), out);
        }
    }

    fn reference(file: &Path, line_number: usize, locator: &str, dialect: Dialect) -> ImageReference {
        ImageReference {
            file: file.to_path_buf(),
            locator: locator.to_string(),
            caption: String::new(),
            line_number,
            line_content: String::new(),
            dialect,
            occurrence: 0,
            language: Language::En,
        }
    }

    #[test]
    fn file_edit_applies_many_and_writes_once() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("post.md");
        fs::write(&path, "# Post\r\n![](./a.jpg)\r\n<img src=\"b.png\">\r\n").unwrap();

        let mut edit = FileEdit::load(&path).unwrap();
        edit.apply(&reference(&path, 2, "./a.jpg", Dialect::MarkdownInline), "A")
            .unwrap();
        edit.apply(&reference(&path, 3, "b.png", Dialect::HtmlTag), "B")
            .unwrap();
        // Nothing on disk until save.
        assert!(fs::read_to_string(&path).unwrap().contains("![](./a.jpg)"));

        assert!(edit.save().unwrap());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "# Post\r\n![A](./a.jpg)\r\n<img alt=\"B\" src=\"b.png\">\r\n"
        );
        assert!(!edit.save().unwrap());
    }

    #[test]
    fn file_edit_reports_bad_addresses() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("post.md");
        fs::write(&path, "![](./a.jpg)\n").unwrap();
        let mut edit = FileEdit::load(&path).unwrap();

        let err = edit
            .apply(&reference(&path, 9, "./a.jpg", Dialect::MarkdownInline), "x")
            .unwrap_err();
        assert!(matches!(err, MutateError::LineOutOfRange { line: 9, len: 2 }));

        let err = edit
            .apply(&reference(&path, 1, "./z.jpg", Dialect::MarkdownInline), "x")
            .unwrap_err();
        assert!(matches!(err, MutateError::StaleLine { line: 1, .. }));
        assert!(!edit.is_dirty());
    }

    #[test]
    fn file_edit_refuses_expression_caption() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("post.svx");
        fs::write(&path, "<enhanced:img src={m['./a.jpg']} alt={caption} />\n").unwrap();
        let mut edit = FileEdit::load(&path).unwrap();

        let err = edit
            .apply(&reference(&path, 1, "./a.jpg", Dialect::EnhancedComponent), "x")
            .unwrap_err();
        assert!(matches!(err, MutateError::ExpressionCaption(1)));
        assert!(!edit.is_dirty());
    }

    #[test]
    fn save_replaces_file_without_leftovers() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("post.md");
        fs::write(&path, "![](./a.jpg)\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();
        }

        let mut edit = FileEdit::load(&path).unwrap();
        edit.apply(&reference(&path, 1, "./a.jpg", Dialect::MarkdownInline), "A")
            .unwrap();
        assert!(edit.save().unwrap());

        assert_eq!(fs::read_to_string(&path).unwrap(), "![A](./a.jpg)\n");
        let entries: Vec<_> = fs::read_dir(tmp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o640);
        }
    }
}
