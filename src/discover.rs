//! Content file discovery.
//!
//! Accepts either a literal path or a shell-style pattern and produces the
//! sorted list of absolute content files it denotes.
//!
//! | Input | Behaviour |
//! |---|---|
//! | `posts/a/a.md` | the file, if it exists |
//! | `posts/` | every content file below the directory |
//! | `posts/**/*.md` | `**/` spans any number of directories |
//! | `posts/2023-*/*.md` | `*` and `?` match within one path segment |
//! | `posts/{a,b}/*.md` | alternatives and `[...]` classes |
//!
//! The walk starts at the longest wildcard-free directory prefix of the
//! pattern. Unreadable directories are skipped; they never abort a scan.

use globset::{GlobBuilder, GlobMatcher};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum DiscoverError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid pattern '{0}'")]
    Pattern(String),
}

/// True when `path`'s file name ends in one of `extensions` (without the dot).
///
/// Compound extensions such as `svelte.md` are supported, which is why this
/// compares name suffixes instead of [`Path::extension`].
pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
    let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_lowercase()) else {
        return false;
    };
    extensions
        .iter()
        .any(|ext| name.len() > ext.len() + 1 && name.ends_with(&format!(".{}", ext.to_lowercase())))
}

/// All files with a matching extension below `dir`, sorted by path.
pub fn find_files(dir: &Path, extensions: &[String]) -> Vec<PathBuf> {
    walk_files(dir)
        .into_iter()
        .filter(|p| has_extension(p, extensions))
        .collect()
}

/// Expand a literal path or a glob pattern into absolute content files.
///
/// A literal path that does not exist yields an empty list.
pub fn expand_pattern(pattern: &str, extensions: &[String]) -> Result<Vec<PathBuf>, DiscoverError> {
    if !is_glob(pattern) {
        let path = absolute(Path::new(pattern))?;
        if path.is_dir() {
            return Ok(find_files(&path, extensions));
        }
        if path.is_file() {
            return Ok(vec![path]);
        }
        return Ok(Vec::new());
    }

    let (base, rest) = split_literal_prefix(pattern);
    let base = absolute(&base)?;
    let matcher = compile_glob(&rest)?;

    Ok(walk_files(&base)
        .into_iter()
        .filter(|p| has_extension(p, extensions))
        .filter(|p| {
            p.strip_prefix(&base)
                .map(|rel| matcher.is_match(rel))
                .unwrap_or(false)
        })
        .collect())
}

fn is_glob(segment: &str) -> bool {
    segment.contains(['*', '?', '[', '{'])
}

/// Split `a/b/c*/**/*.md` into (`a/b`, `c*/**/*.md`).
fn split_literal_prefix(pattern: &str) -> (PathBuf, String) {
    let segments: Vec<&str> = pattern.split('/').collect();
    let first_wild = segments
        .iter()
        .position(|s| is_glob(s))
        .unwrap_or(segments.len());

    let base = segments[..first_wild].join("/");
    let base = if base.is_empty() && pattern.starts_with('/') {
        PathBuf::from("/")
    } else if base.is_empty() {
        PathBuf::from(".")
    } else {
        PathBuf::from(base)
    };
    (base, segments[first_wild..].join("/"))
}

/// Compile the wildcard part of a pattern. `*` and `?` stay within one
/// path segment; `**/` spans any number of directories.
fn compile_glob(glob: &str) -> Result<GlobMatcher, DiscoverError> {
    GlobBuilder::new(glob)
        .literal_separator(true)
        .build()
        .map(|g| g.compile_matcher())
        .map_err(|e| DiscoverError::Pattern(format!("{glob}: {}", e.kind())))
}

fn walk_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect()
}

/// Make `path` absolute against the working directory and drop `.` and `..`
/// components without touching the filesystem.
pub fn absolute(path: &Path) -> std::io::Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    Ok(normalize(&joined))
}

/// Lexically resolve `.` and `..` components.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn exts() -> Vec<String> {
        vec!["md".into(), "svx".into(), "svelte.md".into()]
    }

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    fn tree() -> TempDir {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "posts/2023-a/a.md");
        touch(tmp.path(), "posts/2023-b/b.svx");
        touch(tmp.path(), "posts/2024-c/c.svelte.md");
        touch(tmp.path(), "posts/2024-c/notes.txt");
        touch(tmp.path(), "posts/top.md");
        tmp
    }

    fn names(files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn compound_extension_matches() {
        assert!(has_extension(Path::new("a.svelte.md"), &exts()));
        assert!(has_extension(Path::new("A.MD"), &exts()));
        assert!(!has_extension(Path::new("a.txt"), &exts()));
        assert!(!has_extension(Path::new(".md"), &exts()));
    }

    #[test]
    fn directory_scan_is_recursive_and_sorted() {
        let tmp = tree();
        let files = find_files(&tmp.path().join("posts"), &exts());
        assert_eq!(names(&files), vec!["a.md", "b.svx", "c.svelte.md", "top.md"]);
    }

    #[test]
    fn double_star_pattern() {
        let tmp = tree();
        let pattern = format!("{}/posts/**/*.md", tmp.path().display());
        let files = expand_pattern(&pattern, &exts()).unwrap();
        assert_eq!(names(&files), vec!["a.md", "c.svelte.md", "top.md"]);
    }

    #[test]
    fn single_star_in_directory_segment() {
        let tmp = tree();
        let pattern = format!("{}/posts/2023-*/*", tmp.path().display());
        let files = expand_pattern(&pattern, &exts()).unwrap();
        assert_eq!(names(&files), vec!["a.md", "b.svx"]);
    }

    #[test]
    fn literal_file_and_missing_path() {
        let tmp = tree();
        let file = tmp.path().join("posts/top.md");
        let files = expand_pattern(&file.to_string_lossy(), &exts()).unwrap();
        assert_eq!(files, vec![file]);

        let missing = tmp.path().join("posts/nope.md");
        assert!(expand_pattern(&missing.to_string_lossy(), &exts()).unwrap().is_empty());
    }

    #[test]
    fn missing_directory_is_empty_not_error() {
        assert!(find_files(Path::new("/definitely/not/here"), &exts()).is_empty());
    }

    #[test]
    fn glob_matching() {
        let glob = compile_glob("**/*.md").unwrap();
        assert!(glob.is_match("a.md"));
        assert!(glob.is_match("x/y/a.md"));
        assert!(!glob.is_match("x/a.svx"));

        let glob = compile_glob("20?3-*/*.md").unwrap();
        assert!(glob.is_match("2023-x/a.md"));
        assert!(!glob.is_match("2023-x/y/a.md"));
    }

    #[test]
    fn alternatives_and_classes_are_wildcards() {
        let tmp = tree();
        let pattern = format!("{}/posts/{{2023-a,2024-c}}/*", tmp.path().display());
        let files = expand_pattern(&pattern, &exts()).unwrap();
        assert_eq!(names(&files), vec!["a.md", "c.svelte.md"]);

        let pattern = format!("{}/posts/202[3]-?/*", tmp.path().display());
        let files = expand_pattern(&pattern, &exts()).unwrap();
        assert_eq!(names(&files), vec!["a.md", "b.svx"]);
    }

    #[test]
    fn malformed_pattern_is_an_error() {
        let err = expand_pattern("posts/{a,b/*.md", &exts()).unwrap_err();
        assert!(matches!(err, DiscoverError::Pattern(_)));
    }

    #[test]
    fn normalize_drops_dot_segments() {
        assert_eq!(
            normalize(Path::new("/posts/x/./files/../files/a.jpg")),
            PathBuf::from("/posts/x/files/a.jpg")
        );
    }
}
