//! Locator → filesystem path resolution.
//!
//! | Locator | Resolved against |
//! |---|---|
//! | `./x.jpg`, `../x.jpg` | the owning file's directory |
//! | `/x.jpg` | the static-assets root |
//! | anything else (`hero`, `https://…`) | unresolved |
//!
//! A query string is stripped first. A candidate that does not exist is
//! unresolved too: callers treat `None` as "skip", never as a fault.

use crate::discover::normalize;
use std::path::{Path, PathBuf};

/// Maps locators written in a content file to files on disk.
#[derive(Debug, Clone)]
pub struct Resolver {
    static_root: PathBuf,
}

impl Resolver {
    pub fn new(static_root: impl Into<PathBuf>) -> Self {
        Self {
            static_root: static_root.into(),
        }
    }

    pub fn static_root(&self) -> &Path {
        &self.static_root
    }

    /// The path `locator` would denote, whether or not it exists.
    pub fn candidate(&self, owning_file: &Path, locator: &str) -> Option<PathBuf> {
        let clean = strip_query(locator);
        if clean.starts_with("./") || clean.starts_with("../") {
            let dir = owning_file.parent()?;
            Some(normalize(&dir.join(clean)))
        } else if let Some(rooted) = clean.strip_prefix('/') {
            // `//host/x` is protocol-relative, not root-relative.
            if rooted.starts_with('/') {
                return None;
            }
            Some(normalize(&self.static_root.join(rooted)))
        } else {
            None
        }
    }

    /// Resolve `locator` to an existing file.
    pub fn resolve(&self, owning_file: &Path, locator: &str) -> Option<PathBuf> {
        self.candidate(owning_file, locator).filter(|p| p.exists())
    }
}

/// `a.jpg?w=400` → `a.jpg`.
pub fn strip_query(locator: &str) -> &str {
    locator.split('?').next().unwrap_or(locator)
}
